use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::application::{StructureIndex, UsageLink};
use crate::domain::{resolved_matches_file, DomainError, Import, Symbol, Usage};

/// Resolves each usage's name against the commit's symbols after extraction
/// completes (C10).
///
/// Enclosing symbols match by qualified name within the usage's file.
/// Definitions prefer an import-binding match in the same file (imported
/// `foo` resolves to the `foo` defined in the import's resolved module), then
/// fall back to a unique exact-name match anywhere in the commit. Ambiguity
/// stays unlinked; linking never removes an existing link.
pub struct UsageLinker {
    structure: Arc<dyn StructureIndex>,
}

/// Outcome counts for one linking pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkReport {
    pub usages_seen: usize,
    pub enclosing_linked: usize,
    pub definitions_linked: usize,
}

impl UsageLinker {
    pub fn new(structure: Arc<dyn StructureIndex>) -> Self {
        Self { structure }
    }

    pub async fn link_commit(&self, commit_id: i64) -> Result<LinkReport, DomainError> {
        let symbols = self.structure.symbols_for_commit(commit_id).await?;
        let usages = self.structure.usages_for_commit(commit_id).await?;
        let imports = self.structure.imports_for_commit(commit_id).await?;

        let links = compute_links(&symbols, &usages, &imports);
        let report = LinkReport {
            usages_seen: usages.len(),
            enclosing_linked: links
                .iter()
                .filter(|l| l.enclosing_symbol_id.is_some())
                .count(),
            definitions_linked: links
                .iter()
                .filter(|l| l.definition_symbol_id.is_some())
                .count(),
        };
        self.structure.apply_usage_links(&links).await?;
        debug!(
            "Linked {}/{} usages to definitions ({} enclosing) for commit {}",
            report.definitions_linked, report.usages_seen, report.enclosing_linked, commit_id
        );
        Ok(report)
    }
}

/// Pure linking pass over in-memory rows, shared with tests.
pub fn compute_links(symbols: &[Symbol], usages: &[Usage], imports: &[Import]) -> Vec<UsageLink> {
    // (file_path, qualified_name) → symbol, for enclosing resolution.
    let mut by_file_qualified: HashMap<(&str, &str), i64> = HashMap::new();
    // name → symbols, for global definition matching.
    let mut by_name: HashMap<&str, Vec<&Symbol>> = HashMap::new();
    for symbol in symbols {
        by_file_qualified.insert(
            (symbol.file_path.as_str(), symbol.qualified_name.as_str()),
            symbol.id,
        );
        by_name.entry(symbol.name.as_str()).or_default().push(symbol);
    }

    // (file_path, local_name) → import, for the binding-preferred path.
    let mut bindings_by_file: HashMap<(&str, &str), (&Import, &str)> = HashMap::new();
    for import in imports {
        for binding in &import.bindings {
            bindings_by_file.insert(
                (import.file_path.as_str(), binding.local_name.as_str()),
                (import, binding.imported_name.as_str()),
            );
        }
    }

    let mut links = Vec::new();
    for usage in usages {
        // Enclosing symbol: the extractor's qualified-name hint matched
        // within the usage's file, else the tightest symbol by position.
        let enclosing = usage.enclosing_symbol_id.or_else(|| {
            usage
                .enclosing_hint
                .as_deref()
                .and_then(|hint| {
                    by_file_qualified
                        .get(&(usage.file_path.as_str(), hint))
                        .copied()
                })
                .or_else(|| enclosing_by_position(symbols, usage))
        });

        let definition = if usage.definition_symbol_id.is_some() {
            // Monotonic: a linked usage never downgrades.
            None
        } else {
            resolve_definition(usage, &by_name, &bindings_by_file)
        };

        if enclosing != usage.enclosing_symbol_id || definition.is_some() {
            links.push(UsageLink {
                usage_id: usage.id,
                enclosing_symbol_id: enclosing,
                definition_symbol_id: definition,
            });
        }
    }
    links
}

fn enclosing_by_position(symbols: &[Symbol], usage: &Usage) -> Option<i64> {
    symbols
        .iter()
        .filter(|s| s.file_path == usage.file_path && s.contains_line(usage.line))
        .min_by_key(|s| s.end_line - s.start_line)
        .map(|s| s.id)
}

fn resolve_definition(
    usage: &Usage,
    by_name: &HashMap<&str, Vec<&Symbol>>,
    bindings_by_file: &HashMap<(&str, &str), (&Import, &str)>,
) -> Option<i64> {
    // (a) Import binding in the same file: follow the resolved module.
    if let Some((import, imported_name)) =
        bindings_by_file.get(&(usage.file_path.as_str(), usage.symbol_name.as_str()))
    {
        if let Some(resolved) = &import.resolved_path {
            let lookup_name = if *imported_name == "default" || *imported_name == "*" {
                usage.symbol_name.as_str()
            } else {
                *imported_name
            };
            let in_module: Vec<&&Symbol> = by_name
                .get(lookup_name)
                .map(|candidates| {
                    candidates
                        .iter()
                        .filter(|s| resolved_matches_file(resolved, &s.file_path))
                        .collect()
                })
                .unwrap_or_default();
            if in_module.len() == 1 {
                return Some(in_module[0].id);
            }
        }
    }

    // (b) Unique exact name match across the commit; skip self-references to
    // the declaration site itself.
    let candidates: Vec<&&Symbol> = by_name
        .get(usage.symbol_name.as_str())
        .map(|all| {
            all.iter()
                .filter(|s| !(s.file_path == usage.file_path && s.start_line == usage.line))
                .collect()
        })
        .unwrap_or_default();
    if candidates.len() == 1 {
        return Some(candidates[0].id);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ImportBinding, ImportType, SymbolKind, UsageType};

    fn symbol(id: i64, name: &str, file: &str, start: u32, end: u32) -> Symbol {
        Symbol {
            id,
            repo_id: "r".to_string(),
            commit_id: 1,
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind: SymbolKind::Function,
            file_path: file.to_string(),
            start_line: start,
            end_line: end,
            visibility: None,
            is_async: false,
            is_static: false,
            is_exported: true,
            return_type: None,
            parent_symbol_id: None,
            content_hash: String::new(),
        }
    }

    fn usage(id: i64, name: &str, file: &str, line: u32) -> Usage {
        Usage {
            id,
            commit_id: 1,
            symbol_name: name.to_string(),
            file_path: file.to_string(),
            line,
            column: 1,
            usage_type: UsageType::Call,
            enclosing_hint: None,
            enclosing_symbol_id: None,
            definition_symbol_id: None,
        }
    }

    fn import_of(file: &str, specifier: &str, local: &str) -> Import {
        Import {
            id: 1,
            commit_id: 1,
            file_path: file.to_string(),
            line: 1,
            import_type: ImportType::EsImport,
            module_specifier: specifier.to_string(),
            resolved_path: crate::domain::resolve_relative(file, specifier),
            bindings: vec![ImportBinding::plain(local)],
        }
    }

    #[test]
    fn test_links_via_import_binding() {
        let symbols = vec![
            symbol(1, "helper", "src/utils.ts", 1, 3),
            symbol(2, "greet", "src/index.ts", 3, 6),
        ];
        let usages = vec![usage(10, "helper", "src/index.ts", 4)];
        let imports = vec![import_of("src/index.ts", "./utils", "helper")];

        let links = compute_links(&symbols, &usages, &imports);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].definition_symbol_id, Some(1));
        assert_eq!(links[0].enclosing_symbol_id, Some(2));
    }

    #[test]
    fn test_ambiguous_name_stays_unlinked() {
        let symbols = vec![
            symbol(1, "helper", "a.ts", 1, 3),
            symbol(2, "helper", "b.ts", 1, 3),
            symbol(3, "caller", "c.ts", 1, 5),
        ];
        let usages = vec![usage(10, "helper", "c.ts", 2)];
        let links = compute_links(&symbols, &usages, &[]);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].definition_symbol_id, None);
        assert_eq!(links[0].enclosing_symbol_id, Some(3));
    }

    #[test]
    fn test_unique_global_match_links() {
        let symbols = vec![symbol(1, "helper", "a.ts", 1, 3)];
        let usages = vec![usage(10, "helper", "b.ts", 2)];
        let links = compute_links(&symbols, &usages, &[]);
        assert_eq!(links[0].definition_symbol_id, Some(1));
    }

    #[test]
    fn test_linked_usage_never_downgrades() {
        let symbols = vec![symbol(1, "helper", "a.ts", 1, 3)];
        let mut already = usage(10, "helper", "b.ts", 2);
        already.definition_symbol_id = Some(99);
        let links = compute_links(&symbols, &[already], &[]);
        // No definition update is produced for an already-linked usage.
        assert!(links
            .iter()
            .all(|l| l.definition_symbol_id.is_none() || l.definition_symbol_id == Some(99)));
    }
}
