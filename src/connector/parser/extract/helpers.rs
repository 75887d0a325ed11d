use sha2::{Digest, Sha256};
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor, Tree};

/// A named scope (function/class/impl/module) collected in one pass, with its
/// qualified name computed from nesting.
#[derive(Debug, Clone)]
pub struct ScopeInfo {
    pub start_line: u32,
    pub end_line: u32,
    pub start_byte: usize,
    pub end_byte: usize,
    pub name: String,
    pub qualified: String,
    /// The outer capture name from the scope query (e.g. `class`, `impl`).
    pub kind: String,
}

/// Collect scopes from `scope_query` matches (captures: `@name` inside an
/// outer capture) and qualify nested names as `outer.inner`.
pub fn collect_scopes(tree: &Tree, content: &str, query: &Query) -> Vec<ScopeInfo> {
    let capture_names: Vec<&str> = query.capture_names().to_vec();
    let mut cursor = QueryCursor::new();
    let mut matches_iter = cursor.matches(query, tree.root_node(), content.as_bytes());

    let mut raw: Vec<(usize, usize, u32, u32, String, String)> = Vec::new();
    while let Some(query_match) = matches_iter.next() {
        let mut name: Option<String> = None;
        let mut main_node: Option<Node> = None;
        let mut kind = String::new();
        for capture in query_match.captures {
            let capture_name = capture_names
                .get(capture.index as usize)
                .copied()
                .unwrap_or("");
            if capture_name == "name" {
                name = Some(content[capture.node.byte_range()].to_string());
            } else {
                main_node = Some(capture.node);
                kind = capture_name.to_string();
            }
        }
        if let (Some(node), Some(name)) = (main_node, name) {
            raw.push((
                node.start_byte(),
                node.end_byte(),
                node.start_position().row as u32 + 1,
                node.end_position().row as u32 + 1,
                name,
                kind,
            ));
        }
    }

    // Outer scopes first so parents are qualified before their children.
    raw.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut scopes: Vec<ScopeInfo> = Vec::new();
    for (start_byte, end_byte, start_line, end_line, name, kind) in raw {
        let qualified = match tightest_containing(&scopes, start_byte, end_byte) {
            Some(parent) => format!("{}.{}", parent.qualified, name),
            None => name.clone(),
        };
        scopes.push(ScopeInfo {
            start_line,
            end_line,
            start_byte,
            end_byte,
            name,
            qualified,
            kind,
        });
    }
    scopes
}

/// The tightest scope whose byte range strictly contains `[start, end)`.
pub fn tightest_containing<'a>(
    scopes: &'a [ScopeInfo],
    start_byte: usize,
    end_byte: usize,
) -> Option<&'a ScopeInfo> {
    scopes
        .iter()
        .filter(|s| s.start_byte < start_byte && end_byte <= s.end_byte)
        .min_by_key(|s| s.end_byte - s.start_byte)
}

/// The tightest scope containing a line, for enclosing-symbol hints.
pub fn enclosing_scope<'a>(scopes: &'a [ScopeInfo], line: u32) -> Option<&'a ScopeInfo> {
    scopes
        .iter()
        .filter(|s| s.start_line <= line && line <= s.end_line)
        .min_by_key(|s| s.end_line - s.start_line)
}

/// Short content hash for change detection on symbol bodies.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// The contiguous comment block immediately preceding `node`, if any. A gap
/// of more than one line breaks the attachment.
pub fn preceding_comment_block(node: Node, content: &str) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut cursor = node;
    // Decorated definitions attach docs above the decorators.
    while let Some(parent) = cursor.parent() {
        if parent.kind().contains("decorated") || parent.kind() == "export_statement" {
            cursor = parent;
        } else {
            break;
        }
    }
    let mut expected_end = cursor.start_position().row;
    let mut sibling = cursor.prev_sibling();
    while let Some(prev) = sibling {
        if !prev.kind().contains("comment") {
            break;
        }
        let gap = expected_end.saturating_sub(prev.end_position().row);
        if gap > 1 {
            break;
        }
        lines.push(content[prev.byte_range()].to_string());
        expected_end = prev.start_position().row;
        sibling = prev.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n"))
}

/// First human-readable line of a raw comment block, stripped of markers.
pub fn doc_description(raw: &str) -> Option<String> {
    for line in raw.lines() {
        let cleaned = line
            .trim()
            .trim_start_matches("/**")
            .trim_start_matches("/*")
            .trim_end_matches("*/")
            .trim_start_matches("///")
            .trim_start_matches("//!")
            .trim_start_matches("//")
            .trim_start_matches('*')
            .trim_start_matches('#')
            .trim();
        if !cleaned.is_empty() {
            return Some(cleaned.to_string());
        }
    }
    None
}

/// Names that are language noise rather than meaningful usage targets.
pub fn is_noise_name(name: &str) -> bool {
    name.len() < 2
        || matches!(
            name,
            "if" | "else"
                | "for"
                | "while"
                | "return"
                | "true"
                | "false"
                | "null"
                | "None"
                | "self"
                | "this"
                | "super"
                | "int"
                | "str"
                | "bool"
                | "float"
                | "string"
                | "number"
                | "void"
                | "i8"
                | "i16"
                | "i32"
                | "i64"
                | "u8"
                | "u16"
                | "u32"
                | "u64"
                | "f32"
                | "f64"
                | "usize"
                | "isize"
                | "char"
                | "Vec"
                | "Box"
                | "Option"
                | "Result"
                | "String"
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_stable_and_short() {
        let a = content_hash("fn f() {}");
        let b = content_hash("fn f() {}");
        let c = content_hash("fn g() {}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_doc_description_strips_markers() {
        assert_eq!(
            doc_description("/** Greets a user.\n * @param name */").as_deref(),
            Some("Greets a user.")
        );
        assert_eq!(
            doc_description("/// Returns the sum.").as_deref(),
            Some("Returns the sum.")
        );
        assert_eq!(doc_description("//\n//"), None);
    }

    #[test]
    fn test_noise_names() {
        assert!(is_noise_name("if"));
        assert!(is_noise_name("x"));
        assert!(!is_noise_name("helper"));
    }
}
