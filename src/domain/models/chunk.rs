use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::Language;

/// A named, contiguous region of source code eligible for embedding.
///
/// The chunk's identity is derived from its normalised content (see
/// [`chunk_id`]), so identical definitions share one ID across commits and
/// across machines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    file_path: String,
    symbol: String,
    symbol_type: ChunkKind,
    language: Language,
    start_line: u32,
    end_line: u32,
    content: String,
}

impl Chunk {
    pub fn new(
        file_path: String,
        symbol: String,
        symbol_type: ChunkKind,
        language: Language,
        start_line: u32,
        end_line: u32,
        content: String,
    ) -> Self {
        Self {
            file_path,
            symbol,
            symbol_type,
            language,
            start_line,
            end_line,
            content,
        }
    }

    /// Single whole-file chunk used when no grammar applies or parsing failed.
    pub fn whole_file(file_path: String, language: Language, content: String) -> Self {
        let symbol = std::path::Path::new(&file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&file_path)
            .to_string();
        let end_line = content.lines().count().max(1) as u32;
        Self {
            file_path,
            symbol,
            symbol_type: ChunkKind::File,
            language,
            start_line: 1,
            end_line,
            content,
        }
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn symbol_type(&self) -> ChunkKind {
        self.symbol_type
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// The content-addressed identity of this chunk.
    pub fn id(&self) -> Uuid {
        chunk_id(self.language, &self.file_path, &self.symbol, &self.content)
    }

    /// Truncate chunk content to at most `max_chars`, keeping whole lines.
    pub fn truncated(mut self, max_chars: usize) -> Self {
        if self.content.len() > max_chars {
            let mut cut = 0;
            for line in self.content.lines() {
                let next = cut + line.len() + 1;
                if next > max_chars {
                    break;
                }
                cut = next;
            }
            self.content.truncate(cut.min(self.content.len()));
        }
        self
    }
}

/// The kind of construct a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Function,
    Class,
    Method,
    Interface,
    Struct,
    Enum,
    Trait,
    TypeAlias,
    Constant,
    Module,
    File,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::Class => "class",
            ChunkKind::Method => "method",
            ChunkKind::Interface => "interface",
            ChunkKind::Struct => "struct",
            ChunkKind::Enum => "enum",
            ChunkKind::Trait => "trait",
            ChunkKind::TypeAlias => "type_alias",
            ChunkKind::Constant => "constant",
            ChunkKind::Module => "module",
            ChunkKind::File => "file",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "function" => ChunkKind::Function,
            "class" => ChunkKind::Class,
            "method" => ChunkKind::Method,
            "interface" => ChunkKind::Interface,
            "struct" => ChunkKind::Struct,
            "enum" => ChunkKind::Enum,
            "trait" => ChunkKind::Trait,
            "type_alias" => ChunkKind::TypeAlias,
            "constant" => ChunkKind::Constant,
            "module" => ChunkKind::Module,
            _ => ChunkKind::File,
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalise chunk content for identity: strip per-line trailing whitespace,
/// convert line endings to `\n`, and trim leading/trailing blank lines.
pub fn normalize_content(content: &str) -> String {
    let unixified = content.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = unixified.lines().map(|l| l.trim_end()).collect();
    let start = lines
        .iter()
        .position(|l| !l.is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map(|i| i + 1)
        .unwrap_or(start);
    lines[start..end].join("\n")
}

/// Deterministic chunk ID: a UUID folded from
/// `SHA-256(language ":" path ":" symbol ":" normalised_content)`.
pub fn chunk_id(language: Language, path: &str, symbol: &str, content: &str) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(language.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(path.as_bytes());
    hasher.update(b":");
    hasher.update(symbol.as_bytes());
    hasher.update(b":");
    hasher.update(normalize_content(content).as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Pair each chunk with its ID, dropping duplicates within the batch.
pub fn deduplicate(chunks: Vec<Chunk>) -> Vec<(Chunk, Uuid)> {
    let mut seen = HashSet::new();
    chunks
        .into_iter()
        .filter_map(|chunk| {
            let id = chunk.id();
            if seen.insert(id) {
                Some((chunk, id))
            } else {
                None
            }
        })
        .collect()
}

/// Deduplicate, then keep only chunks whose IDs are not in `existing`.
pub fn new_ids(chunks: Vec<Chunk>, existing: &HashSet<Uuid>) -> Vec<(Chunk, Uuid)> {
    deduplicate(chunks)
        .into_iter()
        .filter(|(_, id)| !existing.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(content: &str) -> Chunk {
        Chunk::new(
            "src/utils.ts".to_string(),
            "helper".to_string(),
            ChunkKind::Function,
            Language::TypeScript,
            1,
            3,
            content.to_string(),
        )
    }

    #[test]
    fn test_chunk_id_ignores_whitespace_noise() {
        let a = sample("function helper() {\n  return 1;\n}");
        let b = sample("function helper() {   \r\n  return 1;\r\n}\n\n");
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_chunk_id_changes_with_content() {
        let a = sample("function helper() { return 1; }");
        let b = sample("function helper() { return 2; }");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_chunk_id_changes_with_path_symbol_language() {
        let base = chunk_id(Language::TypeScript, "a.ts", "f", "x");
        assert_ne!(base, chunk_id(Language::TypeScript, "b.ts", "f", "x"));
        assert_ne!(base, chunk_id(Language::TypeScript, "a.ts", "g", "x"));
        assert_ne!(base, chunk_id(Language::JavaScript, "a.ts", "f", "x"));
    }

    #[test]
    fn test_normalize_trims_blank_lines() {
        assert_eq!(normalize_content("\n\nfn a() {}  \n\n"), "fn a() {}");
        assert_eq!(normalize_content(""), "");
    }

    #[test]
    fn test_deduplicate_within_batch() {
        let chunks = vec![sample("same"), sample("same"), sample("other")];
        let deduped = deduplicate(chunks);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_new_ids_set_difference() {
        let first = sample("one");
        let known: HashSet<Uuid> = [first.id()].into_iter().collect();
        let result = new_ids(vec![first, sample("two")], &known);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0.content(), "two");
    }

    #[test]
    fn test_whole_file_chunk() {
        let chunk = Chunk::whole_file(
            "docs/README.md".to_string(),
            Language::Markdown,
            "# Title\n\nBody\n".to_string(),
        );
        assert_eq!(chunk.symbol(), "README.md");
        assert_eq!(chunk.symbol_type(), ChunkKind::File);
        assert_eq!(chunk.start_line(), 1);
        assert_eq!(chunk.end_line(), 3);
    }

    #[test]
    fn test_truncated_keeps_whole_lines() {
        let chunk = sample("line one\nline two\nline three").truncated(12);
        assert_eq!(chunk.content(), "line one\n");
    }
}
