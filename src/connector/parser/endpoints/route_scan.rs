use once_cell::sync::Lazy;
use regex::Regex;

/// 1-based line number of a byte offset.
pub fn line_of_offset(content: &str, offset: usize) -> u32 {
    content[..offset.min(content.len())]
        .bytes()
        .filter(|b| *b == b'\n')
        .count() as u32
        + 1
}

/// 1-based line where the parenthesised expression starting at `open_offset`
/// balances out, capped to `max_lines` past the start.
pub fn statement_end_line(content: &str, open_offset: usize, max_lines: u32) -> u32 {
    let start_line = line_of_offset(content, open_offset);
    let mut depth = 0i32;
    let mut line = start_line;
    for byte in content[open_offset.min(content.len())..].bytes() {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth <= 0 {
                    return line;
                }
            }
            b'\n' => {
                line += 1;
                if line - start_line > max_lines {
                    return line - 1;
                }
            }
            _ => {}
        }
    }
    line
}

/// For Ruby-style `get '/x' do ... end` blocks: the line of the matching
/// `end`, by indentation heuristic.
pub fn block_end_line(content: &str, start_offset: usize, max_lines: u32) -> u32 {
    let start_line = line_of_offset(content, start_offset);
    let lines: Vec<&str> = content.lines().collect();
    let start_index = (start_line as usize).saturating_sub(1);
    let Some(first) = lines.get(start_index) else {
        return start_line;
    };
    let indent = first.len() - first.trim_start().len();
    for (i, line) in lines
        .iter()
        .enumerate()
        .skip(start_index + 1)
        .take(max_lines as usize)
    {
        let line_indent = line.len() - line.trim_start().len();
        if line.trim_start().starts_with("end") && line_indent <= indent {
            return i as u32 + 1;
        }
    }
    start_line
}

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*)*").unwrap());

const JS_ARG_KEYWORDS: &[&str] = &[
    "function", "async", "await", "req", "res", "ctx", "next", "request", "reply", "response",
    "true", "false", "null", "undefined", "new", "return", "console",
];

/// Split the argument tail of a JS route call into (middleware, handler).
/// The last bare identifier is the handler reference; identifiers before it
/// are middleware. Inline arrows/functions yield no handler name.
pub fn split_js_handler_args(tail: &str) -> (Vec<String>, Option<String>) {
    let tail = tail.trim().trim_start_matches(',').trim();
    if tail.is_empty() {
        return (Vec::new(), None);
    }
    // Anything past an inline function expression belongs to its body.
    let scan_region = match tail.find("=>").or_else(|| tail.find("function")) {
        Some(pos) => &tail[..pos],
        None => tail,
    };
    let mut names: Vec<String> = IDENTIFIER
        .find_iter(scan_region)
        .map(|m| m.as_str().to_string())
        .filter(|name| {
            let head = name.split('.').next().unwrap_or(name);
            !JS_ARG_KEYWORDS.contains(&head)
        })
        .collect();

    let has_inline = tail.contains("=>") || tail.contains("function");
    if has_inline {
        // All named args before the inline handler are middleware.
        return (names, None);
    }
    let handler = names.pop();
    (names, handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_of_offset() {
        let content = "a\nb\nc\n";
        assert_eq!(line_of_offset(content, 0), 1);
        assert_eq!(line_of_offset(content, 2), 2);
        assert_eq!(line_of_offset(content, 4), 3);
    }

    #[test]
    fn test_statement_end_line_multiline() {
        let content = "app.get('/x',\n  auth,\n  handler\n);\nrest";
        assert_eq!(statement_end_line(content, 7, 20), 4);
    }

    #[test]
    fn test_split_handler_reference() {
        let (middleware, handler) = split_js_handler_args(", auth, rateLimit, getUser");
        assert_eq!(middleware, vec!["auth", "rateLimit"]);
        assert_eq!(handler.as_deref(), Some("getUser"));
    }

    #[test]
    fn test_split_inline_handler() {
        let (middleware, handler) = split_js_handler_args(", auth, (req, res) => res.send('ok'))");
        assert_eq!(middleware, vec!["auth"]);
        assert_eq!(handler, None);
    }

    #[test]
    fn test_block_end_line() {
        let content = "get '/users' do\n  json users\nend\n";
        assert_eq!(block_end_line(content, 0, 50), 3);
    }
}
