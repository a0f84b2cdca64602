//! Best-effort recovery of contract condition text from source spans.
//!
//! The statement's span covers the whole call (`Contract.Requires(x != null,
//! "msg");`). The condition is the text from the first `(` up to the first
//! top-level `,` or the matching `)`. Nested brackets, string literals
//! (regular and verbatim) and character literals are skipped over. Lines
//! after the first are re-indented relative to the condition's start column.

use contractor_core::{SourceProvider, SourceSpan};

/// Text of the first argument of the call covered by `span`.
pub fn recover_condition_text(provider: &dyn SourceProvider, span: &SourceSpan) -> Option<String> {
    let text = provider.span_text(span)?;
    let open = text.find('(')?;
    extract_argument(&text, open + 1, true, span.start_column)
}

/// Text of the guard of the `if` statement covered by `span`.
pub fn recover_guard_text(provider: &dyn SourceProvider, span: &SourceSpan) -> Option<String> {
    let text = provider.span_text(span)?;
    let keyword = text.find("if")?;
    let open = keyword + text[keyword..].find('(')?;
    extract_argument(&text, open + 1, false, span.start_column)
}

/// Scans `text` from byte `start` to the closing delimiter and returns the
/// trimmed, re-indented slice. `None` if the delimiter never appears.
fn extract_argument(text: &str, start: usize, stop_at_comma: bool, span_column: u32) -> Option<String> {
    let end = start + find_argument_end(&text[start..], stop_at_comma)?;
    let raw = &text[start..end];

    let leading = raw.len() - raw.trim_start().len();
    let arg_start = start + leading;
    let line_start = text[..arg_start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let mut column = text[line_start..arg_start].chars().count();
    if line_start == 0 {
        // The span's first line starts mid-line in the document.
        column += span_column.saturating_sub(1) as usize;
    }

    Some(reindent(raw.trim(), column))
}

/// Byte offset of the first top-level terminator in `s`.
pub(crate) fn find_argument_end(s: &str, stop_at_comma: bool) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                if depth == 0 {
                    return (c == ')').then_some(i);
                }
                depth -= 1;
            }
            ',' if depth == 0 && stop_at_comma => return Some(i),
            '@' if matches!(chars.peek(), Some((_, '"'))) => {
                chars.next();
                // Verbatim string: `""` is an escaped quote.
                loop {
                    match chars.next()? {
                        (_, '"') if matches!(chars.peek(), Some((_, '"'))) => {
                            chars.next();
                        }
                        (_, '"') => break,
                        _ => {}
                    }
                }
            }
            '"' | '\'' => loop {
                match chars.next()? {
                    (_, '\\') => {
                        chars.next();
                    }
                    (_, q) if q == c => break,
                    _ => {}
                }
            },
            _ => {}
        }
    }
    None
}

/// Byte offsets of the characters of `s` that sit at bracket depth zero and
/// outside string and character literals. Brackets are not included.
pub(crate) fn top_level_offsets(s: &str) -> Vec<usize> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '@' if matches!(chars.peek(), Some((_, '"'))) => {
                chars.next();
                while let Some((_, q)) = chars.next() {
                    if q == '"' {
                        if matches!(chars.peek(), Some((_, '"'))) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            '"' | '\'' => {
                while let Some((_, q)) = chars.next() {
                    if q == '\\' {
                        chars.next();
                    } else if q == c {
                        break;
                    }
                }
            }
            _ if depth == 0 => out.push(i),
            _ => {}
        }
    }
    out
}

/// Removes up to `column` leading whitespace characters from every line but
/// the first.
fn reindent(text: &str, column: usize) -> String {
    let mut lines = text.lines();
    let mut out = String::from(lines.next().unwrap_or(""));
    for line in lines {
        out.push('\n');
        let strip = line
            .chars()
            .take(column)
            .take_while(|c| c.is_whitespace())
            .count();
        out.extend(line.chars().skip(strip));
    }
    out
}
