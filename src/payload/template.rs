//! JSON templates with `//` / `/* */` comments and `{{column}}` placeholders.

use crate::{error::SetupError, input::Row};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{fs, path::Path};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern should compile"));

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Remove `//` line comments and `/* */` block comments outside quoted strings.
///
/// Both `"` and `'` open a string. A backslash escapes the next character only
/// inside a string, so an escaped quote never closes it. Outside strings the only
/// two-character tokens are `//` and `/*`, which keeps a second pass a no-op. The
/// newline ending a line comment is kept.
pub fn strip_comments(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut state = Scan::Code;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match state {
            Scan::Code => match (c, next) {
                ('/', Some('/')) => {
                    state = Scan::LineComment;
                    i += 2;
                    continue;
                }
                ('/', Some('*')) => {
                    state = Scan::BlockComment;
                    i += 2;
                    continue;
                }
                ('"' | '\'', _) => {
                    out.push(c);
                    state = Scan::Quoted(c);
                }
                _ => out.push(c),
            },
            Scan::Quoted(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = next {
                        out.push(escaped);
                        i += 2;
                        continue;
                    }
                } else if c == quote {
                    state = Scan::Code;
                }
            }
            Scan::LineComment => {
                if c == '\n' {
                    out.push(c);
                    state = Scan::Code;
                }
            }
            Scan::BlockComment => {
                if c == '*' && next == Some('/') {
                    state = Scan::Code;
                    i += 2;
                    continue;
                }
            }
        }
        i += 1;
    }

    out
}

/// Placeholder names still present in `text`, in order of appearance.
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Payload text produced for one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    /// False when no placeholder matched and the template was sent as-is.
    pub changed: bool,
}

/// A comment-free JSON template, stripped once at load time.
#[derive(Debug, Clone)]
pub struct Template {
    body: String,
}

impl Template {
    pub fn parse(raw: &str) -> Self {
        Self {
            body: strip_comments(raw),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SetupError::MissingPath(path.to_path_buf()).into());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading template {}", path.display()))?;
        Ok(Self::parse(&raw))
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Substitute `{{header}}` with the row's raw cell for every header of the row.
    /// Placeholders naming no header are left untouched.
    pub fn render(&self, row: &Row) -> Rendered {
        let mut text = self.body.clone();
        for (header, value) in row.iter() {
            let placeholder = format!("{{{{{}}}}}", header);
            if text.contains(&placeholder) {
                text = text.replace(&placeholder, value);
            }
        }
        let changed = text != self.body;
        Rendered { text, changed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::parse_table;
    use std::io::Cursor;

    fn row(csv: &str) -> Row {
        parse_table(Cursor::new(csv)).unwrap().rows.remove(0)
    }

    #[test]
    fn test_strip_line_and_block_comments() {
        let raw = "{\n  // who\n  \"id\": 1, /* inline */ \"n\": 2\n}";
        assert_eq!(strip_comments(raw), "{\n  \n  \"id\": 1,  \"n\": 2\n}");
    }

    #[test]
    fn test_strip_leaves_quoted_text_alone() {
        let raw = r#"{"url": "http://x/*y*/", 'c': '// not a comment', "q": "a\"//b"} // tail"#;
        let stripped = strip_comments(raw);
        assert_eq!(
            stripped,
            r#"{"url": "http://x/*y*/", 'c': '// not a comment', "q": "a\"//b"} "#
        );
    }

    #[test]
    fn test_strip_is_idempotent() {
        let samples = [
            "{\"a\": 1} // c\n/* b */ {\"b\": \"//\"}",
            "/**//x",
            "a/*x*//b",
            "'it\\'s' // gone\n",
            "unterminated /* block",
            r#"\"quoted // kept"#,
            "{\"a\": \\/**/\"//x\"}",
        ];
        for s in samples {
            let once = strip_comments(s);
            assert_eq!(strip_comments(&once), once, "input: {s:?}");
        }
    }

    #[test]
    fn test_backslash_outside_string_does_not_escape_quote() {
        let once = strip_comments("{\"a\": \\/**/\"//x\"}");
        assert_eq!(once, "{\"a\": \\\"//x\"}");
        assert_eq!(strip_comments(&once), once);
    }

    #[test]
    fn test_render_substitutes_known_headers() {
        let template = Template::parse(r#"{"id":"{{case_id}}"}"#);
        let rendered = template.render(&row("case_id\nC9\n"));
        assert_eq!(rendered.text, r#"{"id":"C9"}"#);
        assert!(rendered.changed);
        assert!(unresolved_placeholders(&rendered.text).is_empty());
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        let template = Template::parse(r#"{"id":"{{case_id}}","who":"{{agent}}"} // note"#);
        let rendered = template.render(&row("case_id,extra\nC1,ignored\n"));
        assert_eq!(rendered.text, r#"{"id":"C1","who":"{{agent}}"} "#);
        assert_eq!(unresolved_placeholders(&rendered.text), vec!["agent"]);
    }

    #[test]
    fn test_render_without_match_reports_unchanged() {
        let template = Template::parse(r#"{"static":true}"#);
        let rendered = template.render(&row("case_id\nC1\n"));
        assert!(!rendered.changed);
        assert_eq!(rendered.text, template.body());
    }
}
