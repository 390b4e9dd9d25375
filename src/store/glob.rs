//! Redis-style glob patterns
//!
//! Supported syntax: `*`, `?`, `[abc]`, `[a-z]`, `[^abc]`, and `\x` to
//! match `x` literally. Patterns are compiled to an anchored regex.

use regex::Regex;

use super::errors::{StoreError, StoreResult};

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compiles a glob pattern
    pub fn new(pattern: &str) -> StoreResult<Self> {
        let translated = translate(pattern)?;
        let regex = Regex::new(&translated).map_err(|e| invalid(pattern, e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Whether `key` matches the whole pattern
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Escapes glob metacharacters so `literal` matches only itself
    pub fn escape(literal: &str) -> String {
        let mut out = String::with_capacity(literal.len());
        for c in literal.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }
}

fn invalid(pattern: &str, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.into(),
    }
}

fn literal(c: char) -> String {
    regex::escape(c.encode_utf8(&mut [0u8; 4]))
}

fn translate(pattern: &str) -> StoreResult<String> {
    let mut out = String::from("^(?s:");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => match chars.next() {
                Some(next) => out.push_str(&literal(next)),
                None => out.push_str(&literal('\\')),
            },
            '[' => {
                let mut class = String::from("[");
                if chars.peek() == Some(&'^') {
                    chars.next();
                    class.push('^');
                }
                let mut members = 0usize;
                let mut closed = false;
                while let Some(m) = chars.next() {
                    let m = match m {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '\\' => chars.next().ok_or_else(|| invalid(pattern, "dangling escape"))?,
                        other => other,
                    };
                    members += 1;
                    class.push_str(&literal(m));
                    // Range: a-z, unless '-' is the last member
                    if chars.peek() == Some(&'-') {
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        if let Some(end) = lookahead.next().filter(|e| *e != ']') {
                            chars.next();
                            chars.next();
                            class.push('-');
                            class.push_str(&literal(end));
                        }
                    }
                }
                if !closed {
                    return Err(invalid(pattern, "unclosed character class"));
                }
                if members == 0 {
                    return Err(invalid(pattern, "empty character class"));
                }
                class.push(']');
                out.push_str(&class);
            }
            other => out.push_str(&literal(other)),
        }
    }

    out.push_str(")$");
    Ok(out)
}
