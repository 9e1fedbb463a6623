// src/graph/args.rs

//! Quoting-aware splitting of a tool's parameter string.
//!
//! Follows Windows command-line rules, because tool paths in build jobs are
//! commonly Windows paths:
//! - whitespace outside quotes separates arguments,
//! - `"` toggles quoting,
//! - `2n` backslashes before a quote become `n` backslashes and the quote
//!   toggles; `2n+1` backslashes become `n` backslashes and a literal quote,
//! - backslashes not followed by a quote are literal.

/// One argument with both its raw text and its unquoted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalArgument {
    /// Exactly as written in the parameter string, quotes included.
    pub original: String,
    /// The value the launched process would observe.
    pub logical: String,
}

impl LogicalArgument {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            original: value.clone(),
            logical: value,
        }
    }
}

/// Split a parameter string into arguments.
pub fn split_arguments(params: &str) -> Vec<LogicalArgument> {
    let chars: Vec<(usize, char)> = params.char_indices().collect();
    let mut result = Vec::new();

    let mut logical = String::new();
    let mut start: Option<usize> = None;
    let mut in_quotes = false;
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];

        if c.is_whitespace() && !in_quotes {
            if let Some(s) = start.take() {
                result.push(LogicalArgument {
                    original: params[s..offset].to_string(),
                    logical: std::mem::take(&mut logical),
                });
            }
            i += 1;
            continue;
        }

        if start.is_none() {
            start = Some(offset);
        }

        match c {
            '\\' => {
                let mut run = 0;
                while i < chars.len() && chars[i].1 == '\\' {
                    run += 1;
                    i += 1;
                }
                if i < chars.len() && chars[i].1 == '"' {
                    logical.extend(std::iter::repeat_n('\\', run / 2));
                    if run % 2 == 1 {
                        logical.push('"');
                    } else {
                        in_quotes = !in_quotes;
                    }
                    i += 1;
                } else {
                    logical.extend(std::iter::repeat_n('\\', run));
                }
            }
            '"' => {
                in_quotes = !in_quotes;
                i += 1;
            }
            other => {
                logical.push(other);
                i += 1;
            }
        }
    }

    if let Some(s) = start {
        result.push(LogicalArgument {
            original: params[s..].to_string(),
            logical,
        });
    }

    result
}
