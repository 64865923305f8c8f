//! Input normalization. Every physical line is cleaned in order:
//! comment stripped, tabs to spaces, space runs collapsed, ends
//! trimmed, separator spacing around `,` and `:` removed. Empty lines
//! are dropped; the surviving lines keep their original 1-based number
//! for diagnostics.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

pub fn clean_source(source: &str) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let text = clean_line(raw);
        if !text.is_empty() {
            lines.push(SourceLine {
                number: idx + 1,
                text,
            });
        }
    }
    lines
}

fn clean_line(raw: &str) -> String {
    let code = raw.split('#').next().unwrap_or("");

    // Tabs count as spaces; runs of spaces collapse to one; both ends
    // are trimmed.
    let mut collapsed = String::with_capacity(code.len());
    let mut pending_space = false;
    for ch in code.chars() {
        if ch == ' ' || ch == '\t' {
            pending_space = !collapsed.is_empty();
        } else {
            if pending_space {
                collapsed.push(' ');
                pending_space = false;
            }
            collapsed.push(ch);
        }
    }

    // `a , b` and `lbl : x` canonicalize to `a,b` and `lbl:x`.
    let chars: Vec<char> = collapsed.chars().collect();
    let mut out = String::with_capacity(chars.len());
    for (i, &ch) in chars.iter().enumerate() {
        if ch == ' ' {
            if matches!(chars.get(i + 1), Some(',') | Some(':')) {
                continue;
            }
            if matches!(out.chars().last(), Some(',') | Some(':')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}
