//! Build-time placeholder substitution.
//!
//! `@NAME` placeholders are replaced on the raw source text before the
//! lexer runs, and only at whole-token occurrences: the character after
//! the name must not continue an identifier, so `@BUFSIZE` never rewrites
//! a prefix of `@BUFSIZE_MAX`.

use std::collections::HashMap;

/// Substitute `@NAME` placeholders from `values`. Placeholders with no
/// entry are left in place; the lexer turns them into a dedicated token
/// so the parser can report them precisely.
pub fn substitute_placeholders(source: &str, values: &HashMap<String, String>) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'@' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && is_ident_char(bytes[end]) {
                end += 1;
            }
            if end > start {
                let name = &source[start..end];
                if let Some(value) = values.get(name) {
                    out.push_str(value);
                    i = end;
                    continue;
                }
            }
        }
        let ch = source[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
