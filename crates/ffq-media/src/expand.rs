//! Placeholder expansion and argv tokenization.
//!
//! Expansion happens before tokenization, so a quoted placeholder
//! (`"{{out_1}}"`) expands inside the quoted region and becomes a single
//! argument, while an unquoted one becomes one token.

use std::collections::BTreeMap;

/// Replace every `{{key}}` with its mapped path. Unknown keys are left
/// untouched; replacement is literal substring, no shell interpretation.
pub fn expand_placeholders(cmd: &str, paths: &BTreeMap<String, String>) -> String {
    let mut out = cmd.to_string();
    for (key, path) in paths {
        let placeholder = format!("{{{{{key}}}}}");
        out = out.replace(&placeholder, path);
    }
    out
}

/// Split a command string into argv, respecting single and double quotes.
///
/// A quote character outside a quoted region opens one that ends at the
/// matching character; quote characters are consumed, never emitted. There
/// are no backslash escapes and no nested quotes, so filtergraphs with
/// commas, semicolons, and brackets pass through untouched. A trailing
/// unclosed quote flushes the pending buffer as a final argument.
pub fn tokenize(cmd: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote_char: Option<char> = None;

    for c in cmd.chars() {
        match quote_char {
            None if c == '"' || c == '\'' => quote_char = Some(c),
            Some(q) if c == q => quote_char = None,
            None if c == ' ' => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}
