//! Template substitution: `{stepName.key}` placeholders resolved against a
//! `PipelineContext`.
//!
//! Grammar, exactly per the design notes: left brace, identifier, dot,
//! identifier, right brace. Anything not matching that form — including a
//! brace pair with no dot, or identifiers containing characters outside
//! `[A-Za-z0-9_]` — is left as literal text. Substitution is single-pass,
//! left to right: a value substituted in is never itself rescanned for
//! further placeholders.

use super::context::PipelineContext;

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Resolves every well-formed placeholder in `template` against `context`.
/// Values are stringified when substituted into the surrounding text:
/// JSON strings are unquoted, other JSON types use their JSON rendering.
pub fn resolve(template: &str, context: &PipelineContext) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{' {
            if let Some((replacement, next_i)) = try_match_placeholder(&chars, i, context) {
                out.push_str(&replacement);
                i = next_i;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Attempts to parse a placeholder starting at `chars[start] == '{'`.
/// Returns the resolved (or left-verbatim) text and the index just past the
/// placeholder, or `None` if `chars[start..]` isn't shaped like a
/// placeholder at all (in which case the caller emits `{` literally and
/// advances by one).
fn try_match_placeholder(
    chars: &[char],
    start: usize,
    context: &PipelineContext,
) -> Option<(String, usize)> {
    let mut i = start + 1;
    let step_start = i;
    while i < chars.len() && is_identifier_char(chars[i]) {
        i += 1;
    }
    if i == step_start || i >= chars.len() || chars[i] != '.' {
        return None;
    }
    let step_name: String = chars[step_start..i].iter().collect();
    i += 1; // skip '.'

    let key_start = i;
    while i < chars.len() && is_identifier_char(chars[i]) {
        i += 1;
    }
    if i == key_start || i >= chars.len() || chars[i] != '}' {
        return None;
    }
    let key: String = chars[key_start..i].iter().collect();
    let end = i + 1; // skip '}'

    let placeholder: String = chars[start..end].iter().collect();
    match context.get(&step_name, &key) {
        Some(value) => Some((stringify(value), end)),
        None => Some((placeholder, end)),
    }
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
