//! Phone normalization and message template rendering.

/// Strip everything but digits. The Cloud API wants country code + number
/// with no `+`, spaces, or punctuation.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// A phone number is deliverable when it has 10–15 digits after stripping.
pub fn is_valid_phone(raw: &str) -> bool {
    let digits = normalize_phone(raw).len();
    (10..=15).contains(&digits)
}

/// Substitute `{{key}}` placeholders. Case-sensitive; unresolved tokens are
/// left verbatim.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut message = template.to_string();
    for (key, value) in vars {
        message = message.replace(&format!("{{{{{key}}}}}"), value);
    }
    message
}
