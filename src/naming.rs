//! Identifier case conversion shared by the function pass and the
//! destination-path derivation.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static ACRONYM_BOUNDARY: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").ok());
static CAMEL_BOUNDARY: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").ok());

const PYTHON_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// Convert a verb-noun or CamelCase identifier to snake_case.
///
/// `Get-ADUser` becomes `get_ad_user`, `ConvertTo-Json` becomes
/// `convert_to_json`. Names that collide with Python keywords get a
/// trailing underscore.
pub fn to_snake_case(name: &str) -> String {
    let mut spaced = name.to_string();
    for boundary in [&*ACRONYM_BOUNDARY, &*CAMEL_BOUNDARY].into_iter().flatten() {
        spaced = boundary.replace_all(&spaced, "${1}_${2}").into_owned();
    }

    let mut out = String::with_capacity(spaced.len());
    for ch in spaced.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    let mut out = out.trim_end_matches('_').to_string();

    if out.is_empty() {
        return "_".to_string();
    }
    if out.starts_with(|c: char| c.is_numeric()) {
        out.insert(0, '_');
    }
    if PYTHON_KEYWORDS.contains(&out.as_str()) {
        out.push('_');
    }
    out
}
