//! Table and type naming rules.
//!
//! Type references may be written with `.`, `\` or `::` as namespace
//! separators (`App.Models.User`, `\App\Models\User`, `app::models::User`);
//! all of them name the same model.

/// Converts an identifier to lower snake case.
///
/// An underscore is inserted before every uppercase letter that follows a
/// letter or digit, and runs of `-`, `_` or whitespace collapse into a single
/// underscore.
#[must_use]
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    let mut prev: Option<char> = None;
    for c in s.trim().chars() {
        if c == '-' || c == '_' || c.is_whitespace() {
            if !result.is_empty() && !result.ends_with('_') {
                result.push('_');
            }
        } else if c.is_uppercase() {
            if prev.is_some_and(char::is_alphanumeric) {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
        prev = Some(c);
    }
    while result.ends_with('_') {
        result.pop();
    }
    result
}

/// Rewrites every namespace separator to `.` and drops leading separators.
#[must_use]
pub fn canonical_type(type_ref: &str) -> String {
    type_ref
        .trim()
        .replace("::", ".")
        .replace('\\', ".")
        .trim_start_matches('.')
        .to_string()
}

/// Returns the last segment of a type reference.
#[must_use]
pub fn short_name(type_ref: &str) -> String {
    canonical_type(type_ref)
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Default table name for a model type: snake-cased short name plus `s`.
#[must_use]
pub fn default_table_name(type_ref: &str) -> String {
    format!("{}s", to_snake_case(&short_name(type_ref)))
}

/// Normalizes a configured table prefix.
///
/// Namespace separators are stripped, the rest is snake-cased and `_` is
/// appended. A blank prefix yields an empty string.
#[must_use]
pub fn normalize_prefix(prefix: &str) -> String {
    let stripped: String = prefix
        .trim()
        .replace("::", "")
        .chars()
        .filter(|c| *c != '\\' && *c != '.')
        .collect();
    if stripped.is_empty() {
        return String::new();
    }
    format!("{}_", to_snake_case(&stripped))
}
