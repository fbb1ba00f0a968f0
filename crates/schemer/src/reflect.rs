//! Property declarations.
//!
//! A model declares its persisted fields as annotation lines of the form
//! `<type> $<name> [modifier...]`, for example:
//!
//! ```text
//! int $id primary
//! string $email length=190
//! App.Models.User $owner
//! string $bio text nullable
//! ```
//!
//! Recognized modifiers are `primary`, `length=<int>`, `unsigned`, `text` and
//! `nullable` (or `null`). Anything else is kept on the descriptor and
//! ignored by the resolver, so newer declarations still load.

use crate::error::{MigrateError, Result};

/// Tag that may precede a declaration in doc-comment style sources.
const PROPERTY_TAG: &str = "@property";

/// A declared model field, before any type mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Field (and column) name, without the `$` sigil.
    pub name: String,
    /// Declared type token, exactly as written.
    pub declared_type: String,
    /// Modifiers in declaration order, without duplicates.
    pub modifiers: Vec<String>,
}

impl FieldDescriptor {
    /// Creates a descriptor with no modifiers.
    #[must_use]
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            modifiers: Vec::new(),
        }
    }

    /// Adds a modifier. Duplicates are ignored.
    #[must_use]
    pub fn modifier(mut self, modifier: impl Into<String>) -> Self {
        let modifier = modifier.into();
        if !self.modifiers.contains(&modifier) {
            self.modifiers.push(modifier);
        }
        self
    }

    /// Returns whether the bare modifier is present.
    #[must_use]
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    /// Returns the value of the last `length=<n>` modifier, if it parses.
    #[must_use]
    pub fn length(&self) -> Option<u32> {
        self.modifiers
            .iter()
            .rev()
            .filter_map(|m| m.strip_prefix("length="))
            .find_map(|v| v.parse::<u32>().ok())
            .filter(|len| *len > 0)
    }

    /// Parses one annotation line.
    ///
    /// Leading comment decoration (`/**`, `*`) and an optional `@property`
    /// tag are skipped.
    pub fn parse(line: &str) -> Result<Self> {
        let mut body = line
            .trim()
            .trim_start_matches("/**")
            .trim_start_matches('*')
            .trim();
        if let Some(idx) = body.find(PROPERTY_TAG) {
            body = body[idx + PROPERTY_TAG.len()..].trim();
        }

        let mut tokens = body.split_whitespace();
        let declared_type = tokens
            .next()
            .ok_or_else(|| MigrateError::Reflection(format!("empty declaration: '{line}'")))?;
        let name = tokens
            .next()
            .and_then(|t| t.strip_prefix('$'))
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                MigrateError::Reflection(format!("declaration without '$name': '{line}'"))
            })?;

        let mut field = Self::new(name, declared_type);
        for token in tokens {
            if let Some(value) = token.strip_prefix("length=") {
                if value.parse::<u32>().is_err() {
                    return Err(MigrateError::Reflection(format!(
                        "invalid length '{value}' on field '{name}'"
                    )));
                }
            }
            field = field.modifier(token);
        }
        Ok(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let field = FieldDescriptor::parse("string $name").unwrap();
        assert_eq!(field.name, "name");
        assert_eq!(field.declared_type, "string");
        assert!(field.modifiers.is_empty());
    }

    #[test]
    fn test_parse_modifiers_any_order() {
        let field = FieldDescriptor::parse("int $id unsigned primary length=10").unwrap();
        assert!(field.has_modifier("primary"));
        assert!(field.has_modifier("unsigned"));
        assert_eq!(field.length(), Some(10));
    }

    #[test]
    fn test_parse_doc_comment_line() {
        let field = FieldDescriptor::parse(" * @property \\App\\Models\\User $owner").unwrap();
        assert_eq!(field.name, "owner");
        assert_eq!(field.declared_type, "\\App\\Models\\User");
    }

    #[test]
    fn test_unknown_modifiers_are_kept() {
        let field = FieldDescriptor::parse("string $slug unique indexed").unwrap();
        assert_eq!(field.modifiers, vec!["unique", "indexed"]);
    }

    #[test]
    fn test_duplicate_modifiers_collapse() {
        let field = FieldDescriptor::parse("int $id primary primary").unwrap();
        assert_eq!(field.modifiers, vec!["primary"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            FieldDescriptor::parse("   "),
            Err(MigrateError::Reflection(_))
        ));
        assert!(matches!(
            FieldDescriptor::parse("string name"),
            Err(MigrateError::Reflection(_))
        ));
        assert!(matches!(
            FieldDescriptor::parse("string $"),
            Err(MigrateError::Reflection(_))
        ));
        assert!(matches!(
            FieldDescriptor::parse("string $name length=wide"),
            Err(MigrateError::Reflection(_))
        ));
    }

    #[test]
    fn test_length_zero_is_unset() {
        let field = FieldDescriptor::new("code", "string").modifier("length=0");
        assert_eq!(field.length(), None);
    }
}
