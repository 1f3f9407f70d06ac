mod article;
mod booking;
mod fixture;
mod merchandise;
mod squad;
mod user;

pub use article::*;
pub use booking::*;
pub use fixture::*;
pub use merchandise::*;
pub use squad::*;
pub use user::*;

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, FieldError};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").expect("email pattern compiles")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// slugify
///
/// URL slug for article titles and merchandise names: lower-cased and
/// trimmed, characters other than ASCII letters, digits, whitespace, `_` and
/// `-` dropped, and every run of whitespace, `_` or `-` collapsed into a single
/// `-` with none at either end.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '_' || c == '-' {
            pending_dash = true;
        }
    }
    slug
}

/// Collects field-level validation failures; the first failure per field wins.
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldError>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        if self.0.iter().any(|e| e.field == field) {
            return;
        }
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::FieldValidation(self.0))
        }
    }
}

/// Trims a required text input, recording `message` when it is absent or blank.
pub(crate) fn required(
    violations: &mut Violations,
    field: &str,
    value: Option<String>,
    message: &str,
) -> String {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        violations.add(field, message);
    }
    value
}

/// Records a violation when `value` is longer than `max` characters.
pub(crate) fn max_length(violations: &mut Violations, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        violations.add(field, format!("{field} can not be more than {max} characters"));
    }
}
