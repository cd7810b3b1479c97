//! Input checks that produce field-level validation details.

use crate::error::{DiningError, FieldError};

/// Collects field errors and turns them into one `Validation` error.
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldError>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &'static str, message: &str) -> &mut Self {
        if !ok {
            self.0.push(FieldError::new(field, message));
        }
        self
    }

    pub fn into_result(self) -> Result<(), DiningError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(DiningError::Validation(self.0))
        }
    }
}

/// Loose structural check: one `@`, non-empty local part, dotted domain.
pub fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Trim and drop empty strings.
pub fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

/// Canonical card number: whitespace removed, upper-cased. `None` when blank.
pub fn normalize_id_card(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    (!compact.is_empty()).then(|| compact.to_uppercase())
}
