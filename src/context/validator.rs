use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::storage::ServiceContext;

static LEGAL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("context name pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("context name is required")]
    Required,
    #[error(
        "invalid context name '{0}': use lowercase letters, digits and '-', \
         starting with a letter and not ending with '-'"
    )]
    InvalidChars(String),
    #[error("context '{0}' already exists")]
    AlreadyExists(String),
}

/// Checks proposed context names against a service context document.
pub struct Validator<'a> {
    pub service_context: &'a ServiceContext,
}

impl<'a> Validator<'a> {
    pub fn new(service_context: &'a ServiceContext) -> Self {
        Self { service_context }
    }

    pub fn validate_name(&self, name: &str) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::Required);
        }
        if !LEGAL_NAME.is_match(name) {
            return Err(ValidationError::InvalidChars(name.to_string()));
        }
        Ok(())
    }

    pub fn validate_name_is_available(&self, name: &str) -> Result<(), ValidationError> {
        if self.service_context.contexts.contains_key(name) {
            return Err(ValidationError::AlreadyExists(name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ServiceConfigMap;

    #[test]
    fn test_legal_names() {
        let doc = ServiceContext::default();
        let validator = Validator::new(&doc);
        for name in ["a", "dev", "my-context-1", "a1", "x-y-z"] {
            assert_eq!(validator.validate_name(name), Ok(()), "{name}");
        }
    }

    #[test]
    fn test_illegal_names_report_the_rule() {
        let doc = ServiceContext::default();
        let validator = Validator::new(&doc);

        assert_eq!(validator.validate_name(""), Err(ValidationError::Required));
        for name in ["-bad", "Bad", "1abc", "trailing-", "has space", "under_score"] {
            assert_eq!(
                validator.validate_name(name),
                Err(ValidationError::InvalidChars(name.to_string())),
                "{name}"
            );
        }
    }

    #[test]
    fn test_name_must_be_unused() {
        let mut doc = ServiceContext::default();
        doc.contexts.insert("dev".into(), ServiceConfigMap::default());
        let validator = Validator::new(&doc);

        assert_eq!(
            validator.validate_name_is_available("dev"),
            Err(ValidationError::AlreadyExists("dev".into()))
        );
        assert_eq!(validator.validate_name_is_available("prod"), Ok(()));
    }
}
