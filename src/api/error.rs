use serde_json::Value;

use crate::error::Error;

/// A backend error response normalized across the management, service
/// account and registry instance APIs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (code: {code:?}, status: {status})")]
pub struct ErrorEnvelope {
    /// Machine-readable code, empty if the body carried none.
    pub code: String,
    pub message: String,
    pub status: u16,
    /// The raw response body.
    pub body: String,
}

/// Keys carrying the machine code and the message, in lookup order, across
/// the shapes the backends send: `{"error","error_description"}`,
/// `{"code","reason"}` and `{"name","message","error_code"}`.
const CODE_KEYS: &[&str] = &["error", "code", "name"];
const MESSAGE_KEYS: &[&str] = &["error_description", "reason", "message", "detail"];

/// First key holding a non-empty string. Fields of any other type are skipped.
fn first_str(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| raw.get(key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

impl ErrorEnvelope {
    pub fn parse(status: u16, body: &str) -> Self {
        let raw: Value = serde_json::from_str(body).unwrap_or(Value::Null);

        let code = first_str(&raw, CODE_KEYS).unwrap_or_default();
        let message = first_str(&raw, MESSAGE_KEYS).unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() || trimmed.starts_with('{') {
                format!("HTTP {status}")
            } else {
                trimmed.to_string()
            }
        });

        Self {
            code,
            message,
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    InvalidInput,
    Unauthenticated,
}

const ERROR_KINDS: &[(&str, ErrorKind)] = &[
    // service account management
    ("service_account_not_found", ErrorKind::NotFound),
    ("service_account_access_invalid", ErrorKind::Forbidden),
    // OAuth
    ("invalid_request", ErrorKind::InvalidInput),
    ("invalid_token", ErrorKind::Unauthenticated),
    ("access_denied", ErrorKind::Forbidden),
    // registry instance
    ("ArtifactNotFoundException", ErrorKind::NotFound),
    ("GroupNotFoundException", ErrorKind::NotFound),
    ("VersionNotFoundException", ErrorKind::NotFound),
    ("ContentNotFoundException", ErrorKind::NotFound),
    ("RuleNotFoundException", ErrorKind::NotFound),
    ("RoleMappingNotFoundException", ErrorKind::NotFound),
    ("ArtifactAlreadyExistsException", ErrorKind::Conflict),
    ("VersionAlreadyExistsException", ErrorKind::Conflict),
    ("RuleAlreadyExistsException", ErrorKind::Conflict),
    ("RoleMappingAlreadyExistsException", ErrorKind::Conflict),
    ("InvalidArtifactIdException", ErrorKind::InvalidInput),
    ("InvalidArtifactTypeException", ErrorKind::InvalidInput),
    ("InvalidGroupIdException", ErrorKind::InvalidInput),
    ("InvalidPropertiesException", ErrorKind::InvalidInput),
    ("RuleViolationException", ErrorKind::InvalidInput),
    ("BadRequestException", ErrorKind::InvalidInput),
    ("NotAuthorizedException", ErrorKind::Unauthenticated),
];

pub fn kind_of(code: &str) -> Option<ErrorKind> {
    ERROR_KINDS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, kind)| *kind)
}

/// Maps an error envelope onto the crate's error taxonomy.
pub fn transform(envelope: ErrorEnvelope) -> Error {
    match kind_of(&envelope.code) {
        Some(ErrorKind::NotFound) => Error::NotFound(envelope),
        Some(ErrorKind::Conflict) => Error::Conflict(envelope),
        Some(ErrorKind::Forbidden) => Error::Forbidden(envelope),
        Some(ErrorKind::InvalidInput) => Error::InvalidInput(envelope),
        Some(ErrorKind::Unauthenticated) => Error::Unauthorized(envelope),
        None => Error::Unknown { cause: envelope },
    }
}
