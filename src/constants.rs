//! Compiled-in endpoints and defaults.

pub const PRODUCTION_AUTH_URL: &str = "https://sso.redhat.com/auth/realms/redhat-external";

pub const PRODUCTION_API_URL: &str = "https://api.openshift.com";
pub const STAGING_API_URL: &str = "https://api.stage.openshift.com";
pub const INTEGRATION_API_URL: &str = "https://api.integration.openshift.com";

pub const DEFAULT_CLIENT_ID: &str = "rhoas-cli-prod";
pub const DEFAULT_SCOPES: &[&str] = &["openid"];

/// Group used by registry artifact commands when none is given.
pub const DEFAULT_ARTIFACT_GROUP: &str = "default";

/// Maps the `production`, `staging` and `integration` aliases to their URLs.
/// Anything else is returned unchanged.
pub fn resolve_api_url(value: &str) -> &str {
    match value {
        "production" => PRODUCTION_API_URL,
        "staging" => STAGING_API_URL,
        "integration" => INTEGRATION_API_URL,
        other => other,
    }
}
