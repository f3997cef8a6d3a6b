//! Service account credential files.

use std::path::PathBuf;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::storage;

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("env var pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CredentialsFormat {
    Env,
    Properties,
    #[value(name = "java-kafka-properties")]
    JavaKafkaProperties,
    Json,
    Secret,
}

impl CredentialsFormat {
    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::Env => ".env",
            Self::Properties | Self::JavaKafkaProperties => "credentials.properties",
            Self::Json => "credentials.json",
            Self::Secret => "credentials.yaml",
        }
    }
}

pub fn render(format: CredentialsFormat, creds: &Credentials) -> String {
    let Credentials {
        client_id,
        client_secret,
        token_url,
    } = creds;

    match format {
        CredentialsFormat::Env => format!(
            "## Generated by apicr\n\
             APICR_SERVICE_ACCOUNT_CLIENT_ID={client_id}\n\
             APICR_SERVICE_ACCOUNT_CLIENT_SECRET={client_secret}\n\
             APICR_SERVICE_ACCOUNT_OAUTH_TOKEN_URL={token_url}\n"
        ),
        CredentialsFormat::Properties => format!(
            "## Generated by apicr\n\
             apicr.service-account.clientID={client_id}\n\
             apicr.service-account.clientSecret={client_secret}\n\
             apicr.service-account.oauthTokenUrl={token_url}\n"
        ),
        CredentialsFormat::JavaKafkaProperties => format!(
            r#"## Generated by apicr
sasl.mechanism=OAUTHBEARER
security.protocol=SASL_SSL

sasl.jaas.config=org.apache.kafka.common.security.oauthbearer.OAuthBearerLoginModule required \
clientId="{client_id}" \
clientSecret="{client_secret}" ;

sasl.oauthbearer.token.endpoint.url={token_url}

sasl.login.callback.handler.class=org.apache.kafka.common.security.oauthbearer.secured.OAuthBearerLoginCallbackHandler
"#
        ),
        CredentialsFormat::Json => {
            let body = serde_json::json!({
                "clientID": client_id,
                "clientSecret": client_secret,
                "oauthTokenUrl": token_url,
            });
            format!("{body:#}\n")
        }
        CredentialsFormat::Secret => format!(
            "apiVersion: v1\n\
             kind: Secret\n\
             metadata:\n  \
               name: service-account-credentials\n\
             type: Opaque\n\
             stringData:\n  \
               APICR_SERVICE_ACCOUNT_CLIENT_ID: {client_id}\n  \
               APICR_SERVICE_ACCOUNT_CLIENT_SECRET: {client_secret}\n  \
               APICR_SERVICE_ACCOUNT_OAUTH_TOKEN_URL: {token_url}\n"
        ),
    }
}

/// Default file for `format` in the working directory.
pub fn default_path(format: CredentialsFormat) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.join(format.default_file_name())
}

/// Replaces `$VAR` and `${VAR}` with their values. Unset variables expand to
/// nothing.
pub fn expand_env(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |caps: &Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            std::env::var(name).unwrap_or_default()
        })
        .into_owned()
}

/// Writes `creds` to `path` after expanding environment variables in it.
/// The file is created with mode 0600. Returns the path written.
pub fn write(
    format: CredentialsFormat,
    path: &str,
    creds: &Credentials,
    overwrite: bool,
) -> Result<PathBuf> {
    let path = PathBuf::from(expand_env(path));
    let contents = render(format, creds);

    storage::write_private(&path, contents.as_bytes(), overwrite)?;
    debug!(path = %path.display(), ?format, "wrote credentials");
    Ok(path)
}
