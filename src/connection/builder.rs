use std::sync::Arc;

use url::Url;

use super::transport::{Http, TransportWrapper};
use super::Connection;
use crate::constants::{
    resolve_api_url, DEFAULT_CLIENT_ID, DEFAULT_SCOPES, PRODUCTION_API_URL, PRODUCTION_AUTH_URL,
};
use crate::error::{Error, Result};
use crate::storage::{Config, Store};

/// Assembles a [`Connection`]. Empty values fall back to the compiled defaults.
pub struct ConnectionBuilder {
    config: Arc<dyn Store<Config>>,
    access_token: String,
    refresh_token: String,
    client_id: String,
    scopes: Vec<String>,
    api_url: String,
    auth_url: String,
    insecure: bool,
    transport_wrappers: Vec<TransportWrapper>,
}

impl ConnectionBuilder {
    /// `config` is where refreshed tokens get written back to.
    pub fn new(config: Arc<dyn Store<Config>>) -> Self {
        Self {
            config,
            access_token: String::new(),
            refresh_token: String::new(),
            client_id: String::new(),
            scopes: Vec::new(),
            api_url: String::new(),
            auth_url: String::new(),
            insecure: false,
            transport_wrappers: Vec::new(),
        }
    }

    /// Seeds tokens, endpoints, client id, scopes and the insecure flag from
    /// a loaded config document.
    pub fn from_config(store: Arc<dyn Store<Config>>, config: &Config) -> Self {
        Self::new(store)
            .with_access_token(&config.access_token)
            .with_refresh_token(&config.refresh_token)
            .with_client_id(&config.client_id)
            .with_scopes(config.scopes.iter().cloned())
            .with_url(&config.api_url)
            .with_auth_url(&config.auth_url)
            .with_insecure(config.insecure)
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = token.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// API gateway URL or one of its aliases.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_transport_wrapper(mut self, wrapper: TransportWrapper) -> Self {
        self.transport_wrappers.push(wrapper);
        self
    }

    pub fn build(self) -> Result<Connection> {
        let api_url = match self.api_url.as_str() {
            "" => PRODUCTION_API_URL.to_string(),
            value => resolve_api_url(value).to_string(),
        };
        let auth_url = match self.auth_url.as_str() {
            "" => PRODUCTION_AUTH_URL.to_string(),
            value => value.to_string(),
        };
        let api_url = validate_url(api_url)?;
        let auth_url = validate_url(auth_url)?;

        let client_id = if self.client_id.is_empty() {
            DEFAULT_CLIENT_ID.to_string()
        } else {
            self.client_id
        };
        let scopes = if self.scopes.is_empty() {
            DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            self.scopes
        };

        let http = Http::new(self.insecure, self.transport_wrappers)?;

        Ok(Connection {
            http,
            api_url,
            auth_url,
            client_id,
            scopes,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            config: self.config,
        })
    }
}

fn validate_url(input: String) -> Result<String> {
    match Url::parse(&input) {
        Ok(_) => Ok(input.trim_end_matches('/').to_string()),
        Err(source) => Err(Error::InvalidUrl { input, source }),
    }
}
