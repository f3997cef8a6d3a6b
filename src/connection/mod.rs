//! Authenticated connection to the API gateway and SSO server.
//!
//! A [`Connection`] carries the current token pair and refreshes it on demand.
//! Refreshed tokens are written back to the config store before anything else
//! uses them, so a later invocation never starts from a revoked refresh token.

mod builder;
pub mod transport;

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use reqwest::blocking::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

pub use builder::ConnectionBuilder;
pub use transport::{logging_wrapper, Http, LoggingTransport, Transport, TransportWrapper};

use crate::api::{self, Api, ErrorEnvelope};
use crate::auth::{oauth, token};
use crate::error::{Error, Result};
use crate::storage::{Config, Store};

pub struct Connection {
    http: Http,
    api_url: String,
    auth_url: String,
    client_id: String,
    scopes: Vec<String>,
    access_token: String,
    refresh_token: String,
    config: Arc<dyn Store<Config>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("has_access_token", &!self.access_token.is_empty())
            .field("has_refresh_token", &!self.refresh_token.is_empty())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Makes sure the access token is usable for at least the refresh margin.
    ///
    /// Without any tokens this is a no-op; requests made afterwards fail with
    /// [`Error::Unauthenticated`]. On failure nothing is changed or persisted.
    pub fn refresh_tokens(&mut self) -> Result<()> {
        let now = Utc::now();

        if self.access_token.is_empty() && self.refresh_token.is_empty() {
            debug!("no tokens present, skipping refresh");
            return Ok(());
        }
        if !self.access_token.is_empty() && !token::needs_refresh(&self.access_token, now) {
            debug!("access token still valid, skipping refresh");
            return Ok(());
        }
        if self.refresh_token.is_empty() {
            return Err(Error::Unauthenticated);
        }
        if token::is_expired(&self.refresh_token, now) {
            return Err(Error::AuthenticationFailed {
                reason: "refresh token has expired".into(),
            });
        }

        let tokens = oauth::refresh_token(
            &self.http,
            &self.auth_url,
            &self.client_id,
            &self.refresh_token,
            &self.scopes,
        )?;
        let refresh_token = tokens
            .refresh_token
            .unwrap_or_else(|| self.refresh_token.clone());
        self.store_tokens(tokens.access_token, refresh_token)?;
        debug!("tokens refreshed and saved");
        Ok(())
    }

    /// Browser login. The new tokens replace any stored ones.
    pub fn login_with_browser(&mut self, open_browser: bool) -> Result<()> {
        let tokens = oauth::login_with_browser(
            &self.http,
            &self.auth_url,
            &self.client_id,
            &self.scopes,
            open_browser,
        )?;
        self.store_tokens(tokens.access_token, tokens.refresh_token.unwrap_or_default())
    }

    /// Exchanges an offline token for a token pair. The offline token is kept
    /// as the refresh token unless the server rotates it.
    pub fn login_with_token(&mut self, offline_token: &str) -> Result<()> {
        let tokens = oauth::refresh_token(
            &self.http,
            &self.auth_url,
            &self.client_id,
            offline_token,
            &self.scopes,
        )?;
        let refresh_token = tokens
            .refresh_token
            .unwrap_or_else(|| offline_token.to_string());
        self.store_tokens(tokens.access_token, refresh_token)
    }

    /// Load-modify-save of the token pair, then the in-memory copy.
    fn store_tokens(&mut self, access_token: String, refresh_token: String) -> Result<()> {
        let mut config = self.config.load()?;
        config.access_token = access_token.clone();
        config.refresh_token = refresh_token.clone();
        self.config.save(&config)?;

        self.access_token = access_token;
        self.refresh_token = refresh_token;
        Ok(())
    }

    /// Ends the SSO session (best effort) and clears both tokens from the config.
    pub fn logout(&mut self) -> Result<()> {
        if !self.refresh_token.is_empty() {
            if let Err(e) = oauth::logout(
                &self.http,
                &self.auth_url,
                &self.client_id,
                &self.refresh_token,
            ) {
                warn!(error = %e, "could not end SSO session");
            }
        }

        self.store_tokens(String::new(), String::new())
    }

    pub fn api(&self) -> Api<'_> {
        Api::new(self)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    pub fn token_url(&self) -> String {
        oauth::token_url(&self.auth_url)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub(crate) fn http(&self) -> &Http {
        &self.http
    }

    /// Sends an authenticated request. Error responses go through
    /// [`api::transform`].
    pub(crate) fn execute(&self, request: RequestBuilder) -> Result<Response> {
        if self.access_token.is_empty() {
            return Err(Error::Unauthenticated);
        }

        let response = self.http.send(request.bearer_auth(&self.access_token))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_else(|e| {
            debug!(status = status.as_u16(), error = %e, "could not read error response body");
            String::new()
        });
        Err(api::transform(ErrorEnvelope::parse(status.as_u16(), &body)))
    }

    pub(crate) fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self.execute(request)?.json()?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tempfile::tempdir;

    use super::transport::testing::{counting_wrapper, MockServer};
    use super::*;
    use crate::auth::token::fake_jwt;
    use crate::storage::{ConfigFile, MemoryStore, ServiceConfigMap, ServiceRegistryConfig};

    fn valid_token() -> String {
        fake_jwt(Some(Utc::now().timestamp() + 3600))
    }

    fn expired_token() -> String {
        fake_jwt(Some(Utc::now().timestamp() - 60))
    }

    fn token_response(access: &str, refresh: &str) -> (u16, String) {
        (
            200,
            serde_json::json!({ "access_token": access, "refresh_token": refresh }).to_string(),
        )
    }

    #[test]
    fn test_refresh_without_tokens_is_a_no_op() {
        let store = Arc::new(MemoryStore::<Config>::new());
        let (wrapper, hits) = counting_wrapper();
        let mut conn = ConnectionBuilder::new(store.clone())
            .with_transport_wrapper(wrapper)
            .build()
            .unwrap();

        conn.refresh_tokens().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(store.save_count(), 0);

        let err = conn.api().registry_mgmt().list(1, 10, None).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_truncated_error_body_degrades_to_status() {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(
                b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\n\r\n{\"code\"",
            );
        });

        let conn = ConnectionBuilder::new(Arc::new(MemoryStore::<Config>::new()))
            .with_access_token("token")
            .with_url(&format!("http://{addr}"))
            .build()
            .unwrap();

        match conn.api().registry_mgmt().list(1, 10, None).unwrap_err() {
            Error::Unknown { cause } => {
                assert_eq!(cause.status, 500);
                assert_eq!(cause.message, "HTTP 500");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_refresh_with_valid_token_makes_no_network_calls() {
        let store = Arc::new(MemoryStore::<Config>::new());
        let (wrapper, hits) = counting_wrapper();
        let mut conn = ConnectionBuilder::new(store.clone())
            .with_access_token(valid_token())
            .with_refresh_token(valid_token())
            .with_auth_url("http://127.0.0.1:9")
            .with_transport_wrapper(wrapper)
            .build()
            .unwrap();

        conn.refresh_tokens().unwrap();
        conn.refresh_tokens().unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_expired_token_is_refreshed_and_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let file = ConfigFile::at(&path);
        let new_access = valid_token();
        let server = MockServer::start(vec![token_response(&new_access, "new-refresh")]);

        let registry = ServiceRegistryConfig {
            instance_id: "r-1".into(),
            name: "registry".into(),
        };
        let old = Config {
            access_token: expired_token(),
            refresh_token: "old-refresh".into(),
            auth_url: server.base_url.clone(),
            services: ServiceConfigMap {
                service_registry: Some(registry.clone()),
            },
            ..Config::default()
        };
        file.save(&old).unwrap();

        let store: Arc<dyn Store<Config>> = Arc::new(ConfigFile::at(&path));
        let (wrapper, hits) = counting_wrapper();
        let mut conn = ConnectionBuilder::from_config(store, &old)
            .with_transport_wrapper(wrapper)
            .build()
            .unwrap();

        conn.refresh_tokens().unwrap();
        conn.refresh_tokens().unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(conn.access_token(), new_access);
        assert_eq!(conn.refresh_token(), "new-refresh");

        let saved = file.load().unwrap();
        assert_eq!(saved.access_token, new_access);
        assert_eq!(saved.refresh_token, "new-refresh");
        assert_eq!(saved.services.service_registry, Some(registry));
    }

    #[test]
    fn test_refresh_token_only_triggers_exchange() {
        let store = Arc::new(MemoryStore::<Config>::new());
        let new_access = valid_token();
        let server = MockServer::start(vec![token_response(&new_access, "rotated")]);
        let mut conn = ConnectionBuilder::new(store.clone())
            .with_refresh_token("offline-token")
            .with_auth_url(&server.base_url)
            .build()
            .unwrap();

        conn.refresh_tokens().unwrap();

        assert_eq!(store.load().unwrap().access_token, new_access);
        assert!(server.recorded()[0]
            .body
            .contains("refresh_token=offline-token"));
    }

    #[test]
    fn test_rejected_refresh_leaves_state_untouched() {
        let old_access = expired_token();
        let store = Arc::new(MemoryStore::with(Config {
            access_token: old_access.clone(),
            refresh_token: "revoked".into(),
            ..Config::default()
        }));
        let server = MockServer::start(vec![(
            400,
            r#"{"error":"invalid_grant","error_description":"Session not active"}"#.into(),
        )]);
        let mut conn = ConnectionBuilder::new(store.clone())
            .with_access_token(&old_access)
            .with_refresh_token("revoked")
            .with_auth_url(&server.base_url)
            .build()
            .unwrap();

        let err = conn.refresh_tokens().unwrap_err();

        assert!(matches!(err, Error::AuthenticationFailed { .. }));
        assert!(err.to_string().contains("apicr login"));
        assert_eq!(store.save_count(), 0);
        assert_eq!(conn.access_token(), old_access);
        assert_eq!(conn.refresh_token(), "revoked");
    }

    #[test]
    fn test_expired_refresh_token_fails_without_network() {
        let store = Arc::new(MemoryStore::<Config>::new());
        let (wrapper, hits) = counting_wrapper();
        let mut conn = ConnectionBuilder::new(store)
            .with_access_token(expired_token())
            .with_refresh_token(expired_token())
            .with_transport_wrapper(wrapper)
            .build()
            .unwrap();

        let err = conn.refresh_tokens().unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_expired_access_without_refresh_token_is_unauthenticated() {
        let store = Arc::new(MemoryStore::<Config>::new());
        let mut conn = ConnectionBuilder::new(store)
            .with_access_token(expired_token())
            .build()
            .unwrap();

        assert!(matches!(
            conn.refresh_tokens().unwrap_err(),
            Error::Unauthenticated
        ));
    }

    #[test]
    fn test_omitted_refresh_token_keeps_the_old_one() {
        let store = Arc::new(MemoryStore::<Config>::new());
        let new_access = valid_token();
        let server = MockServer::start(vec![(
            200,
            serde_json::json!({ "access_token": new_access }).to_string(),
        )]);
        let mut conn = ConnectionBuilder::new(store.clone())
            .with_access_token(expired_token())
            .with_refresh_token("keep-me")
            .with_auth_url(&server.base_url)
            .build()
            .unwrap();

        conn.refresh_tokens().unwrap();
        assert_eq!(conn.refresh_token(), "keep-me");
        assert_eq!(store.load().unwrap().refresh_token, "keep-me");
    }

    #[test]
    fn test_login_with_offline_token_keeps_it_as_refresh_token() {
        let store = Arc::new(MemoryStore::with(Config {
            api_url: "staging".into(),
            ..Config::default()
        }));
        let new_access = valid_token();
        let server = MockServer::start(vec![(
            200,
            serde_json::json!({ "access_token": new_access }).to_string(),
        )]);
        let mut conn = ConnectionBuilder::new(store.clone())
            .with_auth_url(&server.base_url)
            .build()
            .unwrap();

        conn.login_with_token("offline").unwrap();

        let saved = store.load().unwrap();
        assert_eq!(saved.access_token, new_access);
        assert_eq!(saved.refresh_token, "offline");
        assert_eq!(saved.api_url, "staging");
        assert!(server.recorded()[0].body.contains("refresh_token=offline"));
    }

    #[test]
    fn test_logout_clears_tokens_even_if_server_fails() {
        let store = Arc::new(MemoryStore::with(Config {
            access_token: "a".into(),
            refresh_token: "r".into(),
            client_id: "kept".into(),
            ..Config::default()
        }));
        let server = MockServer::start(vec![(500, String::new())]);
        let mut conn = ConnectionBuilder::new(store.clone())
            .with_access_token("a")
            .with_refresh_token("r")
            .with_auth_url(&server.base_url)
            .build()
            .unwrap();

        conn.logout().unwrap();

        let saved = store.load().unwrap();
        assert!(!saved.is_logged_in());
        assert_eq!(saved.client_id, "kept");
        assert_eq!(server.recorded()[0].url, "/protocol/openid-connect/logout");
    }
}
