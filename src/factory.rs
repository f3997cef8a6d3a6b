use std::sync::Arc;

use tracing::debug;

use crate::connection::{logging_wrapper, Connection, ConnectionBuilder};
use crate::error::Result;
use crate::storage::{Config, ConfigFile, ServiceContext, ServiceContextFile, Store};

/// Shared dependencies of every command: the two stores and a connection
/// built at most once per invocation.
pub struct Factory {
    config: Arc<dyn Store<Config>>,
    service_context: Arc<dyn Store<ServiceContext>>,
    connection: Option<Connection>,
}

impl Factory {
    pub fn new(
        config: Arc<dyn Store<Config>>,
        service_context: Arc<dyn Store<ServiceContext>>,
    ) -> Self {
        Self {
            config,
            service_context,
            connection: None,
        }
    }

    /// File-backed stores at their default (or environment-overridden) paths.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            Arc::new(ConfigFile::new()?),
            Arc::new(ServiceContextFile::service_context()?),
        ))
    }

    pub fn config(&self) -> &dyn Store<Config> {
        self.config.as_ref()
    }

    pub fn service_context(&self) -> &dyn Store<ServiceContext> {
        self.service_context.as_ref()
    }

    /// A fresh connection from the stored config. No refresh, no caching.
    pub fn build_connection(&self) -> Result<Connection> {
        let config = self.config.load()?;
        ConnectionBuilder::from_config(Arc::clone(&self.config), &config)
            .with_transport_wrapper(logging_wrapper())
            .build()
    }

    /// The invocation's connection with tokens refreshed. The first
    /// successful build is reused by every later call.
    pub fn connection(&mut self) -> Result<&mut Connection> {
        let conn = match self.connection.take() {
            Some(conn) => conn,
            None => {
                let mut conn = self.build_connection()?;
                conn.refresh_tokens()?;
                debug!(api_url = conn.api_url(), "connection ready");
                conn
            }
        };
        Ok(self.connection.insert(conn))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::auth::token::fake_jwt;
    use crate::connection::transport::testing::MockServer;
    use crate::error::Error;
    use crate::storage::MemoryStore;

    fn factory(config: Config) -> (Factory, Arc<MemoryStore<Config>>) {
        let store = Arc::new(MemoryStore::with(config));
        let factory = Factory::new(
            store.clone(),
            Arc::new(MemoryStore::<ServiceContext>::new()),
        );
        (factory, store)
    }

    #[test]
    fn test_connection_is_built_and_refreshed_once() {
        let new_access = fake_jwt(Some(Utc::now().timestamp() + 3600));
        let server = MockServer::start(vec![(
            200,
            serde_json::json!({ "access_token": new_access, "refresh_token": "r2" }).to_string(),
        )]);
        let (mut factory, store) = factory(Config {
            refresh_token: "r1".into(),
            auth_url: server.base_url.clone(),
            ..Config::default()
        });

        let first = factory.connection().unwrap().access_token().to_string();
        let second = factory.connection().unwrap().access_token().to_string();

        assert_eq!(first, new_access);
        assert_eq!(second, new_access);
        assert_eq!(server.recorded().len(), 1);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_cached_connection_ignores_later_config_changes() {
        let token = fake_jwt(None);
        let (mut factory, store) = factory(Config {
            access_token: token.clone(),
            ..Config::default()
        });

        factory.connection().unwrap();
        store
            .save(&Config {
                access_token: "changed".into(),
                ..Config::default()
            })
            .unwrap();

        assert_eq!(factory.connection().unwrap().access_token(), token);
    }

    #[test]
    fn test_failed_refresh_is_not_cached() {
        let expired = fake_jwt(Some(Utc::now().timestamp() - 60));
        let (mut factory, store) = factory(Config {
            access_token: expired,
            ..Config::default()
        });

        assert!(matches!(
            factory.connection().err(),
            Some(Error::Unauthenticated)
        ));

        store
            .save(&Config {
                access_token: fake_jwt(None),
                ..Config::default()
            })
            .unwrap();
        assert!(factory.connection().is_ok());
    }

    #[test]
    fn test_corrupt_config_surfaces_from_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let mut factory = Factory::new(
            Arc::new(ConfigFile::at(&path)),
            Arc::new(MemoryStore::<ServiceContext>::new()),
        );
        match factory.connection().err() {
            Some(Error::CorruptState { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
