//! Client library behind the `apicr` command line: persisted config and
//! contexts, authenticated connections with token refresh, and typed access
//! to the registry management, service account and registry instance APIs.

pub mod api;
pub mod auth;
pub mod connection;
pub mod constants;
pub mod context;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod logging;
pub mod storage;

pub use connection::{Connection, ConnectionBuilder};
pub use error::{Error, Result};
pub use factory::Factory;
