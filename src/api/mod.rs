//! Typed clients for the management APIs and registry instances.

mod artifact;
mod error;
mod registry;
mod service_account;

pub use artifact::{
    Artifact, ArtifactList, ArtifactMetadata, ArtifactSearch, ArtifactVersion, ContentRef,
    RegistryInstanceApi, VersionList,
};
pub use error::{kind_of, transform, ErrorEnvelope, ErrorKind};
pub use registry::{Registry, RegistryList, RegistryMgmtApi};
pub use service_account::{ServiceAccount, ServiceAccountMgmtApi};

use crate::connection::Connection;
use crate::error::Result;

/// Entry point to the resource clients of a connection.
pub struct Api<'a> {
    conn: &'a Connection,
}

impl<'a> Api<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn registry_mgmt(&self) -> RegistryMgmtApi<'a> {
        RegistryMgmtApi::new(self.conn)
    }

    pub fn service_account_mgmt(&self) -> ServiceAccountMgmtApi<'a> {
        ServiceAccountMgmtApi::new(self.conn)
    }

    /// Looks up the registry to find its URL. Fails with
    /// [`Error::RegistryUnavailable`](crate::Error::RegistryUnavailable) while
    /// the instance is still provisioning.
    pub fn registry_instance(&self, registry_id: &str) -> Result<RegistryInstanceApi<'a>> {
        let registry = self.registry_mgmt().get(registry_id)?;
        RegistryInstanceApi::for_registry(self.conn, &registry)
    }
}

/// Percent-encodes a single path segment.
fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
