use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::segment;
use crate::connection::Connection;
use crate::error::Result;

const REGISTRIES_PATH: &str = "/api/serviceregistry_mgmt/v1/registries";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryList {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub items: Vec<Registry>,
}

pub struct RegistryMgmtApi<'a> {
    conn: &'a Connection,
}

impl<'a> RegistryMgmtApi<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn url(&self) -> String {
        format!("{}{REGISTRIES_PATH}", self.conn.api_url())
    }

    /// `search` is passed through as the server-side filter expression,
    /// e.g. `name like %dev%`.
    pub fn list(&self, page: u32, size: u32, search: Option<&str>) -> Result<RegistryList> {
        let mut query = vec![("page", page.to_string()), ("size", size.to_string())];
        if let Some(search) = search.filter(|s| !s.is_empty()) {
            query.push(("search", search.to_string()));
        }
        let request = self.conn.http().client().get(self.url()).query(&query);
        self.conn.execute_json(request)
    }

    pub fn get(&self, id: &str) -> Result<Registry> {
        let url = format!("{}/{}", self.url(), segment(id));
        self.conn.execute_json(self.conn.http().client().get(url))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::connection::transport::testing::MockServer;
    use crate::connection::ConnectionBuilder;
    use crate::error::Error;
    use crate::storage::{Config, MemoryStore};

    fn connect(server: &MockServer) -> Connection {
        ConnectionBuilder::new(Arc::new(MemoryStore::<Config>::new()))
            .with_access_token("token")
            .with_url(&server.base_url)
            .build()
            .unwrap()
    }

    #[test]
    fn test_list_sends_paging_and_bearer_token() {
        let server = MockServer::start(vec![(
            200,
            r#"{"kind":"RegistryList","page":1,"size":1,"total":1,
                "items":[{"id":"r1","name":"dev","status":"ready",
                          "registryUrl":"https://r1.example.com","browserUrl":"https://ui"}]}"#
                .into(),
        )]);
        let conn = connect(&server);

        let list = conn
            .api()
            .registry_mgmt()
            .list(1, 10, Some("name = dev"))
            .unwrap();

        assert_eq!(list.total, 1);
        let registry = &list.items[0];
        assert_eq!(registry.registry_url.as_deref(), Some("https://r1.example.com"));
        assert_eq!(registry.extra["browserUrl"], "https://ui");

        let request = &server.recorded()[0];
        assert_eq!(
            request.url,
            "/api/serviceregistry_mgmt/v1/registries?page=1&size=10&search=name+%3D+dev"
        );
        assert_eq!(request.authorization.as_deref(), Some("Bearer token"));
    }

    #[test]
    fn test_get_encodes_id_and_maps_errors() {
        let server = MockServer::start(vec![(
            404,
            r#"{"kind":"Error","code":"SRS-MGMT-404","reason":"Registry not found"}"#.into(),
        )]);
        let conn = connect(&server);

        let err = conn.api().registry_mgmt().get("a/b").unwrap_err();

        assert_eq!(
            server.recorded()[0].url,
            "/api/serviceregistry_mgmt/v1/registries/a%2Fb"
        );
        match err {
            Error::Unknown { cause } => assert_eq!(cause.message, "Registry not found"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
