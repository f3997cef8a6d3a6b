use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::segment;
use crate::connection::Connection;
use crate::error::Result;

const SERVICE_ACCOUNTS_PATH: &str = "/apis/service_accounts/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    pub id: String,
    #[serde(default)]
    pub client_id: String,
    /// Only returned when the account is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// Service accounts live on the SSO server, not the API gateway.
pub struct ServiceAccountMgmtApi<'a> {
    conn: &'a Connection,
}

impl<'a> ServiceAccountMgmtApi<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn url(&self) -> String {
        format!("{}{SERVICE_ACCOUNTS_PATH}", self.conn.auth_url())
    }

    fn account_url(&self, id: &str) -> String {
        format!("{}/{}", self.url(), segment(id))
    }

    pub fn create(&self, name: &str, description: Option<&str>) -> Result<ServiceAccount> {
        let body = CreateRequest { name, description };
        let request = self.conn.http().client().post(self.url()).json(&body);
        self.conn.execute_json(request)
    }

    pub fn get(&self, id: &str) -> Result<ServiceAccount> {
        self.conn
            .execute_json(self.conn.http().client().get(self.account_url(id)))
    }

    pub fn list(&self) -> Result<Vec<ServiceAccount>> {
        self.conn
            .execute_json(self.conn.http().client().get(self.url()))
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute(self.conn.http().client().delete(self.account_url(id)))?;
        Ok(())
    }
}
