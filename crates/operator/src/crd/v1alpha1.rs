//! `mysql.sample.com/v1alpha1`: storage version and conversion hub.
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::condition::Conditions;

#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
#[kube(
    group = "mysql.sample.com",
    version = "v1alpha1",
    kind = "MySQL",
    plural = "mysqls",
    namespaced,
    status = "MySQLStatus",
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Owner","type":"string","jsonPath":".spec.ownerName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MySQLSpec {
    /// Number of database replicas.
    #[schemars(range(min = 1, max = 5))]
    pub replicas: i32,
    /// Owner of this database, written as `<first name> <last name>`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
pub struct MySQLStatus {
    pub conditions: Conditions,
}
