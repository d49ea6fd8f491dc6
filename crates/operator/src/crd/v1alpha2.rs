//! `mysql.sample.com/v1alpha2`: owner identity split into first/last name.
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::condition::Conditions;

#[derive(CustomResource, Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
#[kube(
    group = "mysql.sample.com",
    version = "v1alpha2",
    kind = "MySQL",
    plural = "mysqls",
    namespaced,
    status = "MySQLStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct MySQLSpec {
    #[schemars(range(min = 1, max = 5))]
    pub replicas: i32,
    /// Defaulted with the last name to "no body" when both are absent.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner_first_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner_last_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, JsonSchema, PartialEq)]
pub struct MySQLStatus {
    #[serde(default, skip_serializing_if = "Conditions::is_empty")]
    pub conditions: Conditions,
}
