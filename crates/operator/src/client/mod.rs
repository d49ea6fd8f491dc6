//! Platform access seam. The core only reads and writes objects by
//! namespace and computed name through [`ClusterClient`].
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;

use crate::crd::v1alpha1::MySQL;
use crate::Result;

mod kube_client;

pub use kube_client::KubeClusterClient;

/// Result of a create call. `AlreadyExists` means another writer won the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome { Created, AlreadyExists }

#[async_trait]
pub trait ClusterClient: Send + Sync + 'static {
    async fn get_mysql(&self, namespace: &str, name: &str) -> Result<Option<MySQL>>;
    /// Full update guarded by `metadata.resourceVersion`.
    async fn replace_mysql(&self, namespace: &str, mysql: &MySQL) -> Result<MySQL>;
    async fn replace_mysql_status(&self, namespace: &str, mysql: &MySQL) -> Result<MySQL>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<CreateOutcome>;

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>>;
    async fn create_stateful_set(&self, namespace: &str, stateful_set: &StatefulSet) -> Result<CreateOutcome>;
    async fn replace_stateful_set(&self, namespace: &str, stateful_set: &StatefulSet) -> Result<StatefulSet>;
}
