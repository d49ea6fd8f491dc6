//! Child-object synchronizers. Each is get, then create when absent; only
//! the workload's replica count is ever adjusted afterwards.
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tracing::{debug, info};

use crate::client::{ClusterClient, CreateOutcome};
use crate::crd::v1alpha1::MySQL;
use crate::resources;
use crate::telemetry::CHILD_WRITES;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    /// Create lost a race with another writer; treated as success.
    AlreadyExists,
    Unchanged,
    Updated,
}

impl From<CreateOutcome> for SyncOutcome {
    fn from(o: CreateOutcome) -> Self {
        match o { CreateOutcome::Created => SyncOutcome::Created, CreateOutcome::AlreadyExists => SyncOutcome::AlreadyExists }
    }
}

async fn ensure_service(client: &dyn ClusterClient, mysql: &MySQL, desired: Service, which: &'static str) -> Result<SyncOutcome> {
    let namespace = mysql.namespace().unwrap_or_default();
    let name = desired.name_any();
    if client.get_service(&namespace, &name).await?.is_some() {
        debug!(%namespace, service=%name, which, "sync.service.present");
        return Ok(SyncOutcome::Unchanged);
    }
    info!(%namespace, service=%name, which, "sync.service.create");
    CHILD_WRITES.with_label_values(&["service", "create"]).inc();
    Ok(client.create_service(&namespace, &desired).await?.into())
}

/// Existing read endpoints are left as found.
pub async fn sync_read_service(client: &dyn ClusterClient, mysql: &MySQL) -> Result<SyncOutcome> {
    ensure_service(client, mysql, resources::read_service(mysql)?, "read").await
}

/// Existing headless endpoints are left as found.
pub async fn sync_headless_service(client: &dyn ClusterClient, mysql: &MySQL) -> Result<SyncOutcome> {
    ensure_service(client, mysql, resources::headless_service(mysql)?, "headless").await
}

/// Creates the workload, or corrects `spec.replicas` drift on the live
/// object. Every other live field is kept exactly as found.
pub async fn sync_stateful_set(client: &dyn ClusterClient, mysql: &MySQL) -> Result<SyncOutcome> {
    let namespace = mysql.namespace().unwrap_or_default();
    let name = resources::stateful_set_name(&mysql.name_any());
    let Some(live) = client.get_stateful_set(&namespace, &name).await? else {
        info!(%namespace, stateful_set=%name, replicas=mysql.spec.replicas, "sync.stateful_set.create");
        let desired: StatefulSet = resources::stateful_set(mysql)?;
        CHILD_WRITES.with_label_values(&["stateful_set", "create"]).inc();
        return Ok(client.create_stateful_set(&namespace, &desired).await?.into());
    };
    let live_replicas = live.spec.as_ref().and_then(|s| s.replicas);
    if live_replicas == Some(mysql.spec.replicas) {
        return Ok(SyncOutcome::Unchanged);
    }
    info!(%namespace, stateful_set=%name, from=?live_replicas, to=mysql.spec.replicas, "sync.stateful_set.scale");
    let mut updated = live.clone();
    updated.spec.get_or_insert_with(Default::default).replicas = Some(mysql.spec.replicas);
    CHILD_WRITES.with_label_values(&["stateful_set", "update"]).inc();
    client.replace_stateful_set(&namespace, &updated).await?;
    Ok(SyncOutcome::Updated)
}
