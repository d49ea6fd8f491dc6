//! Per-identity reconciliation: fetch, finalizer step, synchronizers, status.
use std::fmt;
use std::sync::Arc;

use kube::ResourceExt;
use tracing::{debug, info, instrument};

use crate::client::ClusterClient;
use crate::crd::v1alpha1::{MySQL, MySQLStatus};
use crate::crd::CONDITION_RUNNING;
use crate::finalizer::{self, Cleanup, Step};
use crate::sync::{self, SyncOutcome};
use crate::{resources, Result};

/// Namespace + name of a MySQL resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId { pub namespace: String, pub name: String }

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}/{}", self.namespace, self.name) }
}

impl From<&MySQL> for ResourceId {
    fn from(m: &MySQL) -> Self { Self::new(m.namespace().unwrap_or_default(), m.name_any()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Resource no longer exists.
    Gone,
    /// Finalizer step wrote or the resource is terminal; nothing else ran.
    Finalizing,
    Synced(SyncReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub read_service: SyncOutcome,
    pub headless_service: SyncOutcome,
    pub stateful_set: SyncOutcome,
    pub running: bool,
    pub status_written: bool,
}

/// Holds no per-resource state: every call re-fetches what it needs, so
/// distinct identities may reconcile in parallel. Callers must not run two
/// invocations for the same identity at once.
#[derive(Clone)]
pub struct Reconciler {
    client: Arc<dyn ClusterClient>,
    cleanup: Arc<dyn Cleanup>,
}

impl Reconciler {
    pub fn new(client: Arc<dyn ClusterClient>, cleanup: Arc<dyn Cleanup>) -> Self { Self { client, cleanup } }

    #[instrument(skip(self), fields(mysql = %id))]
    pub async fn reconcile(&self, id: &ResourceId) -> Result<Outcome> {
        let Some(mysql) = self.client.get_mysql(&id.namespace, &id.name).await? else {
            debug!("reconcile.gone");
            return Ok(Outcome::Gone);
        };
        if finalizer::step(self.client.as_ref(), self.cleanup.as_ref(), &mysql).await? == Step::Stop {
            return Ok(Outcome::Finalizing);
        }

        let client = self.client.as_ref();
        let read_service = sync::sync_read_service(client, &mysql).await?;
        let headless_service = sync::sync_headless_service(client, &mysql).await?;
        let stateful_set = sync::sync_stateful_set(client, &mysql).await?;
        let (running, status_written) = self.sync_running_condition(&mysql).await?;

        let report = SyncReport { read_service, headless_service, stateful_set, running, status_written };
        info!(?report, "reconcile.synced");
        Ok(Outcome::Synced(report))
    }

    /// Writes status only when the Running condition's verdict or reason changed.
    async fn sync_running_condition(&self, mysql: &MySQL) -> Result<(bool, bool)> {
        let namespace = mysql.namespace().unwrap_or_default();
        let sts_name = resources::stateful_set_name(&mysql.name_any());
        let ready = self
            .client
            .get_stateful_set(&namespace, &sts_name)
            .await?
            .and_then(|s| s.status)
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);
        let running = ready >= mysql.spec.replicas;
        let reason = if running { "StatefulSetReady" } else { "StatefulSetNotReady" };

        let mut updated = mysql.clone();
        let status = updated.status.get_or_insert_with(MySQLStatus::default);
        if !status.conditions.set(CONDITION_RUNNING, running, reason, chrono::Utc::now()) {
            return Ok((running, false));
        }
        self.client.replace_mysql_status(&namespace, &updated).await?;
        info!(running, ready, "status.running.updated");
        Ok((running, true))
    }
}
