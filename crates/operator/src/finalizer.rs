//! Pre-deletion cleanup sequencing through a finalizer marker.
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use tracing::{info, warn};

use crate::client::ClusterClient;
use crate::crd::v1alpha1::MySQL;
use crate::{Error, Result};

pub const MYSQL_FINALIZER: &str = "finalizer.sample-mysql-operator.com";

/// Cleanup run before the marker is released. Must tolerate being re-run:
/// a failure leaves the marker in place and the next reconcile calls it again.
#[async_trait]
pub trait Cleanup: Send + Sync + 'static {
    async fn clean_up(&self, mysql: &MySQL) -> anyhow::Result<()>;
}

/// Nothing external to release yet; records that cleanup ran.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCleanup;

#[async_trait]
impl Cleanup for LogCleanup {
    async fn clean_up(&self, mysql: &MySQL) -> anyhow::Result<()> {
        info!(name=%mysql.name_any(), "finalizer.cleanup.done");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerState {
    /// Newly created, marker not attached yet.
    ActiveUnmarked,
    Active,
    /// Deletion requested, cleanup pending.
    Deleting,
    /// Cleanup done; the API server completes removal.
    Released,
}

impl FinalizerState {
    pub fn of(mysql: &MySQL) -> Self {
        let deleting = mysql.meta().deletion_timestamp.is_some();
        let marked = mysql.finalizers().iter().any(|f| f == MYSQL_FINALIZER);
        match (deleting, marked) {
            (false, false) => FinalizerState::ActiveUnmarked,
            (false, true) => FinalizerState::Active,
            (true, true) => FinalizerState::Deleting,
            (true, false) => FinalizerState::Released,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Steady state; synchronizers may run.
    Continue,
    /// The resource changed or is terminal; the next invocation sees fresh state.
    Stop,
}

/// Advances the finalizer state machine by at most one persisted write.
pub async fn step(client: &dyn ClusterClient, cleanup: &dyn Cleanup, mysql: &MySQL) -> Result<Step> {
    let namespace = mysql.namespace().unwrap_or_default();
    let name = mysql.name_any();
    match FinalizerState::of(mysql) {
        FinalizerState::Active => Ok(Step::Continue),
        FinalizerState::Released => Ok(Step::Stop),
        FinalizerState::ActiveUnmarked => {
            let mut updated = mysql.clone();
            updated.finalizers_mut().push(MYSQL_FINALIZER.to_string());
            client.replace_mysql(&namespace, &updated).await?;
            info!(%namespace, %name, "finalizer.added");
            Ok(Step::Stop)
        }
        FinalizerState::Deleting => {
            if let Err(e) = cleanup.clean_up(mysql).await {
                warn!(%namespace, %name, error=%e, "finalizer.cleanup.failed");
                return Err(Error::Cleanup { name, source: e.into() });
            }
            let mut updated = mysql.clone();
            updated.finalizers_mut().retain(|f| f != MYSQL_FINALIZER);
            client.replace_mysql(&namespace, &updated).await?;
            info!(%namespace, %name, "finalizer.removed");
            Ok(Step::Stop)
        }
    }
}
