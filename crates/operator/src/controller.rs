//! Binding to the kube-runtime dispatcher. The `Controller` watches MySQL
//! objects and their owned children, maps events to identities and never
//! runs two reconciles for the same identity at once.
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use kube_runtime::controller::Action;
use kube_runtime::{watcher, Controller};
use tracing::{debug, info, warn};

use crate::client::KubeClusterClient;
use crate::config::OperatorConfig;
use crate::crd::v1alpha1::MySQL;
use crate::finalizer::LogCleanup;
use crate::reconciler::{Outcome, Reconciler, ResourceId};
use crate::telemetry::{RECONCILE_ERRORS, RECONCILE_TOTAL};
use crate::{Error, Result};

pub struct Context {
    pub reconciler: Reconciler,
    pub config: OperatorConfig,
}

pub fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome { Outcome::Gone => "gone", Outcome::Finalizing => "finalizing", Outcome::Synced(_) => "synced" }
}

/// Delay before the next level-triggered pass; `None` waits for a watch event.
pub fn resync_after(outcome: &Outcome, config: &OperatorConfig) -> Option<Duration> {
    match outcome { Outcome::Gone => None, Outcome::Finalizing | Outcome::Synced(_) => Some(config.resync_interval) }
}

/// Conflicts are retried quickly, everything else after the error backoff.
pub fn requeue_delay(err: &Error, config: &OperatorConfig) -> Duration {
    match err { Error::Conflict { .. } => config.conflict_requeue, _ => config.error_requeue }
}

/// Inbound call for every event the dispatcher delivers.
pub async fn on_resource_event(obj: Arc<MySQL>, ctx: Arc<Context>) -> Result<Action> {
    let id = ResourceId::from(obj.as_ref());
    let outcome = ctx.reconciler.reconcile(&id).await?;
    RECONCILE_TOTAL.with_label_values(&[outcome_label(&outcome)]).inc();
    Ok(match resync_after(&outcome, &ctx.config) { Some(d) => Action::requeue(d), None => Action::await_change() })
}

pub fn error_policy(obj: Arc<MySQL>, err: &Error, ctx: Arc<Context>) -> Action {
    let id = ResourceId::from(obj.as_ref());
    let delay = requeue_delay(err, &ctx.config);
    warn!(mysql=%id, error=%err, retryable=err.is_retryable(), requeue_secs=delay.as_secs(), "reconcile.failed");
    RECONCILE_TOTAL.with_label_values(&["error"]).inc();
    RECONCILE_ERRORS.with_label_values(&[err.metric_label()]).inc();
    Action::requeue(delay)
}

pub async fn run(client: Client, config: OperatorConfig) -> anyhow::Result<()> {
    let (mysqls, services, stateful_sets) = match config.namespace.as_deref() {
        Some(ns) => (
            Api::<MySQL>::namespaced(client.clone(), ns),
            Api::<Service>::namespaced(client.clone(), ns),
            Api::<StatefulSet>::namespaced(client.clone(), ns),
        ),
        None => (Api::all(client.clone()), Api::all(client.clone()), Api::all(client.clone())),
    };
    info!(namespace=?config.namespace, "controller.starting");
    let reconciler = Reconciler::new(Arc::new(KubeClusterClient::new(client)), Arc::new(LogCleanup));
    let ctx = Arc::new(Context { reconciler, config });
    Controller::new(mysqls, watcher::Config::default())
        .owns(services, watcher::Config::default())
        .owns(stateful_sets, watcher::Config::default())
        .shutdown_on_signal()
        .run(on_resource_event, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => debug!(mysql=%obj, ?action, "controller.reconciled"),
                Err(e) => debug!(error=%e, "controller.event_failed"),
            }
        })
        .await;
    info!("controller.terminated");
    Ok(())
}
