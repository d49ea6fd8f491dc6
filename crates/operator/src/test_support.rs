//! In-memory cluster for unit and integration tests.
//!
//! Emulates the API server behaviour the reconciler depends on:
//! resource versions with optimistic concurrency, a status subresource,
//! finalizer-gated deletion and owner-reference cascade.
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::error::ErrorResponse;
use kube::ResourceExt;

use crate::client::{ClusterClient, CreateOutcome};
use crate::crd::v1alpha1::{MySQL, MySQLSpec};
use crate::finalizer::Cleanup;
use crate::{Error, Result};

type Key = (String, String);

/// Mutating calls, in the order they were attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReplaceMySql(String),
    ReplaceMySqlStatus(String),
    CreateService(String),
    CreateStatefulSet(String),
    ReplaceStatefulSet(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetMySql,
    ReplaceMySql,
    ReplaceMySqlStatus,
    GetService,
    CreateService,
    GetStatefulSet,
    CreateStatefulSet,
    ReplaceStatefulSet,
}

/// Failure injected into the next call of an [`Op`].
#[derive(Debug, Clone)]
pub enum Fault {
    /// 409 on a replace.
    Conflict,
    /// Another writer creates the object first.
    AlreadyExists,
    /// 500 from the API server.
    Server(String),
}

#[derive(Default)]
struct State {
    mysqls: BTreeMap<Key, MySQL>,
    services: BTreeMap<Key, Service>,
    stateful_sets: BTreeMap<Key, StatefulSet>,
    calls: Vec<Call>,
    faults: HashMap<Op, VecDeque<Fault>>,
    revision: u64,
}

impl State {
    fn stamp(&mut self, meta: &mut ObjectMeta) {
        self.revision += 1;
        meta.resource_version = Some(self.revision.to_string());
        if meta.uid.is_none() { meta.uid = Some(format!("uid-{}", self.revision)); }
        if meta.creation_timestamp.is_none() { meta.creation_timestamp = Some(Time(chrono::Utc::now())); }
    }

    fn fault(&mut self, op: Op) -> Option<Fault> {
        self.faults.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn check(&mut self, op: Op, kind: &'static str, name: &str) -> Result<()> {
        match self.fault(op) {
            Some(Fault::Conflict) => Err(conflict(kind, name)),
            Some(Fault::Server(msg)) => Err(api_error(500, "InternalError", &msg)),
            Some(Fault::AlreadyExists) | None => Ok(()),
        }
    }

    fn remove_mysql(&mut self, key: &Key) {
        let Some(removed) = self.mysqls.remove(key) else { return };
        let uid = removed.uid();
        let owned = |meta: &ObjectMeta| meta.owner_references.iter().flatten().any(|o| Some(&o.uid) == uid.as_ref());
        self.services.retain(|_, s| !owned(&s.metadata));
        self.stateful_sets.retain(|_, s| !owned(&s.metadata));
    }
}

fn key(namespace: &str, name: &str) -> Key { (namespace.to_string(), name.to_string()) }

fn api_error(code: u16, reason: &str, message: &str) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse { status: "Failure".into(), message: message.into(), reason: reason.into(), code }))
}

fn conflict(kind: &'static str, name: &str) -> Error {
    Error::Conflict { kind, name: name.to_string(), message: "the object has been modified; please apply your changes to the latest version and try again".into() }
}

fn not_found(kind: &str, name: &str) -> Error {
    api_error(404, "NotFound", &format!("{kind} {name:?} not found"))
}

#[derive(Default)]
pub struct FakeCluster { state: Mutex<State> }

impl FakeCluster {
    pub fn new() -> Self { Self::default() }

    fn state(&self) -> MutexGuard<'_, State> { self.state.lock().unwrap_or_else(|e| e.into_inner()) }

    /// Stores a MySQL as the API server would after admission.
    pub fn insert_mysql(&self, mut mysql: MySQL) -> MySQL {
        let mut st = self.state();
        if mysql.metadata.namespace.is_none() { mysql.metadata.namespace = Some("default".into()); }
        st.stamp(&mut mysql.metadata);
        st.mysqls.insert(key(&mysql.namespace().unwrap_or_default(), &mysql.name_any()), mysql.clone());
        mysql
    }

    /// A user edit; bumps the resource version.
    pub fn edit_mysql(&self, namespace: &str, name: &str, edit: impl FnOnce(&mut MySQL)) {
        let mut st = self.state();
        let Some(mut m) = st.mysqls.get(&key(namespace, name)).cloned() else { return };
        edit(&mut m);
        st.stamp(&mut m.metadata);
        st.mysqls.insert(key(namespace, name), m);
    }

    /// Sets the deletion timestamp; removes immediately when no finalizer holds it.
    pub fn request_deletion(&self, namespace: &str, name: &str) {
        let mut st = self.state();
        let k = key(namespace, name);
        let Some(mut m) = st.mysqls.get(&k).cloned() else { return };
        if m.finalizers().is_empty() {
            st.remove_mysql(&k);
            return;
        }
        m.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        st.stamp(&mut m.metadata);
        st.mysqls.insert(k, m);
    }

    pub fn mysql(&self, namespace: &str, name: &str) -> Option<MySQL> { self.state().mysqls.get(&key(namespace, name)).cloned() }
    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> { self.state().services.get(&key(namespace, name)).cloned() }
    pub fn stateful_set(&self, namespace: &str, name: &str) -> Option<StatefulSet> {
        self.state().stateful_sets.get(&key(namespace, name)).cloned()
    }
    pub fn service_count(&self) -> usize { self.state().services.len() }
    pub fn stateful_set_count(&self) -> usize { self.state().stateful_sets.len() }

    /// Out-of-band change to a live StatefulSet (drift, readiness).
    pub fn edit_stateful_set(&self, namespace: &str, name: &str, edit: impl FnOnce(&mut StatefulSet)) {
        let mut st = self.state();
        let Some(mut s) = st.stateful_sets.get(&key(namespace, name)).cloned() else { return };
        edit(&mut s);
        st.stamp(&mut s.metadata);
        st.stateful_sets.insert(key(namespace, name), s);
    }

    pub fn inject(&self, op: Op, fault: Fault) { self.state().faults.entry(op).or_default().push_back(fault); }

    pub fn calls(&self) -> Vec<Call> { self.state().calls.clone() }

    pub fn take_calls(&self) -> Vec<Call> { std::mem::take(&mut self.state().calls) }

    fn create<K: kube::Resource<DynamicType = ()> + Clone>(
        &self,
        op: Op,
        namespace: &str,
        obj: &K,
        select: impl Fn(&mut State) -> &mut BTreeMap<Key, K>,
    ) -> Result<CreateOutcome> {
        let mut st = self.state();
        let name = obj.meta().name.clone().unwrap_or_default();
        let kind = K::kind(&()).to_string();
        st.calls.push(match op { Op::CreateService => Call::CreateService(name.clone()), _ => Call::CreateStatefulSet(name.clone()) });
        let fault = st.fault(op);
        if let Some(Fault::Server(msg)) = &fault {
            return Err(api_error(500, "InternalError", msg));
        }
        let raced = matches!(fault, Some(Fault::AlreadyExists));
        let k = key(namespace, &name);
        if select(&mut *st).contains_key(&k) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        let mut stored = obj.clone();
        stored.meta_mut().namespace = Some(namespace.to_string());
        st.stamp(stored.meta_mut());
        select(&mut *st).insert(k, stored);
        tracing::trace!(%kind, %name, raced, "fake.create");
        Ok(if raced { CreateOutcome::AlreadyExists } else { CreateOutcome::Created })
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_mysql(&self, namespace: &str, name: &str) -> Result<Option<MySQL>> {
        let mut st = self.state();
        st.check(Op::GetMySql, "MySQL", name)?;
        Ok(st.mysqls.get(&key(namespace, name)).cloned())
    }

    async fn replace_mysql(&self, namespace: &str, mysql: &MySQL) -> Result<MySQL> {
        let mut st = self.state();
        let name = mysql.name_any();
        st.calls.push(Call::ReplaceMySql(name.clone()));
        st.check(Op::ReplaceMySql, "MySQL", &name)?;
        let k = key(namespace, &name);
        let stored = st.mysqls.get(&k).cloned().ok_or_else(|| not_found("MySQL", &name))?;
        if stored.resource_version() != mysql.resource_version() {
            return Err(conflict("MySQL", &name));
        }
        let mut next = mysql.clone();
        next.status = stored.status.clone();
        next.metadata.uid = stored.metadata.uid.clone();
        next.metadata.deletion_timestamp = stored.metadata.deletion_timestamp.clone();
        st.stamp(&mut next.metadata);
        if next.metadata.deletion_timestamp.is_some() && next.finalizers().is_empty() {
            st.remove_mysql(&k);
        } else {
            st.mysqls.insert(k, next.clone());
        }
        Ok(next)
    }

    async fn replace_mysql_status(&self, namespace: &str, mysql: &MySQL) -> Result<MySQL> {
        let mut st = self.state();
        let name = mysql.name_any();
        st.calls.push(Call::ReplaceMySqlStatus(name.clone()));
        st.check(Op::ReplaceMySqlStatus, "MySQL", &name)?;
        let k = key(namespace, &name);
        let mut next = st.mysqls.get(&k).cloned().ok_or_else(|| not_found("MySQL", &name))?;
        if next.resource_version() != mysql.resource_version() {
            return Err(conflict("MySQL", &name));
        }
        next.status = mysql.status.clone();
        st.stamp(&mut next.metadata);
        st.mysqls.insert(k, next.clone());
        Ok(next)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        let mut st = self.state();
        st.check(Op::GetService, "Service", name)?;
        Ok(st.services.get(&key(namespace, name)).cloned())
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<CreateOutcome> {
        self.create(Op::CreateService, namespace, service, |st| &mut st.services)
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>> {
        let mut st = self.state();
        st.check(Op::GetStatefulSet, "StatefulSet", name)?;
        Ok(st.stateful_sets.get(&key(namespace, name)).cloned())
    }

    async fn create_stateful_set(&self, namespace: &str, stateful_set: &StatefulSet) -> Result<CreateOutcome> {
        self.create(Op::CreateStatefulSet, namespace, stateful_set, |st| &mut st.stateful_sets)
    }

    async fn replace_stateful_set(&self, namespace: &str, stateful_set: &StatefulSet) -> Result<StatefulSet> {
        let mut st = self.state();
        let name = stateful_set.name_any();
        st.calls.push(Call::ReplaceStatefulSet(name.clone()));
        st.check(Op::ReplaceStatefulSet, "StatefulSet", &name)?;
        let k = key(namespace, &name);
        let stored = st.stateful_sets.get(&k).cloned().ok_or_else(|| not_found("StatefulSet", &name))?;
        if stored.resource_version() != stateful_set.resource_version() {
            return Err(conflict("StatefulSet", &name));
        }
        let mut next = stateful_set.clone();
        next.status = stored.status.clone();
        st.stamp(&mut next.metadata);
        st.stateful_sets.insert(k, next.clone());
        Ok(next)
    }
}

/// Counts cleanup invocations; fails the first `failures` of them.
#[derive(Debug, Default)]
pub struct RecordingCleanup { calls: AtomicUsize, failures: AtomicUsize }

impl RecordingCleanup {
    pub fn failing(times: usize) -> Self { Self { calls: AtomicUsize::new(0), failures: AtomicUsize::new(times) } }
    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl Cleanup for RecordingCleanup {
    async fn clean_up(&self, mysql: &MySQL) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("backup service unavailable for {}", mysql.name_any());
        }
        Ok(())
    }
}

/// A v1alpha1 MySQL named `name` in `default`, not yet stored.
pub fn sample_mysql(name: &str, replicas: i32, owner: &str) -> MySQL {
    let mut m = MySQL::new(name, MySQLSpec { replicas, owner_name: owner.to_string() });
    m.metadata.namespace = Some("default".into());
    m
}
