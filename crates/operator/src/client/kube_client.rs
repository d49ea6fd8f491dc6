use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::api::PostParams;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

use super::{ClusterClient, CreateOutcome};
use crate::crd::v1alpha1::MySQL;
use crate::{Error, Result};

/// [`ClusterClient`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterClient { client: Client }

impl KubeClusterClient {
    pub fn new(client: Client) -> Self { Self { client } }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

async fn create<K>(api: Api<K>, obj: &K) -> Result<CreateOutcome>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    match api.create(&PostParams::default(), obj).await {
        Ok(_) => Ok(CreateOutcome::Created),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            tracing::debug!(name=%obj.name_any(), reason=%ae.reason, "create.already_exists");
            Ok(CreateOutcome::AlreadyExists)
        }
        Err(e) => Err(e.into()),
    }
}

async fn replace<K>(api: Api<K>, kind: &'static str, obj: &K) -> Result<K>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    let name = obj.name_any();
    match api.replace(&name, &PostParams::default(), obj).await {
        Ok(updated) => Ok(updated),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Err(Error::Conflict { kind, name, message: ae.message }),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_mysql(&self, namespace: &str, name: &str) -> Result<Option<MySQL>> {
        Ok(self.api::<MySQL>(namespace).get_opt(name).await?)
    }

    async fn replace_mysql(&self, namespace: &str, mysql: &MySQL) -> Result<MySQL> {
        replace(self.api(namespace), "MySQL", mysql).await
    }

    async fn replace_mysql_status(&self, namespace: &str, mysql: &MySQL) -> Result<MySQL> {
        let name = mysql.name_any();
        let body = serde_json::to_vec(mysql)?;
        match self.api::<MySQL>(namespace).replace_status(&name, &PostParams::default(), body).await {
            Ok(updated) => Ok(updated),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Err(Error::Conflict { kind: "MySQL", name, message: ae.message }),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        Ok(self.api::<Service>(namespace).get_opt(name).await?)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<CreateOutcome> {
        create(self.api(namespace), service).await
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>> {
        Ok(self.api::<StatefulSet>(namespace).get_opt(name).await?)
    }

    async fn create_stateful_set(&self, namespace: &str, stateful_set: &StatefulSet) -> Result<CreateOutcome> {
        create(self.api(namespace), stateful_set).await
    }

    async fn replace_stateful_set(&self, namespace: &str, stateful_set: &StatefulSet) -> Result<StatefulSet> {
        replace(self.api(namespace), "StatefulSet", stateful_set).await
    }
}
