//! MySQL custom resource: both served schema versions and the merged CRD.
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceConversion, CustomResourceDefinition, ServiceReference, WebhookClientConfig, WebhookConversion,
};
use kube::core::crd::{merge_crds, MergeError};
use kube::CustomResourceExt;

pub mod condition;
pub mod v1alpha1;
pub mod v1alpha2;

pub use condition::{Condition, Conditions, CONDITION_RUNNING};

pub const GROUP: &str = "mysql.sample.com";
pub const KIND: &str = "MySQL";
/// Version persisted in etcd; every other version converts through it.
pub const STORAGE_VERSION: &str = "v1alpha1";
pub const CONVERSION_PATH: &str = "/convert";

/// In-cluster Service fronting the operator's webhook server.
#[derive(Debug, Clone)]
pub struct WebhookService { pub namespace: String, pub name: String, pub port: i32 }

/// Both versions in one CRD, `v1alpha1` stored. With a webhook service the
/// CRD uses the `Webhook` conversion strategy against [`CONVERSION_PATH`].
pub fn merged_crd(webhook: Option<&WebhookService>) -> Result<CustomResourceDefinition, MergeError> {
    let mut crd = merge_crds(vec![v1alpha1::MySQL::crd(), v1alpha2::MySQL::crd()], STORAGE_VERSION)?;
    if let Some(svc) = webhook {
        crd.spec.conversion = Some(CustomResourceConversion {
            strategy: "Webhook".into(),
            webhook: Some(WebhookConversion {
                client_config: Some(WebhookClientConfig {
                    service: Some(ServiceReference {
                        namespace: svc.namespace.clone(),
                        name: svc.name.clone(),
                        path: Some(CONVERSION_PATH.into()),
                        port: Some(svc.port),
                    }),
                    ..Default::default()
                }),
                conversion_review_versions: vec!["v1".into()],
            }),
        });
    }
    Ok(crd)
}
