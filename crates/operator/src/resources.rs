//! Desired child objects for a MySQL resource.
//!
//! Names derive from the resource identity only, so existence checks are
//! always a lookup by computed name. The shapes here are what the init and
//! sidecar images expect; change them only together with those images.
use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar, ExecAction, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PodSpec, PodTemplateSpec, Probe, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};

use crate::crd::v1alpha1::MySQL;
use crate::{Error, Result};

pub const MYSQL_PORT: i32 = 3306;
pub const XTRABACKUP_PORT: i32 = 3307;
pub const CONFIG_MAP_NAME: &str = "mysql";
pub const DATA_VOLUME: &str = "data";
pub const CONF_VOLUME: &str = "conf";
pub const CONFIG_MAP_VOLUME: &str = "config-map";
pub const DATA_STORAGE_REQUEST: &str = "2Gi";

pub const INIT_MYSQL_IMAGE: &str = "quay.io/sample-mysql-operator/init-mysql:latest";
pub const CLONE_MYSQL_IMAGE: &str = "quay.io/sample-mysql-operator/clone-mysql:latest";
pub const MYSQL_IMAGE: &str = "mysql:5.7";
pub const XTRABACKUP_IMAGE: &str = "quay.io/sample-mysql-operator/xtrabackup:latest";

pub fn read_service_name(name: &str) -> String { format!("{name}-read") }
pub fn headless_service_name(name: &str) -> String { name.to_string() }
pub fn stateful_set_name(name: &str) -> String { name.to_string() }

pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), name.to_string())])
}

fn owner_reference(mysql: &MySQL) -> Result<OwnerReference> {
    mysql.controller_owner_ref(&()).ok_or_else(|| Error::MissingObjectKey { kind: "MySQL", name: mysql.name_any(), field: "uid" })
}

fn child_meta(mysql: &MySQL, name: String) -> Result<ObjectMeta> {
    Ok(ObjectMeta {
        name: Some(name),
        namespace: mysql.namespace(),
        owner_references: Some(vec![owner_reference(mysql)?]),
        ..Default::default()
    })
}

fn mysql_service(mysql: &MySQL, name: String, cluster_ip: Option<&str>) -> Result<Service> {
    Ok(Service {
        metadata: child_meta(mysql, name)?,
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort { name: Some("mysql".into()), port: MYSQL_PORT, ..Default::default() }]),
            selector: Some(selector_labels(&mysql.name_any())),
            cluster_ip: cluster_ip.map(str::to_string),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Load-balanced endpoint for read traffic.
pub fn read_service(mysql: &MySQL) -> Result<Service> {
    mysql_service(mysql, read_service_name(&mysql.name_any()), None)
}

/// Headless endpoint giving each pod a stable DNS name.
pub fn headless_service(mysql: &MySQL) -> Result<Service> {
    mysql_service(mysql, headless_service_name(&mysql.name_any()), Some("None"))
}

fn env(name: &str, value: &str) -> EnvVar {
    EnvVar { name: name.into(), value: Some(value.into()), ..Default::default() }
}

fn mount(name: &str, path: &str, sub_path: Option<&str>) -> VolumeMount {
    VolumeMount { name: name.into(), mount_path: path.into(), sub_path: sub_path.map(str::to_string), ..Default::default() }
}

fn exec_probe(command: &[&str], initial_delay: i32, timeout: i32, period: i32) -> Probe {
    Probe {
        exec: Some(ExecAction { command: Some(command.iter().map(|s| s.to_string()).collect()) }),
        initial_delay_seconds: Some(initial_delay),
        timeout_seconds: Some(timeout),
        period_seconds: Some(period),
        ..Default::default()
    }
}

fn port(name: &str, container_port: i32) -> ContainerPort {
    ContainerPort { name: Some(name.into()), container_port, ..Default::default() }
}

pub fn stateful_set(mysql: &MySQL) -> Result<StatefulSet> {
    let name = mysql.name_any();
    let labels = selector_labels(&name);
    let data_mounts = vec![mount(DATA_VOLUME, "/var/lib/mysql", Some("mysql")), mount(CONF_VOLUME, "/etc/mysql/conf.d", None)];
    let peer_env = vec![env("POD_NAME", &name), env("SVC_NAME", &name)];

    let init_containers = vec![
        Container {
            name: "init-mysql".into(),
            image: Some(INIT_MYSQL_IMAGE.into()),
            volume_mounts: Some(vec![mount(CONF_VOLUME, "/mnt/conf.d", None), mount(CONFIG_MAP_VOLUME, "/mnt/config-map", None)]),
            ..Default::default()
        },
        Container {
            name: "clone-mysql".into(),
            image: Some(CLONE_MYSQL_IMAGE.into()),
            volume_mounts: Some(data_mounts.clone()),
            env: Some(peer_env.clone()),
            ..Default::default()
        },
    ];
    let containers = vec![
        Container {
            name: "mysql".into(),
            image: Some(MYSQL_IMAGE.into()),
            env: Some(vec![env("MYSQL_ALLOW_EMPTY_PASSWORD", "1")]),
            volume_mounts: Some(data_mounts.clone()),
            liveness_probe: Some(exec_probe(&["mysqladmin", "ping"], 30, 5, 10)),
            readiness_probe: Some(exec_probe(&["mysql", "-h", "127.0.0.1", "-e", "SELECT 1"], 5, 1, 2)),
            ports: Some(vec![port("mysql", MYSQL_PORT)]),
            ..Default::default()
        },
        Container {
            name: "xtrabackup".into(),
            image: Some(XTRABACKUP_IMAGE.into()),
            ports: Some(vec![port("xtrabackup", XTRABACKUP_PORT)]),
            volume_mounts: Some(data_mounts),
            env: Some(peer_env),
            ..Default::default()
        },
    ];
    let volumes = vec![
        Volume { name: CONF_VOLUME.into(), empty_dir: Some(EmptyDirVolumeSource::default()), ..Default::default() },
        Volume {
            name: CONFIG_MAP_VOLUME.into(),
            config_map: Some(ConfigMapVolumeSource { name: Some(CONFIG_MAP_NAME.into()), ..Default::default() }),
            ..Default::default()
        },
    ];
    let data_claim = PersistentVolumeClaim {
        metadata: ObjectMeta { name: Some(DATA_VOLUME.into()), ..Default::default() },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".into()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([("storage".to_string(), Quantity(DATA_STORAGE_REQUEST.into()))])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(StatefulSet {
        metadata: child_meta(mysql, stateful_set_name(&name))?,
        spec: Some(StatefulSetSpec {
            replicas: Some(mysql.spec.replicas),
            selector: LabelSelector { match_labels: Some(labels.clone()), ..Default::default() },
            service_name: headless_service_name(&name),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta { labels: Some(labels), ..Default::default() }),
                spec: Some(PodSpec { volumes: Some(volumes), init_containers: Some(init_containers), containers, ..Default::default() }),
            },
            volume_claim_templates: Some(vec![data_claim]),
            ..Default::default()
        }),
        ..Default::default()
    })
}
