use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::fs;
use tracing::debug;

use crate::{Error, Result};

pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;
pub const DEFAULT_RESYNC_SECS: u64 = 300;
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 15;
pub const DEFAULT_CONFLICT_REQUEUE_SECS: u64 = 1;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub namespace: Option<String>,
    pub webhook_addr: Option<String>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub resync_secs: Option<u64>,
    pub error_requeue_secs: Option<u64>,
    pub conflict_requeue_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths { pub cert: PathBuf, pub key: PathBuf }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Watch scope; `None` watches every namespace.
    pub namespace: Option<String>,
    pub webhook_addr: SocketAddr,
    /// Plain HTTP when unset.
    pub tls: Option<TlsPaths>,
    pub resync_interval: Duration,
    pub error_requeue: Duration,
    pub conflict_requeue: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            webhook_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_WEBHOOK_PORT)),
            tls: None,
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_SECS),
            error_requeue: Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECS),
            conflict_requeue: Duration::from_secs(DEFAULT_CONFLICT_REQUEUE_SECS),
        }
    }
}

impl OperatorConfig {
    /// Reads the optional TOML file, then applies `MYSQL_OPERATOR_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(p) => {
                debug!(path=?p, exists=p.exists(), "config.load.attempt");
                let content = fs::read_to_string(p).map_err(|e| Error::Config(format!("failed to read config {p:?}: {e}")))?;
                toml::from_str(&content).map_err(|e| Error::Config(format!("failed to parse config {p:?}: {e}")))?
            }
            None => FileConfig::default(),
        };
        Self::resolve(file_cfg, |key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn resolve(mut file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(ns) = env("MYSQL_OPERATOR_NAMESPACE") { file.namespace = Some(ns); }
        if let Some(addr) = env("MYSQL_OPERATOR_WEBHOOK_ADDR") { file.webhook_addr = Some(addr); }
        if let Some(cert) = env("MYSQL_OPERATOR_TLS_CERT") { file.tls_cert = Some(cert.into()); }
        if let Some(key) = env("MYSQL_OPERATOR_TLS_KEY") { file.tls_key = Some(key.into()); }
        let secs = |key: &str, current: Option<u64>| -> Result<Option<u64>> {
            match env(key) {
                Some(v) => v.parse().map(Some).map_err(|e| Error::Config(format!("{key}={v:?}: {e}"))),
                None => Ok(current),
            }
        };
        file.resync_secs = secs("MYSQL_OPERATOR_RESYNC_SECS", file.resync_secs)?;
        file.error_requeue_secs = secs("MYSQL_OPERATOR_ERROR_REQUEUE_SECS", file.error_requeue_secs)?;
        file.conflict_requeue_secs = secs("MYSQL_OPERATOR_CONFLICT_REQUEUE_SECS", file.conflict_requeue_secs)?;

        let defaults = Self::default();
        let webhook_addr = match file.webhook_addr.as_deref() {
            Some(addr) => addr.parse().map_err(|e| Error::Config(format!("webhook_addr {addr:?}: {e}")))?,
            None => defaults.webhook_addr,
        };
        let tls = match (file.tls_cert, file.tls_key) {
            (Some(cert), Some(key)) => Some(TlsPaths { cert, key }),
            (None, None) => None,
            _ => return Err(Error::Config("tls_cert and tls_key must be set together".into())),
        };
        Ok(Self {
            namespace: file.namespace.filter(|ns| !ns.is_empty()),
            webhook_addr,
            tls,
            resync_interval: file.resync_secs.map(Duration::from_secs).unwrap_or(defaults.resync_interval),
            error_requeue: file.error_requeue_secs.map(Duration::from_secs).unwrap_or(defaults.error_requeue),
            conflict_requeue: file.conflict_requeue_secs.map(Duration::from_secs).unwrap_or(defaults.conflict_requeue),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = OperatorConfig::resolve(FileConfig::default(), |_| None).unwrap();
        assert_eq!(cfg, OperatorConfig::default());
        assert_eq!(cfg.namespace, None);
        assert_eq!(cfg.webhook_addr.port(), 9443);
        assert_eq!(cfg.resync_interval, Duration::from_secs(300));
        assert_eq!(cfg.conflict_requeue, Duration::from_secs(1));
        assert!(cfg.tls.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let file = FileConfig { namespace: Some("from-file".into()), resync_secs: Some(60), ..Default::default() };
        let cfg = OperatorConfig::resolve(file, env_of(&[("MYSQL_OPERATOR_NAMESPACE", "from-env"), ("MYSQL_OPERATOR_ERROR_REQUEUE_SECS", "7")])).unwrap();
        assert_eq!(cfg.namespace.as_deref(), Some("from-env"));
        assert_eq!(cfg.resync_interval, Duration::from_secs(60));
        assert_eq!(cfg.error_requeue, Duration::from_secs(7));
    }

    #[test]
    fn half_configured_tls_is_rejected() {
        let file = FileConfig { tls_cert: Some("/tls/tls.crt".into()), ..Default::default() };
        assert!(matches!(OperatorConfig::resolve(file, |_| None), Err(Error::Config(_))));
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        let err = OperatorConfig::resolve(FileConfig::default(), env_of(&[("MYSQL_OPERATOR_RESYNC_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("MYSQL_OPERATOR_RESYNC_SECS"));
    }
}
