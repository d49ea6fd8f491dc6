//! Conversion between `v1alpha1` (hub) and `v1alpha2`.
//!
//! `v1alpha2 -> v1alpha1` always succeeds. The reverse needs an owner
//! string of exactly two non-empty space-separated tokens, so it is not a
//! perfect inverse for owners the validating hook would also reject.
use kube::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::crd::{v1alpha1, v1alpha2};
use crate::telemetry::CONVERSION_TOTAL;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("invalid name: {0:?}")]
    InvalidName(String),
    #[error("unsupported apiVersion {0:?}")]
    UnsupportedVersion(String),
    #[error("malformed object: {0}")]
    Malformed(String),
}

pub fn join_owner(first: &str, last: &str) -> String { format!("{first} {last}") }

pub fn split_owner(owner: &str) -> Result<(String, String), ConversionError> {
    match owner.split(' ').collect::<Vec<_>>().as_slice() {
        [first, last] if !first.is_empty() && !last.is_empty() => Ok((first.to_string(), last.to_string())),
        _ => Err(ConversionError::InvalidName(owner.to_string())),
    }
}

impl From<&v1alpha2::MySQL> for v1alpha1::MySQL {
    fn from(src: &v1alpha2::MySQL) -> Self {
        v1alpha1::MySQL {
            metadata: src.metadata.clone(),
            spec: v1alpha1::MySQLSpec {
                replicas: src.spec.replicas,
                owner_name: join_owner(&src.spec.owner_first_name, &src.spec.owner_last_name),
            },
            status: src.status.as_ref().map(|s| v1alpha1::MySQLStatus { conditions: s.conditions.clone() }),
        }
    }
}

impl TryFrom<&v1alpha1::MySQL> for v1alpha2::MySQL {
    type Error = ConversionError;

    fn try_from(src: &v1alpha1::MySQL) -> Result<Self, Self::Error> {
        let (first, last) = split_owner(&src.spec.owner_name)?;
        Ok(v1alpha2::MySQL {
            metadata: src.metadata.clone(),
            spec: v1alpha2::MySQLSpec { replicas: src.spec.replicas, owner_first_name: first, owner_last_name: last },
            status: src.status.as_ref().map(|s| v1alpha2::MySQLStatus { conditions: s.conditions.clone() }),
        })
    }
}

fn decode<K: serde::de::DeserializeOwned>(object: Value) -> Result<K, ConversionError> {
    serde_json::from_value(object).map_err(|e| ConversionError::Malformed(e.to_string()))
}

fn encode<K: Serialize>(object: &K) -> Result<Value, ConversionError> {
    serde_json::to_value(object).map_err(|e| ConversionError::Malformed(e.to_string()))
}

/// Converts one raw object to `desired` (`group/version`).
pub fn convert_object(object: Value, desired: &str) -> Result<Value, ConversionError> {
    let v1 = v1alpha1::MySQL::api_version(&());
    let v2 = v1alpha2::MySQL::api_version(&());
    let from = object.get("apiVersion").and_then(Value::as_str).unwrap_or_default().to_string();
    if from == desired {
        return Ok(object);
    }
    if from == v1 && desired == v2 {
        let src: v1alpha1::MySQL = decode(object)?;
        return encode(&v1alpha2::MySQL::try_from(&src)?);
    }
    if from == v2 && desired == v1 {
        let src: v1alpha2::MySQL = decode(object)?;
        return encode(&v1alpha1::MySQL::from(&src));
    }
    Err(ConversionError::UnsupportedVersion(if from == v1 || from == v2 { desired.to_string() } else { from }))
}

// apiextensions.k8s.io/v1 ConversionReview wire format.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversionReview {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ConversionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ConversionResponse>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub uid: String,
    #[serde(rename = "desiredAPIVersion")]
    pub desired_api_version: String,
    #[serde(default)]
    pub objects: Vec<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub uid: String,
    #[serde(default)]
    pub converted_objects: Vec<Value>,
    pub result: ConversionResult,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConversionResult {
    pub fn success() -> Self { Self { status: "Success".into(), message: None } }
    pub fn failure(message: impl Into<String>) -> Self { Self { status: "Failure".into(), message: Some(message.into()) } }
    pub fn is_success(&self) -> bool { self.status == "Success" }
}

/// Converts every object in the review; one failure fails the whole review.
pub fn convert_review(review: ConversionReview) -> ConversionReview {
    let (uid, result, converted_objects) = match review.request {
        None => (String::new(), ConversionResult::failure("conversion review has no request"), Vec::new()),
        Some(req) => {
            let desired = req.desired_api_version;
            match req.objects.into_iter().map(|o| convert_object(o, &desired)).collect::<Result<Vec<_>, _>>() {
                Ok(objects) => {
                    debug!(uid=%req.uid, %desired, count=objects.len(), "conversion.success");
                    (req.uid, ConversionResult::success(), objects)
                }
                Err(e) => {
                    warn!(uid=%req.uid, %desired, error=%e, "conversion.failed");
                    (req.uid, ConversionResult::failure(e.to_string()), Vec::new())
                }
            }
        }
    };
    CONVERSION_TOTAL.with_label_values(&[if result.is_success() { "success" } else { "failure" }]).inc();
    ConversionReview {
        api_version: review.api_version,
        kind: review.kind,
        request: None,
        response: Some(ConversionResponse { uid, converted_objects, result }),
    }
}
