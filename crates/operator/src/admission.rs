//! Admission-time defaulting and validation for both schema versions.
//!
//! Both checks are pure functions of the submitted object. The review
//! helpers at the bottom adapt them to the AdmissionReview wire format.
use std::fmt;

use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use kube::{Resource, ResourceExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::crd::{v1alpha1, v1alpha2, GROUP, KIND};
use crate::telemetry::ADMISSION_TOTAL;

/// Owner written when none was given.
pub const NO_BODY: &str = "no body";
pub const OWNER_NAME_FORMAT: &str = "OwnerName must be form of [first name] [last name]";
pub const REPLICAS_MIN: i32 = 1;
pub const REPLICAS_MAX: i32 = 5;

/// A MySQL object in whichever schema version it was submitted.
#[derive(Debug, Clone)]
pub enum Schema {
    V1(v1alpha1::MySQL),
    V2(v1alpha2::MySQL),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    /// Offending value, rendered the way the API server quotes it.
    pub value: String,
    pub detail: String,
}

impl FieldError {
    pub fn invalid(path: &str, value: impl fmt::Debug, detail: &str) -> Self {
        Self { path: path.into(), value: format!("{value:?}"), detail: detail.into() }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: Invalid value: {}: {}", self.path, self.value, self.detail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct Invalid { pub name: String, pub errors: Vec<FieldError> }

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{KIND}.{GROUP} {:?} is invalid: ", self.name)?;
        match self.errors.as_slice() {
            [single] => write!(f, "{single}"),
            many => {
                let joined: Vec<String> = many.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", joined.join(", "))
            }
        }
    }
}

/// `None` when `owner` has exactly one space.
pub fn validate_owner_name(owner: &str) -> Option<FieldError> {
    let spaces = owner.chars().filter(|c| *c == ' ').count();
    (spaces != 1).then(|| FieldError::invalid("spec", owner, OWNER_NAME_FORMAT))
}

/// One token of a split owner: non-empty and without spaces.
pub fn validate_owner_part(path: &str, part: &str) -> Option<FieldError> {
    (part.is_empty() || part.contains(' ')).then(|| FieldError::invalid(path, part, "must be a single non-empty word"))
}

pub fn validate_replicas(replicas: i32) -> Option<FieldError> {
    let detail = format!("must be between {REPLICAS_MIN} and {REPLICAS_MAX}, inclusive");
    (!(REPLICAS_MIN..=REPLICAS_MAX).contains(&replicas)).then(|| FieldError::invalid("spec.replicas", replicas, &detail))
}

impl Schema {
    pub fn name(&self) -> String {
        match self { Schema::V1(m) => m.name_any(), Schema::V2(m) => m.name_any() }
    }

    /// Owner identity in its single-string form.
    pub fn owner(&self) -> String {
        match self {
            Schema::V1(m) => m.spec.owner_name.clone(),
            Schema::V2(m) => format!("{} {}", m.spec.owner_first_name, m.spec.owner_last_name),
        }
    }

    pub fn replicas(&self) -> i32 {
        match self { Schema::V1(m) => m.spec.replicas, Schema::V2(m) => m.spec.replicas }
    }

    /// Fills in the owner sentinel. Returns true when the object changed.
    pub fn apply_defaults(&mut self) -> bool {
        match self {
            Schema::V1(m) if m.spec.owner_name.is_empty() => {
                m.spec.owner_name = NO_BODY.to_string();
                true
            }
            Schema::V2(m) if m.spec.owner_first_name.is_empty() && m.spec.owner_last_name.is_empty() => {
                let (first, last) = NO_BODY.split_once(' ').unwrap_or((NO_BODY, ""));
                m.spec.owner_first_name = first.to_string();
                m.spec.owner_last_name = last.to_string();
                true
            }
            _ => false,
        }
    }

    /// Create and update are checked; delete (and connect) always pass.
    pub fn validate(&self, operation: &Operation) -> Result<(), Invalid> {
        if !matches!(operation, Operation::Create | Operation::Update) {
            return Ok(());
        }
        let owner = match self {
            Schema::V1(m) => vec![validate_owner_name(&m.spec.owner_name)],
            Schema::V2(m) => {
                let parts = [
                    validate_owner_part("spec.ownerFirstName", &m.spec.owner_first_name),
                    validate_owner_part("spec.ownerLastName", &m.spec.owner_last_name),
                ];
                if parts.iter().all(Option::is_none) { vec![validate_owner_name(&self.owner())] } else { parts.into() }
            }
        };
        let errors: Vec<FieldError> =
            owner.into_iter().chain([validate_replicas(self.replicas())]).flatten().collect();
        if errors.is_empty() { Ok(()) } else { Err(Invalid { name: self.name(), errors }) }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self { Schema::V1(m) => serde_json::to_value(m), Schema::V2(m) => serde_json::to_value(m) }
    }

    /// Applies defaults and returns the JSON patch taking the submitted
    /// object to the defaulted one, or `None` when nothing changed.
    pub fn defaulting_patch(&mut self) -> serde_json::Result<Option<json_patch::Patch>> {
        let before = self.to_json()?;
        if !self.apply_defaults() {
            return Ok(None);
        }
        Ok(Some(json_patch::diff(&before, &self.to_json()?)))
    }
}

impl From<v1alpha1::MySQL> for Schema {
    fn from(m: v1alpha1::MySQL) -> Self { Schema::V1(m) }
}

impl From<v1alpha2::MySQL> for Schema {
    fn from(m: v1alpha2::MySQL) -> Self { Schema::V2(m) }
}

fn admission_request<K: Resource>(review: AdmissionReview<K>) -> Result<AdmissionRequest<K>, AdmissionReview<DynamicObject>> {
    let converted: Result<AdmissionRequest<K>, _> = review.try_into();
    converted.map_err(|e| {
        warn!(error=%e, "admission.review.invalid");
        AdmissionResponse::invalid(e.to_string()).into_review()
    })
}

/// Mutating hook: responds with a JSON patch when defaulting changed the object.
pub fn mutate_review<K>(review: AdmissionReview<K>) -> AdmissionReview<DynamicObject>
where
    K: Resource + Serialize + Clone + Into<Schema>,
{
    let req = match admission_request(review) { Ok(r) => r, Err(resp) => return resp };
    let res = AdmissionResponse::from(&req);
    let Some(obj) = req.object.clone() else { return res.into_review() };
    let mut schema: Schema = obj.into();
    ADMISSION_TOTAL.with_label_values(&["mutate", "true"]).inc();
    let patch = match schema.defaulting_patch() {
        Ok(Some(patch)) => patch,
        Ok(None) => return res.into_review(),
        Err(e) => return AdmissionResponse::invalid(e.to_string()).into_review(),
    };
    info!(name=%schema.name(), owner=%schema.owner(), "admission.defaulted");
    match res.with_patch(patch) {
        Ok(res) => res.into_review(),
        Err(e) => AdmissionResponse::invalid(e.to_string()).into_review(),
    }
}

/// Validating hook for create, update and delete.
pub fn validate_review<K>(review: AdmissionReview<K>) -> AdmissionReview<DynamicObject>
where
    K: Resource + Clone + Into<Schema>,
{
    let req = match admission_request(review) { Ok(r) => r, Err(resp) => return resp };
    let res = AdmissionResponse::from(&req);
    let verdict = match req.object.clone() {
        Some(obj) => {
            let schema: Schema = obj.into();
            schema.validate(&req.operation)
        }
        None => Ok(()),
    };
    match verdict {
        Ok(()) => {
            debug!(name=%req.name, operation=?req.operation, "admission.allowed");
            ADMISSION_TOTAL.with_label_values(&["validate", "true"]).inc();
            res.into_review()
        }
        Err(invalid) => {
            info!(name=%invalid.name, reason=%invalid, "admission.denied");
            ADMISSION_TOTAL.with_label_values(&["validate", "false"]).inc();
            res.deny(invalid.to_string()).into_review()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1(owner: &str, replicas: i32) -> Schema {
        Schema::V1(v1alpha1::MySQL::new("sample", v1alpha1::MySQLSpec { replicas, owner_name: owner.into() }))
    }

    #[test]
    fn invalid_message_matches_api_server_format() {
        let err = v1("John", 2).validate(&Operation::Create).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"MySQL.mysql.sample.com "sample" is invalid: spec: Invalid value: "John": OwnerName must be form of [first name] [last name]"#
        );
    }

    #[test]
    fn multiple_errors_are_bracketed() {
        let err = v1("John", 9).validate(&Operation::Update).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert!(err.to_string().contains(": [spec: Invalid value"));
        assert!(err.to_string().contains("spec.replicas: Invalid value: 9"));
    }

    #[test]
    fn v2_owner_parts_are_checked_individually() {
        let v2 = |first: &str, last: &str| {
            Schema::V2(v1alpha2::MySQL::new(
                "s",
                v1alpha2::MySQLSpec { replicas: 1, owner_first_name: first.into(), owner_last_name: last.into() },
            ))
        };
        let err = v2("", "Smith").validate(&Operation::Create).unwrap_err();
        assert_eq!(err.errors.iter().map(|e| e.path.as_str()).collect::<Vec<_>>(), vec!["spec.ownerFirstName"]);
        let err = v2("Mary Ann", "").validate(&Operation::Update).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert!(v2("Ada", "Lovelace").validate(&Operation::Create).is_ok());
    }

    #[test]
    fn v2_defaults_compose_to_sentinel() {
        let mut s = Schema::V2(v1alpha2::MySQL::new("s", v1alpha2::MySQLSpec { replicas: 1, ..Default::default() }));
        assert!(s.apply_defaults());
        assert_eq!(s.owner(), NO_BODY);
        assert!(!s.apply_defaults());
    }
}
