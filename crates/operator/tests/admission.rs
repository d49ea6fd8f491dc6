use kube::core::admission::{AdmissionReview, Operation};
use kube::core::DynamicObject;
use mysql_operator::admission::{mutate_review, validate_owner_name, validate_review, Schema, NO_BODY, OWNER_NAME_FORMAT};
use mysql_operator::crd::{v1alpha1, v1alpha2};
use proptest::prelude::*;
use serde_json::{json, Value};

fn review(version: &str, operation: &str, spec: Value) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": {"group": "mysql.sample.com", "version": version, "kind": "MySQL"},
            "resource": {"group": "mysql.sample.com", "version": version, "resource": "mysqls"},
            "name": "sample",
            "namespace": "default",
            "operation": operation,
            "userInfo": {"username": "admin"},
            "object": {
                "apiVersion": format!("mysql.sample.com/{version}"),
                "kind": "MySQL",
                "metadata": {"name": "sample", "namespace": "default"},
                "spec": spec
            },
            "dryRun": false
        }
    })
}

fn response(review: AdmissionReview<DynamicObject>) -> Value {
    serde_json::to_value(review).unwrap()["response"].clone()
}

fn validate_v1(operation: &str, spec: Value) -> Value {
    let rev: AdmissionReview<v1alpha1::MySQL> = serde_json::from_value(review("v1alpha1", operation, spec)).unwrap();
    response(validate_review(rev))
}

#[test]
fn single_token_owner_is_denied() {
    let resp = validate_v1("CREATE", json!({"replicas": 1, "ownerName": "John"}));
    assert_eq!(resp["uid"], "705ab4f5-6393-11e8-b7cc-42010a800002");
    assert_eq!(resp["allowed"], false);
    let message = resp["status"]["message"].as_str().unwrap();
    assert!(message.starts_with(r#"MySQL.mysql.sample.com "sample" is invalid"#), "{message}");
    assert!(message.contains(OWNER_NAME_FORMAT));
}

#[test]
fn three_token_owner_is_denied_on_update() {
    let resp = validate_v1("UPDATE", json!({"replicas": 1, "ownerName": "John Middle Smith"}));
    assert_eq!(resp["allowed"], false);
}

#[test]
fn two_token_owner_is_allowed() {
    let resp = validate_v1("CREATE", json!({"replicas": 3, "ownerName": "John Smith"}));
    assert_eq!(resp["allowed"], true);
}

#[test]
fn delete_is_never_denied() {
    let resp = validate_v1("DELETE", json!({"replicas": 1, "ownerName": "John"}));
    assert_eq!(resp["allowed"], true);
}

#[test]
fn out_of_range_replicas_are_denied() {
    let resp = validate_v1("CREATE", json!({"replicas": 6, "ownerName": "John Smith"}));
    assert_eq!(resp["allowed"], false);
    assert!(resp["status"]["message"].as_str().unwrap().contains("spec.replicas"));
}

#[test]
fn v2_composed_owner_is_validated() {
    let spec = json!({"replicas": 1, "ownerFirstName": "John", "ownerLastName": "van Smith"});
    let rev: AdmissionReview<v1alpha2::MySQL> = serde_json::from_value(review("v1alpha2", "CREATE", spec)).unwrap();
    assert_eq!(response(validate_review(rev))["allowed"], false);
}

#[test]
fn missing_owner_is_patched() {
    let rev: AdmissionReview<v1alpha1::MySQL> = serde_json::from_value(review("v1alpha1", "CREATE", json!({"replicas": 1}))).unwrap();
    let resp = response(mutate_review(rev));
    assert_eq!(resp["allowed"], true);
    assert_eq!(resp["patchType"], "JSONPatch");
    assert!(!resp["patch"].is_null());
}

#[test]
fn present_owner_is_left_alone() {
    let rev: AdmissionReview<v1alpha1::MySQL> =
        serde_json::from_value(review("v1alpha1", "CREATE", json!({"replicas": 1, "ownerName": "Jane Doe"}))).unwrap();
    let resp = response(mutate_review(rev));
    assert_eq!(resp["allowed"], true);
    assert!(resp.get("patch").map_or(true, Value::is_null));
}

#[test]
fn defaulted_object_passes_validation() {
    let mut schema = Schema::from(v1alpha1::MySQL::new("s", v1alpha1::MySQLSpec { replicas: 1, owner_name: String::new() }));
    assert!(schema.apply_defaults());
    assert_eq!(schema.owner(), NO_BODY);
    assert!(schema.validate(&Operation::Create).is_ok());
}

/// Applies the hook's patch to the object exactly as the API server received it.
fn defaulted(version: &str, spec: Value) -> Value {
    let raw = review(version, "CREATE", spec);
    let mut object = raw["request"]["object"].clone();
    let response = match version {
        "v1alpha1" => mutate_review(serde_json::from_value::<AdmissionReview<v1alpha1::MySQL>>(raw).unwrap()),
        _ => mutate_review(serde_json::from_value::<AdmissionReview<v1alpha2::MySQL>>(raw).unwrap()),
    }
    .response
    .unwrap();
    assert!(response.allowed);
    let patch: json_patch::Patch = serde_json::from_slice(&response.patch.expect("defaulting should patch")).unwrap();
    json_patch::patch(&mut object, &patch).unwrap();
    object
}

#[test]
fn defaulting_patch_is_empty_for_complete_owner() {
    let mut schema = Schema::from(v1alpha2::MySQL::new(
        "s",
        v1alpha2::MySQLSpec { replicas: 1, owner_first_name: "Ada".into(), owner_last_name: "Lovelace".into() },
    ));
    assert!(schema.defaulting_patch().unwrap().is_none());
}

#[test]
fn v1_patch_applies_to_submitted_object() {
    let object = defaulted("v1alpha1", json!({"replicas": 1}));
    assert_eq!(object["spec"]["ownerName"], NO_BODY);
    assert_eq!(object["spec"]["replicas"], 1);
}

#[test]
fn v2_patch_applies_to_submitted_object() {
    let object = defaulted("v1alpha2", json!({"replicas": 2}));
    assert_eq!(object["spec"]["ownerFirstName"], "no");
    assert_eq!(object["spec"]["ownerLastName"], "body");
}

#[test]
fn v2_patch_overwrites_explicit_empty_strings() {
    let object = defaulted("v1alpha2", json!({"replicas": 2, "ownerFirstName": "", "ownerLastName": ""}));
    assert_eq!(object["spec"]["ownerFirstName"], "no");
    assert_eq!(object["spec"]["ownerLastName"], "body");
}

#[test]
fn v2_half_empty_owner_is_denied() {
    for (spec, field) in [
        (json!({"replicas": 1, "ownerLastName": "Smith"}), "spec.ownerFirstName"),
        (json!({"replicas": 1, "ownerFirstName": "John", "ownerLastName": ""}), "spec.ownerLastName"),
        (json!({"replicas": 1, "ownerFirstName": "Mary Ann", "ownerLastName": "Smith"}), "spec.ownerFirstName"),
    ] {
        let rev: AdmissionReview<v1alpha2::MySQL> = serde_json::from_value(review("v1alpha2", "CREATE", spec)).unwrap();
        let resp = response(validate_review(rev));
        assert_eq!(resp["allowed"], false);
        let message = resp["status"]["message"].as_str().unwrap();
        assert!(message.contains(field), "{message}");
    }
}

#[test]
fn admitted_v2_owner_converts_back_from_hub() {
    let v2 = v1alpha2::MySQL::new("s", v1alpha2::MySQLSpec { replicas: 1, owner_first_name: "Ada".into(), owner_last_name: "Lovelace".into() });
    assert!(Schema::from(v2.clone()).validate(&Operation::Create).is_ok());
    let hub = v1alpha1::MySQL::from(&v2);
    assert_eq!(v1alpha2::MySQL::try_from(&hub).unwrap().spec, v2.spec);
}

proptest! {
    #[test]
    fn exactly_one_space_is_accepted(first in "[A-Za-z]{0,10}", last in "[A-Za-z]{0,10}") {
        let owner = format!("{first} {last}");
        prop_assert!(validate_owner_name(&owner).is_none());
    }

    #[test]
    fn other_space_counts_are_rejected(words in proptest::collection::vec("[A-Za-z]{1,6}", 1..6)) {
        prop_assume!(words.len() != 2);
        prop_assert!(validate_owner_name(&words.join(" ")).is_some());
    }
}
