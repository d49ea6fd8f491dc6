use mysql_operator::conversion::{convert_object, convert_review, ConversionError, ConversionRequest, ConversionReview};
use mysql_operator::crd::{v1alpha1, v1alpha2};
use proptest::prelude::*;
use serde_json::{json, Value};

const V1: &str = "mysql.sample.com/v1alpha1";
const V2: &str = "mysql.sample.com/v1alpha2";

fn v1_object(owner: &str) -> Value {
    json!({
        "apiVersion": V1,
        "kind": "MySQL",
        "metadata": {"name": "sample", "namespace": "default", "uid": "u-1", "resourceVersion": "42"},
        "spec": {"replicas": 3, "ownerName": owner},
        "status": {"conditions": [
            {"type": "Running", "status": true, "reason": "StatefulSetReady", "lastTransitionTime": "2024-01-01T00:00:00Z"}
        ]}
    })
}

fn review(desired: &str, objects: Vec<Value>) -> ConversionReview {
    ConversionReview {
        api_version: "apiextensions.k8s.io/v1".into(),
        kind: "ConversionReview".into(),
        request: Some(ConversionRequest { uid: "c-1".into(), desired_api_version: desired.into(), objects }),
        response: None,
    }
}

#[test]
fn hub_to_spoke_splits_owner() {
    let out = convert_object(v1_object("John Smith"), V2).unwrap();
    let v2: v1alpha2::MySQL = serde_json::from_value(out).unwrap();
    assert_eq!(v2.spec.owner_first_name, "John");
    assert_eq!(v2.spec.owner_last_name, "Smith");
    assert_eq!(v2.spec.replicas, 3);
    assert_eq!(v2.metadata.uid.as_deref(), Some("u-1"));
    assert_eq!(v2.metadata.resource_version.as_deref(), Some("42"));
    assert_eq!(v2.status.unwrap().conditions.0.len(), 1);
}

#[test]
fn three_token_owner_cannot_move_to_v2() {
    let err = convert_object(v1_object("John Middle Smith"), V2).unwrap_err();
    assert_eq!(err, ConversionError::InvalidName("John Middle Smith".into()));
}

#[test]
fn spoke_to_hub_round_trips() {
    let there = convert_object(v1_object("Jane Doe"), V2).unwrap();
    let back = convert_object(there, V1).unwrap();
    let original: v1alpha1::MySQL = serde_json::from_value(v1_object("Jane Doe")).unwrap();
    let returned: v1alpha1::MySQL = serde_json::from_value(back).unwrap();
    assert_eq!(returned.spec, original.spec);
    assert_eq!(returned.metadata, original.metadata);
    assert_eq!(returned.status, original.status);
}

#[test]
fn same_version_passes_through() {
    let obj = v1_object("John");
    assert_eq!(convert_object(obj.clone(), V1).unwrap(), obj);
}

#[test]
fn review_echoes_uid_and_converts_all_objects() {
    let out = convert_review(review(V2, vec![v1_object("A B"), v1_object("C D")]));
    assert!(out.request.is_none());
    let resp = out.response.unwrap();
    assert_eq!(resp.uid, "c-1");
    assert!(resp.result.is_success());
    assert_eq!(resp.converted_objects.len(), 2);
    assert!(resp.converted_objects.iter().all(|o| o["apiVersion"] == V2));
}

#[test]
fn one_bad_object_fails_the_review() {
    let resp = convert_review(review(V2, vec![v1_object("A B"), v1_object("Prince")])).response.unwrap();
    assert!(!resp.result.is_success());
    assert!(resp.converted_objects.is_empty());
    assert!(resp.result.message.unwrap().contains("Prince"));
}

#[test]
fn review_wire_format() {
    let raw = json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "ConversionReview",
        "request": {"uid": "c-2", "desiredAPIVersion": V2, "objects": [v1_object("A B")]}
    });
    let out = serde_json::to_value(convert_review(serde_json::from_value(raw).unwrap())).unwrap();
    assert_eq!(out["response"]["uid"], "c-2");
    assert_eq!(out["response"]["result"]["status"], "Success");
    assert_eq!(out["response"]["convertedObjects"][0]["spec"]["ownerLastName"], "B");
}

proptest! {
    #[test]
    fn v2_to_v1_to_v2_is_identity(first in "[A-Za-z]{1,12}", last in "[A-Za-z]{1,12}", replicas in 1i32..=5) {
        let v2 = v1alpha2::MySQL::new("p", v1alpha2::MySQLSpec { replicas, owner_first_name: first, owner_last_name: last });
        let hub = v1alpha1::MySQL::from(&v2);
        let back = v1alpha2::MySQL::try_from(&hub).unwrap();
        prop_assert_eq!(back.spec, v2.spec);
    }
}
