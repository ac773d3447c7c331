//! Typed-binding scenarios: projecting resolved trees onto records.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::json;
use strata_core::{
    ConfigItem, ConfigReader, EnvExpander, ErrorKind, NodePath, ObjectNode, Result,
    load_optional, load_optional_item, load_optional_item_at_path, load_required,
    load_required_item, load_required_item_at_path, load_required_map, load_required_sequence,
    load_required_validated, range_validator, store_item, store_item_at_path, store_map,
    store_value, store_value_at_path,
};

fn load_document(document: &str) -> ObjectNode {
    ConfigReader::with_expander(".", EnvExpander::new(HashMap::new()))
        .load_str(document)
        .unwrap()
}

#[derive(Debug, Default, PartialEq)]
struct PoolConfig {
    size: i32,
    label: Option<String>,
}

impl ConfigItem for PoolConfig {
    fn load_parameters(&mut self, config: &ObjectNode) -> Result<()> {
        self.size = load_required_validated("size", config, range_validator(-50, 50))?;
        self.label = load_optional("label", config)?;
        Ok(())
    }

    fn store_parameters(&self, config: &mut ObjectNode) -> Result<()> {
        store_value(&self.size, "size", config)?;
        if let Some(label) = &self.label {
            store_value(label, "label", config)?;
        }
        Ok(())
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.size > 20 {
            return Err("size must stay at or below 20".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ServiceConfig {
    name: String,
    pool: PoolConfig,
    has_fallback: bool,
}

impl ConfigItem for ServiceConfig {
    fn load_parameters(&mut self, config: &ObjectNode) -> Result<()> {
        self.name = load_required("name", config)?;
        load_required_item(&mut self.pool, "pool", config)?;
        self.has_fallback = load_optional_item(&mut PoolConfig::default(), "fallback", config)?;
        Ok(())
    }

    fn store_parameters(&self, config: &mut ObjectNode) -> Result<()> {
        store_value(&self.name, "name", config)?;
        store_item(&self.pool, "pool", config)
    }
}

#[test]
fn loads_a_record_from_a_resolved_document() {
    let tree = load_document(r##"{"config":{"#param":7}}"##);
    assert_eq!(load_required::<i32>("param", &tree).unwrap(), 7);
}

#[test]
fn loads_nested_records_through_derivation() {
    let tree = load_document(
        r##"{"config":{
            "pool_defaults": {"#size": 8},
            "service": {
                "#name": "billing",
                "pool": {"base": "/pool_defaults", "#label": "primary"}
            }
        }}"##,
    );
    let mut service = ServiceConfig::default();
    load_required_item_at_path(&mut service, &NodePath::parse("/service").unwrap(), &tree).unwrap();

    assert_eq!(service.name, "billing");
    assert_eq!(service.pool.size, 8);
    assert_eq!(service.pool.label.as_deref(), Some("primary"));
    assert!(!service.has_fallback);
}

#[test]
fn range_validator_rejects_out_of_range_parameters() {
    let tree = load_document(r##"{"config":{"pool":{"#size": 60}}}"##);
    let mut pool = PoolConfig::default();
    let err = load_required_item(&mut pool, "pool", &tree).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("size"));
}

#[test]
fn validate_hook_runs_after_loading() {
    let tree = load_document(r##"{"config":{"pool":{"#size": 30}}}"##);
    let mut pool = PoolConfig::default();
    let err = load_required_item(&mut pool, "pool", &tree).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("at or below 20"));
}

#[test]
fn optional_sub_records_report_their_presence() {
    let tree = load_document(
        r##"{"config":{
            "with": {"#name": "a", "pool": {"#size": 1}, "fallback": {"#size": 2}},
            "without": {"#name": "b", "pool": {"#size": 1}}
        }}"##,
    );

    let mut with = ServiceConfig::default();
    load_required_item_at_path(&mut with, &NodePath::parse("/with").unwrap(), &tree).unwrap();
    assert!(with.has_fallback);

    let mut without = ServiceConfig::default();
    load_required_item_at_path(&mut without, &NodePath::parse("/without").unwrap(), &tree).unwrap();
    assert!(!without.has_fallback);
}

#[derive(Debug)]
struct WorkerConfig {
    worker_name: String,
    weight: i32,
}

impl WorkerConfig {
    fn named(worker_name: &str) -> Self {
        Self {
            worker_name: worker_name.to_string(),
            weight: 0,
        }
    }
}

impl ConfigItem for WorkerConfig {
    fn load_parameters(&mut self, config: &ObjectNode) -> Result<()> {
        self.weight = load_required("weight", config)?;
        Ok(())
    }

    fn store_parameters(&self, config: &mut ObjectNode) -> Result<()> {
        store_value(&self.weight, "weight", config)
    }
}

#[test]
fn sequence_containers_are_consumed_in_insertion_order() {
    let tree = load_document(
        r##"{"config":{
            "workers": {
                "gamma": {"#weight": 3},
                "alpha": {"#weight": 1},
                "beta": {"#weight": 2}
            }
        }}"##,
    );
    let workers = load_required_sequence("workers", &tree, WorkerConfig::named).unwrap();
    let names: Vec<&str> = workers.iter().map(|w| w.worker_name.as_str()).collect();
    assert_eq!(names, ["gamma", "alpha", "beta"]);
    assert_eq!(workers[0].weight, 3);
}

#[test]
fn keyed_containers_use_member_names_as_keys() {
    let tree = load_document(
        r##"{"config":{
            "workers": {"alpha": {"#weight": 1}, "beta": {"#weight": 2}}
        }}"##,
    );
    let workers = load_required_map("workers", &tree, WorkerConfig::named).unwrap();
    assert_eq!(workers.len(), 2);
    assert_eq!(workers["alpha"].weight, 1);
    assert_eq!(workers["beta"].weight, 2);
}

#[test]
fn container_entries_must_be_objects() {
    let tree = load_document(r##"{"config":{"workers":{"#oops": 1}}}"##);
    let err = load_required_sequence("workers", &tree, WorkerConfig::named).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("workers/oops"));
}

#[test]
fn stored_records_load_back_identically() {
    let original = PoolConfig {
        size: 12,
        label: Some("primary".to_string()),
    };

    let mut tree = ObjectNode::new();
    store_item(&original, "pool", &mut tree).unwrap();

    let mut reloaded = PoolConfig::default();
    load_required_item(&mut reloaded, "pool", &tree).unwrap();
    assert_eq!(reloaded, original);
}

#[test]
fn stored_maps_round_trip_through_the_tree() {
    let mut workers = IndexMap::new();
    workers.insert("alpha".to_string(), WorkerConfig::named("alpha"));
    workers.insert("beta".to_string(), WorkerConfig::named("beta"));

    let mut tree = ObjectNode::new();
    store_map(&workers, "workers", &mut tree).unwrap();

    let reloaded = load_required_map("workers", &tree, WorkerConfig::named).unwrap();
    let names: Vec<&str> = reloaded.keys().map(String::as_str).collect();
    assert_eq!(names, ["alpha", "beta"]);
}

#[test]
fn storing_under_an_invalid_name_is_a_name_error() {
    let mut tree = ObjectNode::new();
    let err = store_value(&1_i32, "0param", &mut tree).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Name);
}

#[test]
fn store_at_path_builds_intermediate_objects() {
    let mut root = ObjectNode::new();
    store_value_at_path(&1_i32, &NodePath::parse("a/b/c").unwrap(), &mut root).unwrap();
    assert_eq!(
        root.value_at(&NodePath::parse("/a/b/c").unwrap()),
        Some(&json!(1))
    );

    let err = store_value_at_path(&2_i32, &NodePath::parse("a/b").unwrap(), &mut root).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn records_round_trip_through_a_path() {
    let mut root = ObjectNode::new();
    let pool = PoolConfig {
        size: 4,
        label: None,
    };
    let path = NodePath::parse("services/db/pool").unwrap();
    store_item_at_path(&pool, &path, &mut root).unwrap();

    let mut reloaded = PoolConfig::default();
    assert!(load_optional_item_at_path(&mut reloaded, &path, &root).unwrap());
    assert_eq!(reloaded, pool);

    let mut missing = PoolConfig::default();
    let elsewhere = NodePath::parse("services/cache/pool").unwrap();
    assert!(!load_optional_item_at_path(&mut missing, &elsewhere, &root).unwrap());

    // storing into the occupied slot again is a collision
    let err = store_item_at_path(&pool, &path, &mut root).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}
