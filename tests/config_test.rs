//! Loading configuration files and building managers from them.

mod common;

use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use viewstats::core::config::RecorderMode;
use viewstats::core::{Config, ManualClock, Timestamp};
use viewstats::stats::{AggregationData, CollectionState, MeasureMap, StatsManager, ViewName};
use viewstats::StatsError;

const VIEWS_YAML: &str = r#"
recorder:
  mode: direct
collection:
  initial_state: enabled
logging:
  level: warn
views:
  - name: requests_by_method
    description: Request count per method
    measure:
      name: latency
      unit: ms
    aggregation:
      type: count
    columns: [method]
  - name: latency_dist
    measure:
      name: latency
      unit: ms
    aggregation:
      type: distribution
      boundaries: [0, 10, 100]
    columns: [method]
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_config_from_file() {
    let file = write_config(VIEWS_YAML);
    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.recorder.mode, RecorderMode::Direct);
    assert_eq!(config.logging.level.as_str(), "warn");
    assert_eq!(config.views.len(), 2);
    assert_eq!(config.views[0].description, "Request count per method");
    assert!(!config.debug);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::from_file(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, StatsError::Io(_)));
}

#[test]
fn test_malformed_yaml_is_yaml_error() {
    let file = write_config("views: [ { name: broken");
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(matches!(err, StatsError::Yaml(_)));
    assert_eq!(err.category(), "serialization");
}

#[test]
fn test_invalid_boundaries_rejected_on_load() {
    let file = write_config(
        r#"
views:
  - name: bad
    measure:
      name: latency
    aggregation:
      type: distribution
      boundaries: [10, 5]
"#,
    );
    assert!(Config::from_file(file.path()).is_err());
}

#[test]
fn test_manager_registers_configured_views() {
    let file = write_config(VIEWS_YAML);
    let config = Config::from_file(file.path()).unwrap();
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(10)));
    let manager = StatsManager::from_config(&config, clock).unwrap();

    assert_eq!(manager.mode(), RecorderMode::Direct);
    let names: Vec<String> = manager
        .registered_views()
        .iter()
        .map(|view| view.name().to_string())
        .collect();
    assert_eq!(names, vec!["latency_dist", "requests_by_method"]);

    // Views sharing a measure both see every record.
    let latency = manager.registered_views()[0].measure().clone();
    manager
        .record(&common::tags("GET"), MeasureMap::new().put(&latency, 42.0))
        .unwrap();

    let requests = manager
        .get_view(&ViewName::new("requests_by_method").unwrap())
        .unwrap();
    assert_eq!(requests.get(&[Some("GET")]), Some(&AggregationData::Count(1)));

    let dist = manager.get_view(&ViewName::new("latency_dist").unwrap()).unwrap();
    match dist.get(&[Some("GET")]) {
        Some(AggregationData::Distribution(d)) => assert_eq!(d.bucket_counts, vec![0, 0, 1, 0]),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_initially_disabled_manager() {
    let file = write_config(&VIEWS_YAML.replace("initial_state: enabled", "initial_state: disabled"));
    let config = Config::from_file(file.path()).unwrap();
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(10)));
    let manager = StatsManager::from_config(&config, clock).unwrap();

    assert_eq!(manager.state(), CollectionState::Disabled);
    assert_eq!(manager.registered_views().len(), 2);
}
