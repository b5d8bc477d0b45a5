mod common;

use backup_service::config::convert::Converter;
use backup_service::config::loader;
use backup_service::config::validation::{EntityKind, ValidationError};
use backup_service::storage::{BootstrapOptions, ConfigAccessor};
use common::{load_holder, write_config, DOCUMENT};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_unknown_cluster_reference_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let broken = DOCUMENT.replace("source-cluster: main", "source-cluster: clusterX");
    let path = write_config(dir.path(), "config.yml", &broken).await;

    let err = loader::load(&path.to_string_lossy(), false, &BootstrapOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), "validate");
    match err.validation_error() {
        Some(ValidationError::ReferenceNotFound {
            kind,
            name,
            target,
            reference,
        }) => {
            assert_eq!(*kind, EntityKind::BackupRoutine);
            assert_eq!(name, "daily");
            assert_eq!(*target, EntityKind::Cluster);
            assert_eq!(reference, "clusterX");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_cron_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let broken = DOCUMENT.replace("\"@daily\"", "not-a-cron");
    let path = write_config(dir.path(), "config.yml", &broken).await;

    let err = loader::load(&path.to_string_lossy(), false, &BootstrapOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), "validate");
    assert!(matches!(
        err.validation_error(),
        Some(ValidationError::InvalidCron { field: "interval-cron", .. })
    ));
}

#[tokio::test]
async fn test_missing_file_fails_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yml");

    let err = loader::load(&path.to_string_lossy(), false, &BootstrapOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.stage(), "load");
}

#[tokio::test]
async fn test_round_trip_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "config.yml", DOCUMENT).await;
    let holder = load_holder(&path).await;

    let converter = Converter::default();
    let first = converter.to_dto(&holder.snapshot()).unwrap();
    let second = converter.to_dto(&converter.to_runtime(&first).unwrap()).unwrap();
    assert_eq!(first, second);

    let policy = first.backup_policies["policy"].retry_policy.clone().unwrap();
    assert_eq!(policy.base_timeout, 1000);
    assert_eq!(policy.max_retries, 3);
}

#[tokio::test]
async fn test_json_document_selected_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let yaml: serde_yaml::Value = serde_yaml::from_str(DOCUMENT).unwrap();
    let json = serde_json::to_string(&yaml).unwrap();
    let path = write_config(dir.path(), "config.JSON", &json).await;

    let holder = load_holder(&path).await;
    assert_eq!(holder.snapshot().backup_routines.len(), 1);

    // Written back as JSON, so it still decodes as JSON.
    holder.apply(holder.document().unwrap()).await.unwrap();
    let written = tokio::fs::read(&path).await.unwrap();
    assert!(serde_json::from_slice::<serde_json::Value>(&written).is_ok());
}

#[tokio::test]
async fn test_remote_pointer_served_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "config.yml", DOCUMENT).await;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pointer.yml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("type: local\npath: {}\n", config_path.display())),
        )
        .mount(&server)
        .await;

    let location = format!("{}/pointer.yml", server.uri());
    let holder = backup_service::ConfigHolder::load(&location, true, &BootstrapOptions::default())
        .await
        .unwrap();

    assert!(matches!(holder.accessor(), ConfigAccessor::Storage(_)));
    assert_eq!(holder.snapshot().backup_routines.len(), 1);

    let mut document = holder.document().unwrap();
    document.backup_routines.get_mut("daily").unwrap().interval_cron = "@hourly".into();
    holder.apply(document).await.unwrap();

    let written = tokio::fs::read_to_string(&config_path).await.unwrap();
    assert!(written.contains("@hourly"));
}

#[tokio::test]
async fn test_remote_pointer_must_be_valid_storage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pointer.yml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("type: tape\npath: /x\n"))
        .mount(&server)
        .await;

    let location = format!("{}/pointer.yml", server.uri());
    let err = loader::load(&location, true, &BootstrapOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.stage(), "bootstrap");
}
