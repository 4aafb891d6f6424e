mod common;

use common::{request, seed, settings, start, StubInvoker};
use provider_orchestrator::codec::{StateRecord, TimestampRepr};
use provider_orchestrator::provider::ProviderStatus;
use provider_orchestrator::recognition::InvokeTable;
use provider_orchestrator::OrchestratorError;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

fn two_providers() -> provider_orchestrator::Settings {
    settings(vec![seed("primary", 1, 10), seed("backup", 2, 10)], true, true)
}

#[tokio::test]
async fn test_export_import_round_trip() {
    let (orchestrator, _) = start(&two_providers()).await;
    let config = orchestrator.config();

    // Build up some non-trivial state first
    let table = InvokeTable::new()
        .with("primary", StubInvoker::failing())
        .with("backup", StubInvoker::ok("b"));
    orchestrator
        .calls()
        .execute(&request(), &table, &CancellationToken::new())
        .await
        .unwrap();
    config.set_priority("backup", 7).await.unwrap();
    config.set_routing(Some(false), None).await;

    let before = config.snapshot().await;
    let exported = config.export_json().await.unwrap();

    config.reset_to_defaults().await;
    assert_ne!(config.snapshot().await, before);

    assert_ok!(config.import_state(&exported).await);
    assert_eq!(config.snapshot().await, before);
}

#[tokio::test]
async fn test_export_record_carries_timestamps() {
    let (orchestrator, _) = start(&two_providers()).await;
    let config = orchestrator.config();

    let record = config.export_state().await;

    assert_eq!(record.providers.len(), 2);
    assert!(record.auto_fallback);
    match &record.providers[0].quota_reset_at {
        TimestampRepr::Rfc3339(text) => assert!(text.ends_with("T00:00:00Z")),
        other => panic!("Expected RFC 3339 timestamp, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_import_leaves_state_unchanged() {
    let (orchestrator, _) = start(&two_providers()).await;
    let config = orchestrator.config();
    let before = config.snapshot().await;

    for document in [
        "not json at all",
        r#"{"autoFallback": false}"#,
        r#"{"providers": "primary"}"#,
        r#"{"providers": [{"id": "x"}]}"#,
    ] {
        let err = config.import_state(document).await.unwrap_err();
        assert!(
            matches!(err, OrchestratorError::InvalidConfiguration(_)),
            "{} → {:?}",
            document,
            err
        );
    }

    assert_eq!(config.snapshot().await, before);
}

#[tokio::test]
async fn test_import_rejects_duplicate_ids() {
    let (orchestrator, _) = start(&two_providers()).await;
    let config = orchestrator.config();

    let mut record: StateRecord = config.export_state().await;
    record.providers[1].id = "primary".to_string();
    let document = serde_json::to_string(&record).unwrap();

    let err = config.import_state(&document).await.unwrap_err();

    assert!(err.to_string().contains("duplicated"));
    assert!(config.snapshot().await.providers.contains("backup"));
}

#[tokio::test]
async fn test_import_rolls_over_expired_period() {
    let (orchestrator, _) = start(&two_providers()).await;
    let config = orchestrator.config();

    let mut record = config.export_state().await;
    record.providers[0].used_count = 10;
    record.providers[0].status = ProviderStatus::QuotaExceeded;
    record.providers[0].quota_reset_at = TimestampRepr::Rfc3339("2020-01-01T00:00:00Z".to_string());
    config
        .import_state(&serde_json::to_string(&record).unwrap())
        .await
        .unwrap();

    // The first access after import notices the period has ended
    let eligible = config.eligible().await;
    assert_eq!(eligible[0].id, "primary");
    assert_eq!(eligible[0].used_count, 0);
    assert!(eligible[0].quota_reset_at > chrono::Utc::now());
}

#[tokio::test]
async fn test_export_applies_due_quota_reset() {
    let (orchestrator, _) = start(&two_providers()).await;
    let config = orchestrator.config();

    let mut record = config.export_state().await;
    record.providers[0].used_count = 10;
    record.providers[0].status = ProviderStatus::QuotaExceeded;
    record.providers[0].quota_reset_at = TimestampRepr::Rfc3339("2020-01-01T00:00:00Z".to_string());
    config
        .import_state(&serde_json::to_string(&record).unwrap())
        .await
        .unwrap();

    // Export is the first read after the period ended
    let exported = config.export_state().await;
    assert_eq!(exported.providers[0].used_count, 0);
    assert_eq!(exported.providers[0].status, ProviderStatus::Active);

    let json: StateRecord = serde_json::from_str(&config.export_json().await.unwrap()).unwrap();
    assert_eq!(json.providers[0].used_count, 0);
}

#[tokio::test]
async fn test_reset_to_defaults_restores_seeds() {
    let (orchestrator, _) = start(&two_providers()).await;
    let config = orchestrator.config();

    config.disable("primary").await.unwrap();
    config.set_quota_limit("backup", 1).await.unwrap();
    config.set_routing(Some(false), Some(false)).await;

    config.reset_to_defaults().await;

    let snapshot = config.snapshot().await;
    assert!(snapshot.auto_fallback);
    assert!(snapshot.fallback_to_local);
    let primary = snapshot.providers.get("primary").unwrap();
    assert!(primary.enabled);
    assert_eq!(primary.status, ProviderStatus::Active);
    assert_eq!(snapshot.providers.get("backup").unwrap().quota_limit, 10);
}

#[tokio::test]
async fn test_unknown_provider_is_reported() {
    let (orchestrator, _) = start(&two_providers()).await;
    let config = orchestrator.config();
    let before = config.snapshot().await;

    assert!(matches!(
        config.enable("ghost").await,
        Err(OrchestratorError::ProviderNotFound(id)) if id == "ghost"
    ));
    assert_err!(config.disable("ghost").await);
    assert_err!(config.set_priority("ghost", 1).await);
    assert_err!(config.set_credential("ghost", "k").await);
    assert_err!(config.reset_quota("ghost").await);
    assert_err!(config.stats("ghost").await);

    assert_eq!(config.snapshot().await, before);
}

#[tokio::test]
async fn test_set_max_errors_rejects_zero() {
    let (orchestrator, _) = start(&two_providers()).await;
    let config = orchestrator.config();

    let err = config.set_max_errors("primary", 0).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::InvalidConfiguration(_)));
    assert_eq!(config.stats("primary").await.unwrap().max_errors, 3);
}

#[tokio::test]
async fn test_credential_controls_eligibility() {
    let (orchestrator, _) = start(&two_providers()).await;
    let config = orchestrator.config();

    config.set_credential("primary", "").await.unwrap();
    let ids: Vec<String> = config.eligible().await.into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["backup"]);
    assert_eq!(
        config.stats("primary").await.unwrap().status,
        ProviderStatus::Disabled
    );

    config.set_credential("primary", "fresh-key").await.unwrap();
    let ids: Vec<String> = config.eligible().await.into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["primary", "backup"]);
}

#[tokio::test]
async fn test_reset_quota_restores_eligibility() {
    let (orchestrator, _) = start(&two_providers()).await;
    let config = orchestrator.config();

    config.set_quota_limit("primary", 0).await.unwrap();
    assert!(config.eligible().await.iter().all(|p| p.id != "primary"));

    config.set_quota_limit("primary", 5).await.unwrap();
    assert_eq!(config.eligible().await[0].id, "primary");

    let table = InvokeTable::new().with("primary", StubInvoker::ok("a"));
    let calls = orchestrator.calls();
    for _ in 0..5 {
        calls
            .execute(&request(), &table, &CancellationToken::new())
            .await
            .unwrap();
    }
    assert_eq!(
        config.stats("primary").await.unwrap().status,
        ProviderStatus::QuotaExceeded
    );

    config.reset_quota("primary").await.unwrap();

    let stats = config.stats("primary").await.unwrap();
    assert_eq!(stats.used_count, 0);
    assert_eq!(stats.status, ProviderStatus::Active);
    assert_eq!(config.eligible().await[0].id, "primary");
}

#[tokio::test]
async fn test_mutations_are_persisted() {
    let (orchestrator, persistence) = start(&two_providers()).await;
    let config = orchestrator.config();

    config.set_priority("backup", 0).await.unwrap();
    config.set_routing(None, Some(false)).await;
    orchestrator.flush().await;

    let stored = persistence.stored().await.unwrap();
    assert_eq!(stored.providers.get("backup").unwrap().priority, 0);
    assert!(!stored.fallback_to_local);
    assert_eq!(stored, config.snapshot().await);
}
