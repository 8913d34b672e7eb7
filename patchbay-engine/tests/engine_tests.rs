use async_trait::async_trait;
use patchbay_config::ConfigManager;
use patchbay_crypto::{sha256_hex, CryptoError, CryptoResult, PassthroughCipher, PayloadCipher};
use patchbay_engine::{DynamicEngine, EngineError};
use patchbay_net::{
    HttpRequest, HttpResponse, HttpTransport, NetworkClient, NetworkClientConfig, NetworkError,
    NetworkResult,
};
use patchbay_rollback::{RollbackConfig, RollbackManager};
use patchbay_security::{QuarantineRegistry, SecurityPolicy, SecurityValidator};
use patchbay_storage::{KvStore, StorageManager};
use patchbay_types::{ComponentId, ComponentState, ComponentType, DynamicComponent};
use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Transport that plays back a fixed script; an empty script fails every
/// request, which is fine for tests that never touch the network.
struct ScriptedTransport {
    responses: Mutex<VecDeque<NetworkResult<HttpResponse>>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<NetworkResult<HttpResponse>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
        })
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, _request: &HttpRequest) -> NetworkResult<HttpResponse> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(NetworkError::Transport("script exhausted".to_string())))
    }
}

/// Cipher whose writes start failing once the budget is spent; reads keep
/// working. Models a store that goes read-only mid-operation.
struct WriteBudgetCipher {
    budget: AtomicUsize,
}

impl WriteBudgetCipher {
    fn new(budget: usize) -> Arc<Self> {
        Arc::new(Self {
            budget: AtomicUsize::new(budget),
        })
    }
}

impl PayloadCipher for WriteBudgetCipher {
    fn encrypt_bytes(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let granted = self
            .budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if granted {
            Ok(data.to_vec())
        } else {
            Err(CryptoError::Encryption("device is read-only".to_string()))
        }
    }

    fn decrypt_bytes(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        Ok(data.to_vec())
    }
}

async fn engine_with(
    transport: Arc<ScriptedTransport>,
    cipher: Arc<dyn PayloadCipher>,
) -> Arc<DynamicEngine> {
    let storage = Arc::new(StorageManager::new(
        KvStore::open_in_memory().unwrap(),
        cipher,
    ));
    let quarantine = Arc::new(QuarantineRegistry::load(Arc::clone(&storage)).await.unwrap());
    let validator = Arc::new(SecurityValidator::new(
        SecurityPolicy::permissive(),
        quarantine,
    ));
    let rollback = Arc::new(
        RollbackManager::load(Arc::clone(&storage), RollbackConfig::default())
            .await
            .unwrap(),
    );
    let configs = Arc::new(ConfigManager::load(Arc::clone(&storage)).await.unwrap());
    let network = Arc::new(NetworkClient::with_transport(
        NetworkClientConfig {
            retry_attempts: 1,
            ..NetworkClientConfig::default()
        },
        transport as _,
    ));
    Arc::new(DynamicEngine::builder(storage, validator, rollback, configs, network).build())
}

async fn engine_with_transport(transport: Arc<ScriptedTransport>) -> Arc<DynamicEngine> {
    engine_with(transport, Arc::new(PassthroughCipher)).await
}

async fn engine() -> Arc<DynamicEngine> {
    engine_with_transport(ScriptedTransport::new(Vec::new())).await
}

fn component(id: &str, version: &str, dependencies: &[&str]) -> DynamicComponent {
    let content = format!("{id}@{version}").into_bytes();
    DynamicComponent {
        id: ComponentId::new(id),
        name: id.to_string(),
        version: version.to_string(),
        component_type: ComponentType::Logic,
        metadata: BTreeMap::new(),
        dependencies: dependencies.iter().map(|d| ComponentId::new(*d)).collect(),
        config: BTreeMap::new(),
        checksum: sha256_hex(&content),
        content,
        signature: String::new(),
    }
}

#[tokio::test]
async fn load_transitions_through_loading_to_loaded() {
    let engine = engine().await;
    let mut events = engine.subscribe_state_changes();

    engine.load(component("a", "1.0.0", &[])).await.unwrap();

    let info = engine.component_info(&ComponentId::new("a")).await.unwrap();
    assert_eq!(info.state, ComponentState::Loaded);
    assert_eq!(info.component.version, "1.0.0");

    let first = events.recv().await.unwrap();
    assert_eq!((first.from, first.to), (ComponentState::Unloaded, ComponentState::Loading));
    let second = events.recv().await.unwrap();
    assert_eq!((second.from, second.to), (ComponentState::Loading, ComponentState::Loaded));
}

#[tokio::test]
async fn loading_twice_is_rejected() {
    let engine = engine().await;
    engine.load(component("a", "1.0.0", &[])).await.unwrap();

    let err = engine.load(component("a", "1.0.0", &[])).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyLoaded(_)));
}

#[tokio::test]
async fn missing_dependency_leaves_registry_untouched() {
    let engine = engine().await;

    let err = engine
        .load(component("a", "1.0.0", &["ghost"]))
        .await
        .unwrap_err();

    match err {
        EngineError::Dependency { reason, .. } => assert!(reason.contains("ghost")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(engine.component_info(&ComponentId::new("a")).await.is_none());
}

#[tokio::test]
async fn transitive_dependencies_are_resolved() {
    let engine = engine().await;
    engine.load(component("base", "1.0.0", &[])).await.unwrap();
    engine
        .load(component("mid", "1.0.0", &["base"]))
        .await
        .unwrap();
    engine
        .load(component("top", "1.0.0", &["mid"]))
        .await
        .unwrap();

    assert_eq!(engine.components().await.len(), 3);
}

#[tokio::test]
async fn checksum_mismatch_fails_validation_unregistered() {
    let engine = engine().await;
    let mut bad = component("a", "1.0.0", &[]);
    bad.checksum = "not-the-digest".to_string();

    let err = engine.load(bad).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    assert!(engine.component_info(&ComponentId::new("a")).await.is_none());
}

#[tokio::test]
async fn failed_update_restores_previous_version() {
    let engine = engine().await;
    engine.load(component("a", "1.0.0", &[])).await.unwrap();

    let mut v2 = component("a", "2.0.0", &[]);
    v2.checksum = "corrupted".to_string();
    let err = engine.apply_update(v2).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));

    // The registry converged back to v1, loaded.
    let info = engine.component_info(&ComponentId::new("a")).await.unwrap();
    assert_eq!(info.state, ComponentState::Loaded);
    assert_eq!(info.component.version, "1.0.0");
}

#[tokio::test]
async fn failed_restore_keeps_id_visible_with_update_error() {
    // Two writes succeed (the v1 payload and the pre-update snapshot);
    // after that the store is read-only, so the v2 persist fails and the
    // restore's persist fails too.
    let engine = engine_with(ScriptedTransport::new(Vec::new()), WriteBudgetCipher::new(2)).await;
    engine.load(component("a", "1.0.0", &[])).await.unwrap();

    let err = engine
        .apply_update(component("a", "2.0.0", &[]))
        .await
        .unwrap_err();
    // The original load failure surfaces, not the restore failure.
    assert!(matches!(err, EngineError::Storage(_)));

    // The id stays registered in a defined state carrying both failures.
    let info = engine.component_info(&ComponentId::new("a")).await.unwrap();
    assert_eq!(info.state, ComponentState::Error);
    assert_eq!(info.component.version, "1.0.0");
    let message = info.error_message.unwrap();
    assert!(message.contains("update failed"));
    assert!(message.contains("restore failed"));
}

#[tokio::test]
async fn successful_update_replaces_the_component() {
    let engine = engine().await;
    engine.load(component("a", "1.0.0", &[])).await.unwrap();
    engine
        .apply_update(component("a", "2.0.0", &[]))
        .await
        .unwrap();

    let info = engine.component_info(&ComponentId::new("a")).await.unwrap();
    assert_eq!(info.component.version, "2.0.0");
    assert_eq!(info.state, ComponentState::Loaded);
}

#[tokio::test]
async fn rollback_restores_snapshotted_version() {
    let engine = engine().await;
    engine.load(component("a", "1.0.0", &[])).await.unwrap();
    engine
        .apply_update(component("a", "2.0.0", &[]))
        .await
        .unwrap();

    let restored = engine.rollback(&ComponentId::new("a"), None).await.unwrap();
    assert_eq!(restored.version, "1.0.0");

    let info = engine.component_info(&ComponentId::new("a")).await.unwrap();
    assert_eq!(info.component.version, "1.0.0");
    assert_eq!(info.state, ComponentState::Loaded);
}

#[tokio::test]
async fn unload_then_reload_round_trips_through_storage() {
    let engine = engine().await;
    engine.load(component("a", "1.0.0", &[])).await.unwrap();

    engine.unload(&ComponentId::new("a")).await.unwrap();
    assert!(engine.component_info(&ComponentId::new("a")).await.is_none());

    engine.reload(&ComponentId::new("a")).await.unwrap();
    let info = engine.component_info(&ComponentId::new("a")).await.unwrap();
    assert_eq!(info.component.version, "1.0.0");
}

#[tokio::test]
async fn unload_of_unknown_id_is_not_found() {
    let engine = engine().await;
    let err = engine.unload(&ComponentId::new("ghost")).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn batch_load_reports_one_result_per_input() {
    let engine = engine().await;
    let results = engine
        .load_batch(vec![
            component("a", "1.0.0", &[]),
            component("b", "1.0.0", &["a"]),
            component("c", "1.0.0", &["ghost"]),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].1.is_ok());
    assert!(results[2].1.is_err());
    assert!(engine.component_info(&ComponentId::new("c")).await.is_none());
}

#[tokio::test]
async fn activate_requires_loaded_state() {
    let engine = engine().await;
    engine.load(component("a", "1.0.0", &[])).await.unwrap();

    engine.activate(&ComponentId::new("a")).await.unwrap();
    assert_eq!(
        engine
            .component_info(&ComponentId::new("a"))
            .await
            .unwrap()
            .state,
        ComponentState::Active
    );

    engine.deactivate(&ComponentId::new("a")).await.unwrap();
    assert!(matches!(
        engine.activate(&ComponentId::new("ghost")).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn update_poll_applies_announced_updates() {
    let update = component("a", "2.0.0", &[]);
    let descriptors = serde_json::json!([{
        "component_id": "a",
        "version": "2.0.0",
        "checksum": update.checksum,
        "mandatory": false
    }]);
    let transport = ScriptedTransport::new(vec![
        Ok(HttpResponse {
            status: 200,
            body: serde_json::to_vec(&descriptors).unwrap(),
        }),
        Ok(HttpResponse {
            status: 200,
            body: serde_json::to_vec(&update).unwrap(),
        }),
    ]);
    let engine = engine_with_transport(transport).await;
    engine.load(component("a", "1.0.0", &[])).await.unwrap();

    let applied = engine.check_and_apply_updates().await.unwrap();
    assert_eq!(applied, 1);
    assert_eq!(
        engine
            .component_info(&ComponentId::new("a"))
            .await
            .unwrap()
            .component
            .version,
        "2.0.0"
    );
}

#[tokio::test]
async fn start_and_shutdown_stop_background_loops() {
    let engine = engine().await;
    engine.start();
    engine.start(); // idempotent
    engine.shutdown().await;
}
