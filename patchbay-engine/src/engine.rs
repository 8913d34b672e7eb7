//! The lifecycle engine: load/unload/update/rollback orchestration plus the
//! background update-check, cleanup, and health loops.
//!
//! Operations on one component id are strictly serialized; distinct ids run
//! concurrently. Loops are cancellable via a shutdown signal and only stop
//! between operations, never mid-mutation.

use crate::error::{EngineError, EngineResult};
use crate::locks::ComponentLocks;
use crate::registry::{ComponentRegistry, StateChangeEvent};
use futures::future::join_all;
use patchbay_config::ConfigManager;
use patchbay_net::{NetworkClient, UpdateCheckRequest};
use patchbay_rollback::RollbackManager;
use patchbay_security::SecurityValidator;
use patchbay_storage::{StorageCategory, StorageManager};
use patchbay_types::{
    ComponentId, ComponentInfo, ComponentState, DynamicComponent, RollbackPointId,
};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Engine-level settings; collaborator tuning lives in each collaborator's
/// own config.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Application version reported to the update service.
    pub app_version: String,
    pub platform: String,
    pub device_id: String,
    /// When false, only mandatory updates are applied by the poll loop.
    pub auto_update: bool,
    pub update_check_interval: Duration,
    pub cleanup_interval: Duration,
    pub health_check_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
            device_id: String::new(),
            auto_update: true,
            update_check_interval: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(3600),
            health_check_interval: Duration::from_secs(60),
        }
    }
}

/// Assembles a `DynamicEngine` from its collaborators. There is no global
/// instance; callers own the engine and its lifecycle.
pub struct EngineBuilder {
    config: EngineConfig,
    storage: Arc<StorageManager>,
    validator: Arc<SecurityValidator>,
    rollback: Arc<RollbackManager>,
    configs: Arc<ConfigManager>,
    network: Arc<NetworkClient>,
}

impl EngineBuilder {
    pub fn new(
        storage: Arc<StorageManager>,
        validator: Arc<SecurityValidator>,
        rollback: Arc<RollbackManager>,
        configs: Arc<ConfigManager>,
        network: Arc<NetworkClient>,
    ) -> Self {
        Self {
            config: EngineConfig::default(),
            storage,
            validator,
            rollback,
            configs,
            network,
        }
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn build(self) -> DynamicEngine {
        let (shutdown, _) = watch::channel(false);
        DynamicEngine {
            config: self.config,
            registry: ComponentRegistry::new(),
            locks: ComponentLocks::new(),
            storage: self.storage,
            validator: self.validator,
            rollback: self.rollback,
            configs: self.configs,
            network: self.network,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }
}

pub struct DynamicEngine {
    config: EngineConfig,
    registry: ComponentRegistry,
    locks: ComponentLocks,
    storage: Arc<StorageManager>,
    validator: Arc<SecurityValidator>,
    rollback: Arc<RollbackManager>,
    configs: Arc<ConfigManager>,
    network: Arc<NetworkClient>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DynamicEngine {
    pub fn builder(
        storage: Arc<StorageManager>,
        validator: Arc<SecurityValidator>,
        rollback: Arc<RollbackManager>,
        configs: Arc<ConfigManager>,
        network: Arc<NetworkClient>,
    ) -> EngineBuilder {
        EngineBuilder::new(storage, validator, rollback, configs, network)
    }

    // ── Lifecycle operations ─────────────────────────────────────

    /// Validates, snapshots, persists, and registers a component.
    /// Transitions Unloaded → Loading → Loaded, one event each.
    pub async fn load(&self, component: DynamicComponent) -> EngineResult<()> {
        let _guard = self.locks.acquire(&component.id).await;
        self.load_locked(component).await
    }

    /// Removes a component's registration. Its persisted payload stays in
    /// place so a later `reload` can bring it back.
    pub async fn unload(&self, id: &ComponentId) -> EngineResult<()> {
        let _guard = self.locks.acquire(id).await;
        self.registry
            .remove(id)
            .await
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;
        info!(component_id = %id, "component unloaded");
        Ok(())
    }

    /// Reloads a component from its persisted payload, revalidating it.
    pub async fn reload(&self, id: &ComponentId) -> EngineResult<()> {
        let _guard = self.locks.acquire(id).await;
        let component: DynamicComponent = self
            .storage
            .get_json(StorageCategory::Component, id.as_str())
            .await?
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;
        self.registry.remove(id).await;
        self.load_locked(component).await
    }

    /// Loads several components concurrently. The result vector matches the
    /// input order; same-id entries still serialize through the per-id lock.
    pub async fn load_batch(
        &self,
        components: Vec<DynamicComponent>,
    ) -> Vec<(ComponentId, EngineResult<()>)> {
        join_all(components.into_iter().map(|component| async {
            let id = component.id.clone();
            let result = self.load(component).await;
            (id, result)
        }))
        .await
    }

    /// Replaces a resident component with a new version. On any failure the
    /// pre-update snapshot is restored before the error surfaces, so the
    /// registry converges: new version active, or old version back, never
    /// neither.
    pub async fn apply_update(&self, component: DynamicComponent) -> EngineResult<()> {
        let id = component.id.clone();
        let _guard = self.locks.acquire(&id).await;

        let previous = match self.registry.get(&id).await {
            Some(info) if info.state.is_resident() => info,
            _ => return self.load_locked(component).await,
        };

        self.rollback
            .create_backup(&previous.component, "pre-update snapshot")
            .await?;
        self.registry.transition(&id, ComponentState::Updating).await;
        self.registry.remove(&id).await;

        match self.load_locked(component.clone()).await {
            Ok(()) => {
                info!(
                    component_id = %id,
                    from = %previous.component.version,
                    to = %component.version,
                    "update applied"
                );
                Ok(())
            }
            Err(e) => {
                warn!(component_id = %id, error = %e, "update failed, restoring previous version");
                let restore = async {
                    let restored = self
                        .rollback
                        .rollback(&id, None, Some(component.version.clone()))
                        .await?;
                    self.storage
                        .put_json(StorageCategory::Component, id.as_str(), &restored)
                        .await?;
                    Ok::<_, EngineError>(restored)
                }
                .await;
                match restore {
                    Ok(restored) => {
                        // The snapshot passed validation when it first loaded;
                        // re-registering it directly keeps convergence
                        // independent of policy drift.
                        self.registry.register(restored, ComponentState::Loaded).await;
                    }
                    Err(restore_err) => {
                        // Keep the id visible in Error state rather than
                        // vanished, and surface the update error — the
                        // restore failure is recorded alongside it.
                        error!(
                            component_id = %id,
                            error = %restore_err,
                            update_error = %e,
                            "restore after failed update also failed"
                        );
                        self.registry
                            .register(previous.component.clone(), ComponentState::Loading)
                            .await;
                        self.registry
                            .fail(
                                &id,
                                &format!("update failed ({e}); restore failed ({restore_err})"),
                            )
                            .await;
                    }
                }
                Err(e)
            }
        }
    }

    /// Restores a component from a rollback point (most recent by default)
    /// and re-registers it as Loaded.
    pub async fn rollback(
        &self,
        id: &ComponentId,
        point_id: Option<RollbackPointId>,
    ) -> EngineResult<DynamicComponent> {
        let _guard = self.locks.acquire(id).await;

        let from_version = self
            .registry
            .get(id)
            .await
            .map(|info| info.component.version.clone());
        let restored = self.rollback.rollback(id, point_id, from_version).await?;

        self.storage
            .put_json(StorageCategory::Component, id.as_str(), &restored)
            .await?;
        if self.registry.get(id).await.is_some() {
            self.registry.replace_component(id, restored.clone()).await;
            self.registry.transition(id, ComponentState::Loaded).await;
        } else {
            self.registry
                .register(restored.clone(), ComponentState::Loaded)
                .await;
        }
        Ok(restored)
    }

    /// Marks a loaded component active.
    pub async fn activate(&self, id: &ComponentId) -> EngineResult<()> {
        let _guard = self.locks.acquire(id).await;
        match self.registry.state_of(id).await {
            Some(ComponentState::Loaded) => {
                self.registry.transition(id, ComponentState::Active).await;
                Ok(())
            }
            Some(ComponentState::Active) => Ok(()),
            Some(_) | None => Err(EngineError::NotFound(id.clone())),
        }
    }

    /// Returns an active component to Loaded.
    pub async fn deactivate(&self, id: &ComponentId) -> EngineResult<()> {
        let _guard = self.locks.acquire(id).await;
        match self.registry.state_of(id).await {
            Some(ComponentState::Active) => {
                self.registry.transition(id, ComponentState::Loaded).await;
                Ok(())
            }
            Some(ComponentState::Loaded) => Ok(()),
            Some(_) | None => Err(EngineError::NotFound(id.clone())),
        }
    }

    async fn load_locked(&self, component: DynamicComponent) -> EngineResult<()> {
        let id = component.id.clone();

        if let Some(state) = self.registry.state_of(&id).await
            && state.is_resident()
        {
            return Err(EngineError::AlreadyLoaded(id));
        }

        // Dependency and validation failures leave the registry untouched
        // for this id.
        self.check_dependencies(&component).await?;

        let verdict = self.validator.validate_component(&component);
        if !verdict.is_valid {
            return Err(EngineError::Validation {
                component_id: id,
                reason: verdict.reason,
            });
        }
        for violation in &verdict.violations {
            warn!(
                component_id = %id,
                severity = ?violation.severity,
                kind = ?violation.kind,
                message = %violation.message,
                "non-critical security violation recorded"
            );
        }

        if let Some(existing) = self.registry.get(&id).await {
            self.rollback
                .create_backup(&existing.component, "pre-load snapshot")
                .await?;
        }

        self.registry
            .register(component.clone(), ComponentState::Loading)
            .await;
        if let Err(e) = self
            .storage
            .put_json(StorageCategory::Component, id.as_str(), &component)
            .await
        {
            self.registry.fail(&id, &e.to_string()).await;
            return Err(e.into());
        }
        self.registry.transition(&id, ComponentState::Loaded).await;
        info!(component_id = %id, version = %component.version, "component loaded");
        Ok(())
    }

    /// Walks the transitive dependency closure against the registry.
    /// Every dependency must be resident; a path back to the component
    /// itself is circular.
    async fn check_dependencies(&self, component: &DynamicComponent) -> EngineResult<()> {
        let mut missing = Vec::new();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<ComponentId> = component.dependencies.iter().cloned().collect();

        while let Some(dep) = queue.pop_front() {
            if !visited.insert(dep.clone()) {
                continue;
            }
            if dep == component.id {
                return Err(EngineError::Dependency {
                    component_id: component.id.clone(),
                    reason: "circular dependency on itself".to_string(),
                });
            }
            match self.registry.get(&dep).await {
                Some(info) if info.state.is_resident() => {
                    queue.extend(info.component.dependencies.iter().cloned());
                }
                _ => missing.push(dep.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            Err(EngineError::Dependency {
                component_id: component.id.clone(),
                reason: format!("missing dependencies: {}", missing.join(", ")),
            })
        }
    }

    // ── Observation ──────────────────────────────────────────────

    /// One event per state transition.
    pub fn subscribe_state_changes(&self) -> broadcast::Receiver<StateChangeEvent> {
        self.registry.subscribe()
    }

    /// Full-registry snapshots after every change.
    pub fn watch_registry(&self) -> watch::Receiver<Vec<ComponentInfo>> {
        self.registry.watch()
    }

    pub async fn component_info(&self, id: &ComponentId) -> Option<ComponentInfo> {
        self.registry.get(id).await
    }

    pub async fn components(&self) -> Vec<ComponentInfo> {
        self.registry.all().await
    }

    // ── Update polling ───────────────────────────────────────────

    /// Asks the update service what is available and applies it. Skips
    /// non-mandatory updates when `auto_update` is off. Individual apply
    /// failures are logged, not fatal. Returns the number applied.
    pub async fn check_and_apply_updates(&self) -> EngineResult<usize> {
        let request = UpdateCheckRequest {
            current_version: self.config.app_version.clone(),
            platform: self.config.platform.clone(),
            device_id: self.config.device_id.clone(),
        };
        let available = self.network.check_updates(&request).await?;

        let mut applied = 0;
        for descriptor in available {
            if !self.config.auto_update && !descriptor.mandatory {
                debug!(component_id = %descriptor.component_id, "skipping optional update");
                continue;
            }
            let id = ComponentId::new(descriptor.component_id.clone());
            let component = match self
                .network
                .get_component_version(&id, &descriptor.version)
                .await
            {
                Ok(component) => component,
                Err(e) => {
                    warn!(component_id = %id, error = %e, "update download failed");
                    continue;
                }
            };
            match self.apply_update(component).await {
                Ok(()) => applied += 1,
                Err(e) => warn!(component_id = %id, error = %e, "update apply failed"),
            }
        }
        Ok(applied)
    }

    /// Pulls a configuration from the remote service and applies it through
    /// the configuration manager.
    pub async fn sync_configuration(&self, config_id: &str) -> EngineResult<()> {
        let remote = self.network.get_configuration(config_id).await?;
        self.configs.apply_remote(vec![remote]).await?;
        Ok(())
    }

    // ── Background loops ─────────────────────────────────────────

    /// Starts the update-check, cleanup, and health loops. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if !tasks.is_empty() {
            return;
        }
        tasks.push(tokio::spawn(Self::update_loop(Arc::clone(self))));
        tasks.push(tokio::spawn(Self::cleanup_loop(Arc::clone(self))));
        tasks.push(tokio::spawn(Self::health_loop(Arc::clone(self))));
        info!("engine started");
    }

    /// Signals the loops to stop and waits for them. Loops finish their
    /// current operation first, so in-flight persistence lands before this
    /// returns.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
        info!("engine stopped");
    }

    async fn update_loop(engine: Arc<Self>) {
        let mut shutdown = engine.shutdown.subscribe();
        let mut interval = tokio::time::interval(engine.config.update_check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match engine.check_and_apply_updates().await {
                        Ok(0) => {}
                        Ok(applied) => info!(applied, "updates applied"),
                        Err(e) => warn!(error = %e, "update check failed"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn cleanup_loop(engine: Arc<Self>) {
        let mut shutdown = engine.shutdown.subscribe();
        let mut interval = tokio::time::interval(engine.config.cleanup_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = engine.rollback.cleanup_expired_backups().await {
                        warn!(error = %e, "backup cleanup failed");
                    }
                    let purged = engine.network.purge_cache();
                    if purged > 0 {
                        debug!(purged, "expired response-cache entries dropped");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn health_loop(engine: Arc<Self>) {
        let mut shutdown = engine.shutdown.subscribe();
        let mut interval = tokio::time::interval(engine.config.health_check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let online = engine.network.probe_connectivity().await;
                    let components = engine.registry.all().await;
                    let errored = components
                        .iter()
                        .filter(|info| info.state == ComponentState::Error)
                        .count();
                    if !online || errored > 0 {
                        warn!(online, errored, total = components.len(), "health check");
                    } else {
                        debug!(total = components.len(), "health check ok");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }
}
