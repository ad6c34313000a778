//! Permission engine
//!
//! Wires holders, inheritance, calculators and caches together behind one
//! facade.
//!
//! # Architecture
//!
//! ```text
//! check_permission(holder, perm, options)
//!        ↓
//!  [calculator cache] ── miss ──→ NodeResolver ──→ InheritanceGraph
//!        ↓                              ↓
//!  PermissionCalculator ←── merged SourceMap
//!        ↓
//!  TristateResult
//!
//! holder edit ──→ StateListener ──→ recalculate (user) / invalidate all (group)
//! ```

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use permweave_core::{HolderId, QueryOptions};

use crate::cache::{BufferedRequest, ComputeOnMissMap, RequestHandle};
use crate::calculator::{
    CalculatorFactory, CalculatorMetadata, ChannelDiagnosticsSink, CheckRecord, DiagnosticsSink,
    PermissionCalculator, PermissionRegistry, TristateResult,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::model::{Group, GroupManager, GroupSource, Holder, StateListener, User};
use crate::primary_group::PrimaryGroupResolver;
use crate::processor::OverrideSource;
use crate::resolver::NodeResolver;

type CalculatorCache = ComputeOnMissMap<QueryOptions, Arc<PermissionCalculator>>;

/// Cached calculators of one holder
#[derive(Default)]
struct HolderCalculators {
    cache: CalculatorCache,
    /// Held from resolving a holder's nodes until they are installed, so a
    /// slower edit cannot install an older map over a newer one
    refresh: Mutex<()>,
}

/// Builder for [`PermissionEngine`]
pub struct EngineBuilder {
    config: EngineConfig,
    overrides: Vec<Arc<dyn OverrideSource>>,
    registry: Option<Arc<dyn PermissionRegistry>>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            overrides: Vec::new(),
            registry: None,
            diagnostics: None,
        }
    }

    /// Appends an override source to every calculator's chain
    pub fn with_override(mut self, source: Arc<dyn OverrideSource>) -> Self {
        self.overrides.push(source);
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn PermissionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Records every check into a bounded channel sized from the configuration
    pub fn with_diagnostics_channel(self) -> (Self, mpsc::Receiver<CheckRecord>) {
        let (sink, receiver) = ChannelDiagnosticsSink::new(self.config.diagnostics.channel_capacity);
        (self.with_diagnostics(Arc::new(sink)), receiver)
    }

    /// Builds the engine
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for an invalid configuration and
    /// [`EngineError::NoRuntime`] when called outside a Tokio runtime.
    pub fn build(self) -> Result<PermissionEngine> {
        self.config.validate()?;

        let mut factory = CalculatorFactory::new(self.config.processors.clone());
        for source in self.overrides {
            factory = factory.with_override(source);
        }
        if let Some(registry) = self.registry {
            factory = factory.with_registry(registry);
        }
        if let Some(diagnostics) = self.diagnostics {
            factory = factory.with_diagnostics(diagnostics);
        }

        let config = Arc::new(self.config);
        let groups = Arc::new(GroupManager::new());
        let inner = Arc::new(EngineInner {
            resolver: NodeResolver::new(groups.clone(), Arc::clone(&config)),
            config: Arc::clone(&config),
            groups,
            users: DashMap::new(),
            calculators: DashMap::new(),
            listeners: DashMap::new(),
            factory,
        });

        let weak = Arc::downgrade(&inner);
        let refresh = BufferedRequest::new(config.refresh.buffer_window(), move || {
            weak.upgrade().map_or(0, |inner| inner.recalculate_all())
        })?;

        info!(
            "PermissionEngine initialized with traversal={:?}, primary_group={:?}, processors={:?}",
            config.inheritance.traversal_algorithm,
            config.primary_group.calculation,
            inner.factory.config()
        );

        Ok(PermissionEngine { inner, refresh })
    }
}

/// Re-resolves calculators when the holder it watches changes
struct HolderListener {
    engine: Weak<EngineInner>,
    holder: HolderId,
}

impl StateListener for HolderListener {
    fn on_state_change(&self) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        match &self.holder {
            HolderId::User(_) => {
                engine.recalculate_holder(&self.holder);
            }
            // other holders may inherit from the group
            HolderId::Group(_) => engine.invalidate_all(),
        }
    }
}

struct EngineInner {
    config: Arc<EngineConfig>,
    groups: Arc<GroupManager>,
    users: DashMap<Uuid, Arc<User>>,
    calculators: DashMap<HolderId, Arc<HolderCalculators>>,
    listeners: DashMap<HolderId, Arc<HolderListener>>,
    factory: CalculatorFactory,
    resolver: NodeResolver,
}

impl EngineInner {
    fn holder(&self, id: &HolderId) -> Option<Holder> {
        match id {
            HolderId::User(uuid) => self
                .users
                .get(uuid)
                .map(|user| Holder::User(Arc::clone(user.value()))),
            HolderId::Group(name) => self.groups.get_if_loaded(name).map(Holder::Group),
        }
    }

    fn listen(self: &Arc<Self>, holder: &Holder) {
        let id = holder.id();
        if self.listeners.contains_key(&id) {
            return;
        }
        let listener = Arc::new(HolderListener {
            engine: Arc::downgrade(self),
            holder: id.clone(),
        });
        let weak: Weak<dyn StateListener> = Arc::downgrade(&listener) as Weak<dyn StateListener>;
        holder.nodes().subscribe(weak);
        self.listeners.insert(id, listener);
    }

    fn calculator(&self, holder: &Holder, options: &QueryOptions) -> Arc<PermissionCalculator> {
        let id = holder.id();
        let calculators = Arc::clone(self.calculators.entry(id.clone()).or_default().value());

        calculators.cache.get(options.clone(), |options| {
            let calculator = self
                .factory
                .build(CalculatorMetadata::new(id.clone(), options.clone()));
            calculator.set_source_nodes(self.resolver.permission_map(holder, options));
            Arc::new(calculator)
        })
    }

    /// Re-resolves the node set of each cached calculator of `id` in place
    fn recalculate_holder(&self, id: &HolderId) -> usize {
        let Some(entry) = self.calculators.get(id).map(|entry| Arc::clone(entry.value())) else {
            return 0;
        };
        let _refresh = entry.refresh.lock();
        // calculators built from the old nodes must not be stored
        entry.cache.discard_in_flight();

        let Some(holder) = self.holder(id) else {
            entry.cache.clear();
            return 0;
        };

        let calculators = entry.cache.values();
        for calculator in &calculators {
            calculator.set_source_nodes(
                self.resolver
                    .permission_map(&holder, &calculator.metadata().query),
            );
        }
        debug!("Recalculated {} calculators for {}", calculators.len(), id);
        calculators.len()
    }

    fn recalculate_all(&self) -> usize {
        let ids: Vec<HolderId> = self.calculators.iter().map(|entry| entry.key().clone()).collect();
        ids.iter().map(|id| self.recalculate_holder(id)).sum()
    }

    /// Drops every cached calculator and primary group
    fn invalidate_all(&self) {
        let entries: Vec<Arc<HolderCalculators>> = self
            .calculators
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for entry in entries {
            entry.cache.clear();
        }

        let users: Vec<Arc<User>> = self.users.iter().map(|user| Arc::clone(user.value())).collect();
        for user in users {
            user.primary_group_resolver().invalidate();
        }
        debug!("Invalidated all cached calculators");
    }

    fn forget(&self, id: &HolderId) {
        self.listeners.remove(id);
        if let Some((_, entry)) = self.calculators.remove(id) {
            entry.cache.clear();
        }
    }
}

/// Permission engine facade
pub struct PermissionEngine {
    inner: Arc<EngineInner>,
    refresh: BufferedRequest<usize>,
}

impl PermissionEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Engine with the default configuration and no collaborators
    pub fn new(config: EngineConfig) -> Result<Self> {
        EngineBuilder::new(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Read-only view of the loaded groups
    ///
    /// Groups are created through [`PermissionEngine::load_group`] so that
    /// edits to them reach the calculators inheriting from them.
    pub fn groups(&self) -> Arc<dyn GroupSource> {
        self.inner.groups.clone()
    }

    /// Loads a user, returning the existing one if already loaded
    pub fn load_user(&self, uuid: Uuid, username: Option<&str>) -> Arc<User> {
        let user = Arc::clone(
            self.inner
                .users
                .entry(uuid)
                .or_insert_with(|| {
                    debug!("Loading user {}", uuid);
                    let groups: Arc<dyn GroupSource> = self.inner.groups.clone();
                    let resolver = PrimaryGroupResolver::new(Arc::clone(&self.inner.config), groups);
                    Arc::new(User::new(uuid, username.map(str::to_string), resolver))
                })
                .value(),
        );
        self.inner.listen(&Holder::User(Arc::clone(&user)));
        user
    }

    /// Loads a group, returning the existing one if already loaded
    ///
    /// Other holders may already reference the group, so cached
    /// calculators are invalidated when it is newly loaded.
    pub fn load_group(&self, name: &str) -> Arc<Group> {
        let newly_loaded = !self.inner.groups.is_loaded(name);
        let group = self.inner.groups.get_or_create(name);
        self.inner.listen(&Holder::Group(Arc::clone(&group)));
        if newly_loaded {
            self.inner.invalidate_all();
        }
        group
    }

    pub fn unload_user(&self, uuid: Uuid) -> Option<Arc<User>> {
        let (_, user) = self.inner.users.remove(&uuid)?;
        self.inner.forget(&HolderId::User(uuid));
        debug!("Unloaded user {}", uuid);
        Some(user)
    }

    pub fn unload_group(&self, name: &str) -> Option<Arc<Group>> {
        let group = self.inner.groups.unload(name)?;
        self.inner.forget(&HolderId::Group(group.name().to_string()));
        self.inner.invalidate_all();
        debug!("Unloaded group {}", group.name());
        Some(group)
    }

    pub fn user(&self, uuid: Uuid) -> Option<Arc<User>> {
        self.inner.users.get(&uuid).map(|user| Arc::clone(user.value()))
    }

    pub fn group(&self, name: &str) -> Option<Arc<Group>> {
        self.inner.groups.get_if_loaded(name)
    }

    pub fn holder(&self, id: &HolderId) -> Option<Holder> {
        self.inner.holder(id)
    }

    /// Calculator for `id` under `options`, built on first use
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::HolderNotLoaded`] if the holder is not loaded.
    pub fn calculator(&self, id: &HolderId, options: &QueryOptions) -> Result<Arc<PermissionCalculator>> {
        let holder = self
            .inner
            .holder(id)
            .ok_or_else(|| EngineError::HolderNotLoaded(id.clone()))?;
        Ok(self.inner.calculator(&holder, options))
    }

    /// Checks a permission for a loaded holder
    ///
    /// # Arguments
    ///
    /// * `id` - User or group to check
    /// * `permission` - Permission string, in any case
    /// * `options` - Query the permission is checked under
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::HolderNotLoaded`] if the holder is not loaded.
    pub fn check_permission(
        &self,
        id: &HolderId,
        permission: &str,
        options: &QueryOptions,
    ) -> Result<TristateResult> {
        Ok(self.calculator(id, options)?.check_permission(permission))
    }

    /// Primary group of a loaded user
    pub fn primary_group(&self, uuid: Uuid, options: &QueryOptions) -> Result<String> {
        let user = self.user(uuid).ok_or(EngineError::UserNotLoaded(uuid))?;
        Ok(user.primary_group(options))
    }

    /// Number of cached calculators across all holders
    pub fn cached_calculators(&self) -> usize {
        self.inner
            .calculators
            .iter()
            .map(|entry| entry.value().cache.len())
            .sum()
    }

    /// Schedules a recalculation of every cached calculator
    ///
    /// Requests made within the configured window share one run. The
    /// handle resolves to the number of calculators recalculated.
    pub fn request_recalculation(&self) -> RequestHandle<usize> {
        self.refresh.request()
    }

    /// Recalculates every cached calculator on the calling thread
    pub fn recalculate_now(&self) -> usize {
        self.refresh.request_directly()
    }

    /// Drops every cached calculator and primary group
    pub fn invalidate(&self) {
        self.inner.invalidate_all();
    }

    /// Removes expired temporary nodes from every loaded holder
    pub fn audit_temporary_nodes(&self) -> usize {
        let users: Vec<Arc<User>> = self
            .inner
            .users
            .iter()
            .map(|user| Arc::clone(user.value()))
            .collect();
        let from_users: usize = users
            .iter()
            .map(|user| user.nodes().audit_temporary_nodes())
            .sum();
        let from_groups: usize = self
            .inner
            .groups
            .all()
            .iter()
            .map(|group| group.nodes().audit_temporary_nodes())
            .sum();

        let removed = from_users + from_groups;
        if removed > 0 {
            info!("Audit removed {} expired temporary nodes", removed);
        }
        removed
    }
}

impl std::fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEngine")
            .field("users", &self.inner.users.len())
            .field("groups", &self.inner.groups.len())
            .field("calculators", &self.cached_calculators())
            .field("refresh", &self.refresh)
            .finish()
    }
}
