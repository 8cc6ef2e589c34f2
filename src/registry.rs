//! Process-wide store of blueprints, real-type declarations and scenarios.
//!
//! The registry follows a load-then-read lifecycle: everything is
//! registered while the test suite loads, and tests only read afterwards.
//! [`Registry::load_once`] is the barrier for test binaries that run tests
//! in parallel: the first caller runs the loader while every other caller
//! waits for it to finish.
//!
//! Registering a name again replaces the previous entry wholesale. Doubles
//! that already exist keep the shape they were built with.

use crate::blueprint::{Blueprint, BlueprintBuilder};
use crate::config::StubbyConfig;
use crate::error::{StubbyError, StubbyResult};
use crate::factory::DoubleFactory;
use crate::scenario::{Scenario, TestContext};
use crate::types::{EntityType, TypeHierarchy, TypeRef};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

static GLOBAL_REGISTRY: Lazy<Arc<Registry>> = Lazy::new(|| {
    let config = StubbyConfig::from_env().unwrap_or_else(|err| {
        warn!(error = %err, "invalid STUBBY_* environment, using defaults");
        StubbyConfig::default()
    });
    Arc::new(Registry::new(config))
});

pub struct Registry {
    config: RwLock<StubbyConfig>,
    blueprints: RwLock<IndexMap<String, Arc<Blueprint>>>,
    types: RwLock<TypeHierarchy>,
    scenarios: RwLock<IndexMap<String, Arc<Scenario>>>,
    loading: Mutex<()>,
    loaded: AtomicBool,
}

impl Registry {
    pub fn new(config: StubbyConfig) -> Self {
        Self {
            config: RwLock::new(config),
            blueprints: RwLock::new(IndexMap::new()),
            types: RwLock::new(TypeHierarchy::new()),
            scenarios: RwLock::new(IndexMap::new()),
            loading: Mutex::new(()),
            loaded: AtomicBool::new(false),
        }
    }

    /// The process-wide registry, configured from the environment.
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    pub fn config(&self) -> StubbyConfig {
        self.config.read().clone()
    }

    pub fn set_config(&self, config: StubbyConfig) {
        *self.config.write() = config;
    }

    /// Run `loader` unless a previous call already succeeded.
    ///
    /// Concurrent callers block until the running loader returns. A failed
    /// loader leaves the registry unloaded so the next caller retries and
    /// sees the same error. The loader itself may call `is_loaded` and
    /// `clear`; calling `load_once` again from inside it deadlocks.
    pub fn load_once<F>(&self, loader: F) -> StubbyResult<()>
    where
        F: FnOnce(&Registry) -> StubbyResult<()>,
    {
        if self.is_loaded() {
            return Ok(());
        }
        let _loading = self.loading.lock();
        if self.is_loaded() {
            return Ok(());
        }
        loader(self)?;
        self.loaded.store(true, Ordering::Release);
        debug!(
            blueprints = self.blueprints.read().len(),
            scenarios = self.scenarios.read().len(),
            "registry loaded"
        );
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Validate and store `blueprint`, replacing any blueprint registered
    /// under the same entity name.
    pub fn register(&self, blueprint: Blueprint) -> StubbyResult<()> {
        blueprint.validate()?;
        let entity = blueprint.entity_name().to_string();
        let previous = self
            .blueprints
            .write()
            .insert(entity.clone(), Arc::new(blueprint));
        if previous.is_some() {
            info!(entity = %entity, "blueprint redefined");
        } else {
            debug!(entity = %entity, "blueprint registered");
        }
        Ok(())
    }

    /// Declare a blueprint through the builder DSL.
    pub fn define<F>(&self, entity: impl Into<String>, declare: F) -> StubbyResult<()>
    where
        F: FnOnce(BlueprintBuilder) -> BlueprintBuilder,
    {
        let blueprint = declare(Blueprint::builder(entity)).build()?;
        self.register(blueprint)
    }

    pub fn lookup(&self, entity: &str) -> StubbyResult<Arc<Blueprint>> {
        self.blueprints
            .read()
            .get(entity)
            .cloned()
            .ok_or_else(|| StubbyError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.blueprints.read().contains_key(entity)
    }

    /// Registered entity names, in first-registration order.
    pub fn entity_names(&self) -> Vec<String> {
        self.blueprints.read().keys().cloned().collect()
    }

    /// Declare a real type and its direct supertype.
    pub fn declare_type(&self, ty: EntityType) -> StubbyResult<()> {
        let name = ty.name().to_string();
        self.types.write().declare(ty)?;
        debug!(type_name = %name, "type declared");
        Ok(())
    }

    /// Snapshot of `name` and its ancestry, as doubles carry it.
    pub fn resolve_type(&self, name: &str, default_identifier: &str) -> TypeRef {
        self.types.read().resolve(name, default_identifier)
    }

    /// Store `scenario`, replacing any scenario of the same name.
    pub fn register_scenario(&self, scenario: Scenario) -> StubbyResult<()> {
        scenario.validate()?;
        let name = scenario.name().to_string();
        let previous = self
            .scenarios
            .write()
            .insert(name.clone(), Arc::new(scenario));
        if previous.is_some() {
            info!(scenario = %name, "scenario redefined");
        } else {
            debug!(scenario = %name, "scenario registered");
        }
        Ok(())
    }

    /// Declare a scenario with its dependencies and build body.
    pub fn scenario<F>(&self, name: impl Into<String>, dependencies: &[&str], body: F) -> StubbyResult<()>
    where
        F: Fn(&mut TestContext) -> StubbyResult<()> + Send + Sync + 'static,
    {
        self.register_scenario(Scenario::new(name, dependencies, body))
    }

    pub fn lookup_scenario(&self, name: &str) -> StubbyResult<Arc<Scenario>> {
        self.scenarios
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StubbyError::UnknownScenario {
                scenario: name.to_string(),
            })
    }

    pub fn scenario_names(&self) -> Vec<String> {
        self.scenarios.read().keys().cloned().collect()
    }

    pub fn factory(&self) -> DoubleFactory<'_> {
        DoubleFactory::new(self)
    }

    /// Drop every registration and reset the load barrier.
    pub fn clear(&self) {
        self.blueprints.write().clear();
        self.types.write().clear();
        self.scenarios.write().clear();
        self.loaded.store(false, Ordering::Release);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(StubbyConfig::default())
    }
}

/// Register a blueprint in the global registry.
pub fn define<F>(entity: impl Into<String>, declare: F) -> StubbyResult<()>
where
    F: FnOnce(BlueprintBuilder) -> BlueprintBuilder,
{
    GLOBAL_REGISTRY.define(entity, declare)
}

/// Declare a real type in the global registry.
pub fn declare_type(ty: EntityType) -> StubbyResult<()> {
    GLOBAL_REGISTRY.declare_type(ty)
}

/// Declare a scenario in the global registry.
pub fn scenario<F>(name: impl Into<String>, dependencies: &[&str], body: F) -> StubbyResult<()>
where
    F: Fn(&mut TestContext) -> StubbyResult<()> + Send + Sync + 'static,
{
    GLOBAL_REGISTRY.scenario(name, dependencies, body)
}
