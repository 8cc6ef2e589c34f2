//! Scenario engine.
//!
//! A scenario is a named setup procedure. It lists the scenarios it
//! depends on and binds doubles or plain values into the slots of a
//! [`TestContext`]. Within one context a scenario's body runs at most once:
//! requesting it again, directly or as a dependency of another scenario,
//! is a no-op.
//!
//! Execution is sequential and depth-first. Dependencies run in
//! declaration order before the body, so a later scenario may read and
//! rebind the slots of the scenarios it depends on. When two scenarios
//! bind the same slot, the one that ran last wins.

use crate::blueprint::is_identifier;
use crate::double::Double;
use crate::error::{StubbyError, StubbyResult};
use crate::factory::{DoubleFactory, Patch};
use crate::logging::scenario_span;
use crate::registry::Registry;
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub type ScenarioBody = Arc<dyn Fn(&mut TestContext) -> StubbyResult<()> + Send + Sync>;

pub struct Scenario {
    name: String,
    dependencies: Vec<String>,
    body: ScenarioBody,
}

impl Scenario {
    pub fn new<F>(name: impl Into<String>, dependencies: &[&str], body: F) -> Self
    where
        F: Fn(&mut TestContext) -> StubbyResult<()> + Send + Sync + 'static,
    {
        let mut seen = IndexSet::new();
        for dependency in dependencies {
            seen.insert(dependency.to_string());
        }
        Self {
            name: name.into(),
            dependencies: seen.into_iter().collect(),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dependencies in declaration order, duplicates removed.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn validate(&self) -> StubbyResult<()> {
        let invalid = |reason: String| StubbyError::InvalidScenario {
            scenario: self.name.clone(),
            reason,
        };
        if !is_identifier(&self.name) {
            return Err(invalid("scenario names must be identifiers".to_string()));
        }
        if let Some(bad) = self
            .dependencies
            .iter()
            .find(|dependency| !is_identifier(dependency))
        {
            return Err(invalid(format!("dependency `{bad}` is not an identifier")));
        }
        if self.dependencies.iter().any(|dependency| dependency == &self.name) {
            return Err(StubbyError::CyclicScenario {
                cycle: vec![self.name.clone(), self.name.clone()],
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ScenarioState {
    NotRun,
    Running,
    Done,
}

/// Slots and scenario bookkeeping of one test execution.
///
/// A context is owned by a single test. Dropping it at the end of the test
/// releases every double bound in it.
pub struct TestContext {
    registry: Arc<Registry>,
    slots: IndexMap<String, Value>,
    slot_owners: HashMap<String, String>,
    states: HashMap<String, ScenarioState>,
    ran: IndexSet<String>,
    running: Vec<String>,
    strict_slots: bool,
}

impl TestContext {
    /// Fresh context reading the global registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::global())
    }

    pub fn with_registry(registry: Arc<Registry>) -> Self {
        let strict_slots = registry.config().strict_slots;
        Self {
            registry,
            slots: IndexMap::new(),
            slot_owners: HashMap::new(),
            states: HashMap::new(),
            ran: IndexSet::new(),
            running: Vec::new(),
            strict_slots,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn factory(&self) -> DoubleFactory<'_> {
        self.registry.factory()
    }

    /// Build a double through the registry's factory.
    pub fn build(&self, entity: &str, patch: Patch) -> StubbyResult<Double> {
        self.factory().build(entity, patch)
    }

    /// Build a double with the blueprint defaults only.
    pub fn stub(&self, entity: &str) -> StubbyResult<Double> {
        self.build(entity, Patch::new())
    }

    /// Run `name` and its dependencies unless it already ran in this
    /// context.
    pub fn run(&mut self, name: &str) -> StubbyResult<()> {
        match self.state(name) {
            ScenarioState::Done => {
                trace!(scenario = name, "scenario already ran");
                return Ok(());
            }
            ScenarioState::Running => {
                let start = self
                    .running
                    .iter()
                    .position(|running| running == name)
                    .unwrap_or(0);
                let mut cycle = self.running[start..].to_vec();
                cycle.push(name.to_string());
                warn!(cycle = ?cycle, "cyclic scenario dependency");
                return Err(StubbyError::CyclicScenario { cycle });
            }
            ScenarioState::NotRun => {}
        }

        let scenario = self.registry.lookup_scenario(name)?;
        let span = scenario_span(name);
        let _entered = span.enter();

        self.states.insert(name.to_string(), ScenarioState::Running);
        self.running.push(name.to_string());
        let result = self.execute(&scenario);
        self.running.pop();

        match result {
            Ok(()) => {
                self.states.insert(name.to_string(), ScenarioState::Done);
                self.ran.insert(name.to_string());
                debug!(scenario = name, "scenario done");
                Ok(())
            }
            Err(err) => {
                self.states.remove(name);
                Err(err)
            }
        }
    }

    /// Run several scenarios in the given order.
    pub fn run_all(&mut self, names: &[&str]) -> StubbyResult<()> {
        for name in names {
            self.run(name)?;
        }
        Ok(())
    }

    fn execute(&mut self, scenario: &Scenario) -> StubbyResult<()> {
        for dependency in scenario.dependencies() {
            self.run(dependency)?;
        }
        (scenario.body)(self)
    }

    pub fn state(&self, name: &str) -> ScenarioState {
        self.states
            .get(name)
            .copied()
            .unwrap_or(ScenarioState::NotRun)
    }

    pub fn has_run(&self, name: &str) -> bool {
        self.ran.contains(name)
    }

    /// Scenarios that completed, in completion order.
    pub fn ran_scenarios(&self) -> impl Iterator<Item = &str> {
        self.ran.iter().map(String::as_str)
    }

    /// Bind `value` to `slot`, returning the previous value.
    pub fn bind(&mut self, slot: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let slot = slot.into();
        let owner = self
            .running
            .last()
            .cloned()
            .unwrap_or_else(|| "<test>".to_string());

        if let Some(previous_owner) = self.slot_owners.get(&slot) {
            if previous_owner != &owner && self.strict_slots {
                warn!(
                    slot = %slot,
                    previous = %previous_owner,
                    owner = %owner,
                    "slot rebound by another scenario"
                );
            } else {
                debug!(slot = %slot, owner = %owner, "slot rebound");
            }
        }

        self.slot_owners.insert(slot.clone(), owner);
        self.slots.insert(slot, value.into())
    }

    pub fn get(&self, slot: &str) -> Option<&Value> {
        self.slots.get(slot)
    }

    pub fn slot(&self, slot: &str) -> StubbyResult<&Value> {
        self.slots.get(slot).ok_or_else(|| StubbyError::UnboundSlot {
            slot: slot.to_string(),
        })
    }

    /// Slot expected to hold a double.
    pub fn double(&self, slot: &str) -> StubbyResult<Double> {
        match self.slot(slot)? {
            Value::Double(double) => Ok(double.clone()),
            other => Err(StubbyError::TypeMismatch {
                name: slot.to_string(),
                expected: "double",
                found: other.kind(),
            }),
        }
    }

    /// Name of the scenario that last bound `slot`, `<test>` when the test
    /// body bound it directly.
    pub fn slot_owner(&self, slot: &str) -> Option<&str> {
        self.slot_owners.get(slot).map(String::as_str)
    }

    pub fn slots(&self) -> &IndexMap<String, Value> {
        &self.slots
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
