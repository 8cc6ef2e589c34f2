//! Fake objects produced by the factory.
//!
//! A [`Double`] is a cheap, clonable handle; clones share the same state,
//! so a double bound in a slot and the same double reached through an
//! association are one object. All reads and writes go to the double's own
//! tables. Nothing is ever forwarded to the impersonated type.

use crate::blueprint::{Attributes, Cardinality, Producer};
use crate::config::DEFAULT_MAX_DEFAULT_DEPTH;
use crate::error::{StubbyError, StubbyResult};
use crate::identity::Impersonate;
use crate::types::TypeRef;
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

thread_local! {
    static PRODUCER_CALLS: RefCell<ProducerCalls> = RefCell::new(ProducerCalls::default());
}

/// Producer methods currently evaluating on this thread, outermost first.
#[derive(Default)]
struct ProducerCalls {
    chain: Vec<String>,
    overflow: Option<(Vec<String>, usize)>,
}

/// Frame of one producer evaluation, popped on drop.
struct ProducerFrame;

impl ProducerFrame {
    fn enter(frame: String, max_depth: usize) -> StubbyResult<Self> {
        PRODUCER_CALLS.with(|calls| {
            let mut calls = calls.borrow_mut();
            if calls.chain.is_empty() {
                // left over from a producer that panicked
                calls.overflow = None;
            }
            if let Some((chain, max_depth)) = &calls.overflow {
                return Err(StubbyError::CyclicDefault {
                    chain: chain.clone(),
                    max_depth: *max_depth,
                });
            }
            if calls.chain.len() >= max_depth {
                let mut chain = calls.chain.clone();
                chain.push(frame);
                warn!(chain = ?chain, "method producers do not terminate");
                calls.overflow = Some((chain.clone(), max_depth));
                return Err(StubbyError::CyclicDefault { chain, max_depth });
            }
            calls.chain.push(frame);
            Ok(ProducerFrame)
        })
    }

    /// Overflow recorded below the current frame. The outermost frame
    /// takes it, inner frames only observe it.
    fn overflow() -> Option<StubbyError> {
        PRODUCER_CALLS.with(|calls| {
            let mut calls = calls.borrow_mut();
            let overflow = if calls.chain.is_empty() {
                calls.overflow.take()
            } else {
                calls.overflow.clone()
            };
            overflow.map(|(chain, max_depth)| StubbyError::CyclicDefault { chain, max_depth })
        })
    }
}

impl Drop for ProducerFrame {
    fn drop(&mut self) {
        PRODUCER_CALLS.with(|calls| {
            calls.borrow_mut().chain.pop();
        });
    }
}

/// Entry of a double's method table.
#[derive(Clone)]
pub(crate) enum BoundMethod {
    Value(Value),
    Producer(Producer),
}

/// Resolved association. `value` stays `None` until supplied.
#[derive(Debug, Clone)]
pub(crate) struct AssociationSlot {
    pub(crate) cardinality: Cardinality,
    pub(crate) value: Option<Value>,
}

struct DoubleState {
    attributes: Attributes,
    associations: IndexMap<String, AssociationSlot>,
    methods: IndexMap<String, BoundMethod>,
}

#[derive(Clone)]
pub struct Double {
    impersonated: TypeRef,
    state: Arc<RwLock<DoubleState>>,
    max_call_depth: usize,
}

impl Double {
    pub(crate) fn new(
        impersonated: TypeRef,
        attributes: Attributes,
        associations: IndexMap<String, AssociationSlot>,
        methods: IndexMap<String, BoundMethod>,
    ) -> Self {
        Self {
            impersonated,
            state: Arc::new(RwLock::new(DoubleState {
                attributes,
                associations,
                methods,
            })),
            max_call_depth: DEFAULT_MAX_DEFAULT_DEPTH,
        }
    }

    /// Limit on nested producer evaluations before `call` fails with
    /// `CyclicDefault`.
    pub(crate) fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    /// True if both handles point at the same double.
    pub fn ptr_eq(&self, other: &Double) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.state.read().attributes.get(name).cloned()
    }

    /// Copy of the attribute table.
    pub fn attributes(&self) -> Attributes {
        self.state.read().attributes.clone()
    }

    /// Set or replace an attribute after construction.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.state
            .write()
            .attributes
            .insert(name.into(), value.into());
    }

    pub fn has_association(&self, name: &str) -> bool {
        self.state.read().associations.contains_key(name)
    }

    /// Names of the declared associations, in declaration order.
    pub fn association_names(&self) -> Vec<String> {
        self.state.read().associations.keys().cloned().collect()
    }

    /// Read an association.
    ///
    /// A stubbed method of the same name wins over the association. A
    /// declared association nobody supplied fails with
    /// `UnresolvedAssociation`.
    pub fn association(&self, name: &str) -> StubbyResult<Value> {
        if let Some(result) = self.dispatch_method(name) {
            return result;
        }
        let slot = self.state.read().associations.get(name).cloned();
        match slot {
            Some(AssociationSlot {
                value: Some(value), ..
            }) => Ok(value),
            Some(AssociationSlot { value: None, .. }) => Err(StubbyError::UnresolvedAssociation {
                entity: self.impersonated.name().to_string(),
                association: name.to_string(),
            }),
            None => Err(self.unresolved_method(name)),
        }
    }

    /// Read a one-cardinality association expected to hold a double.
    pub fn associated_double(&self, name: &str) -> StubbyResult<Double> {
        match self.association(name)? {
            Value::Double(double) => Ok(double),
            other => Err(StubbyError::TypeMismatch {
                name: name.to_string(),
                expected: "double",
                found: other.kind(),
            }),
        }
    }

    /// Supply or replace an association value. Undeclared names are added,
    /// as many-cardinality when the value is a list. A declared `has_many`
    /// only accepts a list or `Nil`.
    pub fn set_association(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> StubbyResult<()> {
        let name = name.into();
        let value = value.into();
        let is_list = matches!(value, Value::List(_));
        let mut state = self.state.write();
        match state.associations.get_mut(&name) {
            Some(slot) => {
                if slot.cardinality == Cardinality::Many && !is_list && !value.is_nil() {
                    return Err(StubbyError::TypeMismatch {
                        name,
                        expected: "list",
                        found: value.kind(),
                    });
                }
                slot.value = Some(value);
            }
            None => {
                let cardinality = if is_list {
                    Cardinality::Many
                } else {
                    Cardinality::One
                };
                state.associations.insert(
                    name,
                    AssociationSlot {
                        cardinality,
                        value: Some(value),
                    },
                );
            }
        }
        Ok(())
    }

    /// Cardinality of a declared or supplied association.
    pub fn association_cardinality(&self, name: &str) -> Option<Cardinality> {
        self.state
            .read()
            .associations
            .get(name)
            .map(|slot| slot.cardinality)
    }

    /// Replace the result of `method` with a constant. Stubs win over
    /// associations and attributes of the same name.
    pub fn stub(&self, method: impl Into<String>, value: impl Into<Value>) {
        self.state
            .write()
            .methods
            .insert(method.into(), BoundMethod::Value(value.into()));
    }

    /// Replace `method` with a closure evaluated on every call.
    pub fn stub_with<F>(&self, method: impl Into<String>, producer: F)
    where
        F: Fn(&Double) -> Value + Send + Sync + 'static,
    {
        self.state
            .write()
            .methods
            .insert(method.into(), BoundMethod::Producer(Arc::new(producer)));
    }

    /// Remove a method override. Returns false if none was set.
    pub fn unstub(&self, method: &str) -> bool {
        self.state.write().methods.shift_remove(method).is_some()
    }

    pub fn responds_to(&self, name: &str) -> bool {
        let state = self.state.read();
        state.methods.contains_key(name)
            || state.associations.contains_key(name)
            || state.attributes.contains_key(name)
            || matches!(name, "new_record?" | "to_param")
    }

    /// Send `name` to the double.
    ///
    /// Lookup order: method table, associations, attributes, then the
    /// identity predicates every double answers (`new_record?`,
    /// `to_param`).
    /// Producers that keep calling each other fail with `CyclicDefault`
    /// once they nest deeper than the configured default depth.
    pub fn call(&self, name: &str) -> StubbyResult<Value> {
        if let Some(result) = self.dispatch_method(name) {
            return result;
        }
        if self.has_association(name) {
            return self.association(name);
        }
        if let Some(value) = self.attribute(name) {
            return Ok(value);
        }
        match name {
            "new_record?" => Ok(Value::Bool(self.is_newly_created())),
            "to_param" => Ok(Value::Str(self.to_param())),
            _ => Err(self.unresolved_method(name)),
        }
    }

    /// Identifier attribute of the impersonated type, `Nil` when unset.
    pub fn id(&self) -> Value {
        let identifier = self.impersonated.identifier_attribute();
        self.dispatch_method(identifier)
            .and_then(Result::ok)
            .or_else(|| self.attribute(identifier))
            .unwrap_or(Value::Nil)
    }

    /// Attributes and resolved associations as JSON, for assertions and
    /// log output. Nested doubles are rendered by type and identifier.
    pub fn snapshot(&self) -> serde_json::Value {
        let (attributes, associations) = {
            let state = self.state.read();
            (state.attributes.clone(), state.associations.clone())
        };
        let mut object = serde_json::Map::new();
        object.insert(
            "type".to_string(),
            serde_json::Value::String(self.impersonated.name().to_string()),
        );
        for (name, value) in &attributes {
            object.insert(name.clone(), value.to_json());
        }
        for (name, slot) in &associations {
            let rendered = slot
                .value
                .as_ref()
                .map(Value::to_json)
                .unwrap_or(serde_json::Value::Null);
            object.insert(name.clone(), rendered);
        }
        serde_json::Value::Object(object)
    }

    pub(crate) fn impersonated(&self) -> &TypeRef {
        &self.impersonated
    }

    fn dispatch_method(&self, name: &str) -> Option<StubbyResult<Value>> {
        // the lock is released before a producer runs, producers read the
        // double they belong to
        let method = self.state.read().methods.get(name).cloned()?;
        Some(match method {
            BoundMethod::Value(value) => Ok(value),
            BoundMethod::Producer(producer) => self.evaluate(name, &producer),
        })
    }

    fn evaluate(&self, name: &str, producer: &Producer) -> StubbyResult<Value> {
        let frame = ProducerFrame::enter(
            format!("{}#{}", self.impersonated.name(), name),
            self.max_call_depth,
        )?;
        let value = producer(self);
        drop(frame);
        match ProducerFrame::overflow() {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    fn unresolved_method(&self, name: &str) -> StubbyError {
        StubbyError::UnresolvedMethod {
            entity: self.impersonated.name().to_string(),
            method: name.to_string(),
        }
    }
}

impl fmt::Debug for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id();
        let state = self.state.read();
        f.debug_struct("Double")
            .field("type", &self.impersonated.name())
            .field("id", &id)
            .field("attributes", &state.attributes.keys().collect::<Vec<_>>())
            .field("associations", &state.associations.keys().collect::<Vec<_>>())
            .finish()
    }
}
