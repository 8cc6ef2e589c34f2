//! Double factory: blueprint + patch → fresh double.

use crate::blueprint::{Attributes, Blueprint, Cardinality, DefaultProducer, MethodOverride};
use crate::config::StubbyConfig;
use crate::double::{AssociationSlot, BoundMethod, Double};
use crate::error::{StubbyError, StubbyResult};
use crate::logging::build_span;
use crate::registry::Registry;
use crate::value::Value;
use indexmap::IndexMap;
use tracing::{trace, warn};

/// Caller-side changes applied on top of a blueprint.
///
/// Keys naming a declared association supply that association verbatim;
/// every other key is an attribute override.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    preset: Option<String>,
    values: Attributes,
    methods: IndexMap<String, MethodOverride>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the blueprint's named instance `name`.
    pub fn preset(mut self, name: impl Into<String>) -> Self {
        self.preset = Some(name.into());
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn method(mut self, name: impl Into<String>, method: impl Into<MethodOverride>) -> Self {
        self.methods.insert(name.into(), method.into());
        self
    }

    pub fn preset_name(&self) -> Option<&str> {
        self.preset.as_deref()
    }

    pub fn values(&self) -> &Attributes {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.preset.is_none() && self.values.is_empty() && self.methods.is_empty()
    }
}

/// Builds doubles from the blueprints of one registry.
pub struct DoubleFactory<'a> {
    registry: &'a Registry,
    config: StubbyConfig,
}

impl<'a> DoubleFactory<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            config: registry.config(),
        }
    }

    /// Build one double of `entity`.
    pub fn build(&self, entity: &str, patch: Patch) -> StubbyResult<Double> {
        let mut chain = Vec::new();
        self.build_nested(entity, patch, &mut chain)
    }

    /// Build `count` independent doubles with the same patch.
    pub fn build_list(&self, entity: &str, count: usize, patch: Patch) -> StubbyResult<Vec<Double>> {
        (0..count)
            .map(|_| self.build(entity, patch.clone()))
            .collect()
    }

    fn build_nested(
        &self,
        entity: &str,
        patch: Patch,
        chain: &mut Vec<String>,
    ) -> StubbyResult<Double> {
        if chain.len() >= self.config.max_default_depth {
            let mut chain = chain.clone();
            chain.push(entity.to_string());
            warn!(chain = ?chain, "default producers do not terminate");
            return Err(StubbyError::CyclicDefault {
                chain,
                max_depth: self.config.max_default_depth,
            });
        }

        let blueprint = self.registry.lookup(entity)?;
        let _span = build_span(entity).entered();

        chain.push(entity.to_string());
        let result = self.instantiate(&blueprint, patch, chain);
        chain.pop();
        result
    }

    fn instantiate(
        &self,
        blueprint: &Blueprint,
        patch: Patch,
        chain: &mut Vec<String>,
    ) -> StubbyResult<Double> {
        let entity = blueprint.entity_name();
        let Patch {
            preset,
            values,
            methods: patch_methods,
        } = patch;

        let preset_values = match preset.as_deref() {
            Some(name) => blueprint
                .instance(name)
                .cloned()
                .ok_or_else(|| StubbyError::UnknownPreset {
                    entity: entity.to_string(),
                    preset: name.to_string(),
                })?,
            None => Attributes::new(),
        };

        // defaults, then the preset, then the caller
        let mut attributes = blueprint.attributes().clone();
        let mut supplied = IndexMap::new();
        for (key, value) in preset_values.into_iter().chain(values) {
            if blueprint.association(&key).is_some() {
                supplied.insert(key, value);
            } else {
                attributes.insert(key, value);
            }
        }

        let mut associations = IndexMap::with_capacity(blueprint.associations().len());
        for (name, decl) in blueprint.associations() {
            let value = match supplied.shift_remove(name) {
                Some(value) => Some(value),
                None => match &decl.producer {
                    DefaultProducer::Blueprint(target) => {
                        let double = self.build_nested(target, Patch::default(), chain)?;
                        Some(match decl.cardinality {
                            Cardinality::One => Value::Double(double),
                            Cardinality::Many => Value::List(vec![Value::Double(double)]),
                        })
                    }
                    DefaultProducer::Literal(value) => Some(value.clone()),
                    DefaultProducer::Absent => None,
                },
            };
            associations.insert(
                name.clone(),
                AssociationSlot {
                    cardinality: decl.cardinality,
                    value,
                },
            );
        }

        let mut methods = IndexMap::new();
        for (name, method) in blueprint.methods().iter().chain(patch_methods.iter()) {
            let bound = match method {
                MethodOverride::Value(value) => BoundMethod::Value(value.clone()),
                MethodOverride::Double(target) => {
                    let double = self.build_nested(target, Patch::default(), chain)?;
                    BoundMethod::Value(Value::Double(double))
                }
                MethodOverride::Producer(producer) => BoundMethod::Producer(producer.clone()),
            };
            methods.insert(name.clone(), bound);
        }

        let impersonated = self
            .registry
            .resolve_type(entity, &self.config.identifier_attribute);

        trace!(
            entity = entity,
            attributes = attributes.len(),
            associations = associations.len(),
            methods = methods.len(),
            "double built"
        );

        Ok(
            Double::new(impersonated, attributes, associations, methods)
                .with_max_call_depth(self.config.max_default_depth),
        )
    }
}
