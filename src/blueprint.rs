//! Blueprints: the declared shape of one fake entity type.
//!
//! A blueprint lists the associations of the entity, its default
//! attributes, the methods whose results are overridden and the named
//! instances (attribute presets) a test may ask for. Blueprints are
//! immutable once built; a registry replaces them wholesale.

use crate::double::Double;
use crate::error::{StubbyError, StubbyResult};
use crate::value::Value;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern valid"));

static METHOD_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*[?!]?$").expect("method name pattern valid")
});

pub(crate) fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

pub(crate) fn is_method_name(name: &str) -> bool {
    METHOD_NAME.is_match(name)
}

/// Ordered attribute map.
pub type Attributes = IndexMap<String, Value>;

/// Closure evaluated with the double as receiver each time the method is
/// called.
pub type Producer = Arc<dyn Fn(&Double) -> Value + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// What an association resolves to when the caller supplies nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultProducer {
    /// Build a fresh double from the named blueprint
    Blueprint(String),
    /// Use this value as is
    Literal(Value),
    /// Leave unresolved; reading it fails until a value is supplied
    Absent,
}

/// Shorthand for a default produced by another blueprint.
pub fn stub(entity: impl Into<String>) -> DefaultProducer {
    DefaultProducer::Blueprint(entity.into())
}

impl From<Value> for DefaultProducer {
    fn from(value: Value) -> Self {
        DefaultProducer::Literal(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssociationDecl {
    pub cardinality: Cardinality,
    pub producer: DefaultProducer,
}

/// Result override for one method name.
#[derive(Clone)]
pub enum MethodOverride {
    /// Always return this value
    Value(Value),
    /// Return a double of the named entity, built with the owner
    Double(String),
    /// Evaluate the closure with the owner as receiver on every call
    Producer(Producer),
}

impl MethodOverride {
    pub fn value(value: impl Into<Value>) -> Self {
        MethodOverride::Value(value.into())
    }

    pub fn double(entity: impl Into<String>) -> Self {
        MethodOverride::Double(entity.into())
    }

    pub fn producer<F>(producer: F) -> Self
    where
        F: Fn(&Double) -> Value + Send + Sync + 'static,
    {
        MethodOverride::Producer(Arc::new(producer))
    }
}

impl fmt::Debug for MethodOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodOverride::Value(value) => f.debug_tuple("Value").field(value).finish(),
            MethodOverride::Double(entity) => f.debug_tuple("Double").field(entity).finish(),
            MethodOverride::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

macro_rules! method_override_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for MethodOverride {
                fn from(value: $ty) -> Self {
                    MethodOverride::Value(value.into())
                }
            }
        )*
    };
}

method_override_from!(Value, bool, i32, i64, f64, &str, String, Double);

#[derive(Debug, Clone)]
pub struct Blueprint {
    entity_name: String,
    associations: IndexMap<String, AssociationDecl>,
    attributes: Attributes,
    methods: IndexMap<String, MethodOverride>,
    instances: IndexMap<String, Attributes>,
}

impl Blueprint {
    pub fn builder(entity_name: impl Into<String>) -> BlueprintBuilder {
        BlueprintBuilder::new(entity_name)
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn associations(&self) -> &IndexMap<String, AssociationDecl> {
        &self.associations
    }

    pub fn association(&self, name: &str) -> Option<&AssociationDecl> {
        self.associations.get(name)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn methods(&self) -> &IndexMap<String, MethodOverride> {
        &self.methods
    }

    pub fn instances(&self) -> &IndexMap<String, Attributes> {
        &self.instances
    }

    pub fn instance(&self, name: &str) -> Option<&Attributes> {
        self.instances.get(name)
    }

    /// Check names and association defaults.
    pub fn validate(&self) -> StubbyResult<()> {
        let entity = self.entity_name.as_str();
        if !is_identifier(entity) {
            return Err(StubbyError::invalid_blueprint(
                entity,
                "entity names must be identifiers",
            ));
        }

        for (name, decl) in &self.associations {
            if !is_identifier(name) {
                return Err(StubbyError::invalid_blueprint(
                    entity,
                    format!("association `{name}` is not an identifier"),
                ));
            }
            match &decl.producer {
                DefaultProducer::Blueprint(target) if !is_identifier(target) => {
                    return Err(StubbyError::invalid_blueprint(
                        entity,
                        format!("association `{name}` defaults to invalid entity `{target}`"),
                    ));
                }
                DefaultProducer::Literal(value)
                    if decl.cardinality == Cardinality::Many
                        && !matches!(value, Value::List(_)) =>
                {
                    return Err(StubbyError::invalid_blueprint(
                        entity,
                        format!(
                            "has_many `{name}` needs a list default, got {}",
                            value.kind()
                        ),
                    ));
                }
                _ => {}
            }
        }

        for name in self.attributes.keys() {
            if !is_identifier(name) {
                return Err(StubbyError::invalid_blueprint(
                    entity,
                    format!("attribute `{name}` is not an identifier"),
                ));
            }
        }

        for (name, method) in &self.methods {
            if !is_method_name(name) {
                return Err(StubbyError::invalid_blueprint(
                    entity,
                    format!("method `{name}` is not a valid method name"),
                ));
            }
            if let MethodOverride::Double(target) = method {
                if !is_identifier(target) {
                    return Err(StubbyError::invalid_blueprint(
                        entity,
                        format!("method `{name}` refers to invalid entity `{target}`"),
                    ));
                }
            }
        }

        for (preset, attributes) in &self.instances {
            if !is_identifier(preset) {
                return Err(StubbyError::invalid_blueprint(
                    entity,
                    format!("named instance `{preset}` is not an identifier"),
                ));
            }
            if let Some(bad) = attributes.keys().find(|key| !is_identifier(key)) {
                return Err(StubbyError::invalid_blueprint(
                    entity,
                    format!("named instance `{preset}` sets invalid attribute `{bad}`"),
                ));
            }
        }

        Ok(())
    }
}

/// Fluent declaration of a blueprint.
///
/// ```
/// use stubby::{Blueprint, stub};
///
/// let topic = Blueprint::builder("Topic")
///     .belongs_to("site", stub("Site"))
///     .has_many("comments", stubby::DefaultProducer::Absent)
///     .method("locked?", false)
///     .instance("topic", [("id", 1.into()), ("title", "a topic".into())])
///     .build()
///     .unwrap();
///
/// assert_eq!(topic.associations().len(), 2);
/// ```
pub struct BlueprintBuilder {
    blueprint: Blueprint,
    problems: Vec<String>,
}

impl BlueprintBuilder {
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            blueprint: Blueprint {
                entity_name: entity_name.into(),
                associations: IndexMap::new(),
                attributes: Attributes::new(),
                methods: IndexMap::new(),
                instances: IndexMap::new(),
            },
            problems: Vec::new(),
        }
    }

    pub fn association(
        mut self,
        name: impl Into<String>,
        cardinality: Cardinality,
        producer: impl Into<DefaultProducer>,
    ) -> Self {
        let name = name.into();
        if self.blueprint.associations.contains_key(&name) {
            self.problems
                .push(format!("association `{name}` is declared twice"));
            return self;
        }
        self.blueprint.associations.insert(
            name,
            AssociationDecl {
                cardinality,
                producer: producer.into(),
            },
        );
        self
    }

    pub fn belongs_to(self, name: impl Into<String>, producer: impl Into<DefaultProducer>) -> Self {
        self.association(name, Cardinality::One, producer)
    }

    pub fn has_one(self, name: impl Into<String>, producer: impl Into<DefaultProducer>) -> Self {
        self.association(name, Cardinality::One, producer)
    }

    pub fn has_many(self, name: impl Into<String>, producer: impl Into<DefaultProducer>) -> Self {
        self.association(name, Cardinality::Many, producer)
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.blueprint.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attributes<I, K>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.blueprint
            .attributes
            .extend(attributes.into_iter().map(|(key, value)| (key.into(), value)));
        self
    }

    pub fn method(mut self, name: impl Into<String>, method: impl Into<MethodOverride>) -> Self {
        self.blueprint.methods.insert(name.into(), method.into());
        self
    }

    pub fn methods<I, K>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = (K, MethodOverride)>,
        K: Into<String>,
    {
        self.blueprint
            .methods
            .extend(methods.into_iter().map(|(key, method)| (key.into(), method)));
        self
    }

    /// Declare a named instance. Declaring the same name again replaces it.
    pub fn instance<I, K>(mut self, name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let attributes = attributes
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        self.blueprint.instances.insert(name.into(), attributes);
        self
    }

    pub fn build(self) -> StubbyResult<Blueprint> {
        if let Some(problem) = self.problems.into_iter().next() {
            return Err(StubbyError::invalid_blueprint(
                &self.blueprint.entity_name,
                problem,
            ));
        }
        self.blueprint.validate()?;
        Ok(self.blueprint)
    }
}
