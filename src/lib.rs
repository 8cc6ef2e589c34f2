//! Test doubles that impersonate real domain entities.
//!
//! Blueprints declare the shape of a fake entity, the factory turns a
//! blueprint and a patch into a [`Double`], and scenarios compose doubles
//! into memoized, dependency-ordered test setups.
//!
//! ```
//! use stubby::{EntityType, Patch, Registry, TestContext, stub};
//! use stubby::Impersonate;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(Registry::default());
//! registry.declare_type(EntityType::new("Blog").extends("Section")).unwrap();
//! registry.define("Site", |b| b.attribute("id", 1)).unwrap();
//! registry
//!     .define("Blog", |b| b.belongs_to("site", stub("Site")).attribute("id", 2))
//!     .unwrap();
//! registry
//!     .scenario("blog", &[], |ctx| {
//!         let blog = ctx.build("Blog", Patch::new().set("title", "a blog"))?;
//!         ctx.bind("blog", blog);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let mut ctx = TestContext::with_registry(registry);
//! ctx.run("blog").unwrap();
//! let blog = ctx.double("blog").unwrap();
//! assert!(blog.is_instance_of("Section"));
//! assert_eq!(blog.to_param(), "2");
//! ```

pub mod blueprint;
pub mod config;
pub mod double;
pub mod error;
pub mod factory;
pub mod identity;
pub mod logging;
pub mod registry;
pub mod scenario;
pub mod suite;
pub mod types;
pub mod value;

pub use blueprint::{
    AssociationDecl, Attributes, Blueprint, BlueprintBuilder, Cardinality, DefaultProducer,
    MethodOverride, stub,
};
pub use config::StubbyConfig;
pub use double::Double;
pub use error::{StubbyError, StubbyResult};
pub use factory::{DoubleFactory, Patch};
pub use identity::Impersonate;
pub use logging::{LoggingConfig, init_logging, init_test_logging};
pub use registry::{Registry, declare_type, define, scenario};
pub use scenario::{Scenario, ScenarioState, TestContext};
pub use suite::Suite;
pub use types::{EntityType, TypeHierarchy, TypeRef};
pub use value::Value;
