//! Building doubles through the registry: layering, laziness, redefinition.

mod support;

use assert_matches::assert_matches;
use stubby::{
    Blueprint, Cardinality, DefaultProducer, EntityType, Impersonate, MethodOverride, Patch,
    Registry, StubbyConfig, StubbyError, Value, stub,
};

fn layered_registry() -> Registry {
    let registry = Registry::default();
    registry
        .define("Widget", |b| {
            b.attribute("a", 1)
                .attribute("b", 2)
                .instance("preset", [("b", Value::Int(3)), ("c", Value::Int(4))])
        })
        .unwrap();
    registry
}

#[test]
fn test_override_layering() {
    let registry = layered_registry();
    let widget = registry
        .factory()
        .build("Widget", Patch::new().preset("preset").set("c", 5))
        .unwrap();

    let attributes = widget.attributes();
    assert_eq!(attributes.len(), 3);
    assert_eq!(attributes["a"], Value::Int(1));
    assert_eq!(attributes["b"], Value::Int(3));
    assert_eq!(attributes["c"], Value::Int(5));
}

#[test]
fn test_patch_without_preset_skips_instance_values() {
    let registry = layered_registry();
    let widget = registry
        .factory()
        .build("Widget", Patch::new().set("c", 5))
        .unwrap();
    assert_eq!(widget.attribute("b"), Some(Value::Int(2)));
    assert_eq!(widget.attribute("c"), Some(Value::Int(5)));
}

#[test]
fn test_unresolved_association_fails_only_on_access() {
    let registry = Registry::default();
    registry
        .define("Topic", |b| b.belongs_to("section", DefaultProducer::Absent))
        .unwrap();

    let topic = registry.factory().build("Topic", Patch::new()).unwrap();
    assert!(topic.has_association("section"));
    assert_matches!(
        topic.call("section"),
        Err(StubbyError::UnresolvedAssociation { entity, association })
            if entity == "Topic" && association == "section"
    );
}

#[test]
fn test_unknown_method_is_unresolved() {
    let ctx = support::context();
    let site = ctx.stub("Site").unwrap();
    assert!(!site.responds_to("destroy"));
    assert_matches!(
        site.call("destroy"),
        Err(StubbyError::UnresolvedMethod { method, .. }) if method == "destroy"
    );
}

#[test]
fn test_unknown_entity_default_fails_at_build_time() {
    let registry = Registry::default();
    registry
        .define("Topic", |b| b.belongs_to("forum", stub("Forum")))
        .unwrap();
    assert_matches!(
        registry.factory().build("Topic", Patch::new()),
        Err(StubbyError::UnknownEntity { entity }) if entity == "Forum"
    );
}

#[test]
fn test_late_reregistration_applies_to_new_builds() {
    let registry = Registry::default();
    registry.define("Site", |b| b.attribute("host", "old.host")).unwrap();
    let old = registry.factory().build("Site", Patch::new()).unwrap();

    let replacement = Blueprint::builder("Site")
        .attribute("host", "new.host")
        .method("ssl?", true)
        .build()
        .unwrap();
    registry.register(replacement).unwrap();
    let new = registry.factory().build("Site", Patch::new()).unwrap();

    assert_eq!(old.attribute("host"), Some(Value::from("old.host")));
    assert!(!old.responds_to("ssl?"));
    assert_eq!(new.attribute("host"), Some(Value::from("new.host")));
    assert_eq!(new.call("ssl?").unwrap(), Value::Bool(true));
}

#[test]
fn test_has_many_default_builds_one_element_list() {
    let registry = Registry::default();
    registry.define("Comment", |b| b.attribute("id", 1)).unwrap();
    registry
        .define("Article", |b| b.has_many("comments", stub("Comment")))
        .unwrap();

    let blueprint = registry.lookup("Article").unwrap();
    assert_eq!(
        blueprint.association("comments").map(|decl| decl.cardinality),
        Some(Cardinality::Many)
    );

    let article = registry.factory().build("Article", Patch::new()).unwrap();
    let comments = article.association("comments").unwrap();
    let comments = comments.as_list().unwrap();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].is_instance_of("Comment"));

    assert_eq!(article.association_cardinality("comments"), Some(Cardinality::Many));
    assert_matches!(
        article.set_association("comments", "not a list"),
        Err(StubbyError::TypeMismatch { name, expected: "list", .. }) if name == "comments"
    );
}

#[test]
fn test_method_producer_reads_its_double() {
    let registry = Registry::default();
    registry
        .define("Article", |b| {
            b.attribute("title", "Hello World").method(
                "slug",
                MethodOverride::producer(|article| {
                    let title = article.attribute("title").unwrap_or_default();
                    Value::from(title.to_string().to_lowercase().replace(' ', "-"))
                }),
            )
        })
        .unwrap();

    let article = registry.factory().build("Article", Patch::new()).unwrap();
    assert_eq!(article.call("slug").unwrap(), Value::from("hello-world"));
    article.set_attribute("title", "Second Title");
    assert_eq!(article.call("slug").unwrap(), Value::from("second-title"));
}

#[test]
fn test_custom_identifier_attribute_from_config() {
    let registry = Registry::new(StubbyConfig {
        identifier_attribute: "uuid".to_string(),
        ..StubbyConfig::default()
    });
    registry
        .define("Asset", |b| b.attribute("id", 1).attribute("uuid", "a-1"))
        .unwrap();
    registry
        .declare_type(EntityType::new("Image").extends("Asset").identified_by("id"))
        .unwrap();
    registry.define("Image", |b| b.attribute("id", 7)).unwrap();

    let factory = registry.factory();
    let asset = factory.build("Asset", Patch::new()).unwrap();
    let image = factory.build("Image", Patch::new()).unwrap();
    assert_eq!(asset.to_param(), "a-1");
    assert_eq!(image.to_param(), "7");
    assert_eq!(image.base_type(), "Asset");
}

#[test]
fn test_snapshot_renders_nested_doubles_by_reference() {
    let mut ctx = support::context();
    ctx.run("article").unwrap();
    let snapshot = ctx.double("article").unwrap().snapshot();

    assert_eq!(snapshot["type"], "Article");
    assert_eq!(snapshot["title"], "an article");
    assert_eq!(snapshot["section"]["type"], "Section");
    assert_eq!(snapshot["author"]["id"], "john");
    assert_eq!(snapshot["comments"], serde_json::json!([]));
}

#[test]
fn test_article_in_a_blog_answers_as_section() {
    let registry = Registry::default();
    registry
        .declare_type(EntityType::new("Blog").extends("Section"))
        .unwrap();
    registry.define("Site", |b| b.attribute("id", 1)).unwrap();
    registry
        .define("Blog", |b| b.belongs_to("site", stub("Site")).attribute("id", 1))
        .unwrap();
    registry
        .define("Article", |b| b.belongs_to("section", DefaultProducer::Absent))
        .unwrap();

    let factory = registry.factory();
    let blog = factory.build("Blog", Patch::new()).unwrap();
    let article = factory
        .build("Article", Patch::new().set("section", blog))
        .unwrap();

    let section = article.association("section").unwrap();
    assert!(section.is_instance_of("Blog"));
    assert!(section.is_instance_of("Section"));
    assert!(!section.is_instance_of("Wiki"));
    assert!(
        section
            .as_double()
            .unwrap()
            .associated_double("site")
            .unwrap()
            .is_exactly_type("Site")
    );
}

#[test]
fn test_producers_calling_each_other_report_the_method_chain() {
    let registry = Registry::new(StubbyConfig {
        max_default_depth: 6,
        ..StubbyConfig::default()
    });
    registry
        .define("Person", |b| {
            b.attribute("name", "Ada")
                .method(
                    "full_name",
                    MethodOverride::producer(|person| {
                        person.call("display_name").unwrap_or_default()
                    }),
                )
                .method(
                    "display_name",
                    MethodOverride::producer(|person| person.call("full_name").unwrap_or_default()),
                )
        })
        .unwrap();

    let person = registry.factory().build("Person", Patch::new()).unwrap();
    let err = person.call("full_name").unwrap_err();
    assert!(err.is_configuration_error());
    assert_matches!(
        err,
        StubbyError::CyclicDefault { chain, max_depth: 6 } if chain.len() == 7
            && chain[..2] == ["Person#full_name", "Person#display_name"]
    );
    assert_eq!(person.call("name").unwrap(), Value::from("Ada"));
}
