#![allow(dead_code)]
//! Shared blueprints and scenarios for a small CMS domain: sites own
//! sections (blogs and wikis are sections), sections own contents
//! (articles and wikipages), contents collect comments.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use std::sync::Arc;
use stubby::{
    DefaultProducer, Double, EntityType, MethodOverride, Patch, Registry, StubbyResult,
    TestContext, Value, stub,
};

static REGISTRY: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::default()));

/// Registry loaded with the CMS fixtures. Safe to call from parallel tests.
pub fn registry() -> Arc<Registry> {
    stubby::init_test_logging();
    REGISTRY
        .load_once(load_cms)
        .expect("cms fixtures register cleanly");
    Arc::clone(&REGISTRY)
}

/// Fresh context over the shared CMS registry.
pub fn context() -> TestContext {
    TestContext::with_registry(registry())
}

pub fn published_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2008, 3, 1, 12, 0, 0).unwrap()
}

pub fn load_cms(registry: &Registry) -> StubbyResult<()> {
    declare_types(registry)?;
    define_blueprints(registry)?;
    define_scenarios(registry)
}

fn declare_types(registry: &Registry) -> StubbyResult<()> {
    registry.declare_type(EntityType::new("Site"))?;
    registry.declare_type(EntityType::new("Section"))?;
    registry.declare_type(EntityType::new("Blog").extends("Section"))?;
    registry.declare_type(EntityType::new("Wiki").extends("Section"))?;
    registry.declare_type(EntityType::new("Content"))?;
    registry.declare_type(EntityType::new("Article").extends("Content"))?;
    registry.declare_type(EntityType::new("Wikipage").extends("Content"))?;
    registry.declare_type(EntityType::new("Comment"))?;
    registry.declare_type(EntityType::new("Topic"))?;
    registry.declare_type(EntityType::new("User").identified_by("login"))
}

fn define_blueprints(registry: &Registry) -> StubbyResult<()> {
    registry.define("Site", |b| {
        b.has_many("sections", DefaultProducer::Absent)
            .attribute("id", 1)
            .attribute("title", "site title")
            .attribute("host", "test.host")
    })?;

    for (entity, title) in [("Section", "a section"), ("Blog", "a blog"), ("Wiki", "a wiki")] {
        registry.define(entity, |b| {
            b.belongs_to("site", stub("Site"))
                .has_many("articles", DefaultProducer::Absent)
                .method("accept_comments?", true)
                .attribute("id", 1)
                .attribute("title", title)
                .attribute("permalink", title.replace(' ', "-"))
        })?;
    }

    registry.define("User", |b| {
        b.attribute("login", "john")
            .attribute("name", "John Doe")
            .attribute("email", "john@example.org")
    })?;

    registry.define("Article", |b| {
        b.belongs_to("site", stub("Site"))
            .belongs_to("section", stub("Section"))
            .belongs_to("author", stub("User"))
            .has_many("comments", Value::List(Vec::new()))
            .has_many("categories", Value::List(Vec::new()))
            .methods([
                ("published?", MethodOverride::value(true)),
                ("accept_comments?", MethodOverride::value(true)),
                ("comments_count", MethodOverride::value(0)),
                ("approved_comments_count", MethodOverride::value(0)),
            ])
            .attribute("id", 1)
            .attribute("title", "an article")
            .attribute("permalink", "an-article")
            .attribute("published_at", published_at())
            .instance("draft", [("id", Value::Nil), ("published_at", Value::Nil)])
    })?;

    registry.define("Wikipage", |b| {
        b.belongs_to("site", stub("Site"))
            .belongs_to("section", stub("Wiki"))
            .belongs_to("author", stub("User"))
            .has_many("comments", Value::List(Vec::new()))
            .method("published?", true)
            .attribute("id", 1)
            .attribute("title", "a wikipage")
            .attribute("permalink", "a-wikipage")
    })?;

    registry.define("Comment", |b| {
        b.belongs_to("commentable", stub("Article"))
            .belongs_to("author", stub("User"))
            .method("approved?", true)
            .attribute("id", 1)
            .attribute("body", "a comment")
    })?;

    registry.define("Topic", |b| {
        b.belongs_to("site", stub("Site"))
            .belongs_to("section", DefaultProducer::Absent)
            .has_many("comments", DefaultProducer::Absent)
            .has_one("last_comment", stub("Comment"))
            .methods([
                ("sticky?", MethodOverride::value(false)),
                ("locked?", MethodOverride::value(false)),
                ("save", MethodOverride::value(true)),
                ("destroy", MethodOverride::value(true)),
                ("last_page", MethodOverride::value(2)),
                ("last_author_name", MethodOverride::value("last_author_name")),
            ])
            .instance(
                "topic",
                [
                    ("id", Value::Int(1)),
                    ("title", Value::from("a topic")),
                    ("permalink", Value::from("a-topic")),
                ],
            )
    })
}

fn define_scenarios(registry: &Registry) -> StubbyResult<()> {
    registry.scenario("site", &[], |ctx| {
        let site = ctx.stub("Site")?;
        ctx.bind("site", site);
        Ok(())
    })?;

    registry.scenario("user", &[], |ctx| {
        let user = ctx.stub("User")?;
        ctx.bind("user", user);
        Ok(())
    })?;

    for (name, entity) in [("section", "Section"), ("blog", "Blog"), ("wiki", "Wiki")] {
        registry.scenario(name, &["site"], move |ctx| {
            let site = ctx.double("site")?;
            let section = ctx.build(entity, Patch::new().set("site", site))?;
            ctx.bind(name, section);
            Ok(())
        })?;
    }

    registry.scenario("article", &["section", "user"], |ctx| {
        let article = ctx.build(
            "Article",
            Patch::new()
                .set("site", ctx.double("site")?)
                .set("section", ctx.double("section")?)
                .set("author", ctx.double("user")?),
        )?;
        ctx.bind("article", article);
        Ok(())
    })?;

    registry.scenario("wikipage", &["wiki", "user"], |ctx| {
        let wikipage = ctx.build(
            "Wikipage",
            Patch::new()
                .set("site", ctx.double("site")?)
                .set("section", ctx.double("wiki")?)
                .set("author", ctx.double("user")?),
        )?;
        ctx.bind("wikipage", wikipage);
        Ok(())
    })?;

    registry.scenario("comment", &["article"], |ctx| {
        let article = ctx.double("article")?;
        let comment = ctx.build(
            "Comment",
            Patch::new()
                .set("commentable", article.clone())
                .set("author", ctx.double("user")?),
        )?;
        article.set_association("comments", vec![comment.clone()])?;
        ctx.bind("comment", comment);
        Ok(())
    })?;

    registry.scenario("topic", &[], |ctx| {
        ctx.run("comment")?;
        let topic = ctx.build(
            "Topic",
            Patch::new()
                .preset("topic")
                .set("site", ctx.double("site")?)
                .set("last_comment", ctx.double("comment")?),
        )?;
        ctx.bind("topic", topic);
        Ok(())
    })
}

pub fn ids(doubles: &[Double]) -> Vec<Value> {
    doubles.iter().map(Double::id).collect()
}
