//! Per-test lifecycle.
//!
//! A [`Suite`] groups the tests that share setup. Every test gets a fresh
//! [`TestContext`] on which the suite's before-each hooks have already run,
//! so scenario memoization never leaks from one test into the next.

use crate::error::StubbyResult;
use crate::registry::Registry;
use crate::scenario::TestContext;
use std::sync::Arc;
use tracing::debug;

type Hook = Box<dyn Fn(&mut TestContext) -> StubbyResult<()> + Send + Sync>;

pub struct Suite {
    registry: Arc<Registry>,
    hooks: Vec<Hook>,
}

impl Suite {
    /// Suite over the global registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::global())
    }

    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            hooks: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Add a hook run on every new context, in registration order.
    pub fn before_each<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut TestContext) -> StubbyResult<()> + Send + Sync + 'static,
    {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Run `names` before each test.
    pub fn scenarios(self, names: &[&str]) -> Self {
        let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        self.before_each(move |ctx| {
            for name in &names {
                ctx.run(name)?;
            }
            Ok(())
        })
    }

    /// Fresh context with every hook applied.
    pub fn context(&self) -> StubbyResult<TestContext> {
        let mut ctx = TestContext::with_registry(Arc::clone(&self.registry));
        for hook in &self.hooks {
            hook(&mut ctx)?;
        }
        debug!(hooks = self.hooks.len(), slots = ctx.slots().len(), "test context ready");
        Ok(ctx)
    }

    /// Run `test` against a fresh context. The context, and every double
    /// bound in it, is dropped when `test` returns.
    pub fn run<F, T>(&self, test: F) -> StubbyResult<T>
    where
        F: FnOnce(&mut TestContext) -> StubbyResult<T>,
    {
        let mut ctx = self.context()?;
        test(&mut ctx)
    }
}

impl Default for Suite {
    fn default() -> Self {
        Self::new()
    }
}
