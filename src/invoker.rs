//! Purpose: Resolve snippets by name and execute them through one uniform boundary.
//! Exports: `Invoker`, `DEFAULT_MAX_DEPTH`.
//! Role: Shared by HTTP handlers, the CLI, and snippets that call other snippets.
//! Invariants: Every failure inside a unit leaves here as `ErrorKind::Invocation`.
//! Invariants: Unknown names fail with `ErrorKind::NotFound` and are not wrapped.
//! Invariants: A name already on the call chain, or a chain deeper than the limit,
//! fails with `ErrorKind::Cycle` before the unit runs.
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::error::{Error, ErrorKind};
use crate::unit::{Unit, UnitFuture, UnitResult};

pub const DEFAULT_MAX_DEPTH: usize = 16;

#[derive(Clone)]
pub struct Invoker {
    units: Arc<BTreeMap<String, Unit>>,
    chain: Arc<Vec<String>>,
    max_depth: usize,
}

impl Invoker {
    pub fn new<N>(units: impl IntoIterator<Item = (N, Unit)>) -> Self
    where
        N: Into<String>,
    {
        let units = units
            .into_iter()
            .map(|(name, unit)| (name.into(), unit))
            .collect();
        Self {
            units: Arc::new(units),
            chain: Arc::new(Vec::new()),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.units.get(name)
    }

    /// Number of snippets currently executing above this invoker.
    fn depth(&self) -> usize {
        self.chain.len()
    }

    pub fn invoke(&self, name: &str, params: Value) -> UnitFuture {
        let invoker = self.clone();
        let name = name.to_string();
        Box::pin(async move { invoker.run_named(name, params).await })
    }

    /// Invoke `name` and decode its result into `T`.
    pub async fn invoke_as<T: DeserializeOwned>(&self, name: &str, params: Value) -> Result<T, Error> {
        let value = self.invoke(name, params).await?;
        serde_json::from_value(value).map_err(|err| {
            Error::new(ErrorKind::Invocation)
                .with_message(format!("unexpected result from snippet {name}: {err}"))
                .with_snippet(name)
                .with_source(err)
        })
    }

    async fn run_named(&self, name: String, params: Value) -> UnitResult {
        let Some(unit) = self.units.get(&name) else {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message(format!("snippet {name} not found"))
                .with_snippet(name));
        };
        if self.chain.iter().any(|caller| *caller == name) {
            let mut path: Vec<&str> = self.chain.iter().map(String::as_str).collect();
            path.push(&name);
            return Err(Error::new(ErrorKind::Cycle)
                .with_message(format!("dependency cycle: {}", path.join(" -> ")))
                .with_snippet(name.as_str()));
        }
        if self.chain.len() >= self.max_depth {
            return Err(Error::new(ErrorKind::Cycle)
                .with_message(format!(
                    "call depth limit {} exceeded at snippet {name}",
                    self.max_depth
                ))
                .with_snippet(name));
        }

        let callee = self.enter(&name);
        tracing::debug!(snippet = %name, depth = callee.depth(), "invoking snippet");
        match unit.run(callee, params).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if self.chain.is_empty() {
                    tracing::warn!(snippet = %name, error = %err.detail(), "snippet failed");
                } else {
                    tracing::debug!(snippet = %name, error = %err.detail(), "nested snippet failed");
                }
                Err(Error::new(ErrorKind::Invocation)
                    .with_message(format!("Failed to execute snippet {name}: {}", err.detail()))
                    .with_snippet(name)
                    .with_source(err))
            }
        }
    }

    fn enter(&self, name: &str) -> Self {
        let mut chain = self.chain.as_ref().clone();
        chain.push(name.to_string());
        Self {
            units: Arc::clone(&self.units),
            chain: Arc::new(chain),
            max_depth: self.max_depth,
        }
    }
}
