//! Purpose: Define the uniform interface every snippet unit is loaded behind.
//! Exports: `Unit`, `UnitFuture`, `UnitResult`.
//! Role: Adapts typed `execute` functions into JSON-in/JSON-out entry points.
//! Invariants: Params are decoded into the unit's typed struct before its body runs.
//! Invariants: Blocking units run on tokio's blocking pool; async units run as tasks.
//! Invariants: Panics surface as errors and never leak a backtrace to callers.
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinError;

use crate::core::error::{Error, ErrorKind};
use crate::invoker::Invoker;

pub type UnitResult = Result<Value, Error>;
pub type UnitFuture = Pin<Box<dyn Future<Output = UnitResult> + Send + 'static>>;

type BlockingEntry = Arc<dyn Fn(Value) -> UnitResult + Send + Sync>;
type TaskEntry = Arc<dyn Fn(Invoker, Value) -> UnitFuture + Send + Sync>;

#[derive(Clone)]
enum Entry {
    Blocking(BlockingEntry),
    Task(TaskEntry),
}

/// A loaded snippet: its entry point plus the metadata it declares about itself.
#[derive(Clone)]
pub struct Unit {
    entry: Entry,
    dependencies: Vec<String>,
}

impl Unit {
    /// Wrap a synchronous entry point. Blocking units are leaves: they cannot
    /// call other snippets.
    pub fn blocking<P, R, F>(execute: F) -> Self
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(P) -> Result<R, Error> + Send + Sync + 'static,
    {
        let entry: BlockingEntry = Arc::new(move |params: Value| {
            let params = decode_params::<P>(params)?;
            encode_output(execute(params)?)
        });
        Self {
            entry: Entry::Blocking(entry),
            dependencies: Vec::new(),
        }
    }

    /// Wrap an asynchronous entry point that may invoke other snippets.
    pub fn task<P, R, F, Fut>(execute: F) -> Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Invoker, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, Error>> + Send + 'static,
    {
        let entry: TaskEntry = Arc::new(move |invoker: Invoker, params: Value| -> UnitFuture {
            match decode_params::<P>(params) {
                Ok(params) => {
                    let pending = execute(invoker, params);
                    Box::pin(async move { encode_output(pending.await?) })
                }
                Err(err) => Box::pin(async move { Err(err) }),
            }
        });
        Self {
            entry: Entry::Task(entry),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, names: &[&str]) -> Self {
        for name in names {
            if !self.dependencies.iter().any(|known| known == name) {
                self.dependencies.push((*name).to_string());
            }
        }
        self
    }

    pub fn is_async(&self) -> bool {
        matches!(self.entry, Entry::Task(_))
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) async fn run(&self, invoker: Invoker, params: Value) -> UnitResult {
        match &self.entry {
            Entry::Blocking(entry) => {
                let entry = Arc::clone(entry);
                tokio::task::spawn_blocking(move || entry(params))
                    .await
                    .map_err(join_error)?
            }
            Entry::Task(entry) => tokio::spawn(entry(invoker, params))
                .await
                .map_err(join_error)?,
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("is_async", &self.is_async())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

fn decode_params<P: DeserializeOwned>(params: Value) -> Result<P, Error> {
    serde_json::from_value(params).map_err(|err| {
        Error::new(ErrorKind::Validation)
            .with_message(format!("invalid params: {err}"))
            .with_source(err)
    })
}

fn encode_output<R: Serialize>(output: R) -> UnitResult {
    serde_json::to_value(output).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode snippet result")
            .with_source(err)
    })
}

fn join_error(err: JoinError) -> Error {
    let message = if err.is_panic() {
        "snippet panicked"
    } else {
        "snippet task was cancelled"
    };
    Error::new(ErrorKind::Internal).with_message(message)
}
