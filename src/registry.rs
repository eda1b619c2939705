//! Purpose: Load discovered snippets into an immutable route table and catalogue.
//! Exports: `Registry`, `RegistryOptions`, `Skipped`.
//! Role: Joins source units with compiled units; feeds the router and the CLI.
//! Invariants: Every routed name maps to exactly one source unit and one compiled unit.
//! Invariants: A unit that fails to load is logged and skipped; loading continues.
//! Invariants: Descriptors are recomputed from source on every catalogue request.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};
use crate::discovery::{self, SourceUnit};
use crate::introspect::{self, Descriptor};
use crate::invoker::{DEFAULT_MAX_DEPTH, Invoker};
use crate::unit::Unit;

#[derive(Clone, Debug)]
pub struct RegistryOptions {
    pub api_prefix: String,
    pub max_depth: usize,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A discovered source unit that did not make it into the route table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Skipped {
    pub name: String,
    pub reason: String,
}

pub struct Registry {
    api_prefix: String,
    sources: BTreeMap<String, PathBuf>,
    routes: Vec<String>,
    skipped: Vec<Skipped>,
    invoker: Invoker,
}

impl Registry {
    /// Load the units compiled into this crate against the sources in `dir`.
    pub fn load_compiled(dir: &Path, options: RegistryOptions) -> Result<Self, Error> {
        Self::load(dir, crate::snippets::compiled_units(), options)
    }

    pub fn load<N>(
        dir: &Path,
        compiled: impl IntoIterator<Item = (N, Unit)>,
        options: RegistryOptions,
    ) -> Result<Self, Error>
    where
        N: Into<String>,
    {
        let mut compiled: BTreeMap<String, Unit> = compiled
            .into_iter()
            .map(|(name, unit)| (name.into(), unit))
            .collect();
        let discovered = discovery::discover(dir)?;

        let mut sources = BTreeMap::new();
        let mut routes = Vec::new();
        let mut skipped = Vec::new();
        let mut units = Vec::new();
        for SourceUnit { name, path } in discovered {
            sources.insert(name.clone(), path.clone());
            match load_unit(&name, &path, &mut compiled) {
                Ok(unit) => {
                    tracing::info!(snippet = %name, is_async = unit.is_async(), "loaded snippet");
                    routes.push(name.clone());
                    units.push((name, unit));
                }
                Err(err) => {
                    let reason = err.detail();
                    tracing::warn!(snippet = %name, error = %reason, "skipping snippet");
                    skipped.push(Skipped { name, reason });
                }
            }
        }
        for name in compiled.keys() {
            tracing::debug!(snippet = %name, "compiled unit has no source; not routed");
        }

        Ok(Self {
            api_prefix: options.api_prefix,
            sources,
            routes,
            skipped,
            invoker: Invoker::new(units).with_max_depth(options.max_depth),
        })
    }

    /// Names of loaded snippets, in route-table order.
    pub fn names(&self) -> &[String] {
        &self.routes
    }

    /// Every discovered source unit, loaded or not.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    pub fn catalogue_path(&self) -> String {
        format!("{}/snippets", self.api_prefix)
    }

    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/snippets/{name}", self.api_prefix)
    }

    pub fn code_endpoint(&self, name: &str) -> String {
        format!("{}/snippets/{name}/code", self.api_prefix)
    }

    pub fn descriptor(&self, name: &str) -> Option<Descriptor> {
        let unit = self.invoker.unit(name)?;
        let mut descriptor = match self.source(name) {
            Ok(source) => introspect::describe(name, &source),
            Err(err) => {
                tracing::warn!(snippet = %name, error = %err.detail(), "describing snippet without source");
                Descriptor::placeholder(name)
            }
        };
        descriptor.endpoint = self.endpoint(name);
        descriptor.is_async = unit.is_async();
        let inferred = std::mem::take(&mut descriptor.dependencies);
        descriptor.dependencies = unit.dependencies().to_vec();
        for dependency in inferred {
            if !descriptor.dependencies.contains(&dependency) {
                descriptor.dependencies.push(dependency);
            }
        }
        Some(descriptor)
    }

    pub fn catalogue(&self) -> Vec<Descriptor> {
        self.routes
            .iter()
            .filter_map(|name| self.descriptor(name))
            .collect()
    }

    pub fn source(&self, name: &str) -> Result<String, Error> {
        let not_found = || {
            Error::new(ErrorKind::NotFound)
                .with_message(format!("Snippet {name} not found"))
                .with_snippet(name)
        };
        let Some(path) = self.sources.get(name) else {
            return Err(not_found());
        };
        std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                not_found()
            } else {
                Error::new(ErrorKind::Io)
                    .with_message(format!("failed to read source of snippet {name}"))
                    .with_snippet(name)
                    .with_path(path)
                    .with_source(err)
            }
        })
    }
}

fn load_unit(
    name: &str,
    path: &Path,
    compiled: &mut BTreeMap<String, Unit>,
) -> Result<Unit, Error> {
    let source = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Discovery)
            .with_message(format!("failed to read source: {err}"))
            .with_path(path)
            .with_source(err)
    })?;
    introspect::check_syntax(&source).map_err(|err| err.with_path(path))?;
    compiled.remove(name).ok_or_else(|| {
        Error::new(ErrorKind::Discovery)
            .with_message("no compiled unit with this name")
            .with_path(path)
    })
}

#[cfg(test)]
mod tests {
    use super::{Registry, RegistryOptions};
    use crate::core::error::ErrorKind;
    use crate::discovery::default_snippets_dir;
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    fn copy_bundled_sources(dest: &Path) {
        for entry in fs::read_dir(default_snippets_dir()).expect("read snippets") {
            let path = entry.expect("entry").path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("rs") {
                fs::copy(&path, dest.join(path.file_name().expect("file name"))).expect("copy");
            }
        }
    }

    fn scratch_registry() -> (tempfile::TempDir, Registry) {
        let temp = tempfile::tempdir().expect("tempdir");
        copy_bundled_sources(temp.path());
        fs::write(temp.path().join("broken.rs"), "pub fn execute(params: {").expect("write");
        fs::write(temp.path().join("orphan.rs"), "pub fn execute() {}").expect("write");
        let registry =
            Registry::load_compiled(temp.path(), RegistryOptions::default()).expect("load");
        (temp, registry)
    }

    #[test]
    fn broken_and_orphan_units_are_skipped_without_aborting() {
        let (_temp, registry) = scratch_registry();
        assert!(registry.names().iter().any(|name| name == "add_two_numbers"));
        assert!(registry.names().iter().any(|name| name == "sum_of_primes"));
        assert!(!registry.names().iter().any(|name| name == "broken"));
        assert!(!registry.names().iter().any(|name| name == "orphan"));

        let skipped: Vec<&str> = registry
            .skipped()
            .iter()
            .map(|skip| skip.name.as_str())
            .collect();
        assert_eq!(skipped, ["broken", "orphan"]);
        assert!(registry.skipped()[0].reason.starts_with("syntax error"));
        assert!(registry.source_names().any(|name| name == "broken"));
    }

    #[test]
    fn catalogue_describes_every_loaded_snippet() {
        let (_temp, registry) = scratch_registry();
        let catalogue = registry.catalogue();
        assert_eq!(catalogue.len(), registry.names().len());

        let sum = catalogue
            .iter()
            .find(|descriptor| descriptor.name == "sum_of_primes")
            .expect("sum_of_primes");
        assert_eq!(sum.endpoint, "/api/snippets/sum_of_primes");
        assert_eq!(sum.params.get("limit"), Some("str"));
        assert_eq!(sum.return_type, "int");
        assert_eq!(sum.dependencies, ["find_primes"]);
        assert!(sum.is_async);

        let day_start = catalogue
            .iter()
            .find(|descriptor| descriptor.name == "day_start_timestamp")
            .expect("day_start_timestamp");
        assert_eq!(day_start.dependencies, ["current_time"]);

        let primes = catalogue
            .iter()
            .find(|descriptor| descriptor.name == "find_primes")
            .expect("find_primes");
        assert!(!primes.is_async);
        assert_eq!(primes.return_type, "PrimeResult");
        assert!(primes.description.starts_with("Find all prime numbers"));
    }

    #[test]
    fn source_lookup_distinguishes_missing_names() {
        let (temp, registry) = scratch_registry();
        let code = registry.source("add_two_numbers").expect("source");
        assert!(code.contains("fn execute"));
        assert!(registry.source("broken").is_ok());

        let err = registry.source("nope").expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        fs::remove_file(temp.path().join("add_two_numbers.rs")).expect("remove");
        let err = registry.source("add_two_numbers").expect_err("vanished");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn api_prefix_shapes_endpoints() {
        let temp = tempfile::tempdir().expect("tempdir");
        copy_bundled_sources(temp.path());
        let options = RegistryOptions {
            api_prefix: "/v1".to_string(),
            ..RegistryOptions::default()
        };
        let registry = Registry::load_compiled(temp.path(), options).expect("load");
        assert_eq!(registry.catalogue_path(), "/v1/snippets");
        assert_eq!(registry.endpoint("find_primes"), "/v1/snippets/find_primes");
        assert_eq!(
            registry.code_endpoint("find_primes"),
            "/v1/snippets/find_primes/code"
        );
    }

    #[tokio::test]
    async fn dependencies_resolve_through_the_registry_invoker() {
        let (_temp, registry) = scratch_registry();
        let sum = registry
            .invoker()
            .invoke("sum_of_primes", json!({"limit": "10"}))
            .await
            .expect("sum");
        assert_eq!(sum, json!(17));

        let primes = registry
            .invoker()
            .invoke("find_primes", json!({"limit": "10"}))
            .await
            .expect("primes");
        assert_eq!(primes, json!({"count": 4, "primes": [2, 3, 5, 7]}));

        let from_integer = registry
            .invoker()
            .invoke("sum_of_primes", json!({"limit": 10}))
            .await
            .expect("integer limit");
        assert_eq!(from_integer, json!(17));
    }
}
