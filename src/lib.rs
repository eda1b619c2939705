//! Purpose: Library crate behind the `snipserve` binary.
//! Exports: `core` (errors), `unit`, `invoker`, `introspect`, `discovery`,
//! `registry`, `params` (lenient decoders), `clock`, and the compiled `snippets`.
//! Role: Everything needed to discover, describe, and invoke snippets; the
//! HTTP layer and CLI live in the binary.
//! Invariants: The only process-wide state is the local offset held by `clock`.
pub mod clock;
pub mod core;
pub mod discovery;
pub mod introspect;
pub mod invoker;
pub mod params;
pub mod registry;
pub mod snippets;
pub mod unit;
