//! Purpose: Host the snippet units compiled into this crate.
//! Exports: `compiled_units` plus one module per snippet file.
//! Role: The module list and unit table are generated by `build.rs` from the
//! files in this directory; no per-snippet registration is written by hand.
//! Invariants: `_`-prefixed files and this `mod.rs` are never snippets.
include!(concat!(env!("OUT_DIR"), "/snippet_units.rs"));
