//! Reobfuscation mapping engine (reobf)
//!
//! A build-pipeline tool that takes multiple independently-produced name
//! mappings, merges/filters/reverses them, resolves member relationships
//! against a real classpath, and emits one final, internally consistent
//! mapping set suitable for remapping a compiled binary back to its
//! distributable obfuscated form.
//!
//! ## Architecture
//!
//! - **mapping**: multi-namespace mapping graph, composition, tiny-format I/O
//! - **classpath**: classfile metadata index over the input binary plus a
//!   baseline runtime
//! - **hydrate**: derived bridge-method and super-constructor relationships
//! - **chain**: change contributors and the ordered link executor
//! - **pipeline**: the end-to-end mapping generation run
//! - **collab**: interfaces to out-of-scope collaborators (patch stack,
//!   artifact downloads)
//!
//! ## Data flow
//!
//! ```text
//! mapping files -> compose (merge/reverse/filter) -> working set
//!                                                        |
//! input binary + runtime -> classpath index -> hydrate   |
//!                                          \             v
//!                                           contributor chain -> output file
//! ```

pub mod chain;
pub mod classpath;
pub mod collab;
pub mod common;
pub mod hydrate;
pub mod mapping;
pub mod pipeline;

pub use common::{Error, Result};
pub use pipeline::{generate_reobf_mappings, ReobfInputs};
