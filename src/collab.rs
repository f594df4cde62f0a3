//! Seams for external collaborators
//!
//! The patch-stack tooling and artifact downloads are outside this engine;
//! the build orchestrator supplies implementations. The engine itself never
//! calls these beyond sharing the mapping/patch artifact vocabulary.

use std::path::{Path, PathBuf};

use crate::common::Result;

/// Linear patch-series management on top of a decompiled source tree
pub trait PatchStack {
    /// Apply one patch file; returns the tool's exit code
    fn apply_patch(&mut self, patch: &Path) -> Result<i32>;

    /// Regenerate the patch series since the given reference
    fn generate_patches(&mut self, output_dir: &Path, since_ref: &str) -> Result<()>;

    /// Record a commit with explicit authorship bookkeeping
    fn commit(&mut self, message: &str, author: &str, date: &str) -> Result<()>;
}

/// Artifact retrieval by coordinate
pub trait ArtifactDownloader {
    /// Download an artifact into `dest`, returning the local file path
    fn download(&self, coordinate: &str, dest: &Path) -> Result<PathBuf>;
}
