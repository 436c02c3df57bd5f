//! Version-control abstraction used to publish generated bundles.
//!
//! Provides the `VersionControl` trait, the `GitCli` implementation that
//! drives the `git` binary, and the `CommandRunner` seam underneath it.

pub mod git;
pub mod runner;
pub mod truncation;
pub mod version_control;

pub use git::GitCli;
pub use runner::{CommandRunner, ExecResult, LocalCommandRunner};
pub use version_control::{CommitIdentity, VersionControl};
