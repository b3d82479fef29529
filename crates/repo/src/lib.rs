//! devloop working-copy infrastructure adapters.
//!
//! Everything the pipeline touches on local disk lives here:
//!
//! | Adapter | Port | Backing |
//! |---------|------|---------|
//! | [`FileArtifact`] | [`pipeline::ArtifactStore`] | One file plus a sibling `.backup` copy |
//! | [`GitRepository`] | [`pipeline::VersionControl`] | The enclosing Git repository via `git2` |
//! | [`JsonReportStore`] | [`pipeline::ReportStore`] | A directory of write-once JSON files |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** `git2` is synchronous; every repository operation runs
//! on the blocking pool via [`tokio::task::spawn_blocking`] and opens the
//! repository afresh, so adapters hold only paths and are `Send + Sync`.

mod artifact;
mod git;
mod reports;

pub use artifact::FileArtifact;
pub use git::GitRepository;
pub use reports::JsonReportStore;
