//! devloop backlog store infrastructure adapter.
//!
//! Implements the [`pipeline::BacklogStore`] trait over a PostgREST endpoint
//! (a Supabase project's `/rest/v1` API). Rows are addressed by their opaque
//! string id; every write is scoped to one row.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** URL construction, authentication headers, HTTP error
//! classification, and row decoding live here. The [`pipeline`] crate sees
//! only [`pipeline::BacklogStore`] and [`pipeline::StoreError`].
//!
//! ## Ordering
//!
//! PostgREST can only order the `priority` column lexically, which does not
//! match urgency. The adapter therefore pushes the status filter and the
//! time-based ordering to the server and applies the full
//! [`pipeline::ListQuery`] ordering in-process before truncating.

mod postgrest;

pub use postgrest::PostgrestBacklogStore;
