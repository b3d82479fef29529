//! devloop role agents, the Orchestrator, and the LLM gateway.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`gateway`] | [`LlmGateway`]: every completion call, JSON contract, token totals |
//! | [`prompts`] | Role instructions and request builders |
//! | [`implementer`] | [`Implementer`]: analyse, rewrite the artifact, commit |
//! | [`reviewer`] | [`Reviewer`]: grade the latest change, settle item status |
//! | [`planner`] | [`Planner`]: statistics, insights, new items, priority changes |
//! | [`orchestrator`] | [`Orchestrator`]: sequential cycles and the session report |
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Agents sequence calls between the domain types in
//! the [`pipeline`] crate and its port traits. They hold no canonical state:
//! the backlog store owns every work item, and each agent keeps only the
//! transient results of the call in progress.
//!
//! ## Failure model
//!
//! Every agent `run` returns an outcome value instead of an error, so one
//! failing item or cycle never aborts a session. A failure leaves the item in
//! its last persisted state, which is always safe to pick up again on the
//! next run.

mod context;
pub mod gateway;
pub mod implementer;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod reviewer;

pub use context::AgentContext;
pub use gateway::LlmGateway;
pub use implementer::{Implementer, ItemOutcome, ItemResult};
pub use orchestrator::{Orchestrator, SessionOutcome};
pub use planner::{aggregate_stats, Planner, PlannerOutcome};
pub use reviewer::{ReviewOutcome, Reviewer};
