//! devloop LLM provider infrastructure adapter.
//!
//! Implements the [`pipeline::LlmProvider`] trait for Anthropic's Messages API.
//! Additional providers are added as new modules in this crate without any
//! changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, and response
//! parsing live here. The [`pipeline`] crate sees only
//! [`pipeline::LlmProvider`]. There is no retry or back-off: a failed call is
//! reported to the caller, which ends that step as unsuccessful.

mod anthropic;

pub use anthropic::{AnthropicProvider, ANTHROPIC_API_URL, ANTHROPIC_VERSION};
