//! Peanut Agents - the orchestrator over the backend pool.
//!
//! This crate owns:
//! - The [`Agent`] registry with full field validation
//! - Per-agent health rows and the probe that refreshes them
//! - Smooth weighted round-robin selection over the online set
//! - The synchronous backend chat call and metric reconciliation
//!
//! Dispatch flow: select (or honor an explicit target) → call the
//! backend → update the health row → append the audit entry → return.
//! A failed audit append fails the dispatch; the log stays
//! authoritative.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod agent;
mod client;
mod health;
mod orchestrator;
mod selector;
mod store;

pub use agent::{Agent, AgentDraft, AgentPatch, AgentType};
pub use client::{AgentBackend, ChatMessage, ChatOutput, HttpBackend, ProbeOutcome};
pub use health::{AgentHealth, HealthStatus};
pub use orchestrator::{AgentWithHealth, DispatchRequest, DispatchResult, Orchestrator};
pub use store::{AgentStore, HealthStore};
