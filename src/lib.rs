//! # Repo Summarizer
//!
//! Turns a source repository into a documentation audit.
//!
//! A run clones the repository into a private working tree, distills its
//! documentation and source files into a corpus bounded by a character
//! budget, asks a text-generation provider for a report, and saves the report
//! as an [`AnalysisRecord`](models::AnalysisRecord). Progress is delivered as
//! a stream of [`PipelineEvent`](models::PipelineEvent)s ending in exactly one
//! terminal event, and the working tree is removed on every path.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────┐   ┌───────────┐   ┌──────────┐
//! │   git    │──▶│ walker → accumulator     │──▶│ generator │──▶│  store   │
//! │ (source) │   │ (policy, extract)        │   │ (LLM)     │   │ (SQLite) │
//! └──────────┘   └──────────────────────────┘   └───────────┘   └────┬─────┘
//!                         pipeline ── events ──▶ SSE / stderr        │
//!                                                ┌───────────────────┤
//!                                                ▼                   ▼
//!                                           ┌─────────┐        ┌──────────┐
//!                                           │   CLI   │        │   HTTP   │
//!                                           │ (rsum)  │        │  server  │
//!                                           └─────────┘        └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the event wire format |
//! | [`policy`] | Which files and directories belong in a corpus |
//! | [`extract`] | Bytes to text, including PDF extraction |
//! | [`walker`] | Deterministic, lazy traversal of a working tree |
//! | [`accumulator`] | Budget-bounded corpus assembly |
//! | [`source`] | Repository URLs and the `git` fetcher |
//! | [`generate`] | Text-generation providers |
//! | [`events`] | Event sinks and the per-run emitter |
//! | [`pipeline`] | The run state machine |
//! | [`store`] | Record persistence |
//! | [`server`] | HTTP API and SSE stream |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`telemetry`] | Tracing setup |

pub mod accumulator;
pub mod config;
pub mod db;
pub mod events;
pub mod extract;
pub mod generate;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod policy;
pub mod server;
pub mod source;
pub mod store;
pub mod telemetry;
pub mod walker;
