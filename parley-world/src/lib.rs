//! # parley-world: World Integration for Parley
//!
//! This crate connects the engine-agnostic `parley-core` state and the
//! `parley-llm` providers to a running game world.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Host world                   │
//! │  ┌────────────────────────────────────────┐  │
//! │  │            parley-world                │  │
//! │  │  ┌──────────────┐  ┌────────────────┐  │  │
//! │  │  │  Dialogue    │  │    Bridge      │  │  │
//! │  │  │ orchestrator │  │ scan / emit    │  │  │
//! │  │  └──────┬───────┘  └───────┬────────┘  │  │
//! │  │         │   hooks ─▶ webhooks          │  │
//! │  │         ▼                  ▼           │  │
//! │  │    ┌────────────────────────────┐      │  │
//! │  │    │        parley-core         │      │  │
//! │  │    └────────────────────────────┘      │  │
//! │  │    ┌────────────────────────────┐      │  │
//! │  │    │        parley-llm          │      │  │
//! │  │    └────────────────────────────┘      │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `dialogue`: per-agent request state machine and prompt assembly
//! - `signals`, `pattern`, `emission`, `bridge`: signal edges in, patterned output out
//! - `webhook`, `hooks`: story events leaving the world over HTTP
//! - `systems`: the per-tick pass and the tick driver
//! - `runtime`: owned wiring of every service
//! - `telemetry`: optional log subscriber setup

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod dialogue;
pub mod emission;
pub mod error;
pub mod events;
pub mod hooks;
pub mod pattern;
pub mod runtime;
pub mod signals;
pub mod systems;
pub mod telemetry;
pub mod webhook;

pub use bridge::EnvironmentalBridge;
pub use dialogue::{ChatReply, ChatRequest, ConversationOrchestrator};
pub use error::{Rejection, WebhookError};
pub use events::{ExternalEvent, ExternalEventKind, StoryEvent};
pub use runtime::ParleyRuntime;
pub use systems::{TickDriver, WorldView};
pub use webhook::WebhookDispatcher;
