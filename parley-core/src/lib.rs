//! # Parley Core Library
//!
//! Engine-agnostic conversation state for non-player characters.
//!
//! - [`ConversationStore`] keeps bounded per-(agent, player) history,
//!   exchange counters and rate-limit timestamps.
//! - [`ConversationArchive`] saves and restores that state as one JSON
//!   record per pair.
//! - [`CharacterSheet`] and [`WorldSnapshot`] describe who is talking and
//!   where.
//! - [`ParleyConfig`] is the single TOML configuration for every crate.
//!
//! Nothing here performs network I/O; see `parley-llm` and `parley-world`.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod character;
pub mod config;
pub mod conversation;
pub mod error;
pub mod knowledge;
pub mod metrics;
pub mod persistence;
pub mod types;
pub mod world;

pub use character::CharacterSheet;
pub use config::{ParleyConfig, ProviderKind};
pub use conversation::ConversationStore;
pub use error::ParleyError;
pub use knowledge::{KnowledgeEntry, KnowledgeSource};
pub use metrics::ParleyCounters;
pub use persistence::ConversationArchive;
pub use types::*;
pub use world::WorldSnapshot;
