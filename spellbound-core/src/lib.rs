//! Wizarding text-adventure engine with an AI narrator.
//!
//! This crate provides:
//! - Per-player persistent state with field-aware merge semantics
//! - Lore retrieval for grounding narration in canon
//! - Prompt composition and tolerant response parsing
//! - A turn orchestrator that sequences one full game turn
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use spellbound_core::{ClaudeModel, GameConfig, GameEngine, KeywordLoreIndex, StateStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GameConfig::default();
//!     let model = Arc::new(ClaudeModel::from_env(&config)?);
//!     let lore = Arc::new(KeywordLoreIndex::from_dir("lore", config.lore_top_k).await?);
//!     let store = StateStore::on_disk(&config.saves_dir);
//!
//!     let engine = GameEngine::new(store, lore, model, config);
//!
//!     let opening = engine.start_game("Harry Potter", "Gryffindor").await?;
//!     println!("{}", opening.narrative);
//!
//!     let turn = engine.take_action("Harry Potter", "I board the train").await?;
//!     println!("{}", turn.narrative);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod lore;
pub mod model;
pub mod prompt;
pub mod state;
pub mod testing;

// Primary public API
pub use config::GameConfig;
pub use engine::{EngineError, GameEngine, StartOutcome, TurnOutcome, OPENING_ACTION};
pub use lore::{KeywordLoreIndex, LoreError, LoreRetriever};
pub use model::{ClaudeModel, ModelError, NarrativeModel};
pub use prompt::{build_game_prompt, parse_response, STATE_UPDATE_SEPARATOR};
pub use state::{
    normalize_player_id, BlobStore, FieldUpdate, FsBlobStore, PlayerState, StateStore, StateUpdate,
    StoreError,
};
pub use testing::{MemoryBlobStore, MockCompletion, MockModel, StaticLore, TestHarness};
