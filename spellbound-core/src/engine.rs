//! The turn orchestrator.
//!
//! Sequences one full game turn: load state, retrieve lore, compose the
//! prompt, call the narrator, parse the reply, merge the state update,
//! append the scene. State is only mutated after a narrative exists, so a
//! failed retrieval or model call never corrupts a save.

use crate::config::GameConfig;
use crate::lore::{LoreError, LoreRetriever};
use crate::model::{ModelError, NarrativeModel};
use crate::prompt::{build_game_prompt, parse_response};
use crate::state::{normalize_player_id, PlayerState, StateStore, StoreError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Synthesized action for a player's first-ever turn. The opening scene is
/// generated like any other turn, not hand-authored.
pub const OPENING_ACTION: &str =
    "I arrive at Hogwarts for the first time, ready to begin my adventure.";

/// Errors that fail a whole turn.
///
/// Malformed narrator output is not here: a missing separator or bad JSON
/// degrades to a no-change turn inside the parser.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    #[error("lore retrieval failed: {0}")]
    Retrieval(#[from] LoreError),

    #[error("narrative generation failed: {0}")]
    Model(#[from] ModelError),
}

/// Result of one player action.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// The narrated scene.
    pub narrative: String,

    /// The player's full state after the turn.
    pub state: PlayerState,

    /// How many lore passages grounded this scene.
    pub lore_used: usize,
}

/// Result of starting (or resuming) a game.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    /// The opening scene for a new player, or the last stored scene for a
    /// returning one.
    pub narrative: String,

    /// The player's full state.
    pub state: PlayerState,

    /// True when the player already had history and no generation ran.
    pub returning_player: bool,
}

/// The game engine. Owns the per-turn control flow and applies the merge
/// policy; all collaborators are injected.
pub struct GameEngine {
    store: StateStore,
    retriever: Arc<dyn LoreRetriever>,
    model: Arc<dyn NarrativeModel>,
    config: GameConfig,

    /// One lock per normalized player id. Turns for the same player
    /// serialize so concurrent requests cannot lose updates; different
    /// players proceed independently.
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GameEngine {
    pub fn new(
        store: StateStore,
        retriever: Arc<dyn LoreRetriever>,
        model: Arc<dyn NarrativeModel>,
        config: GameConfig,
    ) -> Self {
        Self {
            store,
            retriever,
            model,
            config,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Initialize a new player or resume an existing one.
    ///
    /// A new player's house is set and persisted immediately, independent
    /// of scene generation. A player with no history gets an opening scene
    /// through the normal take-action path; a returning player gets their
    /// last stored scene back with no model call, no lore retrieval, and
    /// no state mutation.
    pub async fn start_game(
        &self,
        player_name: &str,
        house: &str,
    ) -> Result<StartOutcome, EngineError> {
        let key = normalize_player_id(player_name);
        let _turn = self.lock_player(&key).await;
        info!(player = %key, "starting game");

        let mut state = self.store.load(player_name).await?;

        if state.house.is_empty() && !house.is_empty() {
            state.house = house.to_string();
            self.store.save(&state).await?;
        }

        if state.scene_history.is_empty() {
            let turn = self.run_turn(state, OPENING_ACTION).await?;
            return Ok(StartOutcome {
                narrative: turn.narrative,
                state: turn.state,
                returning_player: false,
            });
        }

        let narrative = state
            .scene_history
            .last()
            .cloned()
            .unwrap_or_default();

        Ok(StartOutcome {
            narrative,
            state,
            returning_player: true,
        })
    }

    /// Process one player action: the core game loop.
    pub async fn take_action(
        &self,
        player_name: &str,
        action: &str,
    ) -> Result<TurnOutcome, EngineError> {
        let key = normalize_player_id(player_name);
        let _turn = self.lock_player(&key).await;
        info!(player = %key, action, "processing turn");

        let state = self.store.load(player_name).await?;
        self.run_turn(state, action).await
    }

    /// Read a player's current state without generating anything.
    /// Creates and persists the default record for an unknown player.
    pub async fn player_state(&self, player_name: &str) -> Result<PlayerState, EngineError> {
        let key = normalize_player_id(player_name);
        let _turn = self.lock_player(&key).await;
        Ok(self.store.load(player_name).await?)
    }

    /// One full turn against already-loaded state. Caller holds the
    /// player's turn lock.
    async fn run_turn(
        &self,
        state: PlayerState,
        action: &str,
    ) -> Result<TurnOutcome, EngineError> {
        // Search query combines location and action for better relevance.
        let query = format!("{} {}", state.current_location, action);
        let passages = self.retriever.retrieve(&query).await?;
        let lore_used = passages.len();
        debug!(lore_used, "retrieved lore");

        let prompt = build_game_prompt(&state, action, &passages);

        let raw = tokio::time::timeout(self.config.model_timeout, self.model.complete(&prompt))
            .await
            .map_err(|_| ModelError::Timeout(self.config.model_timeout))??;

        let (narrative, update) = parse_response(&raw);

        // State mutations start here, strictly after a narrative exists.
        let mut state = state;
        if !update.is_empty() {
            debug!(fields = update.fields().len(), "applying state update");
            state = self.store.apply_update(state, &update).await?;
        }

        let state = self
            .store
            .append_scene(state, &narrative, self.config.scene_history_max)
            .await?;

        Ok(TurnOutcome {
            narrative,
            state,
            lore_used,
        })
    }

    async fn lock_player(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.turn_locks.lock().await;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
