//! Engine configuration.
//!
//! Defaults mirror the tuning the game ships with: a small lore window to
//! keep turns fast, and a bounded scene history so prompts cannot grow
//! without limit.

use std::path::PathBuf;
use std::time::Duration;

/// Default model for narrative generation. This is what the player reads.
pub const DEFAULT_NARRATOR_MODEL: &str = "claude-sonnet-4-20250514";

/// Configuration for the game engine.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Model used for scene narration.
    pub narrator_model: String,

    /// Maximum tokens for a narrated scene.
    pub max_tokens: usize,

    /// Lore passages retrieved per action. Fewer than a full RAG pipeline
    /// would use, because latency matters in a game.
    pub lore_top_k: usize,

    /// How many past scenes to keep in a player's saved state.
    pub scene_history_max: usize,

    /// Upper bound on one generative call. A slow model call fails the
    /// turn rather than hanging it.
    pub model_timeout: Duration,

    /// Directory for per-player save records.
    pub saves_dir: PathBuf,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            narrator_model: DEFAULT_NARRATOR_MODEL.to_string(),
            max_tokens: 1000,
            lore_top_k: 3,
            scene_history_max: 10,
            model_timeout: Duration::from_secs(60),
            saves_dir: PathBuf::from("saves"),
        }
    }
}

impl GameConfig {
    /// Set the narrator model.
    pub fn with_narrator_model(mut self, model: impl Into<String>) -> Self {
        self.narrator_model = model.into();
        self
    }

    /// Set max tokens for narrated scenes.
    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    /// Set how many lore passages are retrieved per action.
    pub fn with_lore_top_k(mut self, k: usize) -> Self {
        self.lore_top_k = k;
        self
    }

    /// Set the scene history bound.
    pub fn with_scene_history_max(mut self, max: usize) -> Self {
        self.scene_history_max = max;
        self
    }

    /// Set the generative call timeout.
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Set the saves directory.
    pub fn with_saves_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.saves_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GameConfig::default();
        assert_eq!(config.narrator_model, DEFAULT_NARRATOR_MODEL);
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(config.lore_top_k, 3);
        assert_eq!(config.scene_history_max, 10);
    }

    #[test]
    fn test_builder() {
        let config = GameConfig::default()
            .with_narrator_model("claude-3-5-haiku-20241022")
            .with_lore_top_k(5)
            .with_scene_history_max(4)
            .with_saves_dir("/tmp/saves");

        assert_eq!(config.narrator_model, "claude-3-5-haiku-20241022");
        assert_eq!(config.lore_top_k, 5);
        assert_eq!(config.scene_history_max, 4);
        assert_eq!(config.saves_dir, PathBuf::from("/tmp/saves"));
    }
}
