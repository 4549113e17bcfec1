//! Testing utilities.
//!
//! Deterministic stand-ins for every injected dependency:
//! - `MockModel` returns scripted completions and counts calls
//! - `StaticLore` returns fixed passages and records queries
//! - `MemoryBlobStore` keeps save records in a map
//! - `TestHarness` wires a full engine from all three

use crate::config::GameConfig;
use crate::engine::{EngineError, GameEngine, StartOutcome, TurnOutcome};
use crate::lore::{LoreError, LoreRetriever};
use crate::model::{ModelError, NarrativeModel};
use crate::state::{BlobStore, PlayerState, StateStore, StoreError};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum MockCompletion {
    /// Return this text as the completion.
    Text(String),
    /// Fail the call.
    Fail,
}

/// A narrator that replays scripted completions without API calls.
#[derive(Default)]
pub struct MockModel {
    responses: Mutex<VecDeque<MockCompletion>>,
    calls: AtomicUsize,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a completion.
    pub fn queue(&self, completion: MockCompletion) {
        self.responses
            .lock()
            .expect("mock model lock")
            .push_back(completion);
    }

    /// How many times `complete` was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NarrativeModel for MockModel {
    async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().expect("mock model lock").pop_front();
        match next {
            Some(MockCompletion::Text(text)) => Ok(text),
            Some(MockCompletion::Fail) => Err(ModelError::EmptyCompletion),
            None => Ok("The narrator has no more scripted scenes.".to_string()),
        }
    }
}

/// A retriever with a fixed passage list. Records every query.
#[derive(Default)]
pub struct StaticLore {
    passages: Vec<String>,
    unavailable: bool,
    calls: AtomicUsize,
    last_query: Mutex<Option<String>>,
}

impl StaticLore {
    /// A cold index: every retrieval returns empty.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Always return these passages (already relevance-ordered).
    pub fn with_passages(passages: Vec<String>) -> Self {
        Self {
            passages,
            ..Self::default()
        }
    }

    /// A retriever whose index is unreachable.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().expect("static lore lock").clone()
    }
}

#[async_trait::async_trait]
impl LoreRetriever for StaticLore {
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, LoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().expect("static lore lock") = Some(query.to_string());

        if self.unavailable {
            return Err(LoreError::Unavailable("scripted index failure".to_string()));
        }
        Ok(self.passages.clone())
    }
}

/// A blob store backed by an in-memory map.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.blobs.lock().expect("memory store lock").get(key).cloned())
    }

    async fn put(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        self.blobs
            .lock()
            .expect("memory store lock")
            .insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

/// A fully wired engine over mocks, for scripted scenarios.
pub struct TestHarness {
    pub engine: GameEngine,
    pub model: Arc<MockModel>,
    pub lore: Arc<StaticLore>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestHarness {
    /// Harness with a cold lore index.
    pub fn new() -> Self {
        Self::with_lore(StaticLore::empty())
    }

    /// Harness retrieving the given passages for every query.
    pub fn with_passages(passages: Vec<String>) -> Self {
        Self::with_lore(StaticLore::with_passages(passages))
    }

    /// Harness over an explicit lore double.
    pub fn with_lore(lore: StaticLore) -> Self {
        let model = Arc::new(MockModel::new());
        let lore = Arc::new(lore);
        let blobs = Arc::new(MemoryBlobStore::new());

        let engine = GameEngine::new(
            StateStore::new(blobs.clone()),
            lore.clone(),
            model.clone(),
            GameConfig::default(),
        );

        Self {
            engine,
            model,
            lore,
            blobs,
        }
    }

    /// Queue a scripted narrator reply.
    pub fn script(&mut self, text: impl Into<String>) -> &mut Self {
        self.model.queue(MockCompletion::Text(text.into()));
        self
    }

    /// Queue a narrator failure.
    pub fn script_failure(&mut self) -> &mut Self {
        self.model.queue(MockCompletion::Fail);
        self
    }

    /// Start (or resume) a game.
    pub async fn start(&self, player: &str, house: &str) -> Result<StartOutcome, EngineError> {
        self.engine.start_game(player, house).await
    }

    /// Take one action.
    pub async fn act(&self, player: &str, action: &str) -> Result<TurnOutcome, EngineError> {
        self.engine.take_action(player, action).await
    }

    /// Read the persisted state for a player straight from the store.
    pub async fn load_state(&self, player: &str) -> PlayerState {
        StateStore::new(self.blobs.clone())
            .load(player)
            .await
            .expect("load persisted state")
    }

    /// Model calls made so far.
    pub fn model_calls(&self) -> usize {
        self.model.calls()
    }

    /// Lore retrievals made so far.
    pub fn lore_calls(&self) -> usize {
        self.lore.calls()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
