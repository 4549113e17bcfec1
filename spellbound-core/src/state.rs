//! Player save state and the field-dependent merge policy.
//!
//! Each player has one save record keyed by a normalized identifier.
//! Loading a missing record creates and persists a fresh default; loading
//! a corrupt record is a hard error. Updates suggested by the narrator are
//! merged with field-specific semantics: set union for spells and
//! inventory, shallow map merge for relationships, whole-value overwrite
//! for everything else.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tracing::warn;

/// Errors from state persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt save record '{key}': {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to serialize save record: {0}")]
    Serialize(serde_json::Error),
}

/// Normalize a raw player name into a save-slot key.
///
/// Lowercased, spaces replaced with underscores. Two raw names that
/// normalize identically ("Harry Potter", "harry potter") share one save
/// slot; that is intentional single-slot-per-normalized-name behavior.
pub fn normalize_player_id(raw: &str) -> String {
    raw.to_lowercase().replace(' ', "_")
}

/// One player's complete persistent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Display name. Immutable after creation.
    pub player_name: String,

    /// Hogwarts house. Empty until the player is sorted.
    pub house: String,

    /// School year.
    pub year: u32,

    /// Spells the player knows. No duplicates; order not significant.
    pub spells_learned: BTreeSet<String>,

    /// Items carried. No duplicates; order not significant.
    pub inventory: BTreeSet<String>,

    /// Named relationships, e.g. "Hermione" -> "friend".
    pub relationships: BTreeMap<String, String>,

    /// Where the player currently is.
    pub current_location: String,

    /// Recent narrated scenes, most recent last. Bounded by the engine.
    pub scene_history: Vec<String>,

    /// Health, nominally 0-100. Not enforced at this layer.
    pub health: i64,

    /// Fields the narrator asserted that this layer does not model.
    /// Preserved across save/load so unanticipated updates round-trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PlayerState {
    /// A brand new player: unsorted, first year, on the train with a wand,
    /// a letter, and one spell.
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            house: String::new(),
            year: 1,
            spells_learned: BTreeSet::from(["Lumos".to_string()]),
            inventory: BTreeSet::from(["wand".to_string(), "Hogwarts letter".to_string()]),
            relationships: BTreeMap::new(),
            current_location: "Hogwarts Express".to_string(),
            scene_history: Vec::new(),
            health: 100,
            extra: BTreeMap::new(),
        }
    }

    /// Merge a state update into this state per the field policy.
    pub fn merge(&mut self, update: &StateUpdate) {
        for field in update.fields() {
            match field {
                FieldUpdate::SpellsLearned(new) => {
                    self.spells_learned.extend(new.iter().cloned());
                }
                FieldUpdate::Inventory(new) => {
                    self.inventory.extend(new.iter().cloned());
                }
                FieldUpdate::Relationships(new) => {
                    for (name, relation) in new {
                        self.relationships.insert(name.clone(), relation.clone());
                    }
                }
                FieldUpdate::House(house) => self.house = house.clone(),
                FieldUpdate::Year(year) => self.year = *year,
                FieldUpdate::CurrentLocation(location) => {
                    self.current_location = location.clone();
                }
                FieldUpdate::Health(health) => self.health = *health,
                FieldUpdate::SceneHistory(scenes) => {
                    self.scene_history = scenes.clone();
                }
                FieldUpdate::Other { key, value } => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// One field change asserted by the narrator.
///
/// Known fields get typed variants so merge semantics are explicit;
/// anything else is an opaque whole-value overwrite.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Spells to union into the known set.
    SpellsLearned(Vec<String>),
    /// Items to union into the inventory.
    Inventory(Vec<String>),
    /// Relationship entries to add or overwrite; others untouched.
    Relationships(BTreeMap<String, String>),
    House(String),
    Year(u32),
    CurrentLocation(String),
    Health(i64),
    /// Whole-value overwrite of the scene history.
    SceneHistory(Vec<String>),
    /// Unanticipated field; overwrites whatever was there.
    Other {
        key: String,
        value: serde_json::Value,
    },
}

/// The set of field changes parsed from one narrator reply.
///
/// Not persisted itself; only its effect on [`PlayerState`] is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    fields: Vec<FieldUpdate>,
}

impl StateUpdate {
    /// An update with no field changes.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldUpdate] {
        &self.fields
    }

    /// Add a field change. Mostly useful in tests.
    pub fn push(&mut self, field: FieldUpdate) {
        self.fields.push(field);
    }

    /// Build an update from a parsed JSON object.
    ///
    /// Known keys with the wrong value shape are skipped with a warning
    /// rather than failing the turn. A `player_name` key is ignored
    /// outright: the name is immutable after creation.
    pub fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut fields = Vec::new();

        for (key, value) in map {
            match key.as_str() {
                "spells_learned" => match string_list(&value) {
                    Some(spells) => fields.push(FieldUpdate::SpellsLearned(spells)),
                    None => warn!(%key, "skipping update with non-list value"),
                },
                "inventory" => match string_list(&value) {
                    Some(items) => fields.push(FieldUpdate::Inventory(items)),
                    None => warn!(%key, "skipping update with non-list value"),
                },
                "relationships" => match string_map(&value) {
                    Some(entries) => fields.push(FieldUpdate::Relationships(entries)),
                    None => warn!(%key, "skipping update with non-object value"),
                },
                "house" => match value.as_str() {
                    Some(house) => fields.push(FieldUpdate::House(house.to_string())),
                    None => warn!(%key, "skipping update with non-string value"),
                },
                "year" => match value.as_u64() {
                    Some(year) => fields.push(FieldUpdate::Year(year as u32)),
                    None => warn!(%key, "skipping update with non-integer value"),
                },
                "current_location" => match value.as_str() {
                    Some(location) => {
                        fields.push(FieldUpdate::CurrentLocation(location.to_string()))
                    }
                    None => warn!(%key, "skipping update with non-string value"),
                },
                "health" => match value.as_i64() {
                    Some(health) => fields.push(FieldUpdate::Health(health)),
                    None => warn!(%key, "skipping update with non-integer value"),
                },
                "scene_history" => match string_list(&value) {
                    Some(scenes) => fields.push(FieldUpdate::SceneHistory(scenes)),
                    None => warn!(%key, "skipping update with non-list value"),
                },
                "player_name" => {
                    warn!("ignoring attempt to rename player via state update");
                }
                _ => fields.push(FieldUpdate::Other { key, value }),
            }
        }

        Self { fields }
    }
}

fn string_list(value: &serde_json::Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
    )
}

fn string_map(value: &serde_json::Value) -> Option<BTreeMap<String, String>> {
    let entries = value.as_object()?;
    Some(
        entries
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
    )
}

/// Opaque per-key blob storage.
///
/// The store does not care where blobs live; the filesystem implementation
/// below is the default, and tests use an in-memory one.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob for a key. `None` means no record exists.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write the blob for a key, replacing any previous value.
    async fn put(&self, key: &str, blob: &str) -> Result<(), StoreError>;
}

/// Blob store backed by one JSON file per key in a directory.
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, blob: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.path_for(key), blob).await?;
        Ok(())
    }
}

/// Per-player persistent state, load-or-create semantics, and the typed
/// merge operation.
#[derive(Clone)]
pub struct StateStore {
    blobs: Arc<dyn BlobStore>,
}

impl StateStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// A store writing JSON save files under `dir`.
    pub fn on_disk(dir: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(FsBlobStore::new(dir.as_ref())))
    }

    /// Load a player's state, creating and persisting a fresh default if no
    /// record exists. A present-but-unreadable record is an error; only a
    /// missing one gets defaults.
    pub async fn load(&self, player_name: &str) -> Result<PlayerState, StoreError> {
        let key = normalize_player_id(player_name);
        match self.blobs.get(&key).await? {
            Some(blob) => {
                serde_json::from_str(&blob).map_err(|source| StoreError::Corrupt { key, source })
            }
            None => {
                let state = PlayerState::new(player_name);
                self.save(&state).await?;
                Ok(state)
            }
        }
    }

    /// Persist a player's state. Whole-record overwrite; last writer wins.
    pub async fn save(&self, state: &PlayerState) -> Result<(), StoreError> {
        let key = normalize_player_id(&state.player_name);
        let blob = serde_json::to_string_pretty(state).map_err(StoreError::Serialize)?;
        self.blobs.put(&key, &blob).await
    }

    /// Merge an update into the state, persist, and return the new state.
    pub async fn apply_update(
        &self,
        mut state: PlayerState,
        update: &StateUpdate,
    ) -> Result<PlayerState, StoreError> {
        state.merge(update);
        self.save(&state).await?;
        Ok(state)
    }

    /// Append a scene to history, drop the oldest entries past the bound,
    /// persist, and return the new state.
    pub async fn append_scene(
        &self,
        mut state: PlayerState,
        scene: &str,
        max_history: usize,
    ) -> Result<PlayerState, StoreError> {
        state.scene_history.push(scene.to_string());
        if state.scene_history.len() > max_history {
            let excess = state.scene_history.len() - max_history;
            state.scene_history.drain(..excess);
        }
        self.save(&state).await?;
        Ok(state)
    }
}
