//! Prompt composition and response parsing.
//!
//! The composer assembles everything the narrator needs into one prompt:
//! who it is, what the canon says, who the player is, what just happened,
//! and what the player did. The parser splits the reply back into a
//! narrated scene and a state update, tolerating malformed output.

use crate::state::{PlayerState, StateUpdate};
use tracing::warn;

/// Separator the narrator emits between the scene and the changed-fields
/// JSON object. Shared contract between composer and parser; chosen so it
/// cannot plausibly occur in narrative text.
pub const STATE_UPDATE_SEPARATOR: &str = "---STATE_UPDATE---";

/// How many recent scenes the prompt includes. A tighter recency window
/// than the persisted history bound.
const HISTORY_WINDOW: usize = 3;

const NARRATOR_ROLE: &str = "\
You are the narrator of an interactive Harry Potter RPG.
You generate immersive, canon-accurate scenes based on the player's actions.
You must stay true to the HP world - its rules, characters, and tone.
Keep responses to 3-4 paragraphs. End every scene with 2-3 possible actions
the player could take next, formatted as a numbered list.";

/// Assemble the full prompt the narrator receives for one player action.
///
/// Pure and deterministic: the same state, action, and passages always
/// produce the same prompt. Every section renders something, even when its
/// content is empty.
pub fn build_game_prompt(
    state: &PlayerState,
    player_action: &str,
    lore_passages: &[String],
) -> String {
    let lore = if lore_passages.is_empty() {
        "RELEVANT LORE: None retrieved for this action.".to_string()
    } else {
        let bullets = lore_passages
            .iter()
            .map(|p| format!("- {p}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("RELEVANT LORE FROM THE BOOKS:\n{bullets}")
    };

    let house = if state.house.is_empty() {
        "not yet sorted"
    } else {
        state.house.as_str()
    };
    let spells = if state.spells_learned.is_empty() {
        "none yet".to_string()
    } else {
        state
            .spells_learned
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };
    let inventory = if state.inventory.is_empty() {
        "nothing".to_string()
    } else {
        state.inventory.iter().cloned().collect::<Vec<_>>().join(", ")
    };
    let relationships = if state.relationships.is_empty() {
        "none established".to_string()
    } else {
        serde_json::to_string(&state.relationships).unwrap_or_else(|_| "{}".to_string())
    };

    let character = format!(
        "PLAYER CHARACTER:\n\
         - Name: {}\n\
         - House: {}\n\
         - Year: {}\n\
         - Location: {}\n\
         - Health: {}/100\n\
         - Spells known: {}\n\
         - Inventory: {}\n\
         - Relationships: {}",
        state.player_name,
        house,
        state.year,
        state.current_location,
        state.health,
        spells,
        inventory,
        relationships,
    );

    let history = if state.scene_history.is_empty() {
        "RECENT SCENE HISTORY: This is the beginning of the adventure.".to_string()
    } else {
        let start = state.scene_history.len().saturating_sub(HISTORY_WINDOW);
        let recent = state.scene_history[start..].join("\n\n");
        format!("RECENT SCENE HISTORY:\n{recent}")
    };

    let action = format!(
        "PLAYER ACTION: {player_action}\n\
         \n\
         Generate the next scene. Then on a new line write EXACTLY this separator:\n\
         {STATE_UPDATE_SEPARATOR}\n\
         Followed by a JSON object of ONLY the fields that changed. Example:\n\
         {{\"current_location\": \"Potions classroom\", \"spells_learned\": [\"Wingardium Leviosa\"]}}\n\
         If nothing changed, write: {{}}"
    );

    [NARRATOR_ROLE.to_string(), lore, character, history, action].join("\n\n")
}

/// Split the narrator's reply into the scene text and a state update.
///
/// If the separator is present, everything before it (trimmed) is the
/// narrative and the remainder is parsed as JSON. Malformed or missing
/// structure degrades to an empty update; the narrative always gets
/// something, even if that is the whole raw reply. Never fails.
pub fn parse_response(raw: &str) -> (String, StateUpdate) {
    match raw.split_once(STATE_UPDATE_SEPARATOR) {
        Some((narrative, tail)) => (narrative.trim().to_string(), try_parse_update(tail)),
        None => (raw.trim().to_string(), StateUpdate::empty()),
    }
}

/// Parse the changed-fields JSON. Anything that is not a JSON object
/// degrades to "nothing changed".
fn try_parse_update(raw: &str) -> StateUpdate {
    let json = strip_code_fence(raw.trim());

    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Object(map)) => StateUpdate::from_map(map),
        Ok(other) => {
            warn!(kind = %value_kind(&other), "state update was not a JSON object");
            StateUpdate::empty()
        }
        Err(e) => {
            warn!(error = %e, "failed to parse state update JSON");
            StateUpdate::empty()
        }
    }
}

fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Strip a markdown code fence the model may have wrapped the JSON in.
fn strip_code_fence(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FieldUpdate, PlayerState};

    fn sample_state() -> PlayerState {
        PlayerState::new("Harry Potter")
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let state = sample_state();
        let lore = vec!["A passage about wands.".to_string()];
        let a = build_game_prompt(&state, "I look around", &lore);
        let b = build_game_prompt(&state, "I look around", &lore);
        assert_eq!(a, b);
    }

    #[test]
    fn test_prompt_sections_for_fresh_player() {
        let state = sample_state();
        let prompt = build_game_prompt(&state, "I board the train", &[]);

        assert!(prompt.contains("You are the narrator"));
        assert!(prompt.contains("RELEVANT LORE: None retrieved for this action."));
        assert!(prompt.contains("- Name: Harry Potter"));
        assert!(prompt.contains("- House: not yet sorted"));
        assert!(prompt.contains("- Health: 100/100"));
        assert!(prompt.contains("- Spells known: Lumos"));
        assert!(prompt.contains("- Relationships: none established"));
        assert!(prompt.contains("RECENT SCENE HISTORY: This is the beginning of the adventure."));
        assert!(prompt.contains("PLAYER ACTION: I board the train"));
        assert!(prompt.contains(STATE_UPDATE_SEPARATOR));
    }

    #[test]
    fn test_prompt_renders_lore_bullets() {
        let state = sample_state();
        let lore = vec!["First passage.".to_string(), "Second passage.".to_string()];
        let prompt = build_game_prompt(&state, "I explore", &lore);

        assert!(prompt.contains("RELEVANT LORE FROM THE BOOKS:"));
        assert!(prompt.contains("- First passage."));
        assert!(prompt.contains("- Second passage."));
        assert!(!prompt.contains("None retrieved"));
    }

    #[test]
    fn test_prompt_history_window_is_last_three() {
        let mut state = sample_state();
        for i in 0..5 {
            state.scene_history.push(format!("scene {i}"));
        }
        let prompt = build_game_prompt(&state, "I continue", &[]);

        assert!(!prompt.contains("scene 0"));
        assert!(!prompt.contains("scene 1"));
        assert!(prompt.contains("scene 2"));
        assert!(prompt.contains("scene 3"));
        assert!(prompt.contains("scene 4"));
    }

    #[test]
    fn test_prompt_renders_populated_character() {
        let mut state = sample_state();
        state.house = "Ravenclaw".to_string();
        state
            .relationships
            .insert("Luna".to_string(), "friend".to_string());
        let prompt = build_game_prompt(&state, "I study", &[]);

        assert!(prompt.contains("- House: Ravenclaw"));
        assert!(prompt.contains(r#""Luna":"friend""#));
    }

    #[test]
    fn test_parse_round_trip() {
        let raw = format!(
            "You enter the Great Hall.\n{STATE_UPDATE_SEPARATOR}\n{{\"current_location\": \"Great Hall\"}}"
        );
        let (narrative, update) = parse_response(&raw);

        assert_eq!(narrative, "You enter the Great Hall.");
        assert_eq!(
            update.fields(),
            &[FieldUpdate::CurrentLocation("Great Hall".to_string())]
        );
    }

    #[test]
    fn test_parse_no_separator() {
        let (narrative, update) = parse_response("just text, no separator");
        assert_eq!(narrative, "just text, no separator");
        assert!(update.is_empty());
    }

    #[test]
    fn test_parse_malformed_json_degrades_to_empty() {
        let raw = format!("A scene.\n{STATE_UPDATE_SEPARATOR}\nnot json");
        let (narrative, update) = parse_response(&raw);
        assert_eq!(narrative, "A scene.");
        assert!(update.is_empty());
    }

    #[test]
    fn test_parse_non_object_json_degrades_to_empty() {
        let raw = format!("A scene.\n{STATE_UPDATE_SEPARATOR}\n[1, 2, 3]");
        let (narrative, update) = parse_response(&raw);
        assert_eq!(narrative, "A scene.");
        assert!(update.is_empty());
    }

    #[test]
    fn test_parse_empty_object_is_empty_update() {
        let raw = format!("A quiet scene.\n{STATE_UPDATE_SEPARATOR}\n{{}}");
        let (narrative, update) = parse_response(&raw);
        assert_eq!(narrative, "A quiet scene.");
        assert!(update.is_empty());
    }

    #[test]
    fn test_parse_splits_on_first_separator() {
        let raw = format!(
            "scene one\n{STATE_UPDATE_SEPARATOR}\n{{\"year\": 2}}\n{STATE_UPDATE_SEPARATOR}\ntrailing"
        );
        let (narrative, update) = parse_response(&raw);
        assert_eq!(narrative, "scene one");
        // Trailing garbage after the JSON makes it unparseable, which
        // degrades to no change rather than an error.
        assert!(update.is_empty());
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = format!(
            "A scene.\n{STATE_UPDATE_SEPARATOR}\n```json\n{{\"health\": 90}}\n```"
        );
        let (narrative, update) = parse_response(&raw);
        assert_eq!(narrative, "A scene.");
        assert_eq!(update.fields(), &[FieldUpdate::Health(90)]);
    }

    #[test]
    fn test_strip_code_fence_plain_text_unchanged() {
        assert_eq!(strip_code_fence(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }
}
