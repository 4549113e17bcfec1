//! End-to-end turn flow scenarios over the scripted harness.

use spellbound_core::testing::TestHarness;
use spellbound_core::{normalize_player_id, STATE_UPDATE_SEPARATOR};

#[tokio::test]
async fn first_turn_generates_opening_scene() {
    let mut harness = TestHarness::new();
    harness.script("The scarlet engine hisses as you arrive.");

    let outcome = harness.start("Harry Potter", "Gryffindor").await.unwrap();

    assert!(!outcome.returning_player);
    assert_eq!(outcome.narrative, "The scarlet engine hisses as you arrive.");
    assert_eq!(outcome.state.scene_history.len(), 1);
    assert_eq!(outcome.state.house, "Gryffindor");
    assert_eq!(harness.model_calls(), 1);

    // The opening ran through the normal action path, lore included.
    assert_eq!(harness.lore_calls(), 1);

    // The save landed under the normalized key.
    assert_eq!(normalize_player_id("Harry Potter"), "harry_potter");
    let saved = harness.load_state("harry potter").await;
    assert_eq!(saved.player_name, "Harry Potter");
}

#[tokio::test]
async fn returning_player_gets_last_scene_without_generation() {
    let mut harness = TestHarness::new();
    harness.script("Scene one.");
    harness.script("Scene two.");

    harness.start("Harry", "Gryffindor").await.unwrap();
    harness.act("Harry", "I explore the corridor").await.unwrap();

    let calls_before = harness.model_calls();
    let lore_before = harness.lore_calls();
    let state_before = harness.load_state("Harry").await;

    let outcome = harness.start("Harry", "Slytherin").await.unwrap();

    assert!(outcome.returning_player);
    assert_eq!(outcome.narrative, "Scene two.");
    // No model call, no retrieval, no mutation.
    assert_eq!(harness.model_calls(), calls_before);
    assert_eq!(harness.lore_calls(), lore_before);
    assert_eq!(harness.load_state("Harry").await, state_before);
    // The house was already set; a second start cannot re-sort the player.
    assert_eq!(outcome.state.house, "Gryffindor");
}

#[tokio::test]
async fn turn_applies_update_and_appends_scene() {
    let mut harness = TestHarness::new();
    harness.script(format!(
        "Professor Flitwick beams as your feather rises.\n\
         {STATE_UPDATE_SEPARATOR}\n\
         {{\"spells_learned\": [\"Wingardium Leviosa\"], \"current_location\": \"Charms classroom\"}}"
    ));

    let turn = harness
        .act("Hermione", "I practice the levitation charm")
        .await
        .unwrap();

    assert!(turn.state.spells_learned.contains("Wingardium Leviosa"));
    assert!(turn.state.spells_learned.contains("Lumos"));
    assert_eq!(turn.state.current_location, "Charms classroom");
    assert_eq!(
        turn.state.scene_history.last().unwrap(),
        "Professor Flitwick beams as your feather rises."
    );
}

#[tokio::test]
async fn malformed_update_is_a_successful_no_change_turn() {
    let mut harness = TestHarness::new();
    harness.script(format!(
        "The staircase shifts beneath you.\n{STATE_UPDATE_SEPARATOR}\nnot json at all"
    ));

    let turn = harness.act("Ron", "I climb the stairs").await.unwrap();

    assert_eq!(turn.narrative, "The staircase shifts beneath you.");
    let saved = harness.load_state("Ron").await;
    // The scene persisted; nothing else changed.
    assert_eq!(saved.scene_history.len(), 1);
    assert_eq!(saved.current_location, "Hogwarts Express");
}

#[tokio::test]
async fn cold_index_turn_reports_zero_lore() {
    let mut harness = TestHarness::new();
    harness.script("An echoing, empty hall.");

    let turn = harness.act("Luna", "I wander the hall").await.unwrap();
    assert_eq!(turn.lore_used, 0);
}

#[tokio::test]
async fn lore_passages_are_counted() {
    let mut harness = TestHarness::with_passages(vec![
        "A passage about the Sorting Hat.".to_string(),
        "A passage about house tables.".to_string(),
    ]);
    harness.script("The hat opens its brim and sings.");

    let turn = harness.act("Neville", "I approach the Sorting Hat").await.unwrap();
    assert_eq!(turn.lore_used, 2);
}

#[tokio::test]
async fn normalized_names_share_one_save_slot() {
    let mut harness = TestHarness::new();
    harness.script("Scene for the first spelling.");
    harness.script("Scene for the second spelling.");

    harness.act("Harry Potter", "I wave").await.unwrap();
    let turn = harness.act("harry potter", "I wave again").await.unwrap();

    // Both spellings landed in the same record.
    assert_eq!(turn.state.scene_history.len(), 2);
}

#[tokio::test]
async fn scene_history_stays_bounded() {
    let mut harness = TestHarness::new();

    for i in 0..15 {
        harness.script(format!("scene {i}"));
        let turn = harness.act("Ginny", "I keep going").await.unwrap();
        assert!(turn.state.scene_history.len() <= 10);
    }

    let saved = harness.load_state("Ginny").await;
    assert_eq!(saved.scene_history.len(), 10);
    assert_eq!(saved.scene_history.first().unwrap(), "scene 5");
    assert_eq!(saved.scene_history.last().unwrap(), "scene 14");
}

#[tokio::test]
async fn concurrent_turns_for_one_player_serialize() {
    use std::sync::Arc;

    let mut harness = TestHarness::new();
    harness.script("First concurrent scene.");
    harness.script("Second concurrent scene.");
    let harness = Arc::new(harness);

    let a = {
        let h = harness.clone();
        tokio::spawn(async move { h.act("Cho", "I duck").await })
    };
    let b = {
        let h = harness.clone();
        tokio::spawn(async move { h.act("Cho", "I weave").await })
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // Neither turn lost its append: the per-player lock serialized them.
    let saved = harness.load_state("Cho").await;
    assert_eq!(saved.scene_history.len(), 2);
}

#[tokio::test]
async fn unknown_update_fields_survive_reload() {
    let mut harness = TestHarness::new();
    harness.script(format!(
        "Fifty points to Gryffindor!\n{STATE_UPDATE_SEPARATOR}\n{{\"house_points\": 50}}"
    ));

    harness.act("Harry", "I catch the remembrall").await.unwrap();

    let saved = harness.load_state("Harry").await;
    assert_eq!(saved.extra["house_points"], serde_json::json!(50));
}
