//! Prompt quality evaluation: golden character prompts.
//!
//! Each case assembles a full system prompt from a character sheet and its
//! surroundings and checks that the parts a model must see are present, and
//! that nothing unrendered or out-of-character leaks through.
//!
//! Run with `cargo test -p parley-llm --test eval_golden`.

use parley_core::character::CharacterSheet;
use parley_core::world::{Weather, WorldSnapshot};
use parley_llm::prompt::{self, PromptContext};

/// A golden test case for prompt evaluation.
struct GoldenCase {
    /// Human-readable name for the test case.
    name: &'static str,
    character: CharacterSheet,
    world: Option<WorldSnapshot>,
    external_context: Option<&'static str>,
    knowledge_context: Option<&'static str>,
    history_summary: &'static str,
    setting: &'static str,
    /// Strings that MUST appear in the rendered prompt.
    prompt_must_contain: Vec<&'static str>,
    /// Strings that MUST NOT appear in the rendered prompt.
    prompt_must_not_contain: Vec<&'static str>,
}

fn ferryman() -> CharacterSheet {
    CharacterSheet::from_json(
        r#"{
            "id": "ferryman",
            "name": "Orrin",
            "title": "Keeper of the Crossing",
            "personality": {
                "traits": ["gruff", "honest"],
                "backstory": "Has poled the same raft across the black river for forty winters.",
                "fears": ["deep water at night"]
            },
            "speech_style": { "vocabulary": "plain", "common_phrases": ["Mind the current."] }
        }"#,
    )
    .expect("valid sheet")
}

fn golden_cases() -> Vec<GoldenCase> {
    vec![
        // ---------------------------------------------------------------
        // 1. Stock sage, first meeting, calm morning
        // ---------------------------------------------------------------
        GoldenCase {
            name: "sage_first_meeting",
            character: CharacterSheet::eldric(),
            world: Some(WorldSnapshot::default()),
            external_context: None,
            knowledge_context: None,
            history_summary: "This is your first conversation with this player.",
            setting: prompt::DEFAULT_SETTING,
            prompt_must_contain: vec![
                "You are Eldric, known as \"The Wandering Sage\".",
                "**Personality traits:** wise, mysterious, patient, slightly mischievous",
                "**Phrases you might use:** Ah, young traveler... / But that is a tale for another time...",
                "**Your secret:** Is bound to this world by a curse",
                "- Location: plains biome in the Overworld",
                "## Conversation Context\nThis is your first conversation with this player.",
            ],
            prompt_must_not_contain: vec!["{setting}", "## Something Just Happened", "## Your Knowledge"],
        },
        // ---------------------------------------------------------------
        // 2. Sage after a signal fired nearby
        // ---------------------------------------------------------------
        GoldenCase {
            name: "sage_senses_disturbance",
            character: CharacterSheet::eldric(),
            world: None,
            external_context: Some("You sense a disturbance - something in the physical world has just activated."),
            knowledge_context: None,
            history_summary: "You have spoken with this player 3 times before.",
            setting: "the Shattered Vale",
            prompt_must_contain: vec![
                "## Something Just Happened\nYou sense a disturbance",
                "- You exist in the Shattered Vale",
                "You have spoken with this player 3 times before.",
            ],
            prompt_must_not_contain: vec!["## Current World State"],
        },
        // ---------------------------------------------------------------
        // 3. Sparse sheet with knowledge and a stormy night
        // ---------------------------------------------------------------
        GoldenCase {
            name: "ferryman_with_knowledge",
            character: ferryman(),
            world: Some(WorldSnapshot {
                biome: "river".to_string(),
                day_time: 19_000,
                weather: Weather::Thunder,
                player_name: "Alex".to_string(),
                ..WorldSnapshot::default()
            }),
            external_context: None,
            knowledge_context: Some(
                "## Your Knowledge\nUse this information to answer the player accurately:\n- The far bank hides a sunken shrine.\n",
            ),
            history_summary: "This is your first conversation with this player.",
            setting: prompt::DEFAULT_SETTING,
            prompt_must_contain: vec![
                "You are Orrin, known as \"Keeper of the Crossing\".",
                "**Fears:** deep water at night",
                "**Vocabulary:** plain",
                "- Weather: thunderstorm",
                "- Speaking with: Alex",
                "- The far bank hides a sunken shrine.",
            ],
            prompt_must_not_contain: vec!["Secret Agenda", "**Quirks:**", "**Never say:**"],
        },
        // ---------------------------------------------------------------
        // 4. Default storyteller, nothing optional
        // ---------------------------------------------------------------
        GoldenCase {
            name: "storyteller_minimal",
            character: CharacterSheet::default(),
            world: None,
            external_context: Some(""),
            knowledge_context: Some(""),
            history_summary: "This is your first conversation with this player.",
            setting: prompt::DEFAULT_SETTING,
            prompt_must_contain: vec!["You are Storyteller", "## Rules", "Never break the fourth wall"],
            prompt_must_not_contain: vec!["## Something Just Happened", "## Your Knowledge", "**Backstory:**"],
        },
    ]
}

// ---------------------------------------------------------------------------
// Offline Tests: Prompt Assembly Validation
// ---------------------------------------------------------------------------

#[test]
fn golden_prompts_render_expected_sections() {
    for case in golden_cases() {
        let rendered = prompt::assemble_system_prompt(&PromptContext {
            character: &case.character,
            world: case.world.as_ref(),
            external_context: case.external_context,
            knowledge_context: case.knowledge_context,
            history_summary: case.history_summary,
            setting: case.setting,
        });

        for needle in &case.prompt_must_contain {
            assert!(
                rendered.contains(needle),
                "Golden case '{}': rendered prompt must contain '{}' but doesn't.\nRendered:\n{}",
                case.name,
                needle,
                rendered
            );
        }
        for needle in &case.prompt_must_not_contain {
            assert!(
                !rendered.contains(needle),
                "Golden case '{}': rendered prompt must NOT contain '{}' but does.\nRendered:\n{}",
                case.name,
                needle,
                rendered
            );
        }
    }
}

#[test]
fn every_prompt_ends_with_conversation_context() {
    for case in golden_cases() {
        let rendered = prompt::assemble_system_prompt(&PromptContext {
            character: &case.character,
            world: case.world.as_ref(),
            external_context: case.external_context,
            knowledge_context: case.knowledge_context,
            history_summary: case.history_summary,
            setting: case.setting,
        });
        let tail = rendered.rsplit("## ").next().unwrap_or_default();
        assert!(
            tail.starts_with("Conversation Context\n"),
            "Golden case '{}': last section must be the conversation context",
            case.name
        );
    }
}

#[test]
fn rules_establish_identity_constraints() {
    assert!(prompt::RULES.contains("Stay in character"));
    assert!(prompt::RULES.contains("{setting}"));
}
