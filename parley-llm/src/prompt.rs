//! System-prompt assembly for in-character conversation.
//!
//! The prompt is built from sections in a fixed order:
//!
//! ```text
//! You are {name}, known as "{title}".
//! ## Character / ## How You Speak / ## Your Secret Agenda
//! ## Current World State        (optional)
//! ## Rules
//! ## Something Just Happened    (optional, external event)
//! ## Your Knowledge             (optional)
//! ## Conversation Context
//! ```

use parley_core::character::CharacterSheet;
use parley_core::world::WorldSnapshot;

/// Behaviour rules appended to every character prompt.
pub const RULES: &str = "## Rules
- Stay in character at all times
- Never break the fourth wall or mention being an AI
- Keep responses concise (1-3 sentences usually)
- You exist in {setting} - reference its places, creatures and weather naturally
- Give hints for adventures but don't solve everything for the player
- Remember details the player shares and reference them later
- Your hidden agenda should subtly influence your suggestions
";

/// Setting used in [`RULES`] when the host does not name one.
pub const DEFAULT_SETTING: &str = "this world";

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value; unknown keys are left as is.
#[must_use]
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// Render a character sheet (and optional surroundings) as a system prompt.
#[must_use]
pub fn character_prompt(sheet: &CharacterSheet, world: Option<&WorldSnapshot>, setting: &str) -> String {
    let mut out = format!("You are {}", sheet.name);
    if !sheet.title.is_empty() {
        out.push_str(&format!(", known as \"{}\"", sheet.title));
    }
    out.push_str(".\n\n");

    let p = &sheet.personality;
    out.push_str("## Character\n");
    push_field(&mut out, "Backstory", &p.backstory);
    push_field(&mut out, "Motivation", &p.motivation);
    push_field(&mut out, "Personality traits", &p.traits.join(", "));
    push_field(&mut out, "Fears", &p.fears.join(", "));
    push_field(&mut out, "Quirks", &p.quirks.join("; "));
    out.push('\n');

    let s = &sheet.speech_style;
    out.push_str("## How You Speak\n");
    push_field(&mut out, "Vocabulary", &s.vocabulary);
    push_field(&mut out, "Style", &s.sentence_length);
    push_field(&mut out, "Phrases you might use", &s.common_phrases.join(" / "));
    push_field(&mut out, "Never say", &s.avoid_phrases.join(", "));
    out.push('\n');

    let a = &sheet.hidden_agenda;
    if !(a.short_term_goal.is_empty() && a.long_term_goal.is_empty() && a.secret.is_empty()) {
        out.push_str("## Your Secret Agenda (do not reveal directly)\n");
        push_field(&mut out, "Short-term goal", &a.short_term_goal);
        push_field(&mut out, "Long-term goal", &a.long_term_goal);
        push_field(&mut out, "Your secret", &a.secret);
        push_field(&mut out, "You may hint at your secret when", &a.reveal_conditions.join("; "));
        out.push('\n');
    }

    if let Some(world) = world {
        out.push_str("## Current World State\n");
        out.push_str(&world.to_prompt_string());
        out.push('\n');
    }

    out.push_str(&render(RULES, &[("setting", setting)]));
    out
}

fn push_field(out: &mut String, label: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    out.push_str("**");
    out.push_str(label);
    out.push_str(":** ");
    out.push_str(value);
    out.push('\n');
}

/// Inputs for one outbound prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    /// Who is speaking.
    pub character: &'a CharacterSheet,
    /// Surroundings, if world context is enabled.
    pub world: Option<&'a WorldSnapshot>,
    /// Context from the latest external event, consumed by this prompt.
    pub external_context: Option<&'a str>,
    /// Pre-formatted knowledge section.
    pub knowledge_context: Option<&'a str>,
    /// Relationship summary from the conversation store.
    pub history_summary: &'a str,
    /// Setting name used in the rules.
    pub setting: &'a str,
}

/// Assemble the complete system prompt for a chat request.
#[must_use]
pub fn assemble_system_prompt(ctx: &PromptContext<'_>) -> String {
    let mut prompt = character_prompt(ctx.character, ctx.world, ctx.setting);

    if let Some(external) = ctx.external_context.filter(|c| !c.is_empty()) {
        prompt.push_str("\n## Something Just Happened\n");
        prompt.push_str(external);
        prompt.push('\n');
    }
    if let Some(knowledge) = ctx.knowledge_context.filter(|k| !k.is_empty()) {
        prompt.push('\n');
        prompt.push_str(knowledge);
    }

    prompt.push_str("\n## Conversation Context\n");
    prompt.push_str(ctx.history_summary);
    if !prompt.ends_with('\n') {
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_rendering_works() {
        let rendered = render("Hello {name}, you are in {setting}.", &[("name", "Eldric"), ("setting", "the Vale")]);
        assert_eq!(rendered, "Hello Eldric, you are in the Vale.");
    }

    #[test]
    fn template_handles_missing_vars() {
        assert_eq!(render("Hello {name}, {unknown}.", &[("name", "Eldric")]), "Hello Eldric, {unknown}.");
    }

    #[test]
    fn character_prompt_has_sections_in_order() {
        let sheet = CharacterSheet::eldric();
        let prompt = character_prompt(&sheet, Some(&WorldSnapshot::default()), DEFAULT_SETTING);

        assert!(prompt.starts_with("You are Eldric, known as \"The Wandering Sage\".\n\n## Character\n"));
        let order = [
            "## Character",
            "## How You Speak",
            "## Your Secret Agenda (do not reveal directly)",
            "## Current World State",
            "## Rules",
        ];
        let positions: Vec<usize> = order.iter().map(|h| prompt.find(h).expect("section present")).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(prompt.contains("**Never say:** As an AI, I cannot\n"));
        assert!(prompt.contains("- You exist in this world"));
    }

    #[test]
    fn empty_agenda_and_world_are_omitted() {
        let prompt = character_prompt(&CharacterSheet::default(), None, "the Vale");
        assert!(!prompt.contains("Secret Agenda"));
        assert!(!prompt.contains("Current World State"));
        assert!(!prompt.contains("**Fears:**"));
        assert!(prompt.contains("- You exist in the Vale"));
    }

    #[test]
    fn assembled_prompt_includes_optional_sections() {
        let sheet = CharacterSheet::default();
        let prompt = assemble_system_prompt(&PromptContext {
            character: &sheet,
            world: None,
            external_context: Some("A bell rang in the distance."),
            knowledge_context: Some("## Your Knowledge\n- The ruin lies north.\n"),
            history_summary: "This is your first conversation with this player.",
            setting: DEFAULT_SETTING,
        });

        let event = prompt.find("## Something Just Happened\nA bell rang").expect("event section");
        let knowledge = prompt.find("## Your Knowledge").expect("knowledge section");
        let summary = prompt
            .find("## Conversation Context\nThis is your first conversation with this player.\n")
            .expect("summary section");
        assert!(event < knowledge && knowledge < summary);
    }
}
