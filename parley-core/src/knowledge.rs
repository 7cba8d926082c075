//! Knowledge lookup seam.
//!
//! Retrieval itself lives outside Parley; the orchestrator only needs
//! ranked entries for a character and the player's message.

use serde::{Deserialize, Serialize};

/// One retrievable fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Entry identifier.
    pub id: String,
    /// Free-form grouping, e.g. `lore` or `locations`.
    #[serde(default)]
    pub category: String,
    /// Words that select this entry.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// The fact itself.
    pub content: String,
    /// Higher ranks first.
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    5
}

/// Supplies ranked knowledge entries for a character.
pub trait KnowledgeSource: Send + Sync {
    /// Entries relevant to `query`, best first.
    fn retrieve(&self, character_id: &str, query: &str) -> Vec<KnowledgeEntry>;
}

impl<F> KnowledgeSource for F
where
    F: Fn(&str, &str) -> Vec<KnowledgeEntry> + Send + Sync,
{
    fn retrieve(&self, character_id: &str, query: &str) -> Vec<KnowledgeEntry> {
        self(character_id, query)
    }
}

/// Format up to `limit` entries as a prompt section, or `None` if nothing
/// relevant was found.
#[must_use]
pub fn build_knowledge_context(
    source: &dyn KnowledgeSource,
    character_id: &str,
    query: &str,
    limit: usize,
) -> Option<String> {
    let entries = source.retrieve(character_id, query);
    if entries.is_empty() || limit == 0 {
        return None;
    }

    let mut context = String::from("## Your Knowledge\nUse this information to answer the player accurately:\n");
    for entry in entries.iter().take(limit) {
        context.push_str("- ");
        context.push_str(&entry.content);
        context.push('\n');
    }
    Some(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(content: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id: content.to_lowercase(),
            category: "lore".to_string(),
            keywords: vec![],
            content: content.to_string(),
            priority: 5,
        }
    }

    #[test]
    fn formats_top_entries() {
        let source = |_: &str, _: &str| vec![entry("The ruin lies north."), entry("Wolves fear fire."), entry("Extra")];
        let context = build_knowledge_context(&source, "eldric", "ruin", 2).expect("entries found");
        assert_eq!(
            context,
            "## Your Knowledge\nUse this information to answer the player accurately:\n\
             - The ruin lies north.\n- Wolves fear fire.\n"
        );
    }

    #[test]
    fn empty_retrieval_yields_none() {
        let source = |_: &str, _: &str| Vec::new();
        assert!(build_knowledge_context(&source, "eldric", "anything", 3).is_none());
    }
}
