//! Integration tests: conversation lifecycle across store, archive and config.

use chrono::Duration;

use parley_core::config::ParleyConfig;
use parley_core::conversation::ConversationStore;
use parley_core::persistence::ConversationArchive;
use parley_core::types::{AgentId, ChatMessage, PlayerId, Role};

// ---------------------------------------------------------------------------
// Configured store → conversation → save → restart → load
// ---------------------------------------------------------------------------

#[test]
fn conversation_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ParleyConfig::from_toml(&format!(
        "[conversation]\nmax_history = 4\n\n[persistence]\ndirectory = \"{}\"\nmax_persisted_messages = 3\n",
        dir.path().display()
    ))
    .expect("valid config");

    let store = ConversationStore::from_config(&config.conversation);
    let archive = ConversationArchive::from_config(&config.persistence);
    let (agent, player) = (AgentId::new(), PlayerId::new());

    for i in 0..3 {
        store.add_message(agent, player, ChatMessage::user(format!("question {i}")));
        store.add_message(agent, player, ChatMessage::assistant(format!("answer {i}")));
        store.increment_exchange_count(agent, player);
    }
    assert_eq!(store.get_history(agent, player).len(), 4);
    assert_eq!(archive.save_all(&store).expect("save"), 1);

    // Fresh process.
    let restored = ConversationStore::from_config(&config.conversation);
    assert_eq!(archive.load_all(&restored).expect("load"), 1);

    let history = restored.get_history(agent, player);
    let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["answer 1", "question 2", "answer 2"]);
    assert_eq!(history[0].role, Role::Assistant);
    assert_eq!(restored.exchange_count(agent, player), 3);
    assert!(restored.build_summary(agent, player).starts_with("You have had 3 conversation(s)"));
}

// ---------------------------------------------------------------------------
// Several agents and players stay isolated
// ---------------------------------------------------------------------------

#[test]
fn pairs_are_isolated() {
    let store = ConversationStore::new(20, Duration::seconds(30));
    let agents = [AgentId::new(), AgentId::new()];
    let players = [PlayerId::new(), PlayerId::new(), PlayerId::new()];

    for agent in agents {
        for player in players {
            store.add_message(agent, player, ChatMessage::user(format!("{agent}:{player}")));
        }
    }
    assert_eq!(store.len(), 6);

    // Rate limit is per pair: a fresh pair is always allowed.
    assert!(!store.can_interact(agents[0], players[0]));
    assert!(store.can_interact(AgentId::new(), players[0]));

    store.clear_agent_history(agents[0]);
    assert_eq!(store.len(), 3);
    for player in players {
        assert!(store.get_history(agents[0], player).is_empty());
        assert_eq!(store.get_history(agents[1], player).len(), 1);
    }

    store.reset();
    assert!(store.is_empty());
}
