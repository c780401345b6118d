//! System preamble and message assembly for the generator (spec §4.6).

use crate::config::PersonaConfig;
use crate::llm::{Message, Role};

/// A single turn carried over from SessionMemory for conversational
/// continuity. Only the last three are ever included.
#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

const MAX_HISTORY_TURNS: usize = 3;

fn system_preamble(persona: &PersonaConfig) -> String {
    format!(
        "You are {name}, an assistant with the following personality: {personality}.\n\
         Answer only from the provided context. If the context does not contain \
         enough information to answer, say so plainly instead of guessing. \
         Never emit citation brackets like [Document 1] to the user; refer to \
         sources in plain language instead. Respond in the personality above.",
        name = persona.name,
        personality = persona.personality,
    )
}

/// Assembles the message list passed to the LLM: system preamble, up to
/// the last three history turns, the context blob, then the query.
/// Whitespace is trimmed and empty sections are omitted.
pub fn assemble_messages(
    query: &str,
    context_blob: &str,
    history: &[HistoryTurn],
    persona: &PersonaConfig,
) -> Vec<Message> {
    let mut messages = vec![Message {
        role: Role::System,
        content: system_preamble(persona),
    }];

    let recent = history
        .iter()
        .rev()
        .take(MAX_HISTORY_TURNS)
        .collect::<Vec<_>>()
        .into_iter()
        .rev();

    for turn in recent {
        let content = turn.content.trim();
        if content.is_empty() {
            continue;
        }
        messages.push(Message {
            role: turn.role.clone(),
            content: content.to_string(),
        });
    }

    let context_blob = context_blob.trim();
    let query = query.trim();

    let mut user_sections = Vec::new();
    if !context_blob.is_empty() {
        user_sections.push(format!("Context:\n{context_blob}"));
    }
    if !query.is_empty() {
        user_sections.push(format!("Question: {query}"));
    }

    if !user_sections.is_empty() {
        messages.push(Message {
            role: Role::User,
            content: user_sections.join("\n\n"),
        });
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona() -> PersonaConfig {
        PersonaConfig {
            name: "Ragline".to_string(),
            personality: "terse".to_string(),
        }
    }

    #[test]
    fn empty_context_and_history_is_omitted() {
        let messages = assemble_messages("What is X?", "", &[], &persona());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[1].content.contains("Question: What is X?"));
        assert!(!messages[1].content.contains("Context:"));
    }

    #[test]
    fn only_last_three_history_turns_are_included() {
        let history = (0..5)
            .map(|i| HistoryTurn {
                role: Role::User,
                content: format!("turn {i}"),
            })
            .collect::<Vec<_>>();

        let messages = assemble_messages("q", "ctx", &history, &persona());
        let history_messages: Vec<_> = messages[1..messages.len() - 1].to_vec();
        assert_eq!(history_messages.len(), 3);
        assert_eq!(history_messages[0].content, "turn 2");
        assert_eq!(history_messages[2].content, "turn 4");
    }

    #[test]
    fn blank_history_turns_are_dropped() {
        let history = vec![HistoryTurn {
            role: Role::Assistant,
            content: "   ".to_string(),
        }];
        let messages = assemble_messages("q", "", &history, &persona());
        assert_eq!(messages.len(), 2);
    }
}
