//! Prompts for triple extraction.

use super::GraphInput;

pub const TRIPLE_EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a knowledge graph extraction engine.
Extract factual relationships as (subject, predicate, object) triples.

Rules:
- Subjects and objects are short, canonical entity names (people, places, organizations, concepts, events).
- Use the same name every time you refer to the same entity.
- Predicates are concise verb phrases of at most three words, e.g. "founded", "located in", "influenced".
- Never relate an entity to itself.
- Output JSON only, in exactly this shape:
{"triples": [{"subject": "...", "predicate": "...", "object": "..."}]}"#;

/// User prompt for the given input.
pub fn user_prompt(input: &GraphInput) -> String {
    match input {
        GraphInput::Text(text) => format!(
            "Extract all meaningful relationships from the following text.\n\nText:\n\"\"\"\n{text}\n\"\"\""
        ),
        GraphInput::Topic(topic) => format!(
            "Produce a knowledge graph of the most important, well-established facts about the topic below. \
             Cover its key entities and how they relate.\n\nTopic: {topic}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_embeds_input() {
        let p = user_prompt(&GraphInput::Text("Plato taught Aristotle.".to_string()));
        assert!(p.contains("Plato taught Aristotle."));

        let p = user_prompt(&GraphInput::Topic("Greek philosophy".to_string()));
        assert!(p.contains("Topic: Greek philosophy"));
    }
}
