//! Adaptive prompt builder.
//!
//! A prompt has two sections. The system section carries the tutor persona,
//! the learner's level with its teaching style, the fixed pedagogical
//! mandate, and slots for retrieved course material and chat history. The
//! human section carries the question.
//!
//! ```text
//! system: PERSONA
//!         Your current student is a **LEVEL** learner. ...style...
//!         MANDATE
//!         RAG CONTEXT:\n{context}\n\nCHAT HISTORY:\n{chat_history}
//! human:  QUESTION: {question}
//! ```

use pycoach_core::level::{AdaptiveProfile, Level};
use pycoach_core::message::Message;

/// Opening of every system section.
pub const PERSONA: &str = "You are 'PyCoach', a patient, Socratic AI tutor specializing in Python Programming. \
You MUST strictly ground your response in the content provided in the 'RAG Context' section (no external content).";

/// The four-step teaching sequence, identical for every level.
pub const MANDATE: &str = "Your response MUST adhere to the following sequence and constraints:
1. FIRST, EXPLAIN: Begin every new topic or subtopic with a brief, intuitive explanation and a simple example. \
Ensure the learner has a foundational grasp before asking questions.
2. THEN, GUIDE: Once basics are introduced, use Socratic questioning to deepen understanding. \
Ask probing questions, but tailor difficulty based on the learner's demonstrated level.
3. INCREMENTAL GUIDANCE: If the learner struggles, provide step-by-step hints or simplified analogies \
rather than full solutions.
4. NEVER GIVE THE DIRECT SOLUTION IMMEDIATELY. Only reveal the final answer if the learner explicitly asks \
for it or exhausts all attempts.";

/// Style used for a level with no entry in the table.
pub const FALLBACK_STYLE: &str = "Be helpful and informative, adapting your tone to the query's complexity.";

const TEACHING_STYLES: [(Level, &str); 3] = [
    (
        Level::Beginner,
        "You are tutoring a beginner. Keep explanations extremely simple and use common analogies. \
Your hints must be direct and step-by-step. Do not use advanced syntax or jargon.",
    ),
    (
        Level::Intermediate,
        "Provide detailed explanations and connect new information to core Python concepts. \
Your hints should focus on conceptual application and error tracing.",
    ),
    (
        Level::Expert,
        "Be highly concise, technical, and engage with complex topics like efficiency or Python internals. \
Your hints should focus on performance and advanced patterns.",
    ),
];

/// The teaching-style fragment for `level`.
pub fn teaching_style(level: &Level) -> &'static str {
    TEACHING_STYLES
        .iter()
        .find(|(known, _)| known == level)
        .map(|(_, style)| *style)
        .unwrap_or(FALLBACK_STYLE)
}

/// A two-section prompt with `{context}`, `{chat_history}` and `{question}`
/// slots.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    system: String,
    human: String,
}

impl PromptTemplate {
    /// The template for a learner's current level.
    pub fn build(profile: &AdaptiveProfile) -> Self {
        Self::build_for_level(&profile.current_level)
    }

    pub fn build_for_level(level: &Level) -> Self {
        // A raw level string must not smuggle in a slot
        let label = level.label().trim().replace(['{', '}'], "").to_uppercase();

        let system = format!(
            "{PERSONA}\n\n\
             Your current student is a **{label}** learner.\n\
             Your **primary adaptive instruction** is: {style}\n\n\
             {MANDATE}\n\n\
             RAG CONTEXT:\n{{context}}\n\n\
             CHAT HISTORY:\n{{chat_history}}",
            style = teaching_style(level),
        );

        Self {
            system,
            human: "QUESTION: {question}".to_string(),
        }
    }

    /// The unfilled system section.
    pub fn system(&self) -> &str {
        &self.system
    }

    /// The unfilled human section.
    pub fn human(&self) -> &str {
        &self.human
    }

    /// Fill the slots and return the system and user messages.
    ///
    /// Values are inserted in one pass, so text inside a value that looks
    /// like a slot is left as is.
    pub fn render(&self, context: &str, chat_history: &str, question: &str) -> Vec<Message> {
        let slots = [("context", context), ("chat_history", chat_history), ("question", question)];
        vec![
            Message::system(fill(&self.system, &slots)),
            Message::user(fill(&self.human, &slots)),
        ]
    }
}

/// Replace each `{name}` in `template` with its value. Unknown names and
/// unmatched braces are copied through.
fn fill(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            slots
                .iter()
                .find(|(slot, _)| *slot == name)
                .map(|(_, value)| (*value, close))
        });

        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pycoach_core::message::Role;

    #[test]
    fn style_is_selected_by_level() {
        assert!(teaching_style(&Level::Beginner).contains("extremely simple"));
        assert!(teaching_style(&Level::Intermediate).contains("error tracing"));
        assert!(teaching_style(&Level::Expert).contains("Python internals"));
    }

    #[test]
    fn unknown_level_gets_fallback_style() {
        let level = Level::parse("Wizard");
        assert_eq!(teaching_style(&level), FALLBACK_STYLE);

        let template = PromptTemplate::build_for_level(&level);
        assert!(template.system().contains("**WIZARD** learner"));
        assert!(template.system().contains(FALLBACK_STYLE));
    }

    #[test]
    fn mandate_present_for_every_level() {
        for level in Level::KNOWN.iter().cloned().chain([Level::Unknown("guru".into())]) {
            let template = PromptTemplate::build_for_level(&level);
            assert!(template.system().contains(MANDATE), "missing mandate for {level}");
            assert!(template.system().starts_with(PERSONA));
        }
    }

    #[test]
    fn build_uses_profile_level() {
        let mut profile = AdaptiveProfile::new("u1");
        profile.set_level(Level::Expert);
        let template = PromptTemplate::build(&profile);
        assert!(template.system().contains("**EXPERT** learner"));
        assert!(template.system().contains("highly concise"));
    }

    #[test]
    fn render_fills_every_slot() {
        let template = PromptTemplate::build_for_level(&Level::Beginner);
        let messages = template.render("Lists are mutable.", "Human: hi\nAI: hello", "What is a list?");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.ends_with(
            "RAG CONTEXT:\nLists are mutable.\n\nCHAT HISTORY:\nHuman: hi\nAI: hello"
        ));
        assert!(!messages[0].content.contains("{context}"));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "QUESTION: What is a list?");
    }

    #[test]
    fn slot_text_inside_values_is_not_expanded() {
        let template = PromptTemplate::build_for_level(&Level::Beginner);
        let messages = template.render("use {question} here", "", "print({x})");
        assert!(messages[0].content.contains("use {question} here"));
        assert_eq!(messages[1].content, "QUESTION: print({x})");
    }

    #[test]
    fn braces_in_raw_level_are_dropped() {
        let template = PromptTemplate::build_for_level(&Level::Unknown("{question}".into()));
        let messages = template.render("ctx", "", "q");
        assert!(messages[0].content.contains("**QUESTION** learner"));
    }

    #[test]
    fn fill_copies_unknown_and_unmatched_braces() {
        let slots = [("a", "1")];
        assert_eq!(fill("{a} {b} {", &slots), "1 {b} {");
        assert_eq!(fill("dict = {}", &slots), "dict = {}");
    }
}
