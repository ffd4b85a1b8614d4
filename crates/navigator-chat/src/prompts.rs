//! Prompt templates for the retrieval pipeline.

use navigator_store::RetrievedDocument;

use crate::types::{ChatMessage, Role};

pub const CONDENSE_QUESTION_TEMPLATE: &str = "Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question, in its original language.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:";

pub const ANSWER_TEMPLATE: &str = "Answer the question based only on the following context:
{context}

Question: {question}

If the context doesn't directly mention \"GymNavigator\", you can still provide information about gym management systems based on what's available in the context.
Make sure your answer is helpful and indicates it's based on the information provided.
";

/// Render prior turns as `Human:` / `Assistant:` / `<role>:` lines.
pub fn format_chat_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|message| match &message.role {
            Role::User => format!("Human: {}", message.content),
            Role::Assistant => format!("Assistant: {}", message.content),
            other => format!("{}: {}", other.as_str(), message.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join retrieved document contents into a single context string.
pub fn combine_documents(documents: &[RetrievedDocument]) -> String {
    documents
        .iter()
        .map(|doc| doc.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_condense_prompt(chat_history: &str, question: &str) -> String {
    render(
        CONDENSE_QUESTION_TEMPLATE,
        &[("chat_history", chat_history), ("question", question)],
    )
}

pub fn render_answer_prompt(context: &str, question: &str) -> String {
    render(ANSWER_TEMPLATE, &[("context", context), ("question", question)])
}

/// Single-pass `{name}` substitution. Substituted values are never re-scanned,
/// so braces inside user text survive untouched.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let replaced = after.find('}').and_then(|end| {
            let name = &after[..end];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, end))
        });
        match replaced {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
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
