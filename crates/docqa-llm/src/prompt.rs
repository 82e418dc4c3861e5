/// "Stuff" prompt: every retrieved piece goes into one prompt ahead of the question.
pub const STUFF_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
{context}\n\nQuestion: {question}\nHelpful Answer:";

pub fn render_prompt(question: &str, context: &str) -> String {
    // context first so a `{question}` inside retrieved text is never substituted
    let (head, tail) = STUFF_TEMPLATE.split_once("{context}").unwrap_or((STUFF_TEMPLATE, ""));
    format!("{head}{context}{}", tail.replace("{question}", question))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_both_slots() {
        let p = render_prompt("Who wrote it?", "Alice wrote it.");
        assert!(p.starts_with("Use the following pieces of context"));
        assert!(p.contains("\n\nAlice wrote it.\n\nQuestion: Who wrote it?\nHelpful Answer:"));
    }

    #[test]
    fn placeholders_in_context_are_left_alone() {
        let p = render_prompt("q", "literal {question} here");
        assert!(p.contains("literal {question} here"));
        assert!(p.ends_with("Question: q\nHelpful Answer:"));
    }
}
