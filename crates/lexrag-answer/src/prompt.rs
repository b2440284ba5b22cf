/// Returned instead of an answer when retrieval finds nothing usable.
pub const NOT_FOUND_MESSAGE: &str =
    "Sorry, I couldn't find relevant legal information in the provided context.";

const SYSTEM_PROMPT: &str = "\
You are a legal assistant. Use **only** the provided context to answer the user's question. \
If the context doesn't contain a direct answer, summarize what's relevant, and clearly state \
that the exact answer is not available.";

/// Build the system instruction constraining answers to the context.
///
/// # Examples
///
/// ```
/// use lexrag_answer::prompt::build_system_prompt;
///
/// let prompt = build_system_prompt();
/// assert!(prompt.contains("only"));
/// ```
pub fn build_system_prompt() -> String {
    SYSTEM_PROMPT.to_string()
}

/// Build the user turn from the retrieved context and the question.
///
/// # Examples
///
/// ```
/// use lexrag_answer::prompt::build_user_prompt;
///
/// let prompt = build_user_prompt("BNS Section: 303\n...", "What is theft?");
/// assert_eq!(prompt, "Context:\nBNS Section: 303\n...\n\nQuestion: What is theft?");
/// ```
pub fn build_user_prompt(context: &str, query: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_constrains_to_context() {
        let prompt = build_system_prompt();
        assert!(prompt.contains("legal assistant"));
        assert!(prompt.contains("provided context"));
        assert!(prompt.contains("not available"));
    }

    #[test]
    fn user_prompt_keeps_context_verbatim() {
        let context = "BNS Section: 69\nSubject: X\n\nbody\n\nBNS Section: 70\nSubject: Y\n\nmore";
        let prompt = build_user_prompt(context, "section 69?");
        assert!(prompt.starts_with("Context:\n"));
        assert!(prompt.contains(context));
        assert!(prompt.ends_with("\n\nQuestion: section 69?"));
    }

    #[test]
    fn not_found_message_is_fixed() {
        assert_eq!(
            NOT_FOUND_MESSAGE,
            "Sorry, I couldn't find relevant legal information in the provided context."
        );
    }
}
