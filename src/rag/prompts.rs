//! Prompt construction for grounded answer generation.

/// Fixed system instruction for every generation request.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions based on the provided context.";

/// Build the user turn embedding both the assembled context and the
/// question.
pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!(
        "Context information is below:\n\
         {context}\n\n\
         Given the context information and no prior knowledge, answer the following question:\n\
         {question}\n\n\
         Only if the answer cannot be found in the context, say \"I don't have enough \
         information to answer this question.\" Otherwise give as much relevant detail as \
         possible and break the answer into natural paragraphs."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_embeds_context_and_question() {
        let prompt = build_user_prompt("the context block", "the question?");
        assert!(prompt.contains("the context block"));
        assert!(prompt.contains("the question?"));
        // Context comes before the question.
        assert!(prompt.find("the context block").unwrap() < prompt.find("the question?").unwrap());
    }
}
