//! Prompt templates for the generative model.

/// Instruction prefix for retrieval-augmented chat answers.
const CHAT_SYSTEM_PROMPT: &str = "You are an intelligent AI assistant that answers questions \
based on the content of uploaded PDF documents. Always provide clear, concise, and accurate \
answers referencing only the information contained in the provided context. If the answer is \
not found in the context, politely say that the information is not available in the uploaded \
content. Avoid making up answers or providing unrelated information.";

/// Compose the chat prompt: instruction, retrieved chunk texts verbatim, then the question.
pub fn build_chat_prompt(query: &str, context_chunks: &[String]) -> String {
    let mut prompt = String::from(CHAT_SYSTEM_PROMPT);
    prompt.push_str("\n\nContext:\n");
    if context_chunks.is_empty() {
        prompt.push_str("(no relevant documents found)\n");
    } else {
        for (index, chunk) in context_chunks.iter().enumerate() {
            prompt.push_str(&format!("[{}] {}\n", index + 1, chunk));
        }
    }
    prompt.push_str("\nUser question: ");
    prompt.push_str(query);
    prompt
}

/// Compose the summarization prompt for a full document.
pub fn build_summary_prompt(document_text: &str) -> String {
    format!("Summarize the following PDF content clearly and concisely in depth:\n{document_text}")
}

/// Compose the flashcard-generation prompt for a full document.
pub fn build_flashcard_prompt(document_text: &str) -> String {
    format!(
        "You are a flashcard generator.\n\n\
         TASK:\n\
         From the given text, create exactly 10 flashcards.\n\n\
         FORMAT:\n\
         Return ONLY valid JSON. Do not include explanations, notes, or markdown formatting.\n\
         The JSON must be an array of objects with \"question\" and \"answer\".\n\n\
         Example:\n\
         [\n\
           {{ \"question\": \"What is photosynthesis?\", \"answer\": \"The process by which plants make food using sunlight.\" }},\n\
           {{ \"question\": \"Who discovered gravity?\", \"answer\": \"Sir Isaac Newton\" }}\n\
         ]\n\n\
         CONTENT:\n\
         {document_text}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_prompt_includes_chunks_verbatim() {
        let chunks = vec![
            "Mitochondria are the powerhouse of the cell.".to_string(),
            "Ribosomes synthesize proteins.".to_string(),
        ];
        let prompt = build_chat_prompt("What do ribosomes do?", &chunks);

        for chunk in &chunks {
            assert!(prompt.contains(chunk.as_str()), "chunk missing: {chunk}");
        }
        assert!(prompt.contains("User question: What do ribosomes do?"));
    }

    #[test]
    fn chat_prompt_handles_empty_context() {
        let prompt = build_chat_prompt("Anything?", &[]);
        assert!(prompt.contains("(no relevant documents found)"));
        assert!(prompt.contains("not available"));
    }

    #[test]
    fn flashcard_prompt_embeds_document() {
        let prompt = build_flashcard_prompt("The French Revolution began in 1789.");
        assert!(prompt.contains("exactly 10 flashcards"));
        assert!(prompt.contains("The French Revolution began in 1789."));
    }
}
