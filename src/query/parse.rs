//! Tolerant parsing of model output.
//!
//! Models frequently wrap JSON in markdown fences or surround it with prose. Rather than
//! string-slicing fence markers, scan for the first position where a complete JSON array or
//! object can be deserialized and take that value.

use crate::query::Flashcard;
use serde_json::Value;

/// Extract the first complete JSON array or object embedded in `text`.
pub fn first_json_value(text: &str) -> Option<Value> {
    for (index, ch) in text.char_indices() {
        if ch == '[' || ch == '{' {
            let mut stream = serde_json::Deserializer::from_str(&text[index..]).into_iter::<Value>();
            if let Some(Ok(value)) = stream.next() {
                return Some(value);
            }
        }
    }
    None
}

/// Parse flashcards out of raw model output, falling back to a single error card when the
/// output contains no usable JSON array.
pub fn parse_flashcards(raw: &str) -> Vec<Flashcard> {
    let parsed = first_json_value(raw)
        .and_then(|value| serde_json::from_value::<Vec<Flashcard>>(value).ok())
        .filter(|cards| !cards.is_empty());

    match parsed {
        Some(cards) => cards,
        None => {
            tracing::warn!(raw_len = raw.len(), "Model output did not parse as flashcards");
            vec![error_flashcard()]
        }
    }
}

/// Placeholder card substituted when the model output cannot be parsed.
pub fn error_flashcard() -> Flashcard {
    Flashcard {
        question: "Error parsing flashcards".to_string(),
        answer: "The response format was invalid. Please try again.".to_string(),
    }
}
