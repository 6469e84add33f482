//! Produces up to three contextual follow-up questions from the query,
//! answer, and top cards (§4.7). A small LLM call plus a Jaccard-similarity
//! dedupe pass, grounded on the classifier's "single structured call, strict
//! parse-or-fallback" shape.

use std::collections::HashSet;

use chorus_core::{ChatMessage, ChatProvider};
use serde::Deserialize;

use crate::config::EngineConfig;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "of", "in", "on", "at", "to",
    "for", "and", "or", "with", "what", "how", "why", "does", "do", "can", "i", "you",
];

#[derive(Debug, Deserialize)]
struct FollowupPayload {
    #[serde(default)]
    suggestions: Vec<String>,
}

fn extract_json_array_or_object(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let open = text.as_bytes()[start];
    let close = if open == b'{' { b'}' } else { b']' };
    let mut depth = 0i32;
    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        if *byte == open {
            depth += 1;
        } else if *byte == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start..start + offset + 1]);
            }
        }
    }
    None
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Drop suggestions that are near-duplicates of an earlier one (Jaccard
/// similarity over stopword-stripped tokens above `threshold`), then cap at
/// `max`.
pub fn dedupe(suggestions: Vec<String>, threshold: f64, max: usize) -> Vec<String> {
    let mut kept: Vec<(String, HashSet<String>)> = Vec::new();
    for suggestion in suggestions {
        let tokens = tokenize(&suggestion);
        let is_duplicate = kept.iter().any(|(_, existing)| jaccard(existing, &tokens) > threshold);
        if !is_duplicate {
            kept.push((suggestion, tokens));
        }
        if kept.len() >= max {
            break;
        }
    }
    kept.into_iter().map(|(s, _)| s).collect()
}

fn system_prompt() -> &'static str {
    "You suggest up to three natural follow-up questions a user might ask next, given \
     their query, the answer they received, and any result cards shown. Respond with a \
     single JSON object: {\"suggestions\": [string, ...]}. JSON only, no prose."
}

/// Generate follow-ups for `query`/`answer`/`cards`. Returns `[]` on any LLM
/// or parse failure rather than propagating (§4.7).
pub async fn generate(
    provider: &dyn ChatProvider,
    query: &str,
    answer: &str,
    cards: &[serde_json::Value],
    config: &EngineConfig,
) -> Vec<String> {
    let cards_summary = cards
        .iter()
        .take(5)
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("\n");

    let user_prompt = format!("Query: {query}\n\nAnswer: {answer}\n\nCards:\n{cards_summary}");
    let messages = vec![ChatMessage::system(system_prompt()), ChatMessage::user(user_prompt)];

    let response = match provider.chat(&messages).await {
        Ok(r) => r,
        Err(err) => {
            tracing::warn!(error = %err, "follow-up generation llm call failed");
            return Vec::new();
        }
    };

    let Some(text) = response.text() else { return Vec::new() };
    let Some(json) = extract_json_array_or_object(&text) else { return Vec::new() };

    let suggestions = if json.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<String>>(json).unwrap_or_default()
    } else {
        serde_json::from_str::<FollowupPayload>(json).map(|p| p.suggestions).unwrap_or_default()
    };

    dedupe(suggestions, config.followup_dedupe_threshold, config.max_followups)
}
