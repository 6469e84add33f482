//! Single LLM call mapping `{history, query, enabled_sources}` to an intent
//! structure. Stateless and purely functional: on parse failure, falls back
//! to "no widgets, no skip-search" rather than propagating an error, per
//! §4.2 and the error taxonomy in §7.

use chorus_core::{ChatMessage, ChatProvider};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WidgetFlags {
    #[serde(default)]
    pub show_weather_widget: bool,
    #[serde(default)]
    pub show_stock_widget: bool,
    #[serde(default)]
    pub show_calculation_widget: bool,
    #[serde(default)]
    pub show_product_widget: bool,
    #[serde(default)]
    pub show_hotel_widget: bool,
    #[serde(default)]
    pub show_place_widget: bool,
    #[serde(default)]
    pub show_movie_widget: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    #[serde(default)]
    pub skip_search: bool,
    #[serde(default)]
    pub academic_search: bool,
    #[serde(default)]
    pub personal_search: bool,
    #[serde(flatten)]
    pub widgets: WidgetFlags,
}

impl Classification {
    pub fn any_widget_enabled(&self) -> bool {
        let w = &self.widgets;
        w.show_weather_widget
            || w.show_stock_widget
            || w.show_calculation_widget
            || w.show_product_widget
            || w.show_hotel_widget
            || w.show_place_widget
            || w.show_movie_widget
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub standalone_follow_up: String,
    pub classification: Classification,
}

impl ClassificationResult {
    /// The fallback used when the LLM output cannot be parsed: no skip,
    /// every widget off, standalone question equal to the raw query.
    fn fallback(query: &str) -> Self {
        Self {
            standalone_follow_up: query.to_string(),
            classification: Classification {
                skip_search: false,
                academic_search: false,
                personal_search: false,
                widgets: WidgetFlags::default(),
            },
        }
    }
}

fn system_prompt(enabled_sources: &[String]) -> String {
    format!(
        "You are a query classifier for a retrieval system. Given the conversation \
         history and the latest user message, rewrite it as a standalone question and \
         decide whether web search can be skipped and which domain widgets apply. \
         Enabled sources: {}. Respond with a single JSON object matching: \
         {{\"standaloneFollowUp\": string, \"classification\": {{\"skipSearch\": bool, \
         \"academicSearch\": bool, \"personalSearch\": bool, \"showWeatherWidget\": bool, \
         \"showStockWidget\": bool, \"showCalculationWidget\": bool, \"showProductWidget\": bool, \
         \"showHotelWidget\": bool, \"showPlaceWidget\": bool, \"showMovieWidget\": bool}}}}. \
         Respond with JSON only, no prose.",
        enabled_sources.join(", ")
    )
}

/// Extract the first top-level JSON object from `text`, tolerating
/// surrounding prose or markdown code fences a model might add despite
/// instructions.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

pub async fn classify(
    provider: &dyn ChatProvider,
    history: &[ChatMessage],
    query: &str,
    enabled_sources: &[String],
) -> ClassificationResult {
    let mut messages = vec![ChatMessage::system(system_prompt(enabled_sources))];
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(query));

    let response = match provider.chat(&messages).await {
        Ok(r) => r,
        Err(err) => {
            tracing::warn!(error = %err, "classifier llm call failed, falling back");
            return ClassificationResult::fallback(query);
        }
    };

    let Some(text) = response.text() else {
        tracing::warn!("classifier returned no text, falling back");
        return ClassificationResult::fallback(query);
    };

    let Some(json) = extract_json_object(&text) else {
        tracing::warn!("classifier output contained no JSON object, falling back");
        return ClassificationResult::fallback(query);
    };

    match serde_json::from_str::<ClassificationResult>(json) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(error = %err, "classifier output failed to parse, falling back");
            ClassificationResult::fallback(query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::providers::{MockProvider, ScriptedTurn};

    #[tokio::test]
    async fn well_formed_json_is_parsed() {
        let json = r#"{"standaloneFollowUp":"What hotels are near Shibuya?","classification":{"skipSearch":false,"academicSearch":false,"personalSearch":false,"showWeatherWidget":false,"showStockWidget":false,"showCalculationWidget":false,"showProductWidget":false,"showHotelWidget":true,"showPlaceWidget":false,"showMovieWidget":false}}"#;
        let provider = MockProvider::new(vec![ScriptedTurn::Text(json.to_string())]);
        let result = classify(&provider, &[], "hotels near shibuya", &["web".to_string()]).await;
        assert!(result.classification.widgets.show_hotel_widget);
        assert_eq!(result.standalone_follow_up, "What hotels are near Shibuya?");
    }

    #[tokio::test]
    async fn malformed_output_falls_back_to_no_widgets() {
        let provider = MockProvider::new(vec![ScriptedTurn::Text("not json at all".to_string())]);
        let result = classify(&provider, &[], "define cosine similarity", &["web".to_string()]).await;
        assert!(!result.classification.any_widget_enabled());
        assert_eq!(result.standalone_follow_up, "define cosine similarity");
        assert!(!result.classification.skip_search);
    }

    #[tokio::test]
    async fn json_wrapped_in_prose_is_extracted() {
        let json = r#"Sure thing! {"standaloneFollowUp":"q","classification":{"skipSearch":true,"academicSearch":false,"personalSearch":false,"showWeatherWidget":false,"showStockWidget":false,"showCalculationWidget":false,"showProductWidget":false,"showHotelWidget":false,"showPlaceWidget":false,"showMovieWidget":false}} thanks"#;
        let provider = MockProvider::new(vec![ScriptedTurn::Text(json.to_string())]);
        let result = classify(&provider, &[], "q", &[]).await;
        assert!(result.classification.skip_search);
    }
}
