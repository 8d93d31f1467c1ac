use crate::cache::{summary_key, Cache};
use crate::error::ServiceError;
use crate::gemini::GeminiClient;
use crate::models::ArticleSummary;
use crate::settings::{SummaryModel, TranslationStyle};

const MAX_KEY_POINTS: usize = 5;

/// Produces grounded article summaries, cached per (url, model, style).
pub struct ArticleSummarizer {
    gemini: GeminiClient,
    cache: Cache,
}

impl ArticleSummarizer {
    pub fn new(gemini: GeminiClient, cache: Cache) -> Self {
        Self { gemini, cache }
    }

    /// Summarize the article at `url`. Returns `None` when the summary cannot
    /// be produced; a partially filled summary is never returned.
    pub async fn summarize(
        &self,
        url: &str,
        title: &str,
        model: SummaryModel,
        style: TranslationStyle,
        force_refresh: bool,
    ) -> Option<ArticleSummary> {
        let cache_key = summary_key(url, model, style);

        if !force_refresh {
            let cached = self
                .cache
                .get::<serde_json::Value>(&cache_key)
                .and_then(|value| validate_summary(value).ok());
            if let Some(summary) = cached {
                tracing::debug!(url, "summary served from cache");
                return Some(summary);
            }
        }

        if !self.gemini.has_api_key() {
            tracing::warn!(url, "no Gemini API key, cannot summarize");
            return None;
        }

        match self.request_summary(url, title, model, style).await {
            Ok(summary) => {
                self.cache.set(&cache_key, &summary);
                Some(summary)
            }
            Err(e) => {
                tracing::error!(url, model = %model, error = %e, "summary error");
                None
            }
        }
    }

    async fn request_summary(
        &self,
        url: &str,
        title: &str,
        model: SummaryModel,
        style: TranslationStyle,
    ) -> Result<ArticleSummary, ServiceError> {
        // Search grounding rules out a response schema, so the shape is
        // spelled out in the prompt and checked on the way back.
        let prompt = format!(
            r#"Analyze the following article from the link provided:
Title: {title}
URL: {url}

Provide a structured summary in Chinese (Simplified).
Style: {style}

If you cannot access the content directly, use the Google Search tool to find information about this specific article/topic.

Output ONLY valid JSON without Markdown code blocks.
Format:
{{
  "tldr": "A single, powerful sentence summarizing the core value or news. Make it catchy.",
  "keyPoints": ["Key point 1", "Key point 2", "Key point 3 (Max 5 points)"],
  "analysis": "A short paragraph (approx 100 words) explaining the background, significance, or technical details."
}}"#,
            title = title,
            url = url,
            style = style.instruction(),
        );

        let text = self.gemini.generate_grounded(model.as_str(), &prompt).await?;
        parse_summary(&text)
    }
}

/// Remove a surrounding Markdown code fence, with or without a language tag.
pub fn strip_code_fences(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        body = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }

    body.trim()
}

/// Parse model output into a summary, rejecting anything incomplete.
pub fn parse_summary(text: &str) -> Result<ArticleSummary, ServiceError> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fences(text))?;
    validate_summary(value)
}

fn validate_summary(value: serde_json::Value) -> Result<ArticleSummary, ServiceError> {
    let non_empty_str = |field: &str| -> Result<String, ServiceError> {
        value
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Validation(format!("missing or empty '{}'", field)))
    };

    let tldr = non_empty_str("tldr")?;
    let analysis = non_empty_str("analysis")?;

    let points = value
        .get("keyPoints")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ServiceError::Validation("'keyPoints' must be a list".to_string()))?;

    let key_points = points
        .iter()
        .map(|p| {
            p.as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| ServiceError::Validation("'keyPoints' must hold strings".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|p| !p.is_empty())
        .take(MAX_KEY_POINTS)
        .collect();

    Ok(ArticleSummary {
        tldr,
        key_points,
        analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{response_body, test_client};
    use mockito::{Matcher, Server};

    const FLASH_ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash:generateContent";
    const URL: &str = "https://example.com/post";

    const VALID: &str = r#"{"tldr":"一句话","keyPoints":["要点一","要点二"],"analysis":"分析"}"#;

    #[test]
    fn strips_fences_with_and_without_tag() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn parses_fenced_summary() {
        let text = format!("```json\n{}\n```", VALID);
        let summary = parse_summary(&text).unwrap();
        assert_eq!(summary.tldr, "一句话");
        assert_eq!(summary.key_points, vec!["要点一", "要点二"]);
        assert_eq!(summary.analysis, "分析");
    }

    #[test]
    fn rejects_missing_or_malformed_fields() {
        let missing_points = r#"{"tldr":"t","analysis":"a"}"#;
        assert!(matches!(
            parse_summary(missing_points),
            Err(ServiceError::Validation(_))
        ));

        let points_not_list = r#"{"tldr":"t","keyPoints":"one","analysis":"a"}"#;
        assert!(parse_summary(points_not_list).is_err());

        let empty_tldr = r#"{"tldr":"","keyPoints":[],"analysis":"a"}"#;
        assert!(parse_summary(empty_tldr).is_err());

        assert!(matches!(parse_summary("not json"), Err(ServiceError::Parse(_))));
    }

    #[test]
    fn caps_key_points_at_five() {
        let text = r#"{"tldr":"t","keyPoints":["1","2","3","4","5","6","7"],"analysis":"a"}"#;
        assert_eq!(parse_summary(text).unwrap().key_points.len(), 5);
    }

    #[tokio::test]
    async fn summarizes_with_grounding_and_caches() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", FLASH_ENDPOINT)
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(serde_json::json!({ "tools": [ { "google_search": {} } ] })),
                Matcher::Regex("https://example.com/post".to_string()),
            ]))
            .with_status(200)
            .with_body(response_body(&format!("```json\n{}\n```", VALID)))
            .expect(1)
            .create_async()
            .await;

        let cache = Cache::in_memory();
        let summarizer = ArticleSummarizer::new(test_client(&server), cache.clone());

        let first = summarizer
            .summarize(URL, "A post", SummaryModel::Flash, TranslationStyle::Tech, false)
            .await
            .unwrap();
        let second = summarizer
            .summarize(URL, "A post", SummaryModel::Flash, TranslationStyle::Tech, false)
            .await
            .unwrap();

        assert_eq!(first, second);
        let key = summary_key(URL, SummaryModel::Flash, TranslationStyle::Tech);
        assert_eq!(cache.get::<ArticleSummary>(&key), Some(first));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn urls_sharing_a_long_prefix_are_summarized_separately() {
        let first_url = "https://www.youtube.com/watch?v=AAAAAAAAAAA";
        let second_url = "https://www.youtube.com/watch?v=BBBBBBBBBBB";

        let mut server = Server::new_async().await;
        let first_mock = server
            .mock("POST", FLASH_ENDPOINT)
            .match_body(Matcher::Regex("AAAAAAAAAAA".to_string()))
            .with_status(200)
            .with_body(response_body(
                r#"{"tldr":"about rust","keyPoints":[],"analysis":"a"}"#,
            ))
            .expect(1)
            .create_async()
            .await;
        let second_mock = server
            .mock("POST", FLASH_ENDPOINT)
            .match_body(Matcher::Regex("BBBBBBBBBBB".to_string()))
            .with_status(200)
            .with_body(response_body(
                r#"{"tldr":"about go","keyPoints":[],"analysis":"b"}"#,
            ))
            .expect(1)
            .create_async()
            .await;

        let summarizer = ArticleSummarizer::new(test_client(&server), Cache::in_memory());
        let first = summarizer
            .summarize(first_url, "Rust talk", SummaryModel::Flash, TranslationStyle::Tech, false)
            .await
            .unwrap();
        let second = summarizer
            .summarize(second_url, "Go talk", SummaryModel::Flash, TranslationStyle::Tech, false)
            .await
            .unwrap();

        assert_eq!(first.tldr, "about rust");
        assert_eq!(second.tldr, "about go");
        first_mock.assert_async().await;
        second_mock.assert_async().await;
    }

    #[tokio::test]
    async fn force_refresh_bypasses_cache() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", FLASH_ENDPOINT)
            .with_status(200)
            .with_body(response_body(VALID))
            .expect(2)
            .create_async()
            .await;

        let summarizer = ArticleSummarizer::new(test_client(&server), Cache::in_memory());
        for _ in 0..2 {
            assert!(summarizer
                .summarize(URL, "A post", SummaryModel::Flash, TranslationStyle::Tech, true)
                .await
                .is_some());
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn model_and_style_are_part_of_the_key() {
        let mut server = Server::new_async().await;
        let flash = server
            .mock("POST", FLASH_ENDPOINT)
            .with_status(200)
            .with_body(response_body(VALID))
            .expect(2)
            .create_async()
            .await;
        let pro = server
            .mock("POST", "/v1beta/models/gemini-3-pro-preview:generateContent")
            .with_status(200)
            .with_body(response_body(VALID))
            .expect(1)
            .create_async()
            .await;

        let summarizer = ArticleSummarizer::new(test_client(&server), Cache::in_memory());
        summarizer
            .summarize(URL, "t", SummaryModel::Flash, TranslationStyle::Tech, false)
            .await;
        summarizer
            .summarize(URL, "t", SummaryModel::Flash, TranslationStyle::Fun, false)
            .await;
        summarizer
            .summarize(URL, "t", SummaryModel::Pro, TranslationStyle::Tech, false)
            .await;

        flash.assert_async().await;
        pro.assert_async().await;
    }

    #[tokio::test]
    async fn invalid_response_yields_none_and_is_not_cached() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", FLASH_ENDPOINT)
            .with_status(200)
            .with_body(response_body(r#"{"tldr":"t","analysis":"a"}"#))
            .create_async()
            .await;

        let cache = Cache::in_memory();
        let summarizer = ArticleSummarizer::new(test_client(&server), cache.clone());
        let result = summarizer
            .summarize(URL, "t", SummaryModel::Flash, TranslationStyle::Tech, false)
            .await;

        assert!(result.is_none());
        let key = summary_key(URL, SummaryModel::Flash, TranslationStyle::Tech);
        assert!(cache.get::<serde_json::Value>(&key).is_none());
    }

    #[tokio::test]
    async fn transport_failure_yields_none() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", FLASH_ENDPOINT)
            .with_status(503)
            .create_async()
            .await;

        let summarizer = ArticleSummarizer::new(test_client(&server), Cache::in_memory());
        assert!(summarizer
            .summarize(URL, "t", SummaryModel::Flash, TranslationStyle::Tech, false)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn stale_invalid_cache_entry_is_refetched() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", FLASH_ENDPOINT)
            .with_status(200)
            .with_body(response_body(VALID))
            .expect(1)
            .create_async()
            .await;

        let cache = Cache::in_memory();
        let key = summary_key(URL, SummaryModel::Flash, TranslationStyle::Tech);
        cache.set(&key, &serde_json::json!({ "tldr": "old" }));

        let summarizer = ArticleSummarizer::new(test_client(&server), cache);
        assert!(summarizer
            .summarize(URL, "t", SummaryModel::Flash, TranslationStyle::Tech, false)
            .await
            .is_some());
        mock.assert_async().await;
    }
}
