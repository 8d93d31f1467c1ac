use serde::Serialize;
use std::collections::HashSet;

use crate::cache::{title_key, Cache};
use crate::error::ServiceError;
use crate::gemini::GeminiClient;
use crate::models::{Story, TranslationResult};
use crate::settings::{SummaryModel, TranslationStyle};

#[derive(Serialize)]
struct TitleToTranslate<'a> {
    id: u64,
    title: &'a str,
}

fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "NUMBER" },
                "translatedTitle": { "type": "STRING" }
            },
            "required": ["id", "translatedTitle"]
        }
    })
}

/// Batches title translations, serving what it can from the cache.
pub struct TitleTranslator {
    gemini: GeminiClient,
    cache: Cache,
}

impl TitleTranslator {
    pub fn new(gemini: GeminiClient, cache: Cache) -> Self {
        Self { gemini, cache }
    }

    /// Translate the titles of `stories` into Chinese. Cached titles are
    /// returned as-is unless `force_refresh` is set; the rest go out in one
    /// request. Ids the model leaves out are simply missing from the result.
    pub async fn translate(
        &self,
        stories: &[Story],
        style: TranslationStyle,
        force_refresh: bool,
    ) -> Vec<TranslationResult> {
        let mut results = Vec::new();
        let mut to_translate = Vec::new();

        for story in stories {
            let cached = if force_refresh {
                None
            } else {
                self.cache
                    .get::<String>(&title_key(story.id, style))
                    .filter(|title| !title.is_empty())
            };

            match cached {
                Some(translated_title) => results.push(TranslationResult {
                    id: story.id,
                    translated_title,
                }),
                None => to_translate.push(TitleToTranslate {
                    id: story.id,
                    title: &story.title,
                }),
            }
        }

        if to_translate.is_empty() {
            return results;
        }

        if !self.gemini.has_api_key() {
            tracing::warn!(
                pending = to_translate.len(),
                "no Gemini API key, returning cached titles only"
            );
            return results;
        }

        match self.request_translations(&to_translate, style).await {
            Ok(fresh) => {
                tracing::debug!(
                    requested = to_translate.len(),
                    received = fresh.len(),
                    style = %style,
                    "translated titles"
                );
                for translation in fresh {
                    self.cache
                        .set(&title_key(translation.id, style), &translation.translated_title);
                    results.push(translation);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, style = %style, "translation error");
            }
        }

        results
    }

    async fn request_translations(
        &self,
        batch: &[TitleToTranslate<'_>],
        style: TranslationStyle,
    ) -> Result<Vec<TranslationResult>, ServiceError> {
        let input = serde_json::to_string(batch)?;
        let prompt = format!(
            r#"Translate the following Hacker News titles from English to Chinese (Simplified).
Style Guide: {}

Return a JSON array where each object has the original 'id' and the 'translatedTitle'.

Input Data:
{}"#,
            style.instruction(),
            input
        );

        let text = self
            .gemini
            .generate_structured(SummaryModel::Flash.as_str(), &prompt, &response_schema())
            .await?;

        let requested: HashSet<u64> = batch.iter().map(|t| t.id).collect();
        parse_translations(&text, &requested)
    }
}

/// Validate the model's answer element by element. Malformed entries and ids
/// that were not asked for are skipped rather than failing the batch.
fn parse_translations(
    text: &str,
    requested: &HashSet<u64>,
) -> Result<Vec<TranslationResult>, ServiceError> {
    let value: serde_json::Value = serde_json::from_str(text.trim())?;
    let items = value
        .as_array()
        .ok_or_else(|| ServiceError::Validation("expected a JSON array".to_string()))?;

    let mut seen = HashSet::new();
    let mut translations = Vec::with_capacity(items.len());

    for item in items {
        // Schema says NUMBER, so 5 and 5.0 both show up
        let id = item.get("id").and_then(|id| {
            id.as_u64().or_else(|| {
                id.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
        });
        let title = item
            .get("translatedTitle")
            .and_then(|t| t.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match (id, title) {
            (Some(id), Some(title)) if requested.contains(&id) && seen.insert(id) => {
                translations.push(TranslationResult {
                    id,
                    translated_title: title.to_string(),
                });
            }
            _ => tracing::debug!(item = %item, "skipping translation entry"),
        }
    }

    Ok(translations)
}
