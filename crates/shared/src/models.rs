use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationState {
    Pending,
    Done,
    Failed,
}

/// A Hacker News item as returned by the item endpoint, plus the translation
/// fields attached locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "by", default)]
    pub author: String,
    #[serde(rename = "time", default)]
    pub created_at: i64,
    #[serde(default)]
    pub score: i64,
    #[serde(rename = "descendants", default, skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<u32>,
    #[serde(rename = "kids", default, skip_serializing_if = "Option::is_none")]
    pub child_ids: Option<Vec<u64>>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(skip)]
    pub translated_title: Option<String>,
    #[serde(skip)]
    pub translation_state: Option<TranslationState>,
}

impl Story {
    /// A story worth listing: kind "story" with an external link.
    pub fn is_link_story(&self) -> bool {
        self.kind == "story" && self.url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Host of the external link without a leading `www.`.
    pub fn domain(&self) -> Option<String> {
        let url = Url::parse(self.url.as_deref()?).ok()?;
        let host = url.host_str()?;
        Some(host.strip_prefix("www.").unwrap_or(host).to_string())
    }

    /// Title to show: the translation when there is one.
    pub fn display_title(&self) -> &str {
        self.translated_title.as_deref().unwrap_or(&self.title)
    }

    /// Compact age such as `5m`, `3h` or `2d`.
    pub fn time_ago(&self, now: DateTime<Utc>) -> String {
        let seconds = (now.timestamp() - self.created_at).max(0);

        const UNITS: [(i64, &str); 5] = [
            (31_536_000, "y"),
            (2_592_000, "mo"),
            (86_400, "d"),
            (3_600, "h"),
            (60, "m"),
        ];

        for (size, suffix) in UNITS {
            if seconds > size {
                return format!("{}{}", seconds / size, suffix);
            }
        }

        format!("{}s", seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub id: u64,
    pub translated_title: String,
}

/// Structured summary of an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub tldr: String,
    pub key_points: Vec<String>,
    pub analysis: String,
}
