use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Register used when translating titles and writing summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStyle {
    #[default]
    Tech,
    Concise,
    Professional,
    Fun,
}

impl TranslationStyle {
    pub const ALL: [TranslationStyle; 4] = [
        TranslationStyle::Tech,
        TranslationStyle::Concise,
        TranslationStyle::Professional,
        TranslationStyle::Fun,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationStyle::Tech => "tech",
            TranslationStyle::Concise => "concise",
            TranslationStyle::Professional => "professional",
            TranslationStyle::Fun => "fun",
        }
    }

    /// Prompt fragment describing the register.
    pub fn instruction(&self) -> &'static str {
        match self {
            TranslationStyle::Concise => {
                "Translate strictly and concisely. Remove unnecessary words. Keep it short."
            }
            TranslationStyle::Professional => {
                "Use formal, professional Chinese (Business/Academic tone)."
            }
            TranslationStyle::Fun => {
                "Translate in a witty, engaging, slightly clickbaity style suitable for social media."
            }
            TranslationStyle::Tech => {
                "Keep technical terms in English (e.g., LLM, Rust, CI/CD). Use standard terminology used by Chinese developers."
            }
        }
    }
}

impl fmt::Display for TranslationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranslationStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        TranslationStyle::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid style: {}. Use 'tech', 'concise', 'professional', or 'fun'",
                    s
                )
            })
    }
}

/// Gemini model used for summaries. Titles are always translated with the
/// fast tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SummaryModel {
    #[default]
    #[serde(rename = "gemini-2.5-flash")]
    Flash,
    #[serde(rename = "gemini-3-pro-preview")]
    Pro,
}

impl SummaryModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryModel::Flash => "gemini-2.5-flash",
            SummaryModel::Pro => "gemini-3-pro-preview",
        }
    }
}

impl fmt::Display for SummaryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "flash" | "fast" | "gemini-2.5-flash" => Ok(SummaryModel::Flash),
            "pro" | "advanced" | "gemini-3-pro-preview" => Ok(SummaryModel::Pro),
            _ => anyhow::bail!("Invalid model: {}. Use 'flash' or 'pro'", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// ANSI color for story titles.
    pub fn title_color(&self) -> &'static str {
        match self {
            Theme::Light => "\x1b[34m",
            Theme::Dark => "\x1b[96m",
        }
    }

    /// ANSI color for secondary text.
    pub fn muted_color(&self) -> &'static str {
        match self {
            Theme::Light => "\x1b[90m",
            Theme::Dark => "\x1b[37m",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => anyhow::bail!("Invalid theme: {}. Use 'light' or 'dark'", s),
        }
    }
}

/// User-editable settings, persisted whole on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub translation_style: TranslationStyle,
    pub summary_model: SummaryModel,
    pub theme: Theme,
}

impl AppSettings {
    /// Default location of the settings file.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(config_dir.join("hn-digest").join("settings.json"))
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// cannot be read.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let parsed = fs::read_to_string(path)
            .context("Failed to read settings file")
            .and_then(|content| {
                serde_json::from_str(&content).context("Failed to parse settings file")
            });

        match parsed {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "using default settings");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;

        Ok(())
    }

    /// Whether moving to `next` invalidates the titles currently shown.
    pub fn requires_retranslation(&self, next: &AppSettings) -> bool {
        self.translation_style != next.translation_style
    }
}
