// Public modules
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod gemini;
pub mod hn;
pub mod models;
pub mod settings;
pub mod summarizer;
pub mod translator;

// Re-export commonly used types
pub use cache::{Cache, KeyValueStore, MemoryStore, SqliteStore};
pub use config::Config;
pub use error::{ServiceError, StoreError};
pub use feed::{request_summary, Feed, Pending, RequestGeneration, SummaryFailure, Ticket};
pub use gemini::GeminiClient;
pub use hn::HackerNewsClient;
pub use models::{ArticleSummary, Story, TranslationResult, TranslationState};
pub use settings::{AppSettings, SummaryModel, Theme, TranslationStyle};
pub use summarizer::ArticleSummarizer;
pub use translator::TitleTranslator;
