//! Caller-side state for the story feed: batch paging, translation
//! bookkeeping and stale-completion detection.

use std::fmt;

use crate::hn::HackerNewsClient;
use crate::models::{ArticleSummary, Story, TranslationResult, TranslationState};
use crate::settings::AppSettings;
use crate::summarizer::ArticleSummarizer;

pub const BATCH_SIZE: usize = 24;

/// Monotonic counter identifying the latest request of a kind. A completion
/// whose ticket is no longer current belongs to a superseded request.
#[derive(Debug, Default)]
pub struct RequestGeneration {
    current: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl RequestGeneration {
    pub fn begin(&mut self) -> Ticket {
        self.current += 1;
        Ticket(self.current)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.current
    }
}

/// Outcome of an operation still in flight or already settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Pending<T, E> {
    Loading,
    Ready(T),
    Failed(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFailure {
    NoExternalLink,
    Unavailable,
}

impl fmt::Display for SummaryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryFailure::NoExternalLink => {
                f.write_str("This story has no external link, so it cannot be summarized.")
            }
            SummaryFailure::Unavailable => {
                f.write_str("Could not get a summary right now. Please try again later.")
            }
        }
    }
}

/// Summarize `story` with the model and style from `settings`.
pub async fn request_summary(
    summarizer: &ArticleSummarizer,
    story: &Story,
    settings: &AppSettings,
    force_refresh: bool,
) -> Pending<ArticleSummary, SummaryFailure> {
    let url = match story.url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => url,
        None => return Pending::Failed(SummaryFailure::NoExternalLink),
    };

    match summarizer
        .summarize(
            url,
            &story.title,
            settings.summary_model,
            settings.translation_style,
            force_refresh,
        )
        .await
    {
        Some(summary) => Pending::Ready(summary),
        None => Pending::Failed(SummaryFailure::Unavailable),
    }
}

/// Ranked top stories, loaded one batch at a time.
#[derive(Debug)]
pub struct Feed {
    ids: Vec<u64>,
    stories: Vec<Story>,
    consumed: usize,
    batch_size: usize,
    translations: RequestGeneration,
}

impl Default for Feed {
    fn default() -> Self {
        Self::new(BATCH_SIZE)
    }
}

impl Feed {
    pub fn new(batch_size: usize) -> Self {
        Self {
            ids: Vec::new(),
            stories: Vec::new(),
            consumed: 0,
            batch_size: batch_size.max(1),
            translations: RequestGeneration::default(),
        }
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn total_ids(&self) -> usize {
        self.ids.len()
    }

    pub fn has_more(&self) -> bool {
        self.consumed < self.ids.len()
    }

    /// Fetch the ranked id list and the first batch, replacing any previous
    /// contents. Returns the loaded stories.
    pub async fn load_initial(&mut self, hn: &HackerNewsClient) -> &[Story] {
        self.ids = hn.list_top_story_ids().await;
        let end = self.batch_size.min(self.ids.len());
        self.stories = hn.resolve_stories(&self.ids[..end]).await;
        self.consumed = end;

        &self.stories
    }

    /// Resolve the next batch and append it. Returns only the new stories;
    /// empty when every id has been consumed.
    pub async fn load_more(&mut self, hn: &HackerNewsClient) -> &[Story] {
        if !self.has_more() {
            return &[];
        }

        let end = (self.consumed + self.batch_size).min(self.ids.len());
        let stories = hn.resolve_stories(&self.ids[self.consumed..end]).await;

        let start = self.stories.len();
        self.consumed = end;
        self.append(stories);
        &self.stories[start..]
    }

    fn append(&mut self, stories: Vec<Story>) {
        for story in stories {
            // A story can move up the ranking between batches
            if !self.stories.iter().any(|s| s.id == story.id) {
                self.stories.push(story);
            }
        }
    }

    /// Stories that need a translation pass, marked pending. With `force`,
    /// every loaded story; otherwise only those without a translation.
    pub fn stories_to_translate(&mut self, force: bool) -> (Ticket, Vec<Story>) {
        let ticket = self.translations.begin();
        let mut selected = Vec::new();

        for story in self.stories.iter_mut() {
            if force || story.translated_title.is_none() {
                story.translation_state = Some(TranslationState::Pending);
                selected.push(story.clone());
            }
        }

        (ticket, selected)
    }

    /// Mark one loaded story pending for a forced translation of its title
    /// alone. Starting it supersedes any pass still in flight. `None` when no
    /// loaded story has `id`.
    pub fn story_to_retranslate(&mut self, id: u64) -> Option<(Ticket, Story)> {
        let story = self.stories.iter_mut().find(|s| s.id == id)?;
        story.translation_state = Some(TranslationState::Pending);
        let story = story.clone();

        Some((self.translations.begin(), story))
    }

    /// Attach translations by id. Stories still pending afterwards are marked
    /// failed and keep their original title. Returns false, changing nothing,
    /// when `ticket` was superseded by a newer translation pass.
    pub fn apply_translations(&mut self, ticket: Ticket, results: &[TranslationResult]) -> bool {
        if !self.translations.is_current(ticket) {
            tracing::debug!("discarding translations from a superseded request");
            return false;
        }

        for result in results {
            if let Some(story) = self.stories.iter_mut().find(|s| s.id == result.id) {
                story.translated_title = Some(result.translated_title.clone());
                story.translation_state = Some(TranslationState::Done);
            }
        }

        for story in self.stories.iter_mut() {
            if story.translation_state == Some(TranslationState::Pending) {
                story.translation_state = Some(TranslationState::Failed);
            }
        }

        true
    }
}
