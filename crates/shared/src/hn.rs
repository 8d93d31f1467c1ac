use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::time::Duration;

use crate::config::Config;
use crate::error::ServiceError;
use crate::models::Story;

/// Client for the Hacker News Firebase API.
pub struct HackerNewsClient {
    client: Client,
    base_url: String,
    concurrency: usize,
    item_timeout: Duration,
}

impl HackerNewsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("hn-digest/0.1")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.hn_api_base.clone(),
            concurrency: config.fetch_concurrency.max(1),
            item_timeout: config.item_timeout,
        })
    }

    /// Ranked ids of the current top stories. Empty when the listing cannot
    /// be fetched.
    pub async fn list_top_story_ids(&self) -> Vec<u64> {
        match self.try_list_top_story_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch top story ids");
                Vec::new()
            }
        }
    }

    async fn try_list_top_story_ids(&self) -> Result<Vec<u64>, ServiceError> {
        let url = format!("{}/topstories.json", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Transport(format!(
                "top stories returned {}",
                status
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// A single item by id. `None` on any failure, including ids the API
    /// answers with `null`.
    pub async fn fetch_item(&self, id: u64) -> Option<Story> {
        match self.try_fetch_item(id).await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(id, error = %e, "failed to fetch item");
                None
            }
        }
    }

    async fn try_fetch_item(&self, id: u64) -> Result<Option<Story>, ServiceError> {
        let url = format!("{}/item/{}.json", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Transport(format!(
                "item {} returned {}",
                id, status
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn fetch_item_timed(&self, id: u64) -> Option<Story> {
        match tokio::time::timeout(self.item_timeout, self.fetch_item(id)).await {
            Ok(item) => item,
            Err(_) => {
                tracing::warn!(id, timeout = ?self.item_timeout, "item fetch timed out");
                None
            }
        }
    }

    /// Resolve ids to link stories, keeping the order of `ids`. Each id is
    /// fetched independently; failures and non-link items are dropped.
    pub async fn resolve_stories(&self, ids: &[u64]) -> Vec<Story> {
        let fetched: Vec<(usize, Option<Story>)> = stream::iter(ids.iter().copied().enumerate())
            .map(|(index, id)| async move { (index, self.fetch_item_timed(id).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        in_input_order(fetched)
            .into_iter()
            .filter(Story::is_link_story)
            .collect()
    }
}

/// Reassemble completions by their input index, dropping failed fetches.
fn in_input_order(mut fetched: Vec<(usize, Option<Story>)>) -> Vec<Story> {
    fetched.sort_by_key(|(index, _)| *index);
    fetched.into_iter().filter_map(|(_, story)| story).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use std::io::Write;
    use std::time::Instant;

    fn client_with(server: &Server, concurrency: usize, item_timeout: Duration) -> HackerNewsClient {
        let config = Config {
            hn_api_base: server.url(),
            fetch_concurrency: concurrency,
            item_timeout,
            ..Config::default()
        };
        HackerNewsClient::new(&config).unwrap()
    }

    fn client_for(server: &Server) -> HackerNewsClient {
        client_with(server, 3, Duration::from_secs(5))
    }

    fn story(id: u64, url: Option<&str>) -> String {
        let mut item = serde_json::json!({
            "id": id,
            "title": format!("Story {}", id),
            "by": "pg",
            "time": 1_700_000_000,
            "score": 10,
            "type": "story"
        });
        if let Some(url) = url {
            item["url"] = serde_json::json!(url);
        }
        item.to_string()
    }

    async fn mock_item(server: &mut Server, id: u64, status: usize, body: String) -> mockito::Mock {
        server
            .mock("GET", format!("/item/{}.json", id).as_str())
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    async fn mock_slow_item(server: &mut Server, id: u64, delay: Duration) -> mockito::Mock {
        let body = story(id, Some("https://slow.example"));
        server
            .mock("GET", format!("/item/{}.json", id).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_chunked_body(move |w| {
                std::thread::sleep(delay);
                w.write_all(body.as_bytes())
            })
            .create_async()
            .await
    }

    #[tokio::test]
    async fn lists_top_story_ids_in_rank_order() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/topstories.json")
            .with_status(200)
            .with_body("[3, 1, 2]")
            .create_async()
            .await;

        let client = client_for(&server);
        assert_eq!(client.list_top_story_ids().await, vec![3, 1, 2]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn listing_failure_yields_empty() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/topstories.json")
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(client.list_top_story_ids().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_listing_yields_empty() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/topstories.json")
            .with_status(200)
            .with_body("{\"oops\": true}")
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(client.list_top_story_ids().await.is_empty());
    }

    #[tokio::test]
    async fn fetch_item_handles_null_and_errors() {
        let mut server = Server::new_async().await;
        let _ok = mock_item(&mut server, 1, 200, story(1, Some("https://a.example"))).await;
        let _null = mock_item(&mut server, 2, 200, "null".to_string()).await;
        let _missing = mock_item(&mut server, 3, 404, String::new()).await;
        let _garbage = mock_item(&mut server, 4, 200, "<html>".to_string()).await;

        let client = client_for(&server);
        assert_eq!(client.fetch_item(1).await.map(|s| s.id), Some(1));
        assert!(client.fetch_item(2).await.is_none());
        assert!(client.fetch_item(3).await.is_none());
        assert!(client.fetch_item(4).await.is_none());
    }

    #[tokio::test]
    async fn resolve_drops_stories_without_url_and_keeps_order() {
        let mut server = Server::new_async().await;
        let _one = mock_item(&mut server, 1, 200, story(1, Some("https://one.example"))).await;
        let _two = mock_item(&mut server, 2, 200, story(2, None)).await;
        let _three = mock_item(&mut server, 3, 200, story(3, Some("https://three.example"))).await;

        let client = client_for(&server);
        let ids: Vec<u64> = client
            .resolve_stories(&[1, 2, 3])
            .await
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn resolve_filters_kinds_failures_and_empty_urls() {
        let mut server = Server::new_async().await;
        let job = serde_json::json!({
            "id": 10, "title": "Hiring", "type": "job", "url": "https://jobs.example"
        })
        .to_string();
        let _job = mock_item(&mut server, 10, 200, job).await;
        let _empty_url = mock_item(&mut server, 11, 200, story(11, Some(""))).await;
        let _failed = mock_item(&mut server, 12, 503, String::new()).await;
        let _null = mock_item(&mut server, 13, 200, "null".to_string()).await;
        let _good = mock_item(&mut server, 14, 200, story(14, Some("https://ok.example"))).await;

        let client = client_for(&server);
        let resolved = client.resolve_stories(&[10, 11, 12, 13, 14]).await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, 14);

        let none = client.resolve_stories(&[10, 11, 12, 13]).await;
        assert!(none.is_empty());

        assert!(client.resolve_stories(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn slow_item_is_dropped_after_timeout() {
        let mut server = Server::new_async().await;
        let _one = mock_item(&mut server, 1, 200, story(1, Some("https://one.example"))).await;
        let _slow = mock_slow_item(&mut server, 2, Duration::from_secs(3)).await;
        let _three = mock_item(&mut server, 3, 200, story(3, Some("https://three.example"))).await;

        let client = client_with(&server, 3, Duration::from_millis(300));
        let started = Instant::now();
        let ids: Vec<u64> = client
            .resolve_stories(&[3, 2, 1])
            .await
            .iter()
            .map(|s| s.id)
            .collect();

        assert_eq!(ids, vec![3, 1]);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn fetches_are_bounded_by_concurrency() {
        let delay = Duration::from_millis(150);
        let mut server = Server::new_async().await;
        let _a = mock_slow_item(&mut server, 1, delay).await;
        let _b = mock_slow_item(&mut server, 2, delay).await;
        let _c = mock_slow_item(&mut server, 3, delay).await;

        // One fetch at a time, so the delays add up
        let client = client_with(&server, 1, Duration::from_secs(5));
        let started = Instant::now();
        let ids: Vec<u64> = client
            .resolve_stories(&[2, 3, 1])
            .await
            .iter()
            .map(|s| s.id)
            .collect();

        assert_eq!(ids, vec![2, 3, 1]);
        assert!(started.elapsed() >= delay * 3);
    }

    #[test]
    fn reassembles_by_index_not_arrival() {
        let make = |id: u64| -> Story { serde_json::from_str(&story(id, Some("https://x.example"))).unwrap() };

        // Completion order: third, first, (failed) second
        let arrivals = vec![(2, Some(make(3))), (0, Some(make(1))), (1, None)];
        let ids: Vec<u64> = in_input_order(arrivals).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
