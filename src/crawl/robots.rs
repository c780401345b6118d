//! robots.txt fetching and matching.

use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Per-origin cache of fetched robots.txt bodies, so a job crawling many
/// pages on one host only fetches it once.
pub struct RobotsCache {
    client: Client,
    bodies: Mutex<HashMap<String, Option<String>>>,
}

impl RobotsCache {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            bodies: Mutex::new(HashMap::new()),
        }
    }

    /// Returns whether `user_agent` may fetch `url` per that origin's
    /// robots.txt. A missing or unfetchable robots.txt is treated as
    /// allow-all, matching conventional crawler behavior.
    pub async fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        let origin = format!("{}://{}", url.scheme(), url.authority());

        let cached = self.bodies.lock().expect("robots cache lock poisoned").get(&origin).cloned();
        let body = match cached {
            Some(body) => body,
            None => {
                let fetched = self.fetch(&origin).await;
                self.bodies
                    .lock()
                    .expect("robots cache lock poisoned")
                    .insert(origin.clone(), fetched.clone());
                fetched
            }
        };

        let Some(body) = body else {
            return true;
        };

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&body, user_agent, url.as_str())
    }

    async fn fetch(&self, origin: &str) -> Option<String> {
        let robots_url = format!("{origin}/robots.txt");
        debug!("fetching {}", robots_url);

        let response = self
            .client
            .get(&robots_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        response.text().await.ok()
    }
}
