//! Page fetching: a direct HTTP GET by default, with an optional
//! headless-browser render path for JS-heavy pages (spec §4.8 step 1).

use crate::error::{RaglineError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

pub struct FetchedPage {
    pub html: String,
    pub final_url: String,
}

pub struct Fetcher {
    client: Client,
    user_agent: String,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(user_agent: String, timeout_secs: u64) -> Self {
        Self {
            client: Client::new(),
            user_agent,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetches `url`. When `use_browser` is set, renders it with a headless
    /// browser first and falls back to a plain GET if that fails, since a
    /// crawl job should not die outright because a browser could not start.
    pub async fn fetch(&self, url: &str, use_browser: bool) -> Result<FetchedPage> {
        if use_browser {
            match self.fetch_rendered(url).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    warn!(url, error = %e, "headless render failed, falling back to plain fetch");
                }
            }
        }

        self.fetch_plain(url).await
    }

    async fn fetch_plain(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RaglineError::Provider(format!("fetch failed: {e}")))?;

        let final_url = response.url().to_string();

        if !response.status().is_success() {
            return Err(RaglineError::Provider(format!(
                "fetch of {url} returned status {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| RaglineError::Provider(format!("failed to read response body: {e}")))?;

        Ok(FetchedPage { html, final_url })
    }

    /// Renders `url` in a headless Chromium instance, for pages whose main
    /// content only appears after client-side JavaScript runs. Only
    /// available when the crate is built with the `browser` feature.
    #[cfg(feature = "browser")]
    async fn fetch_rendered(&self, url: &str) -> Result<FetchedPage> {
        use chromiumoxide::browser::{Browser, BrowserConfig};
        use futures::StreamExt;

        let (mut browser, mut handler) = Browser::launch(
            BrowserConfig::builder()
                .request_timeout(self.timeout)
                .build()
                .map_err(|e| RaglineError::Provider(format!("browser config: {e}")))?,
        )
        .await
        .map_err(|e| RaglineError::Provider(format!("browser launch failed: {e}")))?;

        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page(url)
            .await
            .map_err(|e| RaglineError::Provider(format!("browser navigation failed: {e}")))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| RaglineError::Provider(format!("browser navigation failed: {e}")))?;

        let html = page
            .content()
            .await
            .map_err(|e| RaglineError::Provider(format!("failed to read rendered content: {e}")))?;

        let final_url = page.url().await.ok().flatten().unwrap_or_else(|| url.to_string());

        let _ = browser.close().await;
        handler_task.abort();

        Ok(FetchedPage { html, final_url })
    }

    #[cfg(not(feature = "browser"))]
    async fn fetch_rendered(&self, _url: &str) -> Result<FetchedPage> {
        Err(RaglineError::Config(
            "use_browser=true requires the crate to be built with the `browser` feature".to_string(),
        ))
    }
}
