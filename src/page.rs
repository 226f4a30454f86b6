//! The browser-session boundary.
//!
//! Sessions drive one long-lived browser tab through the [`BrowserPage`]
//! trait. The trait keeps the core honest about what it needs from the
//! automation layer (navigate, probe, fill, click, read) while the
//! selector-level scraping lives behind the trait, outside this crate's
//! responsibility. Higher-level extraction points - enumerating fresh
//! job tiles, pulling a typed job record, matching question labels - are
//! part of the same boundary.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::jobs::JobDetails;

/// Errors surfaced by the browser automation layer.
///
/// Every variant is an expected, scriptable failure: the page structure
/// changed, an element never appeared, the navigation stalled. Sessions
/// convert these into failed step outcomes; they never escape a run.
#[derive(Debug, Error)]
pub enum PageError {
    /// Navigation did not complete.
    #[error("navigation to {url} failed: {message}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Diagnostic from the automation layer.
        message: String,
    },

    /// A selector matched nothing.
    #[error("element not found: {selector}")]
    ElementNotFound {
        /// The selector that matched nothing.
        selector: String,
    },

    /// An interaction (fill, click, paste) failed on a present element.
    #[error("interaction with {selector} failed: {message}")]
    Interaction {
        /// The selector the interaction targeted.
        selector: String,
        /// Diagnostic from the automation layer.
        message: String,
    },

    /// The page content could not be turned into the expected structure.
    #[error("extraction failed on {url}: {message}")]
    Extraction {
        /// Page the extraction ran against.
        url: String,
        /// What was missing or malformed.
        message: String,
    },
}

/// One reusable browser tab.
///
/// Implementations are expensive to create and stateful; they are owned
/// by a [`PagePool`](crate::pool::PagePool) and handed to exactly one
/// session at a time. The pool navigates the tab back to a neutral home
/// URL before the next session sees it.
#[async_trait]
pub trait BrowserPage: Send {
    /// Navigates to a URL and waits for the document to settle.
    async fn goto(&mut self, url: &str) -> Result<(), PageError>;

    /// Returns whether a selector currently matches an element.
    async fn has_element(&mut self, selector: &str) -> Result<bool, PageError>;

    /// Fills a form field and commits the value.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), PageError>;

    /// Clicks an element.
    async fn click(&mut self, selector: &str) -> Result<(), PageError>;

    /// Reads the trimmed text content of the first matching element.
    async fn text_content(&mut self, selector: &str) -> Result<String, PageError>;

    /// Enumerates links of recently posted job tiles on the current
    /// search page, newest first.
    ///
    /// "Recently posted" heuristics (posted-minutes-ago badges and the
    /// like) belong to the implementation.
    async fn recent_job_links(&mut self) -> Result<Vec<String>, PageError>;

    /// Visits a job posting and extracts its typed attribute record.
    async fn job_details(&mut self, job_url: &str) -> Result<JobDetails, PageError>;

    /// Returns the labels of the itemized proposal questions on the
    /// current bid form, in page order.
    async fn question_labels(&mut self) -> Result<Vec<String>, PageError>;

    /// Fills the answer textarea belonging to the question with the
    /// exact given label text.
    async fn fill_question(&mut self, label: &str, answer: &str) -> Result<(), PageError>;
}

/// Client for a browser-driver sidecar speaking a small JSON protocol.
///
/// The sidecar owns the actual browser and the marketplace DOM
/// knowledge; this crate only issues commands against opened pages.
/// `POST {base}/pages` opens a page, and every [`BrowserPage`] method
/// maps to `POST {base}/pages/{id}/{command}`.
#[derive(Debug, Clone)]
pub struct RemoteDriver {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteDriver {
    /// Creates a driver client against the sidecar's base URL.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Opens one page in the sidecar's browser.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::Navigation`] when the sidecar is unreachable
    /// or refuses to open a page.
    #[instrument(skip(self), fields(driver = %self.base_url))]
    pub async fn open_page(&self) -> Result<RemotePage, PageError> {
        #[derive(Deserialize)]
        struct Opened {
            page_id: String,
        }

        let url = format!("{}/pages", self.base_url);
        let navigation_err = |message: String| PageError::Navigation {
            url: url.clone(),
            message,
        };

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| navigation_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(navigation_err(format!(
                "driver returned {}",
                response.status()
            )));
        }

        let opened: Opened = response
            .json()
            .await
            .map_err(|e| navigation_err(e.to_string()))?;
        debug!(page_id = %opened.page_id, "opened driver page");

        Ok(RemotePage {
            client: self.client.clone(),
            endpoint: format!("{}/pages/{}", self.base_url, opened.page_id),
        })
    }

    /// Opens a fixed number of pages, for seeding the pool.
    ///
    /// # Errors
    ///
    /// Returns the first [`PageError`] from the sidecar.
    pub async fn open_pages(&self, count: usize) -> Result<Vec<Box<dyn BrowserPage>>, PageError> {
        let mut pages: Vec<Box<dyn BrowserPage>> = Vec::with_capacity(count);
        for _ in 0..count {
            pages.push(Box::new(self.open_page().await?));
        }
        Ok(pages)
    }
}

/// How a sidecar command failed.
enum CommandFailure {
    /// The sidecar reported the selector matched nothing (404).
    NotFound,
    /// Transport or protocol failure.
    Other(String),
}

/// One page held open in the driver sidecar.
#[derive(Debug, Clone)]
pub struct RemotePage {
    client: reqwest::Client,
    endpoint: String,
}

impl RemotePage {
    async fn command(&self, name: &str, body: &Value) -> Result<reqwest::Response, CommandFailure> {
        let url = format!("{}/{name}", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CommandFailure::Other(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(CommandFailure::NotFound);
        }
        if !response.status().is_success() {
            return Err(CommandFailure::Other(format!(
                "driver returned {}",
                response.status()
            )));
        }
        Ok(response)
    }

    fn selector_err(selector: &str, failure: CommandFailure) -> PageError {
        match failure {
            CommandFailure::NotFound => PageError::ElementNotFound {
                selector: selector.to_string(),
            },
            CommandFailure::Other(message) => PageError::Interaction {
                selector: selector.to_string(),
                message,
            },
        }
    }

    fn extraction_err(url: &str, failure: CommandFailure) -> PageError {
        let message = match failure {
            CommandFailure::NotFound => "no extractable content".to_string(),
            CommandFailure::Other(message) => message,
        };
        PageError::Extraction {
            url: url.to_string(),
            message,
        }
    }
}

#[async_trait]
impl BrowserPage for RemotePage {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        self.command("goto", &json!({"url": url}))
            .await
            .map_err(|failure| PageError::Navigation {
                url: url.to_string(),
                message: match failure {
                    CommandFailure::NotFound => "page not found".to_string(),
                    CommandFailure::Other(message) => message,
                },
            })?;
        Ok(())
    }

    async fn has_element(&mut self, selector: &str) -> Result<bool, PageError> {
        #[derive(Deserialize)]
        struct Found {
            found: bool,
        }

        let response = self
            .command("query", &json!({"selector": selector}))
            .await
            .map_err(|f| Self::selector_err(selector, f))?;
        let found: Found = response
            .json()
            .await
            .map_err(|e| Self::selector_err(selector, CommandFailure::Other(e.to_string())))?;
        Ok(found.found)
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), PageError> {
        self.command("fill", &json!({"selector": selector, "value": value}))
            .await
            .map_err(|f| Self::selector_err(selector, f))?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), PageError> {
        self.command("click", &json!({"selector": selector}))
            .await
            .map_err(|f| Self::selector_err(selector, f))?;
        Ok(())
    }

    async fn text_content(&mut self, selector: &str) -> Result<String, PageError> {
        #[derive(Deserialize)]
        struct Text {
            text: String,
        }

        let response = self
            .command("text", &json!({"selector": selector}))
            .await
            .map_err(|f| Self::selector_err(selector, f))?;
        let text: Text = response
            .json()
            .await
            .map_err(|e| Self::selector_err(selector, CommandFailure::Other(e.to_string())))?;
        Ok(text.text.trim().to_string())
    }

    async fn recent_job_links(&mut self) -> Result<Vec<String>, PageError> {
        #[derive(Deserialize)]
        struct Links {
            links: Vec<String>,
        }

        let response = self
            .command("job_links", &json!({}))
            .await
            .map_err(|f| Self::extraction_err(&self.endpoint, f))?;
        let links: Links = response.json().await.map_err(|e| {
            Self::extraction_err(&self.endpoint, CommandFailure::Other(e.to_string()))
        })?;
        Ok(links.links)
    }

    async fn job_details(&mut self, job_url: &str) -> Result<JobDetails, PageError> {
        let response = self
            .command("job_details", &json!({"job_url": job_url}))
            .await
            .map_err(|f| Self::extraction_err(job_url, f))?;
        response
            .json()
            .await
            .map_err(|e| Self::extraction_err(job_url, CommandFailure::Other(e.to_string())))
    }

    async fn question_labels(&mut self) -> Result<Vec<String>, PageError> {
        #[derive(Deserialize)]
        struct Labels {
            labels: Vec<String>,
        }

        let response = self
            .command("question_labels", &json!({}))
            .await
            .map_err(|f| Self::extraction_err(&self.endpoint, f))?;
        let labels: Labels = response.json().await.map_err(|e| {
            Self::extraction_err(&self.endpoint, CommandFailure::Other(e.to_string()))
        })?;
        Ok(labels.labels)
    }

    async fn fill_question(&mut self, label: &str, answer: &str) -> Result<(), PageError> {
        self.command("fill_question", &json!({"label": label, "answer": answer}))
            .await
            .map_err(|f| Self::selector_err(label, f))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn driver_with_page(server: &MockServer) -> RemotePage {
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"page_id": "p1"})),
            )
            .mount(server)
            .await;
        RemoteDriver::new(&server.uri()).open_page().await.unwrap()
    }

    #[tokio::test]
    async fn test_open_page_and_goto() {
        let server = MockServer::start().await;
        let mut page = driver_with_page(&server).await;

        Mock::given(method("POST"))
            .and(path("/pages/p1/goto"))
            .and(body_json(serde_json::json!({"url": "https://example.com"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        page.goto("https://example.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_open_page_against_dead_driver() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let result = RemoteDriver::new(&uri).open_page().await;
        assert!(matches!(result, Err(PageError::Navigation { .. })));
    }

    #[tokio::test]
    async fn test_has_element_parses_answer() {
        let server = MockServer::start().await;
        let mut page = driver_with_page(&server).await;

        Mock::given(method("POST"))
            .and(path("/pages/p1/query"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"found": true})),
            )
            .mount(&server)
            .await;

        assert!(page.has_element("#login_username").await.unwrap());
    }

    #[tokio::test]
    async fn test_fill_missing_element() {
        let server = MockServer::start().await;
        let mut page = driver_with_page(&server).await;

        Mock::given(method("POST"))
            .and(path("/pages/p1/fill"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = page.fill("#missing", "value").await.unwrap_err();
        assert!(matches!(err, PageError::ElementNotFound { selector } if selector == "#missing"));
    }

    #[tokio::test]
    async fn test_job_details_round_trip() {
        let server = MockServer::start().await;
        let mut page = driver_with_page(&server).await;

        Mock::given(method("POST"))
            .and(path("/pages/p1/job_details"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "job_url": "https://example.com/jobs/1",
                "title": "React frontend",
                "total_spent": "$12.3k",
                "payment_verified": true,
            })))
            .mount(&server)
            .await;

        let details = page.job_details("https://example.com/jobs/1").await.unwrap();
        assert_eq!(details.title, "React frontend");
        assert!(details.payment_verified);
        assert!(details.qualified, "absent qualified flag defaults to true");
    }

    #[tokio::test]
    async fn test_recent_job_links() {
        let server = MockServer::start().await;
        let mut page = driver_with_page(&server).await;

        Mock::given(method("POST"))
            .and(path("/pages/p1/job_links"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"links": ["https://example.com/jobs/2", "https://example.com/jobs/1"]}),
            ))
            .mount(&server)
            .await;

        let links = page.recent_job_links().await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0], "https://example.com/jobs/2");
    }

    #[test]
    fn test_page_error_messages() {
        let err = PageError::ElementNotFound {
            selector: "#login_username".to_string(),
        };
        assert!(err.to_string().contains("#login_username"));

        let err = PageError::Navigation {
            url: "https://example.com".to_string(),
            message: "timeout".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("example.com"));
        assert!(msg.contains("timeout"));
    }
}
