//! Canvas REST client with `Link`-header pagination.
//!
//! Collections are fetched page by page, following the `rel="next"` URL the
//! server returns with each response. A failing page never raises: the
//! records gathered so far are returned together with the failure.

use crate::error::FetchError;
use crate::models::{Account, Assignment, Course, Enrollment, Submission};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, LINK};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for the Canvas API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://canvas.example.edu/api/v1`.
    pub base_url: String,
    /// Bearer token. Empty means unauthenticated requests.
    pub token: String,
    /// `per_page` sent on the first request of every collection.
    pub per_page: usize,
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://canvas.uautonoma.cl/api/v1".to_string(),
            token: String::new(),
            per_page: 100,
            timeout_seconds: 60,
        }
    }
}

/// Records of one resource, possibly truncated by a failed page.
#[derive(Debug)]
pub struct Paged<T> {
    pub records: Vec<T>,
    pub failure: Option<FetchError>,
}

impl<T> Paged<T> {
    /// True when every page was retrieved.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Thin typed client over the Canvas endpoints the report needs.
#[derive(Debug, Clone)]
pub struct CanvasClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl CanvasClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, http })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Course metadata (`courses/{id}`).
    pub async fn course(&self, course_id: &str) -> Result<Course, FetchError> {
        self.fetch_one(&format!("course {}", course_id), &format!("courses/{}", course_id))
            .await
    }

    /// Sub-account metadata (`accounts/{id}`).
    pub async fn account(&self, account_id: u64) -> Result<Account, FetchError> {
        self.fetch_one(
            &format!("account {}", account_id),
            &format!("accounts/{}", account_id),
        )
        .await
    }

    /// Student enrollments of a course.
    pub async fn enrollments(&self, course_id: &str) -> Paged<Enrollment> {
        self.fetch_all(
            &format!("enrollments of course {}", course_id),
            &format!("courses/{}/enrollments", course_id),
            &[("type[]", "StudentEnrollment")],
        )
        .await
    }

    pub async fn assignments(&self, course_id: &str) -> Paged<Assignment> {
        self.fetch_all(
            &format!("assignments of course {}", course_id),
            &format!("courses/{}/assignments", course_id),
            &[],
        )
        .await
    }

    pub async fn submissions(&self, course_id: &str, assignment_id: u64) -> Paged<Submission> {
        self.fetch_all(
            &format!("submissions of assignment {} (course {})", assignment_id, course_id),
            &format!("courses/{}/assignments/{}/submissions", course_id, assignment_id),
            &[],
        )
        .await
    }

    /// Walk every page of a collection.
    ///
    /// `query` and `per_page` are only attached to the first request; the
    /// server's next links already carry them.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        resource: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Paged<T> {
        let mut records = Vec::new();
        let mut next = Some(self.endpoint(path));
        let mut first = true;
        let mut page_number = 0usize;
        let mut visited = HashSet::new();

        while let Some(url) = next.take() {
            page_number += 1;
            visited.insert(url.clone());
            let mut request = self.get(&url);
            if first {
                request = request
                    .query(query)
                    .query(&[("per_page", self.config.per_page)]);
                first = false;
            }

            match self.fetch_page::<T>(resource, request).await {
                Ok((page, link)) => {
                    debug!("{}: page {} with {} records", resource, page_number, page.len());
                    records.extend(page);
                    next = match link {
                        Some(link) if visited.contains(&link) => {
                            warn!(
                                "{}: next link {} was already visited, stopping after page {}",
                                resource, link, page_number
                            );
                            None
                        }
                        other => other,
                    };
                }
                Err(failure) => {
                    warn!(
                        "Failed to fetch {} (page {}, {} records kept): {}",
                        resource,
                        page_number,
                        records.len(),
                        failure
                    );
                    return Paged {
                        records,
                        failure: Some(failure),
                    };
                }
            }
        }

        Paged {
            records,
            failure: None,
        }
    }

    /// Fetch a single JSON object.
    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        resource: &str,
        path: &str,
    ) -> Result<T, FetchError> {
        let response = self.send(resource, self.get(&self.endpoint(path))).await?;
        let body = read_body(resource, response).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            resource: resource.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        resource: &str,
        request: RequestBuilder,
    ) -> Result<(Vec<T>, Option<String>), FetchError> {
        let response = self.send(resource, request).await?;
        let link = next_link(response.headers());
        let body = read_body(resource, response).await?;

        let page = serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            resource: resource.to_string(),
            message: e.to_string(),
        })?;

        Ok((page, link))
    }

    async fn send(
        &self,
        resource: &str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, FetchError> {
        let response = request.send().await.map_err(|source| FetchError::Transport {
            resource: resource.to_string(),
            source,
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                resource: resource.to_string(),
                status,
                body,
            });
        }

        Ok(response)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.http.get(url);
        if self.config.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.config.token)
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

async fn read_body(resource: &str, response: reqwest::Response) -> Result<String, FetchError> {
    response.text().await.map_err(|source| FetchError::Transport {
        resource: resource.to_string(),
        source,
    })
}

/// Extract the `rel="next"` target from `Link` headers.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_next_link)
}

fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });

        if is_next {
            target
                .strip_prefix('<')?
                .strip_suffix('>')
                .map(str::to_string)
        } else {
            None
        }
    })
}
