//! Jira REST search client.

use serde::Deserialize;

use super::IssueError;
use crate::constants::{JIRA_FIELDS, USER_AGENT};
use crate::models::Issue;

/// One page of `/rest/api/2/search`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<Issue>,
}

pub struct JiraClient {
    base_url: String,
    client: reqwest::Client,
}

impl JiraClient {
    pub fn new(base_url: &str) -> Result<Self, IssueError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| IssueError::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/rest/api/2/search", self.base_url)
    }

    /// Run a JQL search, following pagination until the server's `total`
    /// is reached or `max_issues` issues have been collected.
    pub async fn search(
        &self,
        jql: &str,
        page_size: usize,
        max_issues: Option<usize>,
    ) -> Result<Vec<Issue>, IssueError> {
        let page_size = page_size.max(1);
        let mut issues = Vec::new();

        loop {
            let limit = match max_issues {
                Some(max) => max.saturating_sub(issues.len()).min(page_size),
                None => page_size,
            };
            if limit == 0 {
                break;
            }

            let page = self.page(jql, issues.len(), limit).await?;
            let received = page.issues.len();
            issues.extend(page.issues);
            tracing::debug!("fetched {} of {} issue(s)", issues.len(), page.total);

            if received == 0 || issues.len() >= page.total {
                break;
            }
        }

        tracing::info!("fetched {} issue(s)", issues.len());
        Ok(issues)
    }

    async fn page(&self, jql: &str, start_at: usize, max_results: usize) -> Result<SearchPage, IssueError> {
        let url = self.search_url();
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&[
                ("jql", jql.to_string()),
                ("fields", JIRA_FIELDS.to_string()),
                ("startAt", start_at.to_string()),
                ("maxResults", max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| IssueError::Http(format!("{url}: {e}")))?;

        if !resp.status().is_success() {
            return Err(IssueError::Status {
                url,
                status: resp.status().as_u16(),
            });
        }

        resp.json()
            .await
            .map_err(|e| IssueError::Parse(e.to_string()))
    }
}
