#![doc = "GitHub issue source: posts one fixed GraphQL query and maps the response onto the core model."]
//
//! # GitHub issue fetcher (CLI <-> Core)
//!
//! [`GithubIssueFetcher`] implements the core [`IssueSource`] trait against the
//! GitHub GraphQL API. It pages through a repository's issues in creation
//! order and converts each node into an [`Issue`]; nothing more. There is no
//! retry and no backoff: any transport, HTTP or GraphQL error ends the fetch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use issue_blog_core::contract::{FetchError, IssueSource};
use issue_blog_core::model::{Author, Comment, Issue, Label, RepoRef};
use serde::{Deserialize, Serialize};

const PAGE_SIZE: u32 = 100;

const ISSUES_QUERY: &str = r#"
query($owner: String!, $name: String!, $first: Int!, $after: String) {
  repository(owner: $owner, name: $name) {
    issues(first: $first, after: $after, orderBy: {field: CREATED_AT, direction: ASC}) {
      pageInfo { hasNextPage endCursor }
      nodes {
        number
        title
        createdAt
        body
        url
        labels(first: 100) { nodes { name } }
        comments(first: 100) {
          nodes {
            author { login avatarUrl }
            createdAt
            body
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error("GitHub request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("GitHub returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("GitHub GraphQL errors: {0}")]
    GraphQl(String),
    #[error("repository {0} not found or not accessible")]
    RepositoryNotFound(String),
}

pub struct GithubIssueFetcher {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl GithubIssueFetcher {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    async fn fetch_page(
        &self,
        repo: &RepoRef,
        after: Option<&str>,
    ) -> Result<IssueConnection, GithubError> {
        let request = GraphQlRequest {
            query: ISSUES_QUERY,
            variables: Variables {
                owner: &repo.owner,
                name: &repo.name,
                first: PAGE_SIZE,
                after,
            },
        };

        tracing::debug!(endpoint = %self.endpoint, repo = %repo.slug(), ?after, "Requesting issue page");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, concat!("issue-blog/", env!("CARGO_PKG_VERSION")))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            tracing::error!(status = %status, endpoint = %self.endpoint, "GitHub API returned error");
            return Err(GithubError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GraphQlResponse = response.json().await?;
        if let Some(errors) = payload.errors.filter(|errors| !errors.is_empty()) {
            let joined = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(GithubError::GraphQl(joined));
        }

        payload
            .data
            .and_then(|data| data.repository)
            .map(|repository| repository.issues)
            .ok_or_else(|| GithubError::RepositoryNotFound(repo.slug()))
    }
}

#[async_trait]
impl IssueSource for GithubIssueFetcher {
    async fn fetch_issues(&self, repo: &RepoRef) -> Result<Vec<Issue>, FetchError> {
        let mut issues = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page = self.fetch_page(repo, after.as_deref()).await?;
            issues.extend(page.nodes.into_iter().map(IssueNode::into_issue));
            match (page.page_info.has_next_page, page.page_info.end_cursor) {
                (true, Some(cursor)) => after = Some(cursor),
                _ => break,
            }
        }
        tracing::info!(repo = %repo.slug(), count = issues.len(), "Fetched issues");
        Ok(issues)
    }
}

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Variables<'a>,
}

#[derive(Serialize)]
struct Variables<'a> {
    owner: &'a str,
    name: &'a str,
    first: u32,
    after: Option<&'a str>,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    errors: Option<Vec<GraphQlErrorMessage>>,
}

#[derive(Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Deserialize)]
struct ResponseData {
    repository: Option<RepositoryNode>,
}

#[derive(Deserialize)]
struct RepositoryNode {
    issues: IssueConnection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueConnection {
    page_info: PageInfo,
    nodes: Vec<IssueNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    number: u64,
    title: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    body: String,
    url: String,
    labels: Option<Nodes<LabelNode>>,
    comments: Nodes<CommentNode>,
}

#[derive(Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

#[derive(Deserialize)]
struct LabelNode {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    /// Null for deleted accounts.
    author: Option<AuthorNode>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    body: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorNode {
    login: String,
    avatar_url: String,
}

impl IssueNode {
    fn into_issue(self) -> Issue {
        Issue {
            number: self.number,
            title: self.title,
            created_at: self.created_at,
            body: self.body,
            url: self.url,
            labels: self
                .labels
                .map(|labels| labels.nodes)
                .unwrap_or_default()
                .into_iter()
                .map(|label| Label { name: label.name })
                .collect(),
            comments: self
                .comments
                .nodes
                .into_iter()
                .map(|comment| Comment {
                    author: comment
                        .author
                        .map(|a| Author {
                            login: a.login,
                            avatar_url: a.avatar_url,
                        })
                        .unwrap_or_else(|| Author {
                            login: "ghost".to_string(),
                            avatar_url: String::new(),
                        }),
                    created_at: comment.created_at,
                    body: comment.body,
                })
                .collect(),
        }
    }
}
