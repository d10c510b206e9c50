//! GitLab API client for repository files and commits.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use serde::de::DeserializeOwned;

use super::error::{GitLabError, is_rate_limit_error, short_error_message};
use super::types::{CreateCommit, Commit, FileCommit, FileWriteResult, GitLabUser, RepositoryFile};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::retry::{RetryConfig, with_retry};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Default GitLab host.
pub const GITLAB_COM: &str = "https://gitlab.com";

/// GitLab REST v4 client.
///
/// Every call is a single request awaited to completion; the client never
/// fans out requests on its own.
#[derive(Clone)]
pub struct GitLabClient {
    transport: Arc<dyn HttpTransport>,
    host: String,
    token: String,
    retry: RetryConfig,
}

impl GitLabClient {
    /// Create a client talking to `host` over reqwest.
    ///
    /// `host` may be a bare hostname (`gitlab.example.com`), a URL, or a URL
    /// that already ends in `/api/v4`.
    ///
    /// ```ignore
    /// let client = GitLabClient::new("gitlab.com", "glpat-...", DEFAULT_TIMEOUT)?;
    /// ```
    pub fn new(host: &str, token: &str, timeout: StdDuration) -> Result<Self, GitLabError> {
        if token.trim().is_empty() {
            return Err(GitLabError::Config("GitLab token is empty".to_string()));
        }
        let transport = ReqwestTransport::with_timeout(timeout)
            .map_err(|e| GitLabError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(host, token, Arc::new(transport)))
    }

    pub fn new_with_transport(host: &str, token: &str, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            host: normalize_host(host),
            token: token.to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Replace the backoff used for rate-limited requests.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Host URL without the API suffix.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.host, path)
    }

    fn file_url(&self, project: &str, file_path: &str) -> String {
        self.api_url(&format!(
            "/projects/{}/repository/files/{}",
            urlencoding::encode(project),
            urlencoding::encode(file_path)
        ))
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .header("Accept", "application/json")
            .header("PRIVATE-TOKEN", self.token.clone())
    }

    /// Send a request, backing off while GitLab answers 429.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, GitLabError> {
        let label = format!("{} {}", request.method.as_str(), request.url);
        with_retry(
            &self.retry,
            || {
                let request = request.clone();
                async move {
                    let response = self.transport.send(request).await?;
                    if response.is_success() {
                        Ok(response)
                    } else {
                        Err(GitLabError::from_status(
                            response.status,
                            &response.headers,
                            &response.body,
                        ))
                    }
                }
            },
            is_rate_limit_error,
            short_error_message,
            &label,
        )
        .await
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<T, GitLabError> {
        let response = self.execute(request).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Fetch one file at `git_ref`.
    ///
    /// A missing project, ref or path yields [`GitLabError::NotFound`].
    pub async fn get_file(
        &self,
        project: &str,
        file_path: &str,
        git_ref: &str,
    ) -> Result<RepositoryFile, GitLabError> {
        let url = format!(
            "{}?ref={}",
            self.file_url(project, file_path),
            urlencoding::encode(git_ref)
        );
        tracing::trace!(project, file_path, git_ref, "Fetching repository file");
        self.execute_json(self.request(HttpMethod::Get, url)).await
    }

    /// Apply all actions of `commit` as one atomic revision.
    pub async fn create_commit(
        &self,
        project: &str,
        commit: &CreateCommit,
    ) -> Result<Commit, GitLabError> {
        let url = self.api_url(&format!(
            "/projects/{}/repository/commits",
            urlencoding::encode(project)
        ));
        let request = self.request(HttpMethod::Post, url).json(commit)?;
        let created: Commit = self.execute_json(request).await?;
        tracing::debug!(
            project,
            branch = %commit.branch,
            commit = %created.short_id,
            actions = commit.actions.len(),
            "Created commit"
        );
        Ok(created)
    }

    pub async fn create_file(
        &self,
        project: &str,
        file_path: &str,
        body: &FileCommit,
    ) -> Result<FileWriteResult, GitLabError> {
        let request = self
            .request(HttpMethod::Post, self.file_url(project, file_path))
            .json(body)?;
        self.execute_json(request).await
    }

    pub async fn update_file(
        &self,
        project: &str,
        file_path: &str,
        body: &FileCommit,
    ) -> Result<FileWriteResult, GitLabError> {
        let request = self
            .request(HttpMethod::Put, self.file_url(project, file_path))
            .json(body)?;
        self.execute_json(request).await
    }

    pub async fn delete_file(
        &self,
        project: &str,
        file_path: &str,
        body: &FileCommit,
    ) -> Result<(), GitLabError> {
        let request = self
            .request(HttpMethod::Delete, self.file_url(project, file_path))
            .json(body)?;
        self.execute(request).await?;
        Ok(())
    }

    /// The user the token belongs to; doubles as a credentials check.
    pub async fn current_user(&self) -> Result<GitLabUser, GitLabError> {
        let request = self.request(HttpMethod::Get, self.api_url("/user"));
        self.execute_json(request).await
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    let host = host.strip_suffix("/api/v4").unwrap_or(host);
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::types::{CommitAction, FileAction};
    use crate::http::{MockTransport, header_get};

    const FILE_URL: &str =
        "https://gitlab.example.com/api/v4/projects/group%2Fproj/repository/files/docs%2Fa.txt";

    fn client(transport: &MockTransport) -> GitLabClient {
        GitLabClient::new_with_transport(
            "gitlab.example.com",
            "secret",
            Arc::new(transport.clone()),
        )
        .with_retry_config(
            RetryConfig::new(StdDuration::from_millis(1), StdDuration::from_millis(2), 2)
                .with_jitter(false),
        )
    }

    fn file_json(path: &str, content_b64: &str) -> serde_json::Value {
        serde_json::json!({
            "file_name": path.rsplit('/').next().unwrap_or(path),
            "file_path": path,
            "size": 1,
            "encoding": "base64",
            "content": content_b64,
            "content_sha256": "",
            "ref": "main",
            "blob_id": "blob",
            "commit_id": "c1",
            "last_commit_id": "c0"
        })
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("gitlab.com"), "https://gitlab.com");
        assert_eq!(normalize_host("https://gitlab.com/"), "https://gitlab.com");
        assert_eq!(
            normalize_host("http://localhost:8080/api/v4"),
            "http://localhost:8080"
        );
    }

    #[test]
    fn test_new_rejects_empty_token() {
        let err = GitLabClient::new("gitlab.com", "  ", DEFAULT_TIMEOUT)
            .err()
            .expect("empty token must fail");
        assert!(matches!(err, GitLabError::Config(_)));
    }

    #[test]
    fn test_gitlab_client_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<GitLabClient>();
    }

    #[tokio::test]
    async fn test_get_file_encodes_path_and_sends_token() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{FILE_URL}?ref=feature%2Fx"),
            200,
            file_json("docs/a.txt", "aGk="),
        );

        let file = client(&transport)
            .get_file("group/proj", "docs/a.txt", "feature/x")
            .await
            .expect("file should load");
        assert_eq!(file.decoded_content().unwrap(), b"hi".to_vec());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(header_get(&requests[0].headers, "private-token"), Some("secret"));
    }

    #[tokio::test]
    async fn test_get_file_maps_404_to_not_found() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Get,
            format!("{FILE_URL}?ref=main"),
            404,
            serde_json::json!({ "message": "404 File Not Found" }),
        );

        let err = client(&transport)
            .get_file("group/proj", "docs/a.txt", "main")
            .await
            .expect_err("missing file");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let transport = MockTransport::new();
        let url = format!("{FILE_URL}?ref=main");
        transport.push_json(HttpMethod::Get, url.clone(), 429, serde_json::json!({}));
        transport.push_json(HttpMethod::Get, url, 200, file_json("docs/a.txt", "aGk="));

        let file = client(&transport)
            .get_file("group/proj", "docs/a.txt", "main")
            .await
            .expect("second attempt succeeds");
        assert_eq!(file.file_path, "docs/a.txt");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_create_commit_posts_actions() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            "https://gitlab.example.com/api/v4/projects/group%2Fproj/repository/commits",
            201,
            serde_json::json!({ "id": "abc123", "short_id": "abc", "title": "sync files" }),
        );

        let commit = CreateCommit {
            branch: "main".to_string(),
            commit_message: "sync files".to_string(),
            start_branch: None,
            author_email: None,
            author_name: None,
            actions: vec![CommitAction::with_content(FileAction::Update, "a.txt", b"new")],
        };
        let created = client(&transport)
            .create_commit("group/proj", &commit)
            .await
            .expect("commit created");
        assert_eq!(created.id, "abc123");

        let requests = transport.requests();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["actions"][0]["action"], "update");
        assert_eq!(body["actions"][0]["content"], "bmV3");
    }

    #[tokio::test]
    async fn test_create_commit_surfaces_remote_message() {
        let transport = MockTransport::new();
        transport.push_json(
            HttpMethod::Post,
            "https://gitlab.example.com/api/v4/projects/group%2Fproj/repository/commits",
            400,
            serde_json::json!({ "message": "A file with this name already exists" }),
        );

        let commit = CreateCommit {
            branch: "main".to_string(),
            commit_message: "sync".to_string(),
            start_branch: None,
            author_email: None,
            author_name: None,
            actions: vec![CommitAction::with_content(FileAction::Create, "a.txt", b"x")],
        };
        let err = client(&transport)
            .create_commit("group/proj", &commit)
            .await
            .expect_err("conflict");
        assert_eq!(
            err.to_string(),
            "GitLab API error (400): A file with this name already exists"
        );
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_file_sends_body() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Delete,
            FILE_URL,
            HttpResponse {
                status: 204,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );

        let body = FileCommit {
            branch: "main".to_string(),
            commit_message: "[DELETE]: remove".to_string(),
            content: None,
            encoding: None,
            start_branch: None,
            author_email: None,
            author_name: None,
            last_commit_id: Some("c0".to_string()),
        };
        client(&transport)
            .delete_file("group/proj", "docs/a.txt", &body)
            .await
            .expect("deleted");

        let sent: serde_json::Value = serde_json::from_slice(&transport.requests()[0].body).unwrap();
        assert_eq!(sent["last_commit_id"], "c0");
        assert!(sent.get("content").is_none());
    }
}
