//! Drives the GitLab client end to end against an in-process fake of the
//! files and commits endpoints.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use repofiles::http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use repofiles::retry::RetryConfig;
use repofiles::{GitLabClient, Provider, ResourceError};
use serde_json::{Value, json};

const HOST: &str = "https://gitlab.test";
const PROJECT: &str = "group/proj";

/// Fake GitLab holding the files of one branch.
#[derive(Default)]
struct FakeGitLab {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    commits: Mutex<Vec<Value>>,
    requests: Mutex<Vec<(HttpMethod, String)>>,
    /// Number of upcoming requests to answer with 429.
    throttle: AtomicUsize,
}

impl FakeGitLab {
    fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.as_bytes().to_vec());
        self
    }

    fn json(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    fn get_file(&self, url: &str) -> HttpResponse {
        let prefix = format!(
            "{}/api/v4/projects/{}/repository/files/",
            HOST,
            urlencoding::encode(PROJECT)
        );
        let rest = url.strip_prefix(&prefix).expect("file url");
        let (encoded_path, query) = rest.split_once('?').expect("ref query");
        assert_eq!(query, "ref=main");
        let path = urlencoding::decode(encoded_path).unwrap().into_owned();

        match self.files.lock().unwrap().get(&path) {
            Some(content) => Self::json(
                200,
                json!({
                    "file_name": path.rsplit('/').next(),
                    "file_path": path,
                    "size": content.len(),
                    "encoding": "base64",
                    "content": STANDARD.encode(content),
                    "content_sha256": "",
                    "ref": "main",
                    "blob_id": "blob",
                    "commit_id": "head",
                    "last_commit_id": "head"
                }),
            ),
            None => Self::json(404, json!({ "message": "404 File Not Found" })),
        }
    }

    fn create_commit(&self, body: &[u8]) -> HttpResponse {
        let body: Value = serde_json::from_slice(body).unwrap();
        let mut files = self.files.lock().unwrap();
        let mut next = files.clone();

        for action in body["actions"].as_array().unwrap() {
            let path = action["file_path"].as_str().unwrap().to_string();
            let exists = next.contains_key(&path);
            match (action["action"].as_str().unwrap(), exists) {
                ("create", true) => {
                    return Self::json(
                        400,
                        json!({ "message": "A file with this name already exists" }),
                    );
                }
                ("update" | "delete", false) => {
                    return Self::json(
                        400,
                        json!({ "message": "A file with this name doesn't exist" }),
                    );
                }
                ("delete", true) => {
                    next.remove(&path);
                }
                ("create" | "update", _) => {
                    assert_eq!(action["encoding"], "base64");
                    let content = STANDARD
                        .decode(action["content"].as_str().unwrap())
                        .unwrap();
                    next.insert(path, content);
                }
                (other, _) => panic!("unexpected action {}", other),
            }
        }

        *files = next;
        self.commits.lock().unwrap().push(body);
        Self::json(
            201,
            json!({ "id": "0123456789abcdef", "short_id": "01234567", "title": "sync" }),
        )
    }

    fn commits(&self) -> Vec<Value> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for FakeGitLab {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.method, request.url.clone()));

        if self
            .throttle
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(HttpResponse {
                status: 429,
                headers: vec![("RateLimit-Reset".to_string(), "1700000000".to_string())],
                body: b"Retry later".to_vec(),
            });
        }

        let token = request
            .headers
            .iter()
            .find(|(k, _)| k == "PRIVATE-TOKEN")
            .map(|(_, v)| v.as_str());
        if token != Some("glpat-test") {
            return Ok(Self::json(401, json!({ "message": "401 Unauthorized" })));
        }

        Ok(match request.method {
            HttpMethod::Get => self.get_file(&request.url),
            HttpMethod::Post if request.url.ends_with("/repository/commits") => {
                self.create_commit(&request.body)
            }
            _ => Self::json(405, json!({ "message": "405 Method Not Allowed" })),
        })
    }
}

fn provider(fake: Arc<FakeGitLab>, token: &str) -> Provider {
    let client = GitLabClient::new_with_transport(HOST, token, fake).with_retry_config(
        RetryConfig::new(Duration::from_millis(1), Duration::from_millis(2), 3).with_jitter(false),
    );
    Provider::new(Arc::new(client))
}

fn config(files: &[(&str, &str)]) -> Value {
    json!({
        "project": PROJECT,
        "branch": "main",
        "commit_message": "sync",
        "author_name": "Release Bot",
        "file": files
            .iter()
            .map(|(path, content)| json!({ "file_path": path, "content": content }))
            .collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn test_mixed_batch_sends_one_commit_in_order() {
    let fake = Arc::new(
        FakeGitLab::default()
            .with_file("a.txt", "1")
            .with_file("b.txt", "2"),
    );
    let provider = provider(Arc::clone(&fake), "glpat-test");

    let prior = json!({
        "id": "group/proj:main:a.txt,b.txt",
        "project": PROJECT,
        "branch": "main",
        "commit_message": "sync",
        "file": [
            { "file_path": "a.txt", "content": "1" },
            { "file_path": "b.txt", "content": "2" }
        ]
    });
    let state = provider
        .update(
            "gitlab_repository_files",
            prior,
            config(&[("b.txt", "2-new"), ("c.txt", "3")]),
        )
        .await
        .unwrap();

    assert_eq!(state["id"], "group/proj:main:b.txt,c.txt");

    let commits = fake.commits();
    assert_eq!(commits.len(), 1);
    let actions: Vec<(&str, &str)> = commits[0]["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| (a["action"].as_str().unwrap(), a["file_path"].as_str().unwrap()))
        .collect();
    assert_eq!(
        actions,
        vec![("create", "c.txt"), ("delete", "a.txt"), ("update", "b.txt")]
    );
    assert_eq!(commits[0]["author_name"], "Release Bot");
    assert!(commits[0].get("start_branch").is_none());
}

#[tokio::test]
async fn test_paths_are_percent_encoded() {
    let fake = Arc::new(FakeGitLab::default().with_file("docs/guide:v2.md", "g"));
    let provider = provider(Arc::clone(&fake), "glpat-test");

    let state = provider
        .import("gitlab_repository_files", "group/proj:main:docs/guide:v2.md")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state["file"][0]["content"], "g");
    let requests = fake.requests.lock().unwrap().clone();
    assert_eq!(
        requests[0].1,
        "https://gitlab.test/api/v4/projects/group%2Fproj/repository/files/docs%2Fguide%3Av2.md?ref=main"
    );
}

#[tokio::test]
async fn test_rate_limited_requests_are_retried() {
    let fake = Arc::new(FakeGitLab::default().with_file("a.txt", "1"));
    fake.throttle.store(2, Ordering::SeqCst);
    let provider = provider(Arc::clone(&fake), "glpat-test");

    let state = provider
        .import("gitlab_repository_files", "group/proj:main:a.txt")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(state["file"][0]["content"], "1");
    assert_eq!(fake.requests.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_auth_failures_are_not_retried() {
    let fake = Arc::new(FakeGitLab::default().with_file("a.txt", "1"));
    let provider = provider(Arc::clone(&fake), "wrong-token");

    let err = provider
        .import("gitlab_repository_files", "group/proj:main:a.txt")
        .await
        .unwrap_err();

    assert!(matches!(err, ResourceError::Remote { ref path, .. } if path == "a.txt"));
    assert_eq!(fake.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_files_are_created_not_errors() {
    let fake = Arc::new(FakeGitLab::default());
    let provider = provider(Arc::clone(&fake), "glpat-test");

    let state = provider
        .create("gitlab_repository_files", config(&[("new.txt", "n")]))
        .await
        .unwrap();

    assert_eq!(state["file"][0]["content"], "n");
    assert_eq!(fake.commits()[0]["actions"][0]["action"], "create");
    assert_eq!(fake.commits()[0]["actions"][0]["content"], "bg==");
}
