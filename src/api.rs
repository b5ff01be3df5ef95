use anyhow::Context;
use reqwest::header::CACHE_CONTROL;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{
    DetailBreakdown, LoginRequest, LoginResponse, SummaryEnvelope, TeacherSummary, WeeklyEnvelope,
    WeeklyPoint,
};

/// Failures of an authenticated read request.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request was not authorized")]
    Unauthorized,

    #[error("request failed: {status}")]
    Request { status: u16 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Failures of the sign-in request.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("email and password are required")]
    Validation,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("sign-in failed: {status}")]
    Failed { status: u16 },

    #[error("unexpected sign-in response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("server unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
}

/// The remote teacher-metrics API, as consumed by the dashboard.
pub trait TeacherApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, LoginError>;

    async fn teachers_summary(&self, token: &str) -> ApiResult<Vec<TeacherSummary>>;

    async fn teacher_weekly(&self, token: &str, teacher_id: &str) -> ApiResult<Vec<WeeklyPoint>>;

    async fn teacher_details(&self, token: &str, teacher_id: &str) -> ApiResult<DetailBreakdown>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base: Url,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(api_base: &str) -> anyhow::Result<Self> {
        let base = Url::parse(api_base)
            .with_context(|| format!("invalid API base URL: {api_base}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("API base URL must be hierarchical: {api_base}");
        }
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { base, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], token: Option<&str>) -> ApiResult<T> {
        let url = self.endpoint(segments);
        log::debug!("{} {}", Method::GET, url.path());

        let mut request = self.client.get(url).header(CACHE_CONTROL, "no-store");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            return Err(ApiError::Request {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl TeacherApi for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, LoginError> {
        let url = self.endpoint(&["api", "auth", "login"]);
        log::debug!("{} {}", Method::POST, url.path());

        let response = self
            .client
            .post(url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(LoginError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(LoginError::Failed {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn teachers_summary(&self, token: &str) -> ApiResult<Vec<TeacherSummary>> {
        let envelope: SummaryEnvelope = self
            .get(&["api", "teachers", "summary"], Some(token))
            .await?;
        Ok(envelope.data)
    }

    async fn teacher_weekly(&self, token: &str, teacher_id: &str) -> ApiResult<Vec<WeeklyPoint>> {
        let envelope: WeeklyEnvelope = self
            .get(&["api", "teachers", teacher_id, "weekly"], Some(token))
            .await?;
        Ok(envelope.weeks)
    }

    async fn teacher_details(&self, token: &str, teacher_id: &str) -> ApiResult<DetailBreakdown> {
        self.get(&["api", "teachers", teacher_id, "details"], Some(token))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves one canned response and hands back the raw request it received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let read = socket.read(&mut chunk).await.unwrap();
                if read == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..read]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });

        (base, handle)
    }

    fn local_client(base: &str) -> ApiClient {
        let mut client = ApiClient::new(base).unwrap();
        client.client = reqwest::Client::builder().no_proxy().build().unwrap();
        client
    }

    async fn closed_port_base() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        base
    }

    #[tokio::test]
    async fn summary_sends_bearer_and_no_store() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"data":[{"teacher_id":"t1","teacher_name":"A","lessons":5,"quizzes":2,"assessments":1}]}"#,
        )
        .await;
        let client = local_client(&base);

        let teachers = client.teachers_summary("abc123").await.unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0].lessons, 5);

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get /api/teachers/summary http/1.1"));
        assert!(request.contains("authorization: bearer abc123"));
        assert!(request.contains("cache-control: no-store"));
    }

    #[tokio::test]
    async fn unauthorized_read_is_classified() {
        for call in ["summary", "weekly", "details"] {
            let (base, server) = serve_once("401 Unauthorized", "{}").await;
            let client = local_client(&base);
            let result = match call {
                "summary" => client.teachers_summary("stale").await.map(|_| ()),
                "weekly" => client.teacher_weekly("stale", "t1").await.map(|_| ()),
                _ => client.teacher_details("stale", "t1").await.map(|_| ()),
            };
            assert!(matches!(result, Err(ApiError::Unauthorized)), "{call}");
            server.await.unwrap();
        }
    }

    #[tokio::test]
    async fn other_failures_carry_status() {
        let (base, server) = serve_once("503 Service Unavailable", "{}").await;
        let client = local_client(&base);

        let result = client.teacher_weekly("abc", "t1").await;
        assert!(matches!(result, Err(ApiError::Request { status: 503 })));
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/teachers/t1/weekly HTTP/1.1"));
    }

    #[tokio::test]
    async fn unreadable_body_is_a_decode_error() {
        let (base, server) = serve_once("200 OK", "not json").await;
        let client = local_client(&base);

        let result = client.teacher_details("abc", "t1").await;
        assert!(matches!(result, Err(ApiError::Decode(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn login_posts_credentials() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"token":"fresh","user":{"email":"principal@school.edu","role":"admin"}}"#,
        )
        .await;
        let client = local_client(&base);

        let body = client.login("principal@school.edu", "secret").await.unwrap();
        assert_eq!(body.token, "fresh");
        assert_eq!(
            body.user.and_then(|user| user.role).as_deref(),
            Some("admin")
        );

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/auth/login HTTP/1.1"));
        assert!(request.ends_with(r#"{"email":"principal@school.edu","password":"secret"}"#));
    }

    #[tokio::test]
    async fn login_statuses_are_classified() {
        let (base, server) = serve_once("401 Unauthorized", "{}").await;
        let result = local_client(&base).login("a@b.c", "pw").await;
        assert!(matches!(result, Err(LoginError::InvalidCredentials)));
        server.await.unwrap();

        let (base, server) = serve_once("500 Internal Server Error", "{}").await;
        let result = local_client(&base).login("a@b.c", "pw").await;
        assert!(matches!(result, Err(LoginError::Failed { status: 500 })));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let client = local_client(&closed_port_base().await);

        let login = client.login("a@b.c", "pw").await;
        assert!(matches!(login, Err(LoginError::Unreachable(_))));
        let summary = client.teachers_summary("abc").await;
        assert!(matches!(summary, Err(ApiError::Network(_))));
    }

    #[test]
    fn endpoints_join_onto_base() {
        let client = ApiClient::new("http://localhost:4000").unwrap();
        let url = client.endpoint(&["api", "teachers", "summary"]);
        assert_eq!(url.as_str(), "http://localhost:4000/api/teachers/summary");
    }

    #[test]
    fn endpoints_keep_base_path_and_escape_ids() {
        let client = ApiClient::new("https://school.test/insights/").unwrap();
        let url = client.endpoint(&["api", "teachers", "t 1/x", "weekly"]);
        assert_eq!(
            url.as_str(),
            "https://school.test/insights/api/teachers/t%201%2Fx/weekly"
        );
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(ApiClient::new("not a url").is_err());
        assert!(ApiClient::new("mailto:principal@school.edu").is_err());
    }
}
