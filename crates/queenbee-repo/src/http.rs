//! HTTP transport for registries
//!
//! Redirects are followed by hand so that credentials are only sent to the
//! origin the request started on. Each request is attempted once.

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, LOCATION};
use std::time::Duration;
use url::Url;

use crate::credentials::ScopedCredentials;
use crate::error::{RepoError, Result};

const MAX_REDIRECTS: usize = 10;

/// HTTP client with scoped credentials and redirect protection
pub struct SecureHttpClient {
    client: reqwest::Client,
    credentials: ScopedCredentials,
}

impl SecureHttpClient {
    pub fn new(credentials: ScopedCredentials, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Redirects are handled in `get` so credentials never leak
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .user_agent(concat!("queenbee/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepoError::InvalidConfig {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            credentials,
        })
    }

    /// Client without credentials
    pub fn public(timeout: Duration) -> Result<Self> {
        Self::new(ScopedCredentials::default(), timeout)
    }

    /// GET `url`, following up to ten redirects
    ///
    /// Any final status other than 2xx is `SourceUnreachable` with the status
    /// code as the reason.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let origin = url;
        let mut target = url.to_string();

        for _ in 0..=MAX_REDIRECTS {
            let response = self.send(origin, &target).await?;
            let status = response.status();

            if status.is_redirection() {
                target = redirect_target(&target, &response)?;
                continue;
            }
            if !status.is_success() {
                return Err(status_error(&target, status));
            }
            return Ok(response);
        }

        Err(RepoError::unreachable(
            origin,
            format!("too many redirects (max {})", MAX_REDIRECTS),
        ))
    }

    /// GET `url` and read the whole body
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| RepoError::unreachable(url, e))?;
        Ok(body.to_vec())
    }

    async fn send(&self, origin: &str, target: &str) -> Result<reqwest::Response> {
        let mut request = self.client.get(target);

        if ScopedCredentials::same_origin(origin, target) {
            if let Some(creds) = self.credentials.for_url(target) {
                request = request.header(AUTHORIZATION, creds.auth_header());
            }
        } else if !self.credentials.is_empty() {
            tracing::warn!(
                "Redirected from {} to {}, credentials not forwarded",
                origin,
                target
            );
        }

        request
            .send()
            .await
            .map_err(|e| RepoError::unreachable(target, e))
    }
}

fn redirect_target(current: &str, response: &reqwest::Response) -> Result<String> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| RepoError::unreachable(current, "redirect without Location header"))?;
    Url::parse(current)
        .and_then(|base| base.join(location))
        .map(|url| url.to_string())
        .map_err(|e| RepoError::unreachable(current, format!("invalid redirect '{}': {}", location, e)))
}

fn status_error(url: &str, status: StatusCode) -> RepoError {
    RepoError::unreachable(url, format!("HTTP {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ResolvedCredentials;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scoped(url: &str) -> ScopedCredentials {
        let mut scoped = ScopedCredentials::default();
        scoped.add(
            url,
            ResolvedCredentials::Bearer {
                token: "secret".to_string(),
            },
        );
        scoped
    }

    #[tokio::test]
    async fn test_sends_scoped_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.json"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{}".to_vec()))
            .mount(&server)
            .await;

        let client = SecureHttpClient::new(scoped(&server.uri()), Duration::from_secs(5)).unwrap();
        let bytes = client
            .get_bytes(&format!("{}/index.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"{}");
    }

    #[tokio::test]
    async fn test_follows_same_origin_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old/index.json"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new/index.json"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new/index.json"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"moved".to_vec()))
            .mount(&server)
            .await;

        let client = SecureHttpClient::new(scoped(&server.uri()), Duration::from_secs(5)).unwrap();
        let bytes = client
            .get_bytes(&format!("{}/old/index.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"moved");
    }

    #[tokio::test]
    async fn test_cross_origin_redirect_drops_auth() {
        let registry = MockServer::start().await;
        let cdn = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/recipes/daylight-factor-0.2.0.tgz"))
            .respond_with(ResponseTemplate::new(302).insert_header(
                "Location",
                format!("{}/blobs/daylight-factor-0.2.0.tgz", cdn.uri()).as_str(),
            ))
            .mount(&registry)
            .await;
        Mock::given(method("GET"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(403))
            .with_priority(1)
            .mount(&cdn)
            .await;
        Mock::given(method("GET"))
            .and(path("/blobs/daylight-factor-0.2.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"bundle".to_vec()))
            .mount(&cdn)
            .await;

        // Credentials scoped to both servers, only the first origin may see them
        let mut creds = scoped(&registry.uri());
        creds.add(
            &cdn.uri(),
            ResolvedCredentials::Bearer {
                token: "secret".to_string(),
            },
        );
        let client = SecureHttpClient::new(creds, Duration::from_secs(5)).unwrap();

        let bytes = client
            .get_bytes(&format!("{}/recipes/daylight-factor-0.2.0.tgz", registry.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"bundle");
    }

    #[tokio::test]
    async fn test_redirect_loop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.json"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/index.json"))
            .mount(&server)
            .await;

        let client = SecureHttpClient::public(Duration::from_secs(5)).unwrap();
        let err = client
            .get_bytes(&format!("{}/index.json", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::SourceUnreachable { ref reason, .. } if reason.contains("too many redirects")));
    }

    #[tokio::test]
    async fn test_malformed_redirect_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.json"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "http://[::1"))
            .mount(&server)
            .await;

        let client = SecureHttpClient::public(Duration::from_secs(5)).unwrap();
        let err = client
            .get_bytes(&format!("{}/index.json", server.uri()))
            .await
            .unwrap_err();

        match err {
            RepoError::SourceUnreachable { url, reason } => {
                assert!(url.ends_with("/index.json"));
                assert!(reason.contains("invalid redirect"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_error_status_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = SecureHttpClient::public(Duration::from_secs(5)).unwrap();
        let err = client
            .get_bytes(&format!("{}/index.json", server.uri()))
            .await
            .unwrap_err();

        match err {
            RepoError::SourceUnreachable { url, reason } => {
                assert!(url.ends_with("/index.json"));
                assert_eq!(reason, "HTTP 404");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
