//! Temp-upload backend client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.
//! Session and presign requests are multipart forms; completion is JSON.

use std::time::Duration;

use clipvault_protocol::constants::{
    API_REQUEST_TIMEOUT, COMPLETE_UPLOAD_PATH, INIT_UPLOAD_PATH, PART_PRESIGN_PATH,
    PLAYBACK_URL_PATH,
};
use clipvault_protocol::{
    CompleteUploadRequest, CompletedPart, InitUploadResponse, PartPresignResponse,
    PlaybackUrlResponse,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, truncate_body};
use crate::transport::{BoxFuture, UploadBackend};
use crate::types::{PartCredential, UploadSession};

/// Characters escaped in a storage key path; `/` separators are kept.
const KEY_PATH_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Temp-upload backend client.
pub struct SessionClient {
    http: reqwest::Client,
    base_url: String,
}

impl SessionClient {
    /// Creates a client for `base_url` with the standard API timeout.
    ///
    /// `auth_token`, when present, is sent as a Bearer token on every
    /// backend request. It is never forwarded to storage.
    pub fn new(base_url: &str, auth_token: Option<&str>) -> Result<Self, Error> {
        Self::with_timeout(base_url, auth_token, API_REQUEST_TIMEOUT)
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(
        base_url: &str,
        auth_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let parsed = reqwest::Url::parse(base_url)
            .map_err(|e| Error::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::InvalidBaseUrl(base_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = auth_token.filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| Error::InvalidToken)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Posts a multipart form and decodes the JSON response.
    async fn post_form<T: DeserializeOwned>(&self, endpoint: &str, form: Form) -> Result<T, Error> {
        let resp = self.http.post(self.url(endpoint)).multipart(form).send().await?;
        let body = check_status(resp).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Looks up the playback URL of a finished object.
    pub async fn playback_url(&self, storage_key: &str) -> Result<String, Error> {
        let encoded = utf8_percent_encode(storage_key.trim_start_matches('/'), KEY_PATH_SET);
        let resp = self
            .http
            .get(self.url(&format!("{PLAYBACK_URL_PATH}/{encoded}")))
            .send()
            .await?;
        let body = check_status(resp).await?;
        let parsed: PlaybackUrlResponse = serde_json::from_slice(&body)?;
        Ok(parsed.playback_url)
    }
}

/// Returns the body of a 2xx response, or an [`Error::Api`] otherwise.
async fn check_status(resp: reqwest::Response) -> Result<Vec<u8>, Error> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }
    Ok(resp.bytes().await?.to_vec())
}

impl UploadBackend for SessionClient {
    fn initialize<'a>(
        &'a self,
        filename: &'a str,
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<UploadSession, Error>> {
        Box::pin(async move {
            let form = Form::new()
                .text("filename", filename.to_string())
                .text("content_type", content_type.to_string());
            let resp: InitUploadResponse = self.post_form(INIT_UPLOAD_PATH, form).await?;
            debug!(upload_id = %resp.upload_id, key = %resp.s3_key, "upload session created");
            Ok(UploadSession::new(resp.upload_id, resp.s3_key))
        })
    }

    fn request_part_credential<'a>(
        &'a self,
        session: &'a UploadSession,
        part_number: u32,
    ) -> BoxFuture<'a, Result<PartCredential, Error>> {
        Box::pin(async move {
            let form = Form::new()
                .text("s3_key", session.storage_key().to_string())
                .text("upload_id", session.upload_id().to_string())
                .text("part_number", part_number.to_string());
            let resp: PartPresignResponse = self.post_form(PART_PRESIGN_PATH, form).await?;
            Ok(PartCredential {
                part_number,
                upload_url: resp.upload_url,
            })
        })
    }

    fn finalize<'a>(
        &'a self,
        session: UploadSession,
        parts: &'a [CompletedPart],
    ) -> BoxFuture<'a, Result<String, Error>> {
        Box::pin(async move {
            let req = CompleteUploadRequest {
                s3_key: session.storage_key().to_string(),
                upload_id: session.upload_id().to_string(),
                parts: parts.to_vec(),
            };
            let resp = self
                .http
                .post(self.url(COMPLETE_UPLOAD_PATH))
                .json(&req)
                .send()
                .await?;
            check_status(resp).await?;
            debug!(upload_id = %session.upload_id(), parts = parts.len(), "upload session completed");
            Ok(session.into_storage_key())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::{MockResponse, MockServer};

    fn client(url: &str) -> SessionClient {
        SessionClient::new(url, Some("secret-token")).unwrap()
    }

    #[tokio::test]
    async fn initialize_posts_form_and_parses_session() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"s3_key":"temp/u1/clip.mp4","upload_id":"s1"}"#,
        )])
        .await;

        let session = client(&server.url)
            .initialize("clip.mp4", "video/mp4")
            .await
            .unwrap();
        assert_eq!(session.upload_id(), "s1");
        assert_eq!(session.storage_key(), "temp/u1/clip.mp4");

        let reqs = server.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, "POST");
        assert_eq!(reqs[0].path, INIT_UPLOAD_PATH);
        assert_eq!(reqs[0].header("authorization"), Some("Bearer secret-token"));
        assert!(
            reqs[0]
                .header("content-type")
                .is_some_and(|v| v.starts_with("multipart/form-data"))
        );
        let body = reqs[0].body_str();
        assert!(body.contains("name=\"filename\"\r\n\r\nclip.mp4"));
        assert!(body.contains("name=\"content_type\"\r\n\r\nvideo/mp4"));
    }

    #[tokio::test]
    async fn initialize_api_error() {
        let server =
            MockServer::start(vec![MockResponse::json(401, r#"{"detail":"expired"}"#)]).await;

        let err = client(&server.url)
            .initialize("clip.mp4", "video/mp4")
            .await
            .unwrap_err();
        match err {
            Error::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("expired"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn initialize_malformed_json() {
        let server = MockServer::start(vec![MockResponse::json(200, r#"{"s3_key":1}"#)]).await;
        let err = client(&server.url)
            .initialize("clip.mp4", "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn part_credential_sends_session_and_part_number() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"upload_url":"https://storage.example/put?part=2&sig=abc"}"#,
        )])
        .await;

        let session = UploadSession::new("s1", "temp/k.mp4");
        let cred = client(&server.url)
            .request_part_credential(&session, 2)
            .await
            .unwrap();
        assert_eq!(cred.part_number, 2);
        assert_eq!(cred.upload_url, "https://storage.example/put?part=2&sig=abc");

        let reqs = server.requests();
        assert_eq!(reqs[0].path, PART_PRESIGN_PATH);
        let body = reqs[0].body_str();
        assert!(body.contains("name=\"s3_key\"\r\n\r\ntemp/k.mp4"));
        assert!(body.contains("name=\"upload_id\"\r\n\r\ns1"));
        assert!(body.contains("name=\"part_number\"\r\n\r\n2"));
    }

    #[tokio::test]
    async fn part_credential_error_status() {
        let server = MockServer::start(vec![MockResponse::json(403, "{}")]).await;
        let session = UploadSession::new("s1", "k");
        let err = client(&server.url)
            .request_part_credential(&session, 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn finalize_sends_json_parts_and_returns_key() {
        let server = MockServer::start(vec![MockResponse::empty(204)]).await;

        let parts = vec![
            CompletedPart {
                part_number: 1,
                etag: "e1".into(),
            },
            CompletedPart {
                part_number: 2,
                etag: "e2".into(),
            },
        ];
        let key = client(&server.url)
            .finalize(UploadSession::new("s1", "temp/k.mp4"), &parts)
            .await
            .unwrap();
        assert_eq!(key, "temp/k.mp4");

        let reqs = server.requests();
        assert_eq!(reqs[0].path, COMPLETE_UPLOAD_PATH);
        let sent: CompleteUploadRequest = serde_json::from_slice(&reqs[0].body).unwrap();
        assert_eq!(sent.upload_id, "s1");
        assert_eq!(sent.s3_key, "temp/k.mp4");
        assert_eq!(sent.parts, parts);
    }

    #[tokio::test]
    async fn finalize_rejection_is_error() {
        let server =
            MockServer::start(vec![MockResponse::json(400, r#"{"detail":"InvalidPart"}"#)]).await;
        let err = client(&server.url)
            .finalize(UploadSession::new("s1", "k"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn playback_url_encodes_key_segments() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"playback_url":"https://cdn.example/v.m3u8"}"#,
        )])
        .await;

        let url = client(&server.url)
            .playback_url("temp/u1/my clip.mp4")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/v.m3u8");
        assert_eq!(
            server.requests()[0].path,
            "/video-temp/playback-url/temp/u1/my%20clip.mp4"
        );
    }

    #[tokio::test]
    async fn no_token_sends_no_authorization() {
        let server = MockServer::start(vec![MockResponse::json(
            200,
            r#"{"s3_key":"k","upload_id":"s"}"#,
        )])
        .await;
        let client = SessionClient::new(&server.url, None).unwrap();
        client.initialize("a.mp4", "video/mp4").await.unwrap();
        assert!(server.requests()[0].header("authorization").is_none());
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = SessionClient::new("https://api.example/v1/", None).unwrap();
        assert_eq!(
            c.url(INIT_UPLOAD_PATH),
            "https://api.example/v1/video-temp/temp-upload/main-video"
        );
    }

    #[test]
    fn invalid_base_url_rejected() {
        assert!(matches!(
            SessionClient::new("not a url", None),
            Err(Error::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            SessionClient::new("ftp://api.example", None),
            Err(Error::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn invalid_token_rejected() {
        assert!(matches!(
            SessionClient::new("https://api.example", Some("bad\ntoken")),
            Err(Error::InvalidToken)
        ));
    }
}
