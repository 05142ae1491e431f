#![forbid(unsafe_code)]

use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use url::Url;

use crate::{
    error::{NetError, NetResult},
    types::{Headers, NetOptions},
    ByteStream,
};

/// HTTP client used for metadata fetches and artifact downloads.
///
/// Thin wrapper over `reqwest` that turns non-success statuses into
/// [`NetError::HttpStatus`] instead of leaving them to the caller.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    options: NetOptions,
}

impl HttpClient {
    pub fn new(options: NetOptions) -> Self {
        let inner = Client::builder()
            .use_rustls_tls()
            .build()
            .expect("failed to build reqwest client");
        Self { inner, options }
    }

    pub fn options(&self) -> &NetOptions {
        &self.options
    }

    fn build_request(&self, url: Url, headers: Option<Headers>) -> reqwest::RequestBuilder {
        let mut req = self.inner.get(url);
        if let Some(headers) = headers {
            for (k, v) in headers.iter() {
                req = req.header(k, v);
            }
        }
        req
    }

    async fn check_status(response: reqwest::Response) -> NetResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(NetError::HttpStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            })
        }
    }

    /// Fetch a whole body into memory. Sized for metadata documents.
    pub async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> NetResult<Bytes> {
        let req = self
            .build_request(url, headers)
            .timeout(self.options.request_timeout);
        let resp = req.send().await.map_err(NetError::from)?;
        let resp = Self::check_status(resp).await?;
        resp.bytes().await.map_err(NetError::from)
    }

    /// Open a streaming GET. The returned response headers are exposed to
    /// the caller alongside the body stream.
    pub async fn stream(
        &self,
        url: Url,
        headers: Option<Headers>,
    ) -> NetResult<(Headers, ByteStream)> {
        let req = self
            .build_request(url, headers)
            .timeout(self.options.download_timeout);
        let resp = req.send().await.map_err(NetError::from)?;
        let resp = Self::check_status(resp).await?;

        let mut out = Headers::new();
        for (name, value) in resp.headers().iter() {
            if let Ok(v) = value.to_str() {
                out.insert(name.as_str(), v);
            }
        }

        let stream = resp.bytes_stream().map(|r| r.map_err(NetError::from));
        Ok((out, Box::pin(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;

    async fn run_test_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route("/ok", get(|| async { "payload" }))
            .route(
                "/missing",
                get(|| async { StatusCode::NOT_FOUND }),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://127.0.0.1:{}", addr.port())
    }

    #[tokio::test]
    async fn get_bytes_returns_body() {
        let base = run_test_server().await;
        let client = HttpClient::new(NetOptions::default());
        let url = format!("{base}/ok").parse().unwrap();

        let bytes = client.get_bytes(url, None).await.unwrap();
        assert_eq!(bytes, Bytes::from("payload"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let base = run_test_server().await;
        let client = HttpClient::new(NetOptions::default());
        let url = format!("{base}/missing").parse().unwrap();

        match client.get_bytes(url, None).await {
            Err(NetError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected HttpStatus error, got {other:?}"),
        }
    }
}
