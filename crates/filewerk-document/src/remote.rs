// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Remote conversion: hand the file to an HTTP conversion service.
//
// Request:  POST <endpoint>  { "filename": "...", "data": "<base64>" }
// Response: 2xx              { "filename": "...", "data": "<base64>" }
//
// `filename` in the response is optional; without it the output is named
// after the input with the configured extension.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use filewerk_core::error::{FilewerkError, Result};
use filewerk_core::{Artifact, FileFormat, JobInput, TimeoutClass, TransformAdapter, TransformContext};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Characters of an error body kept in `RemoteStatus`.
const ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Serialize)]
struct ConvertRequest<'a> {
    filename: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    #[serde(default)]
    filename: Option<String>,
    data: String,
}

#[derive(Debug, Clone)]
pub struct RemoteConvertOptions {
    /// Output format when the service does not name the result.
    pub output: FileFormat,
}

impl Default for RemoteConvertOptions {
    fn default() -> Self {
        Self {
            output: FileFormat::Pdf,
        }
    }
}

/// Conversion delegated to a remote HTTP service.
pub struct RemoteConvert {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl RemoteConvert {
    /// `timeout` bounds the whole request, response body included.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|err| {
            FilewerkError::Validation(format!("invalid remote endpoint {endpoint:?}: {err}"))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(FilewerkError::Validation(format!(
                "remote endpoint must be http or https, got {}",
                endpoint.scheme()
            )));
        }
        Ok(Self {
            client: Client::new(),
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_error(&self, err: reqwest::Error) -> FilewerkError {
        if err.is_timeout() {
            FilewerkError::RemoteTimeout(self.timeout.as_secs())
        } else if err.is_decode() {
            FilewerkError::MalformedResponse(err.to_string())
        } else {
            FilewerkError::Network(format!("{}: {}", self.endpoint, err))
        }
    }

    async fn round_trip(&self, filename: &str, bytes: &[u8]) -> Result<Vec<u8>> {
        let body = ConvertRequest {
            filename,
            data: STANDARD.encode(bytes),
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|err| self.request_error(err))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Remote conversion rejected");
            return Err(FilewerkError::RemoteStatus {
                status: status.as_u16(),
                detail: text.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }

        let body = resp.bytes().await.map_err(|err| self.request_error(err))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl TransformAdapter for RemoteConvert {
    type Options = RemoteConvertOptions;

    fn name(&self) -> &'static str {
        "remote-convert"
    }

    fn timeout_class(&self) -> TimeoutClass {
        TimeoutClass::Remote
    }

    #[instrument(skip_all, fields(job_id = %ctx.job_id, endpoint = %self.endpoint))]
    async fn transform(
        &self,
        input: &JobInput,
        options: &RemoteConvertOptions,
        ctx: &TransformContext,
    ) -> Result<Vec<Artifact>> {
        let file = input.file()?;
        ctx.progress.report(0.1);

        let body = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(FilewerkError::Cancelled),
            body = self.round_trip(file.name(), file.bytes()) => body?,
        };
        ctx.progress.report(0.9);

        let fallback = format!("{}.{}", file.stem(), options.output.extension());
        let artifact = decode_response(&body, &fallback)?;
        info!(
            in_bytes = file.size(),
            out_bytes = artifact.size(),
            output = %artifact.filename,
            "Remote conversion complete"
        );
        Ok(vec![artifact])
    }
}

/// Turn a service response body into an artifact.
///
/// Names from the service are reduced to their final path component.
pub fn decode_response(body: &[u8], fallback_name: &str) -> Result<Artifact> {
    let response: ConvertResponse = serde_json::from_slice(body)
        .map_err(|err| FilewerkError::MalformedResponse(format!("not the expected JSON: {err}")))?;

    let bytes = STANDARD
        .decode(response.data.trim())
        .map_err(|err| FilewerkError::MalformedResponse(format!("data is not base64: {err}")))?;
    if bytes.is_empty() {
        return Err(FilewerkError::MalformedResponse("converted file is empty".into()));
    }

    let filename = response
        .filename
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(fallback_name)
        .to_owned();
    debug!(%filename, bytes = bytes.len(), "Remote response decoded");

    let media_type = FileFormat::from_filename(&filename)
        .map_or("application/octet-stream", |format| format.mime_type());
    Ok(Artifact::with_media_type(filename, bytes, media_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filewerk_core::{JobId, SourceFile};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one HTTP request with a canned response, after `delay`.
    async fn one_shot_server(status: &'static str, body: String, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.expect("read");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            tokio::time::sleep(delay).await;
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });

        format!("http://{addr}/convert")
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        body.len() >= length
    }

    fn docx() -> JobInput {
        JobInput::File(SourceFile::new("letter.docx", b"PK fake docx".to_vec(), None))
    }

    fn ctx() -> TransformContext {
        TransformContext::detached(JobId::new())
    }

    #[test]
    fn response_name_is_flattened() {
        let body = format!(r#"{{"filename":"../../etc/out.pdf","data":"{}"}}"#, STANDARD.encode(b"%PDF"));
        let artifact = decode_response(body.as_bytes(), "letter.pdf").expect("decode");
        assert_eq!(artifact.filename, "out.pdf");
        assert_eq!(artifact.bytes, b"%PDF");
        assert_eq!(artifact.media_type, "application/pdf");
    }

    #[test]
    fn missing_name_uses_fallback() {
        let body = format!(r#"{{"data":"{}"}}"#, STANDARD.encode(b"%PDF"));
        let artifact = decode_response(body.as_bytes(), "letter.pdf").expect("decode");
        assert_eq!(artifact.filename, "letter.pdf");
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        for body in [
            "<html>oops</html>",
            r#"{"filename":"x.pdf"}"#,
            r#"{"data":"***not base64***"}"#,
            r#"{"data":""}"#,
        ] {
            assert!(
                matches!(
                    decode_response(body.as_bytes(), "x.pdf"),
                    Err(FilewerkError::MalformedResponse(_))
                ),
                "{body}"
            );
        }
    }

    #[test]
    fn endpoint_must_be_http() {
        assert!(RemoteConvert::new("ftp://example.com/convert", Duration::from_secs(5)).is_err());
        assert!(RemoteConvert::new("not a url", Duration::from_secs(5)).is_err());
        assert!(RemoteConvert::new("https://example.com/convert", Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn successful_round_trip() {
        let body = format!(r#"{{"filename":"letter.pdf","data":"{}"}}"#, STANDARD.encode(b"%PDF-1.7 remote"));
        let url = one_shot_server("200 OK", body, Duration::ZERO).await;
        let adapter = RemoteConvert::new(&url, Duration::from_secs(5)).expect("endpoint");

        let out = adapter
            .transform(&docx(), &RemoteConvertOptions::default(), &ctx())
            .await
            .expect("convert");
        assert_eq!(out[0].filename, "letter.pdf");
        assert_eq!(out[0].bytes, b"%PDF-1.7 remote");
    }

    #[tokio::test]
    async fn error_status_is_surfaced() {
        let url = one_shot_server("502 Bad Gateway", "upstream down".into(), Duration::ZERO).await;
        let adapter = RemoteConvert::new(&url, Duration::from_secs(5)).expect("endpoint");

        let err = adapter
            .transform(&docx(), &RemoteConvertOptions::default(), &ctx())
            .await
            .expect_err("502");
        assert!(matches!(err, FilewerkError::RemoteStatus { status: 502, ref detail } if detail == "upstream down"));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let url = one_shot_server("200 OK", "{}".into(), Duration::from_secs(5)).await;
        let adapter = RemoteConvert::new(&url, Duration::from_millis(200)).expect("endpoint");

        let err = adapter
            .transform(&docx(), &RemoteConvertOptions::default(), &ctx())
            .await
            .expect_err("timeout");
        assert!(matches!(err, FilewerkError::RemoteTimeout(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let adapter = RemoteConvert::new(&format!("http://{addr}/convert"), Duration::from_secs(5))
            .expect("endpoint");
        let err = adapter
            .transform(&docx(), &RemoteConvertOptions::default(), &ctx())
            .await
            .expect_err("refused");
        assert!(matches!(err, FilewerkError::Network(_)));
    }

    #[tokio::test]
    async fn cancellation_abandons_the_request() {
        let url = one_shot_server("200 OK", "{}".into(), Duration::from_secs(5)).await;
        let adapter = RemoteConvert::new(&url, Duration::from_secs(30)).expect("endpoint");
        let ctx = ctx();
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let err = adapter
            .transform(&docx(), &RemoteConvertOptions::default(), &ctx)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, FilewerkError::Cancelled));
    }
}
