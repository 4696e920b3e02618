//! Default transport backed by `reqwest`.

use async_trait::async_trait;
use bytes::BytesMut;
use courier_core::{
    BodySerializer, Context, Error, ProgressDirection, ProgressInfo, Request, Result, Transport,
    TransportResult,
};
use futures::StreamExt;
use http::HeaderMap;
use std::sync::Arc;

/// Transport that performs the network call with a shared [`reqwest::Client`].
///
/// The serializer's header instructions are applied first and the request's
/// own headers merged over them, so an explicit caller content-type always
/// wins. The merged cancellation token is observed both while the request is
/// in flight and while the body is being read; an abort surfaces as the
/// untyped [`Error::Network`] bucket for the error mapper to classify.
///
/// Progress reporting is best-effort: upload progress is a single sample when
/// the payload size is known, download progress is per received chunk.
pub struct HttpTransport {
    client: reqwest::Client,
    serializer: Arc<dyn BodySerializer>,
}

impl HttpTransport {
    /// Creates a transport with a fresh connection pool.
    #[must_use]
    pub fn new(serializer: Arc<dyn BodySerializer>) -> Self {
        Self {
            client: reqwest::Client::new(),
            serializer,
        }
    }

    /// Creates a transport reusing an existing `reqwest` client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, serializer: Arc<dyn BodySerializer>) -> Self {
        Self { client, serializer }
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &Request, ctx: &Context) -> Result<TransportResult> {
        let encoded = self.serializer.serialize(request, ctx)?;

        let mut headers = HeaderMap::new();
        encoded.headers.apply(&mut headers);
        let request_headers = request.headers();
        for (name, value) in &request_headers {
            headers.insert(name, value.clone());
        }

        if let Some(on_upload) = &request.meta().on_upload_progress {
            if let Some(payload) = &encoded.payload {
                let total = payload.len() as u64;
                on_upload(&ProgressInfo {
                    loaded: total,
                    total: Some(total),
                    direction: ProgressDirection::Upload,
                });
            }
        }

        let mut builder = self
            .client
            .request(request.method().clone(), request.url())
            .headers(headers);
        if let Some(payload) = encoded.payload {
            builder = builder.body(payload);
        }

        let cancellation = ctx.cancellation();
        let response = tokio::select! {
            outcome = builder.send() => {
                outcome.map_err(|err| Error::network_with_cause("transport failure", err))?
            }
            () = cancellation.cancelled() => {
                return Err(Error::network("request aborted in flight"));
            }
        };

        let status = response.status();
        let response_headers = response.headers().clone();
        let url = response.url().to_string();

        let body = if let Some(on_download) = request.meta().on_download_progress.clone() {
            let total = response.content_length();
            let mut stream = response.bytes_stream();
            let mut buffer = BytesMut::new();
            loop {
                let chunk = tokio::select! {
                    chunk = stream.next() => chunk,
                    () = cancellation.cancelled() => {
                        return Err(Error::network("request aborted while reading body"));
                    }
                };
                match chunk {
                    Some(Ok(bytes)) => {
                        buffer.extend_from_slice(&bytes);
                        on_download(&ProgressInfo {
                            loaded: buffer.len() as u64,
                            total,
                            direction: ProgressDirection::Download,
                        });
                    }
                    Some(Err(err)) => {
                        return Err(Error::network_with_cause("failed to read response body", err));
                    }
                    None => break,
                }
            }
            buffer.freeze()
        } else {
            tokio::select! {
                outcome = response.bytes() => {
                    outcome.map_err(|err| Error::network_with_cause("failed to read response body", err))?
                }
                () = cancellation.cancelled() => {
                    return Err(Error::network("request aborted while reading body"));
                }
            }
        };

        Ok(TransportResult {
            status,
            headers: response_headers,
            url,
            body,
        })
    }
}
