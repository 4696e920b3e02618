//! Default response decoder.

use async_trait::async_trait;
use courier_core::{
    BodyPreview, Context, DecodedBody, Error, Request, Response, ResponseDecoder, ResponseKind,
    Result, TransportResult,
};
use http::header::CONTENT_TYPE;
use http::HeaderMap;

/// Decodes transport results into [`Response`] values.
///
/// Statuses outside 2xx fail with [`Error::Http`] carrying a best-effort body
/// preview. On success the response kind is negotiated in priority order:
/// explicit per-request override, content-type sniffing, configured default,
/// then either a strict-mode failure or a raw passthrough.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponseDecoder {
    default_kind: Option<ResponseKind>,
    strict: bool,
}

impl DefaultResponseDecoder {
    /// Creates a decoder with no default kind, non-strict.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the kind used when nothing else determines one.
    #[must_use]
    pub fn with_default_kind(mut self, kind: ResponseKind) -> Self {
        self.default_kind = Some(kind);
        self
    }

    /// In strict mode an undeterminable response kind is a failure instead of
    /// a raw passthrough.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn negotiate(&self, request: &Request, result: &TransportResult) -> Result<ResponseKind> {
        if let Some(kind) = request.meta().response_kind {
            return Ok(kind);
        }
        let content_type = content_type(&result.headers).unwrap_or_default();
        if content_type.contains("application/json") {
            return Ok(ResponseKind::Json);
        }
        if content_type.contains("text/") {
            return Ok(ResponseKind::Text);
        }
        if let Some(kind) = self.default_kind {
            return Ok(kind);
        }
        if self.strict {
            return Err(Error::config(
                "unable to determine response type in strict mode",
            ));
        }
        Ok(ResponseKind::Raw)
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_ascii_lowercase)
}

/// Best-effort preview of a failed response body. Failures here are
/// swallowed; the HTTP error is what matters.
fn capture_preview(result: &TransportResult) -> Option<BodyPreview> {
    let content_type = content_type(&result.headers).unwrap_or_default();
    if content_type.contains("application/json") {
        serde_json::from_slice(&result.body).ok().map(BodyPreview::Json)
    } else {
        Some(BodyPreview::Text(
            String::from_utf8_lossy(&result.body).into_owned(),
        ))
    }
}

#[async_trait]
impl ResponseDecoder for DefaultResponseDecoder {
    async fn decode(
        &self,
        request: &Request,
        result: TransportResult,
        _ctx: &Context,
    ) -> Result<Response> {
        if !result.status.is_success() {
            let preview = capture_preview(&result);
            return Err(Error::http(
                result.status,
                result.url,
                preview,
                result.headers,
            ));
        }

        let kind = self.negotiate(request, &result)?;
        let data = match kind {
            ResponseKind::Raw => None,
            ResponseKind::Json => Some(DecodedBody::Json(
                serde_json::from_slice(&result.body).map_err(|err| {
                    Error::decode(ResponseKind::Json, result.status, result.url.as_str(), err)
                })?,
            )),
            ResponseKind::Text => Some(DecodedBody::Text(
                std::str::from_utf8(&result.body)
                    .map(str::to_string)
                    .map_err(|err| {
                        Error::decode(ResponseKind::Text, result.status, result.url.as_str(), err)
                    })?,
            )),
            ResponseKind::Binary => Some(DecodedBody::Binary(result.body.clone())),
        };

        let mut builder = Response::builder(result.status, result.url.as_str())
            .headers(result.headers)
            .raw(result.body);
        if let Some(data) = data {
            builder = builder.data(data);
        }
        Ok(builder.build())
    }
}
