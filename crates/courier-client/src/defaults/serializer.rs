//! Default body serializer.

use bytes::Bytes;
use courier_core::{
    Body, BodySerializer, Context, EncodedBody, Error, HeaderPatch, Request, Result,
};
use http::header::CONTENT_TYPE;
use http::HeaderValue;
use url::form_urlencoded;

/// Encodes request bodies into their wire form.
///
/// Text and binary bodies pass through untouched. Form fields are URL-encoded
/// and JSON values are serialized; both come back with a content-type header
/// instruction when the caller has not set one — the instruction is merged by
/// the transport, the request itself is never mutated.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBodySerializer;

impl DefaultBodySerializer {
    /// Creates the serializer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BodySerializer for DefaultBodySerializer {
    fn serialize(&self, request: &Request, _ctx: &Context) -> Result<EncodedBody> {
        let Some(body) = request.body() else {
            return Ok(EncodedBody::default());
        };
        let has_content_type = request.header(&CONTENT_TYPE).is_some();

        match body {
            Body::Text(text) => Ok(EncodedBody {
                payload: Some(Bytes::from(text.clone())),
                headers: HeaderPatch::new(),
            }),
            Body::Binary(bytes) => Ok(EncodedBody {
                payload: Some(bytes.clone()),
                headers: HeaderPatch::new(),
            }),
            Body::Form(fields) => {
                let mut serializer = form_urlencoded::Serializer::new(String::new());
                serializer.extend_pairs(fields.iter().map(|(key, value)| (key.as_str(), value.as_str())));
                let headers = if has_content_type {
                    HeaderPatch::new()
                } else {
                    HeaderPatch::new().set(
                        CONTENT_TYPE,
                        HeaderValue::from_static("application/x-www-form-urlencoded"),
                    )
                };
                Ok(EncodedBody {
                    payload: Some(Bytes::from(serializer.finish())),
                    headers,
                })
            }
            Body::Json(value) => {
                let payload = serde_json::to_vec(value)
                    .map_err(|err| Error::serialize("request body is not valid JSON", err))?;
                let headers = if has_content_type {
                    HeaderPatch::new()
                } else {
                    HeaderPatch::new()
                        .set(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                };
                Ok(EncodedBody {
                    payload: Some(Bytes::from(payload)),
                    headers,
                })
            }
        }
    }
}
