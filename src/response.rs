//! The outbound half of an exchange: [`ResponseWriter`] and [`Payload`].
//!
//! You should rarely touch the writer directly. [`Context`](crate::Context)
//! drives it; the writer only guarantees that the status line and headers are
//! fixed exactly once, by the first write.

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use tracing::{debug, warn};

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// A response sink: a mutable header map, a write-once status commit and an
/// incrementally written body.
///
/// Headers changed after the commit are not part of the response.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    headers: HeaderMap,
    committed: Option<(StatusCode, HeaderMap)>,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers that will be sent with the status line, until it is committed.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The committed status, if any write has happened yet.
    pub fn status(&self) -> Option<StatusCode> {
        self.committed.as_ref().map(|(status, _)| *status)
    }

    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    /// Commits `status` and a snapshot of the current headers.
    ///
    /// Only the first call has an effect.
    pub fn write_header(&mut self, status: StatusCode) {
        if let Some((sent, _)) = &self.committed {
            warn!(sent = %sent, ignored = %status, "superfluous write_header call");
            return;
        }
        self.committed = Some((status, self.headers.clone()));
    }

    /// Appends body bytes, committing `200 OK` first if nothing was committed.
    pub fn write(&mut self, chunk: &[u8]) {
        if self.committed.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(chunk);
    }

    /// Converts the sink into a response for the transport.
    ///
    /// A writer that never committed produces `200 OK` with its current headers.
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let (status, headers) = self
            .committed
            .unwrap_or((StatusCode::OK, self.headers));
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

// ── Payload ───────────────────────────────────────────────────────────────────

/// A body handed to [`Context::send`](crate::Context::send).
///
/// Text and bytes are written verbatim. Anything else goes through [`Json`].
/// `()` means "status only".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Raw(Bytes),
}

impl From<()> for Payload {
    fn from((): ()) -> Self { Self::Empty }
}

impl From<&str> for Payload {
    fn from(body: &str) -> Self { Self::Raw(Bytes::copy_from_slice(body.as_bytes())) }
}

impl From<String> for Payload {
    fn from(body: String) -> Self { Self::Raw(Bytes::from(body)) }
}

impl From<&[u8]> for Payload {
    fn from(body: &[u8]) -> Self { Self::Raw(Bytes::copy_from_slice(body)) }
}

impl From<Vec<u8>> for Payload {
    fn from(body: Vec<u8>) -> Self { Self::Raw(Bytes::from(body)) }
}

impl From<Bytes> for Payload {
    fn from(body: Bytes) -> Self { Self::Raw(body) }
}

/// Serialize the wrapped value as JSON when sent.
///
/// A value that fails to serialize becomes [`Payload::Empty`]: the status is
/// still committed, no body is written.
///
/// ```rust
/// use contxt::{Json, Payload};
///
/// let payload: Payload = Json(vec![1, 2, 3]).into();
/// assert_eq!(payload, Payload::Raw("[1,2,3]".into()));
/// ```
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> From<Json<T>> for Payload {
    fn from(Json(value): Json<T>) -> Self {
        match serde_json::to_vec(&value) {
            Ok(bytes) => Self::Raw(Bytes::from(bytes)),
            Err(e) => {
                debug!(error = %e, "discarding payload that failed to serialize");
                Self::Empty
            }
        }
    }
}
