//! Buffering and decoding request bodies.
//!
//! [`Context::body_parser`](crate::Context::body_parser) picks one of these by
//! `Content-Type`; everything here works on an already-chosen format.

use bytes::Bytes;
use http::Method;
use http_body::Body;
use http_body_util::{BodyDataStream, BodyExt, Limited};
use serde::de::DeserializeOwned;
use tracing::debug;
use ubyte::ByteUnit;

use crate::error::{BoxError, DecodeError, Error};
use crate::form;

/// Form key/value pairs in wire order.
pub(crate) type FormPairs = Vec<(String, String)>;

/// Reads the whole body into memory.
pub(crate) async fn read_all<B>(body: B) -> Result<Bytes, Error>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| Error::Io(e.into()))
}

pub(crate) fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(bytes).map_err(|e| DecodeError::Json(e).into())
}

/// Decodes `pairs` into `T`. A repeated key keeps its last value unless the
/// field is a sequence.
pub(crate) fn decode_form<T: DeserializeOwned>(pairs: &[(String, String)]) -> Result<T, Error> {
    form::from_pairs(pairs).map_err(|e| DecodeError::Form(e).into())
}

/// Parses an `application/x-www-form-urlencoded` body.
///
/// Only `POST`, `PUT` and `PATCH` carry a form body; for any other method the
/// body is left unread and the form is empty.
pub(crate) async fn parse_urlencoded<B>(
    method: &Method,
    body: B,
    limit: ByteUnit,
) -> Result<FormPairs, Error>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        debug!(%method, "method carries no form body");
        return Ok(Vec::new());
    }

    let bytes = match Limited::new(body, limit.as_u64() as usize).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() => {
            return Err(DecodeError::PayloadTooLarge { limit }.into());
        }
        Err(e) => return Err(Error::Io(e)),
    };

    Ok(form_urlencoded::parse(&bytes).into_owned().collect())
}

/// Parses a `multipart/form-data` body, keeping text fields only.
///
/// Text fields together must fit within `limit`. File parts are streamed
/// through and dropped chunk by chunk, so they cost no memory and never count
/// against the limit.
pub(crate) async fn parse_multipart<B>(
    content_type: &str,
    body: B,
    limit: ByteUnit,
) -> Result<FormPairs, Error>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError> + 'static,
{
    let boundary = multer::parse_boundary(content_type).map_err(multipart_error)?;
    let mut multipart = multer::Multipart::new(BodyDataStream::new(body), boundary);

    let mut pairs = Vec::new();
    let mut in_memory = 0u64;
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if let Some(file_name) = field.file_name() {
            debug!(field = %name, file = %file_name, "skipping file part");
            let mut skipped = 0usize;
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                skipped += chunk.len();
            }
            debug!(field = %name, bytes = skipped, "file part drained");
            continue;
        }

        let mut value = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            in_memory += chunk.len() as u64;
            if in_memory > limit.as_u64() {
                return Err(DecodeError::PayloadTooLarge { limit }.into());
            }
            value.extend_from_slice(&chunk);
        }
        pairs.push((name, String::from_utf8_lossy(&value).into_owned()));
    }
    Ok(pairs)
}

fn multipart_error(e: multer::Error) -> Error {
    match e {
        multer::Error::StreamReadFailed(source) => Error::Io(source),
        e => DecodeError::Multipart(e).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use serde::Deserialize;
    use ubyte::ToByteUnit;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Login {
        user: String,
        #[serde(default)]
        remember: bool,
    }

    #[test]
    fn form_pairs_decode_by_field_name() {
        let pairs = vec![
            ("user".to_owned(), "alice smith".to_owned()),
            ("remember".to_owned(), "true".to_owned()),
            ("unknown".to_owned(), "ignored".to_owned()),
        ];
        let login: Login = decode_form(&pairs).unwrap();
        assert_eq!(login, Login { user: "alice smith".into(), remember: true });
    }

    #[test]
    fn form_with_wrong_type_is_a_decode_error() {
        let pairs = vec![
            ("user".to_owned(), "bob".to_owned()),
            ("remember".to_owned(), "maybe".to_owned()),
        ];
        let err = decode_form::<Login>(&pairs).unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Form(_))));
    }

    #[tokio::test]
    async fn urlencoded_body_is_ignored_for_get() {
        let body = Full::new(Bytes::from_static(b"user=alice"));
        let pairs = parse_urlencoded(&Method::GET, body, 1.kibibytes()).await.unwrap();
        assert!(pairs.is_empty());
    }

    #[tokio::test]
    async fn urlencoded_body_over_limit() {
        let body = Full::new(Bytes::from(vec![b'a'; 64]));
        let err = parse_urlencoded(&Method::POST, body, 16.bytes()).await.unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn urlencoded_body_is_read_for_put_and_patch() {
        for method in [Method::PUT, Method::PATCH] {
            let body = Full::new(Bytes::from_static(b"user=alice&remember=true"));
            let pairs = parse_urlencoded(&method, body, 1.kibibytes()).await.unwrap();
            assert_eq!(
                pairs,
                [("user".to_owned(), "alice".to_owned()), ("remember".to_owned(), "true".to_owned())],
                "{method}"
            );
        }
    }

    #[test]
    fn repeated_form_keys_keep_the_last_value() {
        let pairs = vec![
            ("user".to_owned(), "first".to_owned()),
            ("user".to_owned(), "last".to_owned()),
        ];
        let login: Login = decode_form(&pairs).unwrap();
        assert_eq!(login.user, "last");
    }

    #[tokio::test]
    async fn multipart_without_boundary() {
        let body = Full::new(Bytes::new());
        let err = parse_multipart("multipart/form-data", body, 1.kibibytes()).await.unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Multipart(_))));
    }
}
