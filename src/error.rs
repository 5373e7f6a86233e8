//! Unified error type.

use http::StatusCode;
use ubyte::ByteUnit;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by [`Context`](crate::Context)'s fallible operations.
///
/// Nothing here is logged or retried by the context itself: the caller decides
/// whether a failure becomes a `400`, a `415` or something else. Use
/// [`Error::status_code`] for the conventional mapping.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The request body stream could not be read.
    #[error("failed to read the request body")]
    Io(#[source] BoxError),
    /// The request body was read but does not match the target shape.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The request `Content-Type` is not one the body parser understands.
    #[error("cannot parse content-type: {0}")]
    UnsupportedMediaType(String),
    /// A value handed to the context cannot be used as asked.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The response value could not be serialized to JSON.
    #[error("failed to serialize the response body as JSON")]
    Serialization(#[source] serde_json::Error),
}

/// Why a request body could not be decoded.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("failed to deserialize the body as JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("failed to deserialize the body as a urlencoded form: {0}")]
    Form(#[source] serde::de::value::Error),
    #[error("failed to parse the multipart body: {0}")]
    Multipart(#[source] multer::Error),
    #[error("the request body is larger than the {limit} limit")]
    PayloadTooLarge { limit: ByteUnit },
}

impl Error {
    /// The status a handler would conventionally reply with for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Io(_)                                    => StatusCode::BAD_REQUEST,
            Self::Decode(DecodeError::PayloadTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Decode(_)                                => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType(_)                  => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::InvalidArgument(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ubyte::ToByteUnit;

    #[test]
    fn unsupported_media_type_names_the_offender() {
        let err = Error::UnsupportedMediaType("text/plain".to_owned());
        insta::assert_snapshot!(err, @"cannot parse content-type: text/plain");
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn oversized_bodies_map_to_413() {
        let err = Error::from(DecodeError::PayloadTooLarge { limit: 16.bytes() });
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn malformed_json_maps_to_400() {
        let source = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err = Error::from(DecodeError::Json(source));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("failed to deserialize the body as JSON"));
    }
}
