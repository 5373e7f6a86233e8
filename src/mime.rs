//! MIME type constants.
//!
//! [`Context::body_parser`](crate::Context::body_parser) matches the request
//! `Content-Type` against these by prefix, so parameters such as
//! `; charset=utf-8` or `; boundary=…` do not get in the way.

pub const APPLICATION_JSON: &str        = "application/json";
pub const APPLICATION_JAVASCRIPT: &str  = "application/javascript";
pub const APPLICATION_XML: &str         = "application/xml";
pub const TEXT_XML: &str                = "text/xml";
pub const APPLICATION_FORM: &str        = "application/x-www-form-urlencoded";
pub const APPLICATION_PROTOBUF: &str    = "application/protobuf";
pub const APPLICATION_MSGPACK: &str     = "application/msgpack";
pub const TEXT_HTML: &str               = "text/html";
pub const TEXT_PLAIN: &str              = "text/plain";
pub const MULTIPART_FORM: &str          = "multipart/form-data";
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

/// `text/html` with an explicit charset, used for redirect bodies.
pub(crate) const TEXT_HTML_UTF8: &str   = "text/html; charset=utf-8";
