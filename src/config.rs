//! Body decoding configuration.
//!
//! Build one [`Config`] when the server starts, wrap it in an [`Arc`] and hand
//! a clone to every [`Context`](crate::Context). It is never mutated after
//! that, so contexts on different tasks can share it freely.
//!
//! [`Arc`]: std::sync::Arc

use serde::Deserialize;
use ubyte::{ByteUnit, ToByteUnit};

/// Limits applied while buffering request bodies.
///
/// Deserializable, so it can live inside the host application's own
/// configuration file:
///
/// ```rust
/// let config: contxt::Config = serde_json::from_str(
///     r#"{ "multipart_max_memory": "8 MiB" }"#,
/// ).unwrap();
/// assert_eq!(config.multipart_max_memory.as_u64(), 8 << 20);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound on an `application/x-www-form-urlencoded` body.
    pub form_max_size: ByteUnit,
    /// Upper bound on the text fields of a `multipart/form-data` body.
    ///
    /// File parts are streamed past without being kept and do not count.
    pub multipart_max_memory: ByteUnit,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            form_max_size: 10.mebibytes(),
            multipart_max_memory: 32.mebibytes(),
        }
    }
}
