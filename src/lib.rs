//! # contxt
//!
//! A per-request context for hyper services. Wrap the incoming request, read
//! what you need from it, write the response, hand it back to hyper.
//!
//! ## The contract
//!
//! hyper (or whatever sits in front of it) owns the connection: TLS, routing,
//! timeouts, cancellation. contxt does not. It covers the handful of chores
//! every handler repeats:
//!
//! - **Body parsing** by `Content-Type`: JSON, urlencoded forms, multipart forms
//! - **Header binding** onto typed records via [`HeaderBindable`]
//! - **Response writing**: JSON, raw text/bytes, redirects, with a status that
//!   is committed exactly once
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use contxt::{Config, Context, Json};
//! use http::StatusCode;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize, Serialize)]
//! struct NewUser {
//!     name: String,
//! }
//!
//! async fn create_user(mut ctx: Context) -> http::Response<http_body_util::Full<bytes::Bytes>> {
//!     match ctx.body_parser::<NewUser>().await {
//!         Ok(user) => ctx.status(StatusCode::CREATED).send(Json(&user)),
//!         Err(e) => {
//!             let code = e.status_code();
//!             ctx.status(code).send(e.to_string());
//!         }
//!     }
//!     ctx.into_response()
//! }
//!
//! # async fn handle(req: http::Request<hyper::body::Incoming>, config: Arc<Config>) {
//! let ctx = Context::new(req, config);
//! let response = create_user(ctx).await;
//! # }
//! ```

mod body;
mod config;
mod context;
mod error;
mod form;
mod headers;
mod response;

pub mod mime;

pub use config::Config;
pub use context::Context;
pub use error::{DecodeError, Error};
pub use headers::{HeaderBindable, HeaderBinder};
pub use response::{Json, Payload, ResponseWriter};
