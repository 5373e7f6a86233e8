//! The per-exchange [`Context`].

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::request::Parts;
use http::{HeaderValue, Method, StatusCode};
use http_body::Body;
use http_body_util::Full;
use hyper::body::Incoming;
use percent_encoding::{CONTROLS, utf8_percent_encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::body::{self, FormPairs};
use crate::config::Config;
use crate::error::{BoxError, Error};
use crate::headers::{HeaderBindable, HeaderBinder, first_value};
use crate::mime;
use crate::response::{Payload, ResponseWriter};

/// One inbound request and one outbound response, for the lifetime of a
/// single exchange.
///
/// The only state of its own is the pending status set by [`status`]; the
/// first writing call ([`json`], [`send`], [`xml`], [`redirect`]) commits it
/// together with the response headers.
///
/// A `Context` is owned by the task handling the request. It is never shared.
///
/// [`status`]: Context::status
/// [`json`]: Context::json
/// [`send`]: Context::send
/// [`xml`]: Context::xml
/// [`redirect`]: Context::redirect
pub struct Context<B = Incoming> {
    status: Option<StatusCode>,
    head: Parts,
    body: Option<B>,
    form: Option<FormPairs>,
    config: Arc<Config>,
    writer: ResponseWriter,
}

impl<B> Context<B> {
    pub fn new(request: http::Request<B>, config: Arc<Config>) -> Self {
        let (head, body) = request.into_parts();
        Self {
            status: None,
            head,
            body: Some(body),
            form: None,
            config,
            writer: ResponseWriter::new(),
        }
    }

    /// Method, URI, version and headers of the request.
    pub fn request(&self) -> &Parts {
        &self.head
    }

    /// The response sink, for headers these helpers don't set.
    pub fn writer(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    /// First value of request header `key`, `""` if absent.
    pub fn get(&self, key: &str) -> Cow<'_, str> {
        first_value(&self.head.headers, key)
    }

    /// First value of query parameter `key`, `""` if absent.
    pub fn query(&self, key: &str) -> Cow<'_, str> {
        let query = self.head.uri.query().unwrap_or_default();
        form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .unwrap_or(Cow::Borrowed(""))
    }

    /// Fills the fields of `target` from the request headers.
    ///
    /// ```rust
    /// # use std::sync::Arc;
    /// # use bytes::Bytes;
    /// # use http_body_util::Full;
    /// use contxt::Context;
    ///
    /// contxt::header_bindable! {
    ///     #[derive(Default)]
    ///     struct Trace {
    ///         #[header = "X-Request-Id"]
    ///         id: String,
    ///     }
    /// }
    ///
    /// let request = http::Request::builder()
    ///     .header("x-request-id", "abc")
    ///     .body(Full::new(Bytes::new()))
    ///     .unwrap();
    /// let ctx = Context::new(request, Arc::default());
    ///
    /// let mut trace = Trace::default();
    /// ctx.headers(&mut trace).unwrap();
    /// assert_eq!(trace.id, "abc");
    /// ```
    pub fn headers<T: HeaderBindable + ?Sized>(&self, target: &mut T) -> Result<(), Error> {
        target.bind_headers(&HeaderBinder::new(&self.head.headers))
    }

    /// Records the status for the first write. Nothing is written yet.
    pub fn status(&mut self, code: StatusCode) -> &mut Self {
        self.status = Some(code);
        self
    }

    /// Serializes `value` as an `application/json` response.
    ///
    /// The status is committed before serializing: on failure the response
    /// keeps that status with an empty body, and the error is returned.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.set_content_type(mime::APPLICATION_JSON);
        self.commit();

        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self.writer.write(&bytes);
                Ok(())
            }
            Err(e) => {
                self.writer.write(b"");
                Err(Error::Serialization(e))
            }
        }
    }

    /// Commits the status and writes `payload` as the body.
    ///
    /// ```rust,ignore
    /// ctx.send(());                      // status only
    /// ctx.send("hello");                 // verbatim
    /// ctx.send(Json(&user));             // serialized, errors discarded
    /// ```
    pub fn send(&mut self, payload: impl Into<Payload>) {
        self.commit();
        if let Payload::Raw(bytes) = payload.into() {
            self.writer.write(&bytes);
        }
    }

    /// Labels the response `application/xml`, then behaves like [`send`].
    ///
    /// No XML encoding happens: pass markup you already rendered.
    ///
    /// [`send`]: Context::send
    pub fn xml(&mut self, payload: impl Into<Payload>) {
        self.set_content_type(mime::APPLICATION_XML);
        self.send(payload);
    }

    /// Redirects to `path` with `status`, `302 Found` by default.
    ///
    /// A relative `path` is resolved against the request path and cleaned;
    /// targets with a scheme or host are left as they are. Non-ASCII bytes
    /// are percent-encoded in `Location`.
    ///
    /// If no content type is set yet, `GET` and `HEAD` responses are labelled
    /// `text/html`, and `GET` also gets a short HTML body linking to the target.
    pub fn redirect(&mut self, path: &str, status: Option<StatusCode>) {
        let code = status.unwrap_or(StatusCode::FOUND);
        let target = resolve_redirect(self.head.uri.path(), path);

        let location = utf8_percent_encode(&target, CONTROLS).to_string();
        match HeaderValue::from_str(&location) {
            Ok(location) => {
                self.writer.headers_mut().insert(LOCATION, location);
            }
            Err(e) => debug!(%location, error = %e, "redirect target is not a valid header value"),
        }

        let had_content_type = self.writer.headers().contains_key(CONTENT_TYPE);
        if !had_content_type && matches!(self.head.method, Method::GET | Method::HEAD) {
            self.set_content_type(mime::TEXT_HTML_UTF8);
        }

        self.writer.write_header(code);
        if !had_content_type && self.head.method == Method::GET {
            let reason = code.canonical_reason().unwrap_or_default();
            let html = format!("<a href=\"{}\">{reason}</a>.\n\n", html_escape(&target));
            self.writer.write(html.as_bytes());
        }
    }

    /// Hands the committed response back to the transport.
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        self.writer.into_response()
    }

    fn set_content_type(&mut self, content_type: &'static str) {
        self.writer
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    fn commit(&mut self) {
        self.writer.write_header(self.status.unwrap_or(StatusCode::OK));
    }
}

// ── Body parsing ──────────────────────────────────────────────────────────────

impl<B> Context<B>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError> + 'static,
{
    /// Decodes the request body according to its `Content-Type`.
    ///
    /// | Content-Type prefix                 | Decoding                          |
    /// |-------------------------------------|-----------------------------------|
    /// | `application/json`                  | JSON                              |
    /// | `application/x-www-form-urlencoded` | form fields, by field name        |
    /// | `multipart/form-data`               | text fields, by field name        |
    ///
    /// Anything else fails with [`Error::UnsupportedMediaType`]. The body can
    /// be consumed once: a second JSON parse sees an empty body, while form
    /// parses reuse the fields read the first time.
    pub async fn body_parser<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let content_type = self.get(CONTENT_TYPE.as_str()).into_owned();

        if content_type.starts_with(mime::APPLICATION_JSON) {
            let bytes = match self.body.take() {
                Some(body) => body::read_all(body).await?,
                None => Bytes::new(),
            };
            return body::decode_json(&bytes);
        }

        if content_type.starts_with(mime::APPLICATION_FORM) {
            if self.form.is_none() {
                let pairs = match self.body.take() {
                    Some(body) => {
                        body::parse_urlencoded(&self.head.method, body, self.config.form_max_size)
                            .await?
                    }
                    None => Vec::new(),
                };
                self.form = Some(pairs);
            }
            return body::decode_form(self.form.as_deref().unwrap_or_default());
        }

        if content_type.starts_with(mime::MULTIPART_FORM) {
            if self.form.is_none() {
                let body_pairs = match self.body.take() {
                    Some(body) => {
                        body::parse_multipart(&content_type, body, self.config.multipart_max_memory)
                            .await?
                    }
                    None => Vec::new(),
                };
                // Query first, so a body field of the same name wins.
                let query = self.head.uri.query().unwrap_or_default();
                let mut pairs: FormPairs = form_urlencoded::parse(query.as_bytes()).into_owned().collect();
                pairs.extend(body_pairs);
                self.form = Some(pairs);
            }
            return body::decode_form(self.form.as_deref().unwrap_or_default());
        }

        debug!(content_type = %content_type, "no body parser for content type");
        Err(Error::UnsupportedMediaType(content_type))
    }
}

/// Resolves a redirect target against the path of the current request.
fn resolve_redirect<'a>(request_path: &str, target: &'a str) -> Cow<'a, str> {
    if has_scheme(target) || target.starts_with("//") {
        return Cow::Borrowed(target);
    }

    let joined = if target.starts_with('/') {
        target.to_owned()
    } else {
        let request_path = if request_path.is_empty() { "/" } else { request_path };
        let dir = &request_path[..request_path.rfind('/').map_or(0, |i| i + 1)];
        format!("{dir}{target}")
    };

    let (path, query) = match joined.find('?') {
        Some(i) => joined.split_at(i),
        None => (joined.as_str(), ""),
    };
    let mut cleaned = clean_path(path);
    if path.ends_with('/') && !cleaned.ends_with('/') {
        cleaned.push('/');
    }
    cleaned.push_str(query);
    Cow::Owned(cleaned)
}

/// `scheme ":"` per RFC 3986: a letter, then letters, digits, `+`, `-` or `.`.
fn has_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Lexically cleans a path: drops empty and `.` segments, applies `..`.
/// The result is always rooted.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".."     => { segments.pop(); }
            segment  => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

fn html_escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&'  => escaped.push_str("&amp;"),
            '<'  => escaped.push_str("&lt;"),
            '>'  => escaped.push_str("&gt;"),
            '"'  => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            c    => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_redirects_resolve_against_the_request_path() {
        assert_eq!(resolve_redirect("/a/b", "c"), "/a/c");
        assert_eq!(resolve_redirect("/a/b/c", "../x?y=1"), "/a/x?y=1");
        assert_eq!(resolve_redirect("/a/", "b/"), "/a/b/");
        assert_eq!(resolve_redirect("/a/b", "/x/./y//z/.."), "/x/y");
        assert_eq!(resolve_redirect("/a", "../../.."), "/");
        assert_eq!(resolve_redirect("/a/b", ""), "/a/");
    }

    #[test]
    fn absolute_redirects_are_untouched() {
        assert_eq!(resolve_redirect("/a", "https://example.com/x/../y"), "https://example.com/x/../y");
        assert_eq!(resolve_redirect("/a", "//cdn.example.com/z"), "//cdn.example.com/z");
        assert_eq!(resolve_redirect("/a", "mailto:me@example.com"), "mailto:me@example.com");
    }

    #[test]
    fn scheme_detection() {
        assert!(has_scheme("http://x"));
        assert!(has_scheme("svn+ssh://x"));
        assert!(!has_scheme("/a:b"));
        assert!(!has_scheme("1abc:x"));
        assert!(!has_scheme("plain"));
    }

    #[test]
    fn escapes_markup_in_redirect_targets() {
        assert_eq!(html_escape("/plain"), "/plain");
        assert_eq!(html_escape("/a?x=1&y=<2>"), "/a?x=1&amp;y=&lt;2&gt;");
        assert_eq!(html_escape(r#"/"q'"#), "/&#34;q&#39;");
    }
}
