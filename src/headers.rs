//! Binding request headers onto a typed record.
//!
//! A record opts in by implementing [`HeaderBindable`], usually through the
//! [`header_bindable!`](crate::header_bindable) macro:
//!
//! ```rust
//! contxt::header_bindable! {
//!     #[derive(Debug, Default)]
//!     pub struct Forwarded {
//!         #[header = "X-Forwarded-For"]
//!         pub client: String,
//!         #[header = "X-Request-Id"]
//!         pub request_id: String,
//!     }
//! }
//! ```
//!
//! Every declared field is overwritten: with the header's first value when it
//! is present, with `""` when it is not. Fields that are not declared are left
//! alone, which only a hand-written impl can express.

use std::borrow::Cow;

use http::{HeaderMap, HeaderName};

use crate::error::Error;

/// A record whose fields can be filled from request headers.
///
/// ```rust
/// use contxt::{Error, HeaderBindable, HeaderBinder};
///
/// #[derive(Default)]
/// struct Auth {
///     token: String,
///     attempts: u32, // not bound
/// }
///
/// impl HeaderBindable for Auth {
///     fn bind_headers(&mut self, headers: &HeaderBinder<'_>) -> Result<(), Error> {
///         headers.bind("Authorization", &mut self.token)
///     }
/// }
/// ```
pub trait HeaderBindable {
    fn bind_headers(&mut self, headers: &HeaderBinder<'_>) -> Result<(), Error>;
}

/// Read-only view over the request headers handed to [`HeaderBindable`].
pub struct HeaderBinder<'a> {
    headers: &'a HeaderMap,
}

impl<'a> HeaderBinder<'a> {
    pub(crate) fn new(headers: &'a HeaderMap) -> Self {
        Self { headers }
    }

    /// Sets `slot` to the first value of header `name`, or `""` if absent.
    ///
    /// Fails with [`Error::InvalidArgument`] when `name` is not a valid header
    /// name; `slot` is left untouched in that case.
    pub fn bind(&self, name: &str, slot: &mut String) -> Result<(), Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidArgument(format!("`{name}` is not a valid header name")))?;
        *slot = first_value(self.headers, name).into_owned();
        Ok(())
    }
}

/// First value of `name`, lossily decoded; `""` when absent.
pub(crate) fn first_value<K: http::header::AsHeaderName>(headers: &HeaderMap, name: K) -> Cow<'_, str> {
    match headers.get(name) {
        Some(value) => String::from_utf8_lossy(value.as_bytes()),
        None        => Cow::Borrowed(""),
    }
}

/// Declares a struct of `String` fields and implements [`HeaderBindable`] for
/// it. Each field names its header with `#[header = "…"]`, placed before any
/// other field attribute.
#[macro_export]
macro_rules! header_bindable {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                #[header = $header:literal]
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : String
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: String,
            )*
        }

        impl $crate::HeaderBindable for $name {
            fn bind_headers(
                &mut self,
                headers: &$crate::HeaderBinder<'_>,
            ) -> ::std::result::Result<(), $crate::Error> {
                $( headers.bind($header, &mut self.$field)?; )*
                Ok(())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::header_bindable! {
        #[derive(Debug, Default, PartialEq)]
        struct Foo {
            #[header = "X-Foo"]
            foo: String,
            #[header = "x-bar"]
            bar: String,
        }
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn present_headers_are_bound() {
        let map = headers(&[("x-foo", "bar"), ("x-bar", "baz")]);
        let mut target = Foo::default();
        target.bind_headers(&HeaderBinder::new(&map)).unwrap();
        assert_eq!(target, Foo { foo: "bar".into(), bar: "baz".into() });
    }

    #[test]
    fn absent_headers_blank_the_field() {
        let map = headers(&[("x-foo", "bar")]);
        let mut target = Foo { foo: "old".into(), bar: "old".into() };
        target.bind_headers(&HeaderBinder::new(&map)).unwrap();
        assert_eq!(target.foo, "bar");
        assert_eq!(target.bar, "");
    }

    #[test]
    fn first_value_wins() {
        let map = headers(&[("x-foo", "one"), ("x-foo", "two")]);
        let mut slot = String::new();
        HeaderBinder::new(&map).bind("X-Foo", &mut slot).unwrap();
        assert_eq!(slot, "one");
    }

    #[test]
    fn invalid_names_are_rejected() {
        let map = HeaderMap::new();
        let binder = HeaderBinder::new(&map);
        let mut slot = "kept".to_owned();

        for name in ["", "not a header", "x-foo\n"] {
            let err = binder.bind(name, &mut slot).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{name:?}: {err}");
        }
        assert_eq!(slot, "kept");
    }
}
