//! Decoding form key/value pairs into a typed record.
//!
//! Pairs are grouped by key, in order of first appearance. A scalar field
//! takes the last value sent for its key; a sequence field takes all of them.
//!
//! ```text
//! name=first&name=last&tag=a&tag=b   →   { name: "last", tags: ["a", "b"] }
//! ```

use serde::de::value::{Error, MapDeserializer, SeqDeserializer};
use serde::de::{self, IntoDeserializer, Unexpected, Visitor};
use serde::forward_to_deserialize_any;

/// Decodes `pairs` into `T`, field names matching form keys.
pub(crate) fn from_pairs<T: de::DeserializeOwned>(pairs: &[(String, String)]) -> Result<T, Error> {
    T::deserialize(FormDeserializer::new(pairs))
}

// ── Whole form ────────────────────────────────────────────────────────────────

struct FormDeserializer {
    entries: Vec<(String, Values)>,
}

impl FormDeserializer {
    fn new(pairs: &[(String, String)]) -> Self {
        let mut entries: Vec<(String, Values)> = Vec::new();
        for (key, value) in pairs {
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some((_, values)) => values.0.push(value.clone()),
                None => entries.push((key.clone(), Values(vec![value.clone()]))),
            }
        }
        Self { entries }
    }
}

impl<'de> de::Deserializer<'de> for FormDeserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_map(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let mut map = MapDeserializer::<_, Error>::new(self.entries.into_iter());
        let value = visitor.visit_map(&mut map)?;
        map.end()?;
        Ok(value)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_map(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct seq tuple tuple_struct enum
        identifier ignored_any
    }
}

// ── Every value of one key ────────────────────────────────────────────────────

struct Values(Vec<String>);

impl Values {
    fn last(mut self) -> Value {
        Value(self.0.pop().unwrap_or_default())
    }
}

impl<'de> IntoDeserializer<'de, Error> for Values {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

macro_rules! forward_to_last {
    ($($method:ident)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
            self.last().$method(visitor)
        }
    )*};
}

impl<'de> de::Deserializer<'de> for Values {
    type Error = Error;

    forward_to_last! {
        deserialize_any deserialize_bool
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64 deserialize_i128
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64 deserialize_u128
        deserialize_f32 deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf deserialize_unit deserialize_identifier
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_some(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        let mut seq = SeqDeserializer::<_, Error>::new(self.0.into_iter().map(Value));
        let value = visitor.visit_seq(&mut seq)?;
        seq.end()?;
        Ok(value)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.last().deserialize_enum(name, variants, visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! { map struct }
}

// ── A single value ────────────────────────────────────────────────────────────

struct Value(String);

impl<'de> IntoDeserializer<'de, Error> for Value {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

macro_rules! parse_scalar {
    ($($method:ident => $visit:ident)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
            match self.0.parse() {
                Ok(parsed) => visitor.$visit(parsed),
                Err(_) => Err(de::Error::invalid_value(Unexpected::Str(&self.0), &visitor)),
            }
        }
    )*};
}

impl<'de> de::Deserializer<'de> for Value {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_string(self.0)
    }

    parse_scalar! {
        deserialize_bool => visit_bool
        deserialize_i8   => visit_i8
        deserialize_i16  => visit_i16
        deserialize_i32  => visit_i32
        deserialize_i64  => visit_i64
        deserialize_i128 => visit_i128
        deserialize_u8   => visit_u8
        deserialize_u16  => visit_u16
        deserialize_u32  => visit_u32
        deserialize_u64  => visit_u64
        deserialize_u128 => visit_u128
        deserialize_f32  => visit_f32
        deserialize_f64  => visit_f64
        deserialize_char => visit_char
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_some(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_enum(self.0.into_deserializer())
    }

    forward_to_deserialize_any! {
        str string bytes byte_buf unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Role {
        Admin,
        Guest,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Signup {
        name: String,
        age: u8,
        #[serde(default)]
        tags: Vec<String>,
        nickname: Option<String>,
        role: Role,
        #[serde(default)]
        newsletter: bool,
    }

    #[test]
    fn scalars_take_the_last_value() {
        let signup: Signup = from_pairs(&pairs(&[
            ("name", "first"),
            ("age", "20"),
            ("role", "guest"),
            ("name", "last"),
            ("age", "21"),
        ]))
        .unwrap();
        assert_eq!(signup.name, "last");
        assert_eq!(signup.age, 21);
        assert_eq!(signup.role, Role::Guest);
    }

    #[test]
    fn sequences_take_every_value_in_order() {
        let signup: Signup = from_pairs(&pairs(&[
            ("tags", "b"),
            ("name", "n"),
            ("tags", "a"),
            ("age", "3"),
            ("role", "admin"),
            ("tags", "c"),
        ]))
        .unwrap();
        assert_eq!(signup.tags, ["b", "a", "c"]);
        assert_eq!(signup.role, Role::Admin);
    }

    #[test]
    fn optional_and_defaulted_fields() {
        let signup: Signup = from_pairs(&pairs(&[
            ("name", "n"),
            ("age", "3"),
            ("role", "admin"),
            ("nickname", "nn"),
            ("newsletter", "true"),
            ("unknown", "ignored"),
        ]))
        .unwrap();
        assert_eq!(signup.nickname.as_deref(), Some("nn"));
        assert!(signup.newsletter);
        assert!(signup.tags.is_empty());
    }

    #[test]
    fn unparsable_scalar_is_an_error() {
        let err = from_pairs::<Signup>(&pairs(&[("name", "n"), ("age", "old"), ("role", "admin")]))
            .unwrap_err();
        assert!(err.to_string().contains("old"), "{err}");
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let err = from_pairs::<Signup>(&pairs(&[("age", "1"), ("role", "admin")])).unwrap_err();
        assert!(err.to_string().contains("name"), "{err}");
    }

    #[test]
    fn decodes_into_a_map() {
        use std::collections::BTreeMap;

        let map: BTreeMap<String, String> =
            from_pairs(&pairs(&[("a", "1"), ("b", "2"), ("a", "3")])).unwrap();
        assert_eq!(map["a"], "3");
        assert_eq!(map["b"], "2");
    }
}
