//! A decoded message seen as a type tag plus named fields.
//!
//! The client sends flat value lists in one of two shapes:
//!
//! ```text
//! ["qp", "k1", v1, "k2", v2]   odd length → first string is the type
//! ["join", "key-abc"]          even length → key/value pairs only
//! ```
//!
//! Parsing never fails. Pairs whose key is not a string are skipped, and a
//! trailing key with no value is kept with an empty value so that
//! `contains` still sees it (the client sends `["ic"]` this way).

use serde_json::{Map, Value as Json};

use crate::Value;

/// Label used when a message has neither a type nor any field.
pub const UNDETERMINED: &str = "[Undetermined]";

/// Key that marks a save message.
const SAVE_KEY: &str = "s";

/// A parsed message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    msg_type: Option<String>,
    fields: Vec<(String, Option<Value>)>,
}

impl Envelope {
    /// Builds an envelope from a decoded value list.
    pub fn parse(values: Vec<Value>) -> Self {
        let mut iter = values.into_iter().peekable();
        let len = iter.len();

        let msg_type = if len % 2 == 1 && len != 1 {
            match iter.peek() {
                Some(Value::String(s)) => {
                    let s = s.clone();
                    iter.next();
                    Some(s)
                }
                _ => None,
            }
        } else {
            None
        };

        let mut envelope = Self {
            msg_type,
            fields: Vec::with_capacity(len / 2),
        };
        while let Some(key) = iter.next() {
            let value = iter.next();
            if let Value::String(key) = key {
                envelope.insert(key, value);
            }
        }
        envelope
    }

    fn insert(&mut self, key: String, value: Option<Value>) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// The leading type tag, if the message had one.
    pub fn msg_type(&self) -> Option<&str> {
        self.msg_type.as_deref()
    }

    /// True when the message carries no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when `key` was present, even without a value.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// True when the message is tagged with `name` either as its type or
    /// as a field key.
    pub fn is(&self, name: &str) -> bool {
        self.msg_type() == Some(name) || self.contains(name)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Reads any integer variant, narrowed to `i32`.
    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.get(key)
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok())
    }

    /// Reads a field as a JSON object.
    ///
    /// The client sends nested data as JSON strings, so a string field is
    /// parsed. A string that is not a JSON object yields `None`.
    pub fn get_map(&self, key: &str) -> Option<Map<String, Json>> {
        match self.get(key)? {
            Value::String(s) => match serde_json::from_str::<Json>(s) {
                Ok(Json::Object(map)) => Some(map),
                _ => None,
            },
            map @ Value::Map(_) => match map.to_json() {
                Json::Object(map) => Some(map),
                _ => None,
            },
            _ => None,
        }
    }

    /// True for save messages, keyed or typed `"s"`.
    pub fn is_save(&self) -> bool {
        self.is(SAVE_KEY)
    }

    /// The body of a save message.
    ///
    /// For `["s", json]` it is the JSON under `"s"`; for a typed `"s"`
    /// message it is the fields themselves.
    pub fn save_body(&self) -> Option<Map<String, Json>> {
        if let Some(map) = self.get_map(SAVE_KEY) {
            return Some(map);
        }
        if self.msg_type() == Some(SAVE_KEY) {
            return Some(
                self.fields
                    .iter()
                    .map(|(k, v)| {
                        (k.clone(), v.as_ref().map(Value::to_json).unwrap_or(Json::Null))
                    })
                    .collect(),
            );
        }
        None
    }

    /// The save subtype: `body.data._type`, then `body._type`, else `""`.
    pub fn subtype(&self) -> String {
        let Some(body) = self.save_body() else {
            return String::new();
        };
        body.get("data")
            .and_then(|data| data.get("_type"))
            .or_else(|| body.get("_type"))
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// A short label for logs.
    pub fn type_label(&self) -> String {
        if self.is_save() {
            return format!("save/{}", self.subtype());
        }
        self.msg_type
            .as_deref()
            .or_else(|| self.fields.first().map(|(k, _)| k.as_str()))
            .unwrap_or(UNDETERMINED)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(values: Vec<Value>) -> Envelope {
        Envelope::parse(values)
    }

    // =====================================================================
    // parse()
    // =====================================================================

    #[test]
    fn test_parse_odd_length_takes_type() {
        let e = env(vec!["qp".into(), "a".into(), 1.into()]);
        assert_eq!(e.msg_type(), Some("qp"));
        assert_eq!(e.get_int("a"), Some(1));
    }

    #[test]
    fn test_parse_even_length_has_no_type() {
        let e = env(vec!["join".into(), "key-1".into()]);
        assert_eq!(e.msg_type(), None);
        assert_eq!(e.get_str("join"), Some("key-1"));
    }

    #[test]
    fn test_parse_single_element_is_dangling_key() {
        let e = env(vec!["ic".into()]);
        assert_eq!(e.msg_type(), None);
        assert!(e.contains("ic"));
        assert!(e.get("ic").is_none());
        assert!(!e.is_empty());
    }

    #[test]
    fn test_parse_skips_non_string_keys() {
        let e = env(vec![7.into(), "x".into(), "k".into(), true.into()]);
        assert_eq!(e.get("k"), Some(&Value::Bool(true)));
        assert!(!e.contains("x"));
    }

    #[test]
    fn test_parse_odd_length_with_non_string_head_degrades_to_fields() {
        let e = env(vec![1.into(), "k".into(), "v".into()]);
        assert_eq!(e.msg_type(), None);
        // 1 is a non-string key and eats "k" as its value
        assert!(!e.contains("k"));
    }

    #[test]
    fn test_parse_empty_list_is_empty() {
        assert!(env(vec![]).is_empty());
    }

    #[test]
    fn test_parse_duplicate_key_last_wins() {
        let e = env(vec!["a".into(), 1.into(), "a".into(), 2.into()]);
        assert_eq!(e.get_int("a"), Some(2));
    }

    // =====================================================================
    // Accessors
    // =====================================================================

    #[test]
    fn test_get_map_parses_json_string() {
        let e = env(vec!["s".into(), r#"{"id":"x","data":{"_type":"T"}}"#.into()]);
        let map = e.get_map("s").unwrap();
        assert_eq!(map.get("id").and_then(Json::as_str), Some("x"));
    }

    #[test]
    fn test_get_map_invalid_json_is_none() {
        let e = env(vec!["s".into(), "not json".into()]);
        assert!(e.get_map("s").is_none());
    }

    #[test]
    fn test_get_int_narrows_long() {
        let e = env(vec!["n".into(), Value::Long(42)]);
        assert_eq!(e.get_int("n"), Some(42));
        let e = env(vec!["n".into(), Value::Long(1 << 40)]);
        assert_eq!(e.get_int("n"), None);
    }

    // =====================================================================
    // subtype() / type_label()
    // =====================================================================

    #[test]
    fn test_subtype_reads_data_type() {
        let e = env(vec![
            "s".into(),
            r#"{"id":"save-1","data":{"_type":"TASK_STARTED"}}"#.into(),
        ]);
        assert_eq!(e.subtype(), "TASK_STARTED");
        assert_eq!(e.type_label(), "save/TASK_STARTED");
    }

    #[test]
    fn test_subtype_falls_back_to_body_type() {
        let e = env(vec!["s".into(), r#"{"_type":"MISSION_END"}"#.into()]);
        assert_eq!(e.subtype(), "MISSION_END");
    }

    #[test]
    fn test_subtype_of_typed_save_reads_fields() {
        let e = env(vec!["s".into(), "_type".into(), "BUILDING_CREATE".into()]);
        assert_eq!(e.msg_type(), Some("s"));
        assert_eq!(e.subtype(), "BUILDING_CREATE");
    }

    #[test]
    fn test_subtype_missing_is_empty() {
        let e = env(vec!["s".into(), "{}".into()]);
        assert_eq!(e.subtype(), "");
        assert_eq!(e.type_label(), "save/");
    }

    #[test]
    fn test_type_label_prefers_type_then_first_key() {
        assert_eq!(env(vec!["qp".into(), "a".into(), 1.into()]).type_label(), "qp");
        assert_eq!(env(vec!["join".into(), "k".into()]).type_label(), "join");
        assert_eq!(env(vec![]).type_label(), UNDETERMINED);
    }
}
