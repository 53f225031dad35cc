//! Shaped rows.
//!
//! List queries return rows as field maps so callers can ask for a subset of
//! columns. Field names compare ASCII-case-insensitively but keep the casing
//! they were inserted with; insertion order is preserved on output.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, Value)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert or replace a field. A replaced field keeps its original position
    /// and casing.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        match self.position(&name) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|index| &self.entries[index].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.position(name).map(|index| &mut self.entries[index].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.position(name)
            .map(|index| self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the requested fields, in the order they were requested.
    ///
    /// Unknown names are ignored; when none of the requested names match, or
    /// nothing was requested, the full row is returned.
    pub fn project(&self, fields: &[&str]) -> FieldMap {
        let projected: FieldMap = fields
            .iter()
            .filter_map(|field| {
                let index = self.position(field)?;
                let (name, value) = &self.entries[index];
                Some((name.clone(), value.clone()))
            })
            .collect();

        if projected.is_empty() {
            self.clone()
        } else {
            projected
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldMapVisitor;

        impl<'de> Visitor<'de> for FieldMapVisitor {
            type Value = FieldMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMap, A::Error> {
                let mut map = FieldMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    map.insert(name, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(FieldMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn employee() -> FieldMap {
        [
            ("Id", json!(1)),
            ("FirstName", json!("Ada")),
            ("LastName", json!("Lovelace")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn lookups_ignore_case_and_keep_original_casing() {
        let mut row = employee();
        assert_eq!(row.get("firstname"), Some(&json!("Ada")));

        row.insert("FIRSTNAME", json!("Augusta"));
        assert_eq!(row.len(), 3);
        let names: Vec<&str> = row.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Id", "FirstName", "LastName"]);
        assert_eq!(row.get("FirstName"), Some(&json!("Augusta")));
    }

    #[test]
    fn projection_follows_request_order() {
        let projected = employee().project(&["lastname", "id", "Missing"]);
        let names: Vec<&str> = projected.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["LastName", "Id"]);
    }

    #[test]
    fn projection_without_matches_returns_full_row() {
        assert_eq!(employee().project(&[]), employee());
        assert_eq!(employee().project(&["Salary"]), employee());
    }

    #[test]
    fn serializes_as_an_ordered_object() {
        let encoded = serde_json::to_string(&employee()).expect("encode");
        assert_eq!(encoded, r#"{"Id":1,"FirstName":"Ada","LastName":"Lovelace"}"#);

        let decoded: FieldMap = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, employee());
    }
}
