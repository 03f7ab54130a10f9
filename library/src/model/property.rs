//! Property values carried by processors (parameters).

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub struct Vec2 {
    pub x: OrderedFloat<f64>,
    pub y: OrderedFloat<f64>,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: OrderedFloat(x),
            y: OrderedFloat(y),
        }
    }
}

impl Hash for Vec2 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.hash(state);
        self.y.hash(state);
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(OrderedFloat<f64>),
    Integer(i64),
    Text(String),
    Boolean(bool),
    Vec2(Vec2),
    Array(Vec<PropertyValue>),
    Map(HashMap<String, PropertyValue>),
}

impl Hash for PropertyValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            PropertyValue::Number(n) => n.hash(state),
            PropertyValue::Integer(i) => i.hash(state),
            PropertyValue::Text(s) => s.hash(state),
            PropertyValue::Boolean(b) => b.hash(state),
            PropertyValue::Vec2(v) => v.hash(state),
            PropertyValue::Array(arr) => arr.hash(state),
            PropertyValue::Map(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by_key(|(k, _)| k.as_str()); // Deterministic order
                for (k, v) in entries {
                    k.hash(state);
                    v.hash(state);
                }
            }
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(OrderedFloat(value))
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        PropertyValue::Number(OrderedFloat(value as f64))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<Vec2> for PropertyValue {
    fn from(value: Vec2) -> Self {
        PropertyValue::Vec2(value)
    }
}

impl PropertyValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(n.into_inner()),
            PropertyValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            PropertyValue::Vec2(v) => Some(*v),
            _ => None,
        }
    }
}

/// Named property storage on a processor instance.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct PropertyMap(HashMap<String, PropertyValue>);

impl PropertyMap {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<PropertyValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    /// Insert and report whether the stored value actually changed.
    pub fn set_changed(&mut self, name: &str, value: impl Into<PropertyValue>) -> bool {
        let value = value.into();
        match self.0.get(name) {
            Some(existing) if *existing == value => false,
            _ => {
                self.0.insert(name.to_string(), value);
                true
            }
        }
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(PropertyValue::as_number)
    }

    pub fn get_integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropertyValue::as_integer)
    }

    pub fn get_boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropertyValue::as_boolean)
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropertyValue::as_text)
    }

    pub fn get_vec2(&self, name: &str) -> Option<Vec2> {
        self.get(name).and_then(PropertyValue::as_vec2)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }

    pub fn merge(&mut self, other: &PropertyMap) {
        for (k, v) in other.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let mut map = PropertyMap::new();
        map.set("amount", 2.5);
        map.set("count", 3i64);
        map.set("label", "blur");
        map.set("enabled", true);

        assert_eq!(map.get_number("amount"), Some(2.5));
        assert_eq!(map.get_number("count"), Some(3.0));
        assert_eq!(map.get_integer("count"), Some(3));
        assert_eq!(map.get_text("label"), Some("blur"));
        assert_eq!(map.get_boolean("enabled"), Some(true));
        assert_eq!(map.get_number("missing"), None);
    }

    #[test]
    fn test_set_changed_detects_identical_value() {
        let mut map = PropertyMap::new();
        assert!(map.set_changed("amount", 1.0));
        assert!(!map.set_changed("amount", 1.0));
        assert!(map.set_changed("amount", 2.0));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut map = PropertyMap::new();
        map.set("amount", 2.5);
        map.set("dims", Vec2::new(128.0, 64.0));

        let json = serde_json::to_string(&map).unwrap();
        let back: PropertyMap = serde_json::from_str(&json).unwrap();
        assert_eq!(map, back);
    }
}
