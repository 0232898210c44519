//! # Packet Envelope
//!
//! The structured message exchanged over a connection.
//!
//! A packet is a JSON object with a required `type` string, an optional `id`
//! correlation token, an optional `auth` credential, and any number of
//! additional fields. Field values are [`Value`]s, which extend the JSON data
//! model with an unordered [`Value::Set`].
//!
//! ## Set Encoding
//! JSON has no set type, so a set travels as `{"_set_object": [elements...]}`.
//! Any object with exactly that one key and an array value decodes as a set,
//! including objects that were never meant to be one.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Number};

use crate::error::{constants, ProtocolError, Result};

/// Reserved key carrying the elements of an encoded set
pub const SET_KEY: &str = "_set_object";

/// Reserved top-level keys interpreted by the protocol core
pub const TYPE_KEY: &str = "type";
pub const ID_KEY: &str = "id";
pub const AUTH_KEY: &str = "auth";

/// A field value inside a packet.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    /// Elements in no particular order. [`Value::set`] drops duplicates up
    /// front; a set built directly drops them when encoded.
    Set(Vec<Value>),
}

impl Value {
    /// Build a set, dropping duplicate elements.
    pub fn set<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let mut elements: Vec<Value> = Vec::new();
        for item in items {
            let item = item.into();
            if !elements.contains(&item) {
                elements.push(item);
            }
        }
        Value::Set(elements)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Elements of a set, in arbitrary order.
    pub fn as_set(&self) -> Option<&[Value]> {
        match self {
            Value::Set(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            // Duplicates in a hand-built set carry no meaning
            (Value::Set(a), Value::Set(b)) => {
                a.iter().all(|item| b.contains(item)) && b.iter().all(|item| a.contains(item))
            }
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Value::Set(items) => {
                let mut out = serializer.serialize_map(Some(1))?;
                out.serialize_entry(SET_KEY, &Distinct(items))?;
                out.end()
            }
        }
    }
}

/// Set elements as written to the wire: first occurrence of each value only.
struct Distinct<'a>(&'a [Value]);

impl Serialize for Distinct<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(None)?;
        for (i, item) in self.0.iter().enumerate() {
            if !self.0[..i].contains(item) {
                seq.serialize_element(item)?;
            }
        }
        seq.end()
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => object_or_set(map),
        }
    }
}

fn object_or_set(mut map: Map<String, serde_json::Value>) -> Value {
    let is_set = map.len() == 1 && matches!(map.get(SET_KEY), Some(serde_json::Value::Array(_)));
    if is_set {
        if let Some(serde_json::Value::Array(items)) = map.remove(SET_KEY) {
            return Value::set(items.into_iter().map(Value::from));
        }
    }

    Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value.into())
    }
}

/// Non-finite floats have no JSON form and become `Null`.
impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<Packet> for Value {
    fn from(packet: Packet) -> Self {
        let mut map = packet.fields;
        map.insert(TYPE_KEY.to_string(), Value::String(packet.packet_type));
        if let Some(id) = packet.id {
            map.insert(ID_KEY.to_string(), Value::String(id));
        }
        if let Some(auth) = packet.auth {
            map.insert(AUTH_KEY.to_string(), Value::String(auth));
        }
        Value::Object(map)
    }
}

/// The unit of communication between coordinator and peers.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Semantic tag, routed on by the server dispatcher
    pub packet_type: String,
    /// Correlation token assigned by the requesting side
    pub id: Option<String>,
    /// Credential, only meaningful on the first packet of a connection
    pub auth: Option<String>,
    /// Every other top-level key
    pub fields: BTreeMap<String, Value>,
}

impl Packet {
    pub fn new(packet_type: impl Into<String>) -> Self {
        Self {
            packet_type: packet_type.into(),
            id: None,
            auth: None,
            fields: BTreeMap::new(),
        }
    }

    /// Add a payload field. Reserved keys are routed to their dedicated slots.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if key != TYPE_KEY && key != ID_KEY && key != AUTH_KEY {
            self.fields.insert(key, value);
            return;
        }

        match value {
            Value::String(s) if key == TYPE_KEY => self.packet_type = s,
            Value::String(s) if key == ID_KEY => self.id = Some(s),
            Value::String(s) if key == AUTH_KEY => self.auth = Some(s),
            Value::Null if key == ID_KEY => self.id = None,
            Value::Null if key == AUTH_KEY => self.auth = None,
            // reserved keys only hold strings
            _ => {}
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn is_type(&self, packet_type: &str) -> bool {
        self.packet_type == packet_type
    }
}

impl Serialize for Packet {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = 1 + self.fields.len() + self.id.is_some() as usize + self.auth.is_some() as usize;
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(TYPE_KEY, &self.packet_type)?;
        if let Some(id) = &self.id {
            map.serialize_entry(ID_KEY, id)?;
        }
        if let Some(auth) = &self.auth {
            map.serialize_entry(AUTH_KEY, auth)?;
        }
        for (key, value) in &self.fields {
            // Reserved keys only ever come from the dedicated slots
            if key == TYPE_KEY || key == ID_KEY || key == AUTH_KEY {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl TryFrom<serde_json::Value> for Packet {
    type Error = ProtocolError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(mut map) = value else {
            return Err(ProtocolError::Decode(constants::ERR_NOT_AN_OBJECT.into()));
        };

        let packet_type = match map.remove(TYPE_KEY) {
            Some(serde_json::Value::String(s)) => s,
            _ => return Err(ProtocolError::Decode(constants::ERR_MISSING_TYPE.into())),
        };
        let id = optional_string(map.remove(ID_KEY), constants::ERR_INVALID_ID)?;
        let auth = optional_string(map.remove(AUTH_KEY), constants::ERR_INVALID_AUTH)?;

        let fields = map.into_iter().map(|(k, v)| (k, Value::from(v))).collect();

        Ok(Self {
            packet_type,
            id,
            auth,
            fields,
        })
    }
}

fn optional_string(value: Option<serde_json::Value>, err: &str) -> Result<Option<String>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ProtocolError::Decode(err.into())),
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}#{}", self.packet_type, id),
            None => f.write_str(&self.packet_type),
        }
    }
}
