//! Property values and property states

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ItemError, ItemResult, NodeId, QName};

/// The type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    String,
    Binary,
    Long,
    Double,
    Date,
    Boolean,
    Name,
    Reference,
}

impl PropertyType {
    /// Returns the canonical name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::String => "String",
            PropertyType::Binary => "Binary",
            PropertyType::Long => "Long",
            PropertyType::Double => "Double",
            PropertyType::Date => "Date",
            PropertyType::Boolean => "Boolean",
            PropertyType::Name => "Name",
            PropertyType::Reference => "Reference",
        }
    }
}

impl FromStr for PropertyType {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(PropertyType::String),
            "binary" => Ok(PropertyType::Binary),
            "long" => Ok(PropertyType::Long),
            "double" => Ok(PropertyType::Double),
            "date" => Ok(PropertyType::Date),
            "boolean" => Ok(PropertyType::Boolean),
            "name" => Ok(PropertyType::Name),
            "reference" => Ok(PropertyType::Reference),
            _ => Err(ItemError::UnknownPropertyType(s.to_string())),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    String(String),
    Binary(Vec<u8>),
    Long(i64),
    Double(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
    Name(QName),
    Reference(NodeId),
}

impl Value {
    /// Returns the type of this value.
    pub fn property_type(&self) -> PropertyType {
        match self {
            Value::String(_) => PropertyType::String,
            Value::Binary(_) => PropertyType::Binary,
            Value::Long(_) => PropertyType::Long,
            Value::Double(_) => PropertyType::Double,
            Value::Date(_) => PropertyType::Date,
            Value::Boolean(_) => PropertyType::Boolean,
            Value::Name(_) => PropertyType::Name,
            Value::Reference(_) => PropertyType::Reference,
        }
    }

    /// Converts raw text into a value of the given type.
    pub fn parse(property_type: PropertyType, raw: &str) -> ItemResult<Self> {
        let invalid = |reason: String| ItemError::InvalidValue {
            property_type: property_type.to_string(),
            raw: raw.to_string(),
            reason,
        };

        match property_type {
            PropertyType::String => Ok(Value::String(raw.to_string())),
            PropertyType::Binary => Ok(Value::Binary(raw.as_bytes().to_vec())),
            PropertyType::Long => raw
                .parse()
                .map(Value::Long)
                .map_err(|e| invalid(e.to_string())),
            PropertyType::Double => raw
                .parse()
                .map(Value::Double)
                .map_err(|e| invalid(e.to_string())),
            PropertyType::Date => DateTime::parse_from_rfc3339(raw)
                .map(|d| Value::Date(d.with_timezone(&Utc)))
                .map_err(|e| invalid(e.to_string())),
            PropertyType::Boolean => raw
                .parse()
                .map(Value::Boolean)
                .map_err(|e| invalid(e.to_string())),
            PropertyType::Name => QName::parse(raw)
                .map(Value::Name)
                .map_err(|e| invalid(e.to_string())),
            PropertyType::Reference => raw
                .parse()
                .map(Value::Reference)
                .map_err(|e: uuid::Error| invalid(e.to_string())),
        }
    }

    /// Returns the name if this is a NAME value.
    pub fn as_name(&self) -> Option<&QName> {
        match self {
            Value::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the target if this is a REFERENCE value.
    pub fn as_reference(&self) -> Option<NodeId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the text if this is a STRING value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// The value or values of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Single(Value),
    Multiple(Vec<Value>),
}

/// The state of one property: its name, declared type and value(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyState {
    name: QName,
    property_type: PropertyType,
    value: PropertyValue,
}

impl PropertyState {
    /// Creates a single-valued property. The type follows the value.
    pub fn single(name: QName, value: Value) -> Self {
        Self {
            name,
            property_type: value.property_type(),
            value: PropertyValue::Single(value),
        }
    }

    /// Creates a multi-valued property of the given type.
    pub fn multiple(name: QName, property_type: PropertyType, values: Vec<Value>) -> Self {
        Self {
            name,
            property_type,
            value: PropertyValue::Multiple(values),
        }
    }

    /// Returns the property name.
    #[inline]
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Returns the declared type.
    #[inline]
    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    /// Returns the raw value holder.
    #[inline]
    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// Returns true if the property is multi-valued.
    #[inline]
    pub fn is_multiple(&self) -> bool {
        matches!(self.value, PropertyValue::Multiple(_))
    }

    /// Returns all values; a single-valued property yields one.
    pub fn values(&self) -> &[Value] {
        match &self.value {
            PropertyValue::Single(v) => std::slice::from_ref(v),
            PropertyValue::Multiple(vs) => vs,
        }
    }

    /// Returns the first value, if any.
    pub fn first(&self) -> Option<&Value> {
        self.values().first()
    }
}
