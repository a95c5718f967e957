//! Parameter data types, storage and value coercion
//!
//! Profiles carry values as text. The host stores them in one of four
//! storage classes. This module owns the conversion table between the two
//! and between storage classes when a value is copied from one parameter
//! to another.

use crate::error::ModelError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Physical storage class of a parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// Floating point (lengths, areas, angles, plain numbers)
    Double,
    /// Integer (counts, yes/no flags)
    Integer,
    /// Free text
    String,
    /// Reference to another element (materials)
    ElementId,
}

impl StorageType {
    /// Check whether every value of `self` converts to `target` without loss
    ///
    /// Conversions that depend on the concrete value (double to integer,
    /// text to number) are not lossless and return `false`.
    #[inline]
    #[must_use]
    pub fn converts_losslessly_to(self, target: StorageType) -> bool {
        match (self, target) {
            (a, b) if a == b => true,
            (Self::Integer, Self::Double) => true,
            (Self::ElementId, Self::String) => false,
            (_, Self::String) => true,
            _ => false,
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Double => "double",
            Self::Integer => "integer",
            Self::String => "string",
            Self::ElementId => "element id",
        };
        f.write_str(name)
    }
}

/// Semantic data type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Length,
    Area,
    Volume,
    Angle,
    Number,
    Integer,
    YesNo,
    Text,
    Url,
    Material,
}

static DATA_TYPE_ALIASES: Lazy<HashMap<&'static str, DataType>> = Lazy::new(|| {
    HashMap::from([
        ("length", DataType::Length),
        ("area", DataType::Area),
        ("volume", DataType::Volume),
        ("angle", DataType::Angle),
        ("number", DataType::Number),
        ("integer", DataType::Integer),
        ("yesno", DataType::YesNo),
        ("yes/no", DataType::YesNo),
        ("yes_no", DataType::YesNo),
        ("text", DataType::Text),
        ("url", DataType::Url),
        ("material", DataType::Material),
    ])
});

impl DataType {
    /// Storage class used by the host for this data type
    #[inline]
    #[must_use]
    pub fn storage_type(self) -> StorageType {
        match self {
            Self::Length | Self::Area | Self::Volume | Self::Angle | Self::Number => {
                StorageType::Double
            }
            Self::Integer | Self::YesNo => StorageType::Integer,
            Self::Text | Self::Url => StorageType::String,
            Self::Material => StorageType::ElementId,
        }
    }

    /// Name used in shared parameter files
    #[must_use]
    pub fn host_name(self) -> &'static str {
        match self {
            Self::Length => "LENGTH",
            Self::Area => "AREA",
            Self::Volume => "VOLUME",
            Self::Angle => "ANGLE",
            Self::Number => "NUMBER",
            Self::Integer => "INTEGER",
            Self::YesNo => "YESNO",
            Self::Text => "TEXT",
            Self::Url => "URL",
            Self::Material => "MATERIAL",
        }
    }

    /// Resolve a data type from a host or user-facing name (case-insensitive)
    ///
    /// # Errors
    /// Returns [`ModelError::UnknownDataType`] for unrecognised names
    pub fn from_name(name: &str) -> Result<Self, ModelError> {
        DATA_TYPE_ALIASES
            .get(name.trim().to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| ModelError::UnknownDataType(name.to_string()))
    }

    /// Parse profile text into a value of this data type
    ///
    /// # Errors
    /// Returns [`ModelError::Coercion`] when the text does not fit
    pub fn parse_value(self, text: &str) -> Result<ParamValue, ModelError> {
        match self {
            Self::Length => parse_feet_inches(text)
                .map(ParamValue::Double)
                .ok_or_else(|| ModelError::coercion(text, StorageType::Double)),
            Self::YesNo => parse_yes_no(text)
                .map(ParamValue::Integer)
                .ok_or_else(|| ModelError::coercion(text, StorageType::Integer)),
            Self::Area | Self::Volume | Self::Angle | Self::Number => text
                .trim()
                .parse::<f64>()
                .map(ParamValue::Double)
                .map_err(|_| ModelError::coercion(text, StorageType::Double)),
            Self::Integer => text
                .trim()
                .parse::<i64>()
                .map(ParamValue::Integer)
                .map_err(|_| ModelError::coercion(text, StorageType::Integer)),
            Self::Text | Self::Url => Ok(ParamValue::String(text.to_string())),
            Self::Material => Err(ModelError::coercion(text, StorageType::ElementId)),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host_name().to_ascii_lowercase())
    }
}

/// A concrete parameter value as stored by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Double(f64),
    Integer(i64),
    String(String),
    ElementId(i64),
}

impl ParamValue {
    /// Storage class of this value
    #[inline]
    #[must_use]
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::Double(_) => StorageType::Double,
            Self::Integer(_) => StorageType::Integer,
            Self::String(_) => StorageType::String,
            Self::ElementId(_) => StorageType::ElementId,
        }
    }

    /// Check for an inert value: empty text, zero, or an invalid element
    #[must_use]
    pub fn is_empty_or_zero(&self) -> bool {
        match self {
            Self::Double(v) => *v == 0.0,
            Self::Integer(v) => *v == 0,
            Self::String(s) => s.trim().is_empty(),
            Self::ElementId(id) => *id <= 0,
        }
    }

    /// Convert to another storage class
    ///
    /// # Errors
    /// Returns [`ModelError::Coercion`] when the value has no representation
    /// in `target`
    pub fn coerce_to(&self, target: StorageType) -> Result<ParamValue, ModelError> {
        if self.storage_type() == target {
            return Ok(self.clone());
        }
        match (self, target) {
            (Self::ElementId(_), _) => Err(ModelError::coercion(self, target)),
            (_, StorageType::String) => Ok(Self::String(self.to_string())),
            (Self::Integer(v), StorageType::Double) => Ok(Self::Double(*v as f64)),
            (Self::Double(v), StorageType::Integer) => {
                if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                    Ok(Self::Integer(*v as i64))
                } else {
                    Err(ModelError::coercion(self, target))
                }
            }
            (Self::String(s), StorageType::Double) => parse_feet_inches(s)
                .map(Self::Double)
                .ok_or_else(|| ModelError::coercion(s, target)),
            (Self::String(s), StorageType::Integer) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| parse_yes_no(s))
                .map(Self::Integer)
                .ok_or_else(|| ModelError::coercion(s, target)),
            _ => Err(ModelError::coercion(self, target)),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Double(v) => write!(f, "{v}"),
            Self::Integer(v) | Self::ElementId(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Parse decimal feet or feet-and-inches notation (`2'`, `6"`, `2' 6"`)
#[must_use]
pub fn parse_feet_inches(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }

    let (sign, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest.trim_start()),
        None => (1.0, trimmed),
    };

    let (feet, rest) = match body.find('\'') {
        Some(idx) => {
            let feet = body[..idx].trim().parse::<f64>().ok()?;
            (feet, body[idx + 1..].trim_start_matches([' ', '-']))
        }
        None => (0.0, body),
    };

    let rest = rest.trim();
    let inches = if rest.is_empty() {
        0.0
    } else {
        rest.strip_suffix('"')?.trim().parse::<f64>().ok()?
    };

    if body.find('\'').is_none() && rest.is_empty() {
        return None;
    }

    Some(sign * (feet + inches / 12.0))
}

fn parse_yes_no(text: &str) -> Option<i64> {
    match text.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(1),
        "no" | "false" | "0" => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_storage() {
        assert_eq!(DataType::Length.storage_type(), StorageType::Double);
        assert_eq!(DataType::YesNo.storage_type(), StorageType::Integer);
        assert_eq!(DataType::Url.storage_type(), StorageType::String);
        assert_eq!(DataType::Material.storage_type(), StorageType::ElementId);
    }

    #[test]
    fn data_type_from_name() {
        assert_eq!(DataType::from_name("LENGTH").unwrap(), DataType::Length);
        assert_eq!(DataType::from_name(" yes/no ").unwrap(), DataType::YesNo);
        assert!(DataType::from_name("furlong").is_err());
    }

    #[test]
    fn feet_inches_parsing() {
        assert_eq!(parse_feet_inches("2.5"), Some(2.5));
        assert_eq!(parse_feet_inches("2'"), Some(2.0));
        assert_eq!(parse_feet_inches("6\""), Some(0.5));
        assert_eq!(parse_feet_inches("2' 6\""), Some(2.5));
        assert_eq!(parse_feet_inches("2'-6\""), Some(2.5));
        assert_eq!(parse_feet_inches("-1' 6\""), Some(-1.5));
        assert_eq!(parse_feet_inches("wide"), None);
        assert_eq!(parse_feet_inches(""), None);
    }

    #[test]
    fn parse_value_by_type() {
        assert_eq!(
            DataType::YesNo.parse_value("Yes").unwrap(),
            ParamValue::Integer(1)
        );
        assert_eq!(
            DataType::Text.parse_value("abc").unwrap(),
            ParamValue::String("abc".to_string())
        );
        assert!(DataType::Integer.parse_value("1.5").is_err());
        assert!(DataType::Material.parse_value("Steel").is_err());
    }

    #[test]
    fn coercion_table() {
        let five = ParamValue::Double(5.0);
        assert_eq!(
            five.coerce_to(StorageType::Integer).unwrap(),
            ParamValue::Integer(5)
        );
        assert!(ParamValue::Double(5.5)
            .coerce_to(StorageType::Integer)
            .is_err());
        assert_eq!(
            five.coerce_to(StorageType::String).unwrap(),
            ParamValue::String("5".to_string())
        );
        assert_eq!(
            ParamValue::String("3'".into())
                .coerce_to(StorageType::Double)
                .unwrap(),
            ParamValue::Double(3.0)
        );
        assert!(ParamValue::ElementId(12)
            .coerce_to(StorageType::String)
            .is_err());
        assert!(ParamValue::String("x".into())
            .coerce_to(StorageType::ElementId)
            .is_err());
    }

    #[test]
    fn lossless_conversions() {
        assert!(StorageType::Integer.converts_losslessly_to(StorageType::Double));
        assert!(StorageType::Double.converts_losslessly_to(StorageType::String));
        assert!(!StorageType::Double.converts_losslessly_to(StorageType::Integer));
        assert!(!StorageType::ElementId.converts_losslessly_to(StorageType::String));
    }

    #[test]
    fn empty_or_zero() {
        assert!(ParamValue::Double(0.0).is_empty_or_zero());
        assert!(ParamValue::String("  ".into()).is_empty_or_zero());
        assert!(!ParamValue::Integer(1).is_empty_or_zero());
    }
}
