use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Declared type of a data port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int,
    UInt,
    Real,
    Time,
    Str,
}

/// Runtime value held in a data port. Data connections copy values; the
/// destination always owns its copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Real(f64),
    Time(Duration),
    Str(String),
}

impl Value {
    /// Zero/empty value for a declared type; used on instance creation and Reset.
    pub fn default_for(ty: DataType) -> Self {
        match ty {
            DataType::Bool => Value::Bool(false),
            DataType::Int => Value::Int(0),
            DataType::UInt => Value::UInt(0),
            DataType::Real => Value::Real(0.0),
            DataType::Time => Value::Time(Duration::ZERO),
            DataType::Str => Value::Str(String::new()),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int,
            Value::UInt(_) => DataType::UInt,
            Value::Real(_) => DataType::Real,
            Value::Time(_) => DataType::Time,
            Value::Str(_) => DataType::Str,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<Duration> {
        match self {
            Value::Time(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{}ms", v.as_millis()),
            Value::Str(v) => write!(f, "{v}"),
        }
    }
}
