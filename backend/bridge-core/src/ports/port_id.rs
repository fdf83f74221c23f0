use std::fmt::{Display, Formatter, Result as FormatResult};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{Error as DeError, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static ANALOG_PORT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^a(?P<index>\d+)$").expect("valid regex pattern"));

/// Port identifier: a digital pin number (`"3"`) or a named line (`"a0"`).
///
/// Compared by identifier, so `PortId::from(3)` equals `PortId::from("3")`.
/// Purely numeric ids travel as JSON numbers, everything else as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(String);

impl PortId {
    /// The analog channel `a<index>`.
    pub fn analog(index: u32) -> Self {
        Self(format!("a{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn analog_index(&self) -> Option<u32> {
        ANALOG_PORT_PATTERN
            .captures(&self.0)
            .and_then(|caps| caps.name("index"))
            .and_then(|index| index.as_str().parse().ok())
    }

    fn as_number(&self) -> Option<u64> {
        self.0
            .parse::<u64>()
            .ok()
            .filter(|number| number.to_string() == self.0)
    }
}

impl Display for PortId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.0)
    }
}

impl From<u32> for PortId {
    fn from(pin: u32) -> Self {
        Self(pin.to_string())
    }
}

impl From<&str> for PortId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PortId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&PortId> for PortId {
    fn from(id: &PortId) -> Self {
        id.clone()
    }
}

impl Serialize for PortId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_number() {
            Some(number) => serializer.serialize_u64(number),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for PortId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PortIdVisitor;

        impl Visitor<'_> for PortIdVisitor {
            type Value = PortId;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> FormatResult {
                formatter.write_str("a port number or port name")
            }

            fn visit_u64<E: DeError>(self, value: u64) -> Result<PortId, E> {
                Ok(PortId(value.to_string()))
            }

            fn visit_i64<E: DeError>(self, value: i64) -> Result<PortId, E> {
                Ok(PortId(value.to_string()))
            }

            fn visit_str<E: DeError>(self, value: &str) -> Result<PortId, E> {
                Ok(PortId(value.to_string()))
            }

            fn visit_string<E: DeError>(self, value: String) -> Result<PortId, E> {
                Ok(PortId(value))
            }
        }

        deserializer.deserialize_any(PortIdVisitor)
    }
}
