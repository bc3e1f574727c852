//! Endpoints as seen by a device session

use hexabus_core::{DataKind, Value};
use serde::Serialize;
use std::fmt;

/// Description text that marks an endpoint as a push button
const PUSH_BUTTON_MARKER: &str = "Pushbutton";

/// What an endpoint's value means to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRole {
    /// Ordinary attribute
    Plain,
    /// Eid 0, 32, 64, ...: bitmask of the 31 eids that follow it
    Descriptor,
    /// Reading `true` means the device state changed; everything is re-read
    PushButton,
}

impl EndpointRole {
    pub fn classify(eid: u8, description: &str) -> Self {
        if eid % 32 == 0 {
            EndpointRole::Descriptor
        } else if description.contains(PUSH_BUTTON_MARKER) {
            EndpointRole::PushButton
        } else {
            EndpointRole::Plain
        }
    }

    /// Value kind the session holds the endpoint to, given what the device
    /// advertised
    pub fn declared_kind(self, advertised: DataKind) -> DataKind {
        match self {
            EndpointRole::Descriptor => DataKind::UInt32,
            EndpointRole::PushButton => DataKind::Bool,
            EndpointRole::Plain => advertised,
        }
    }
}

/// An attribute of a remote device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub eid: u8,
    pub kind: DataKind,
    pub description: String,
    pub role: EndpointRole,
    /// Last value the device reported, `None` until the first answer
    pub value: Option<Value>,
}

impl Endpoint {
    /// Build an endpoint from an `EndpointInfo` answer
    pub fn from_info(eid: u8, advertised: DataKind, description: &str) -> Self {
        let role = EndpointRole::classify(eid, description);
        let description = match role {
            EndpointRole::Descriptor => format!(
                "Description of the endpoints [{}-{}]",
                u16::from(eid) + 1,
                u16::from(eid) + 31
            ),
            _ => description.to_string(),
        };

        Self {
            eid,
            kind: role.declared_kind(advertised),
            description,
            role,
            value: None,
        }
    }

    /// Eids flagged as present by a descriptor value
    pub fn described_eids(&self) -> Vec<u8> {
        match (self.role, self.value.as_ref().and_then(Value::as_u32)) {
            (EndpointRole::Descriptor, Some(mask)) => (1..32u8)
                .filter(|i| mask >> (i - 1) & 1 != 0)
                .map(|i| self.eid + i)
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint <{}: {}> (", self.eid, self.description)?;
        match &self.value {
            Some(value) => write!(f, "{})", value),
            None => write!(f, "-)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(EndpointRole::classify(0, "anything"), EndpointRole::Descriptor);
        assert_eq!(EndpointRole::classify(64, "Pushbutton"), EndpointRole::Descriptor);
        assert_eq!(
            EndpointRole::classify(24, "Pushbutton 1"),
            EndpointRole::PushButton
        );
        assert_eq!(EndpointRole::classify(1, "Main Switch"), EndpointRole::Plain);
    }

    #[test]
    fn test_descriptor_overrides_kind_and_description() {
        let endpoint = Endpoint::from_info(32, DataKind::Text, "whatever");
        assert_eq!(endpoint.kind, DataKind::UInt32);
        assert_eq!(endpoint.description, "Description of the endpoints [33-63]");

        let last = Endpoint::from_info(224, DataKind::UInt32, "");
        assert_eq!(last.description, "Description of the endpoints [225-255]");
    }

    #[test]
    fn test_push_button_is_bool() {
        let endpoint = Endpoint::from_info(24, DataKind::UInt8, "Pushbutton");
        assert_eq!(endpoint.role, EndpointRole::PushButton);
        assert_eq!(endpoint.kind, DataKind::Bool);
        assert_eq!(endpoint.description, "Pushbutton");
    }

    #[test]
    fn test_described_eids() {
        let mut endpoint = Endpoint::from_info(32, DataKind::UInt32, "");
        assert!(endpoint.described_eids().is_empty());

        endpoint.value = Some(Value::UInt32(0b101 | 1 << 30));
        assert_eq!(endpoint.described_eids(), vec![33, 35, 63]);
    }

    #[test]
    fn test_display() {
        let mut endpoint = Endpoint::from_info(2, DataKind::UInt32, "Power");
        assert_eq!(endpoint.to_string(), "Endpoint <2: Power> (-)");
        endpoint.value = Some(Value::UInt32(17));
        assert_eq!(endpoint.to_string(), "Endpoint <2: Power> (17)");
    }
}
