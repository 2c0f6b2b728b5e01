//! How a session obtains its measurements.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Connection mode of a [`DeviceSession`](crate::DeviceSession).
///
/// | Mode | Link | Measurements come from |
/// |------|------|------------------------|
/// | `Advertising` | down | passive advertisements routed by the dispatcher |
/// | `Notification` | up | GATT notifications |
/// | `Connection` | up | a GATT read on every getter call |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    #[default]
    Advertising,
    Notification,
    Connection,
}

impl ConnectionMode {
    /// Whether the mode keeps a BLE link open.
    pub fn needs_link(self) -> bool {
        !matches!(self, ConnectionMode::Advertising)
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionMode::Advertising => "advertising",
            ConnectionMode::Notification => "notification",
            ConnectionMode::Connection => "connection",
        };
        f.write_str(name)
    }
}

impl FromStr for ConnectionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advertising" | "adv" | "passive" => Ok(ConnectionMode::Advertising),
            "notification" | "notify" => Ok(ConnectionMode::Notification),
            "connection" | "connect" | "poll" => Ok(ConnectionMode::Connection),
            other => Err(Error::invalid_config(format!(
                "unknown connection mode '{other}' (expected advertising, notification or connection)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!(
            "advertising".parse::<ConnectionMode>().unwrap(),
            ConnectionMode::Advertising
        );
        assert_eq!(
            " Notify ".parse::<ConnectionMode>().unwrap(),
            ConnectionMode::Notification
        );
        assert_eq!(
            "CONNECTION".parse::<ConnectionMode>().unwrap(),
            ConnectionMode::Connection
        );
        assert!("scan".parse::<ConnectionMode>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for mode in [
            ConnectionMode::Advertising,
            ConnectionMode::Notification,
            ConnectionMode::Connection,
        ] {
            assert_eq!(mode.to_string().parse::<ConnectionMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_needs_link() {
        assert!(!ConnectionMode::Advertising.needs_link());
        assert!(ConnectionMode::Notification.needs_link());
        assert!(ConnectionMode::Connection.needs_link());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&ConnectionMode::Notification).unwrap();
        assert_eq!(json, "\"notification\"");
        let back: ConnectionMode = serde_json::from_str("\"connection\"").unwrap();
        assert_eq!(back, ConnectionMode::Connection);
    }
}
