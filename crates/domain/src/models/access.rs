//! Access control domain models.
//!
//! Every app usage operation names the capability it needs. A [`Principal`]
//! is the authenticated caller; whether it holds a capability is decided by
//! [`crate::services::access::Authorizer`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Role attached to an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyRole {
    /// Full access to every device and team.
    Admin,
    /// Read-only access, optionally limited to one team.
    Observer,
    /// Agent key bound to a single device; may only report its own usage.
    Device,
}

impl FromStr for ApiKeyRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(ApiKeyRole::Admin),
            "observer" => Ok(ApiKeyRole::Observer),
            "device" => Ok(ApiKeyRole::Device),
            _ => Err(format!("Unknown API key role: {}", s)),
        }
    }
}

impl fmt::Display for ApiKeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKeyRole::Admin => write!(f, "admin"),
            ApiKeyRole::Observer => write!(f, "observer"),
            ApiKeyRole::Device => write!(f, "device"),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub api_key_id: i64,
    pub role: ApiKeyRole,
    /// Team the key is scoped to; `None` means global.
    pub team_id: Option<Uuid>,
    /// Device the key belongs to (device keys only).
    pub device_id: Option<Uuid>,
}

/// A permission an operation requires before touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Read per-host data such as one device's usage.
    ReadHosts,
    /// Read fleet software inventory, optionally scoped to one team.
    ReadSoftwareInventory { team_id: Option<Uuid> },
    /// Write usage rows for one device.
    WriteUsage { device_id: Uuid },
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ReadHosts => write!(f, "read hosts"),
            Capability::ReadSoftwareInventory { team_id: Some(team) } => {
                write!(f, "read software inventory of team {}", team)
            }
            Capability::ReadSoftwareInventory { team_id: None } => {
                write!(f, "read software inventory")
            }
            Capability::WriteUsage { device_id } => {
                write!(f, "write app usage of device {}", device_id)
            }
        }
    }
}

/// Returned when a principal lacks a required capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Not permitted to {capability}")]
pub struct AccessDenied {
    pub capability: Capability,
}
