//! Capability checks for app usage operations.

use crate::models::access::{AccessDenied, ApiKeyRole, Capability, Principal};

/// Decides whether a caller holds a capability.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, capability: &Capability) -> Result<(), AccessDenied>;
}

impl Authorizer for Principal {
    fn authorize(&self, capability: &Capability) -> Result<(), AccessDenied> {
        let allowed = match (self.role, capability) {
            (ApiKeyRole::Admin, _) => true,

            (ApiKeyRole::Observer, Capability::ReadHosts) => true,
            // A team-scoped observer may only aggregate its own team.
            (ApiKeyRole::Observer, Capability::ReadSoftwareInventory { team_id }) => {
                match self.team_id {
                    None => true,
                    Some(own) => *team_id == Some(own),
                }
            }
            (ApiKeyRole::Observer, Capability::WriteUsage { .. }) => false,

            (ApiKeyRole::Device, Capability::WriteUsage { device_id }) => {
                self.device_id == Some(*device_id)
            }
            (ApiKeyRole::Device, _) => false,
        };

        if allowed {
            Ok(())
        } else {
            tracing::debug!(
                api_key_id = self.api_key_id,
                role = %self.role,
                capability = %capability,
                "Capability check denied"
            );
            Err(AccessDenied {
                capability: *capability,
            })
        }
    }
}
