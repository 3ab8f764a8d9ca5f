//! API key entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{ApiKeyRole, Principal};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the api_keys table.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyEntity {
    pub id: i64,
    pub key_hash: String,
    pub key_prefix: String,
    pub name: String,
    pub role: String,
    pub team_id: Option<Uuid>,
    pub device_id: Option<Uuid>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiKeyEntity {
    /// Builds the principal this key authenticates as.
    pub fn principal(&self) -> Result<Principal, String> {
        let role: ApiKeyRole = self.role.parse()?;

        Ok(Principal {
            api_key_id: self.id,
            role,
            team_id: self.team_id,
            device_id: self.device_id,
        })
    }
}
