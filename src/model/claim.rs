use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of one fee harvest. Append-only. The split amounts
/// are recorded as computed at claim time; `platform_fee +
/// owner_received + reserve` reconciles with `gross` to within one dust
/// unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub token_id: String,
    pub gross_lamports: u64,
    pub platform_fee_lamports: u64,
    pub owner_received_lamports: u64,
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

impl Claim {
    pub fn new(
        token_id: &str,
        gross_lamports: u64,
        platform_fee_lamports: u64,
        owner_received_lamports: u64,
        signature: String,
    ) -> Self {
        Claim {
            id: uuid::Uuid::new_v4().to_string(),
            token_id: token_id.to_string(),
            gross_lamports,
            platform_fee_lamports,
            owner_received_lamports,
            signature,
            created_at: Utc::now(),
        }
    }
}
