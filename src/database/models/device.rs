//! Paired device records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One paired (or pairing) account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Session id; also the gateway instance name.
    pub id: String,
    pub phone: String,
    #[serde(default)]
    pub lid: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set once the account reported connected.
    #[serde(default)]
    pub paired: bool,
}

impl DeviceRecord {
    /// A fresh record for a number that is about to pair.
    pub fn new(phone: &str) -> Self {
        let short = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("wa-{}-{}", phone, &short[..8]),
            phone: phone.to_string(),
            lid: None,
            created_at: Utc::now(),
            paired: false,
        }
    }
}
