//! Follow entity - relazione follower → seguito

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Follow {
    pub follower_id: i32,
    pub following_id: i32,
    pub created_at: DateTime<Utc>,
}
