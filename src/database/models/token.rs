use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 刷新令牌实体，refresh_token 字段保存的是密文
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub user_id: i32,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
}
