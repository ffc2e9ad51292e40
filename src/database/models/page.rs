use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 页面实体，对应 web_pages 表（静态数据，本层只读）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Page {
    pub page_id: i32,
    pub path: String,
    pub component_name: String,
    pub description: String,
    pub icon_name: String,
}
