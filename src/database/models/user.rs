use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 用户数据库实体，对应 web_users 表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// bcrypt 哈希，激活前为空
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub activated: bool,
    #[serde(skip_serializing)]
    pub confirmation_token: Option<String>,
    /// 用户可访问的页面ID集合
    pub permitted_pages_id: Vec<i32>,
    pub avatar: Option<String>,
}

/// 注册时插入的新用户
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: Option<String>,
    pub confirmation_token: Option<String>,
    pub permitted_pages_id: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserUpdate {
    pub user_id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub permitted_pages_id: Vec<i32>,
}

/// 激活请求：password 为已哈希的密码，token 为确认令牌
#[derive(Debug, Clone, Deserialize)]
pub struct ActivateUser {
    pub password: String,
    pub token: String,
}

impl User {
    pub fn can_view_page(&self, page_id: i32) -> bool {
        self.permitted_pages_id.contains(&page_id)
    }
}
