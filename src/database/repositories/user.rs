use std::sync::Arc;

use async_trait::async_trait;
use bcrypt::BcryptError;
use sqlx::PgPool;
use sqlx::postgres::PgQueryResult;

use crate::database::models::{ActivateUser, NewUser, Page, User, UserUpdate};
use crate::error::DbResult;
use crate::infrastructure::TokenCipher;
use crate::utils::verify_password;

const USER_COLUMNS: &str = "user_id, email, first_name, last_name, password, activated, \
                            confirmation_token, permitted_pages_id, avatar";

/// 用户存储库接口
///
/// 每个操作只执行一条语句。查不到数据返回 `None` 或空列表而不是错误；
/// 变更操作返回受影响的行数，0 行同样视为成功。
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> DbResult<Option<User>>;

    async fn get_user_by_id(&self, user_id: i32) -> DbResult<Option<User>>;

    /// 仅返回已激活的用户
    async fn get_activated_user_by_email(&self, email: &str) -> DbResult<Option<User>>;

    /// 查找使用该邮箱的其他用户，用于更新资料时检查邮箱是否被占用
    async fn get_user_by_email_except_id(
        &self,
        email: &str,
        user_id: i32,
    ) -> DbResult<Option<User>>;

    /// 按 user_id 排序返回全部用户
    async fn get_users(&self) -> DbResult<Vec<User>>;

    /// 返回新用户的 user_id
    async fn add_user(&self, user: NewUser) -> DbResult<i32>;

    async fn update_user(&self, user: UserUpdate) -> DbResult<u64>;

    /// 删除用户，其刷新令牌随外键级联删除
    async fn remove_user(&self, user_id: i32) -> DbResult<u64>;

    /// 条件更新：令牌匹配且尚未激活时写入密码并激活
    async fn activate_user(&self, activation: ActivateUser) -> DbResult<u64>;

    /// 清空密码、取消激活并写入新的确认令牌
    async fn reset_account(&self, email: &str, confirmation_token: &str) -> DbResult<u64>;

    async fn upload_image_source(&self, user_id: i32, avatar: &str) -> DbResult<u64>;

    async fn change_password(&self, user_id: i32, password: &str) -> DbResult<u64>;

    async fn insert_refresh_token(&self, user_id: i32, refresh_token: &str) -> DbResult<()>;

    async fn remove_refresh_token(&self, user_id: i32, refresh_token: &str) -> DbResult<u64>;

    /// 返回匹配的令牌数量，大于 0 表示会话有效
    async fn contains_refresh_token(&self, user_id: i32, refresh_token: &str) -> DbResult<i64>;

    /// 权限页面：页面ID属于用户的可访问集合，结果去重
    async fn get_permitted_pages(&self, user_id: i32) -> DbResult<Vec<Page>>;

    /// 校验已激活用户的密码
    ///
    /// 存储的密码不是合法的 bcrypt 哈希时按校验失败处理
    async fn authenticate(&self, email: &str, password: &str) -> DbResult<Option<User>> {
        let Some(user) = self.get_activated_user_by_email(email).await? else {
            return Ok(None);
        };

        let verified = match user.password.as_deref() {
            Some(hash) => match verify_password(password, hash) {
                Ok(verified) => verified,
                Err(
                    e @ (BcryptError::InvalidHash(_)
                    | BcryptError::InvalidPrefix(_)
                    | BcryptError::InvalidCost(_)
                    | BcryptError::InvalidBase64(_)),
                ) => {
                    tracing::warn!(
                        "Stored password of user {} is not a bcrypt hash: {}",
                        user.user_id,
                        e
                    );
                    false
                }
                Err(e) => return Err(e.into()),
            },
            None => false,
        };

        if verified {
            Ok(Some(user))
        } else {
            tracing::debug!("Authentication failed for user: {}", user.user_id);
            Ok(None)
        }
    }
}

/// 基于 Postgres 的用户存储库
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    cipher: Arc<dyn TokenCipher>,
}

/// 数据库错误先记录再原样返回
fn logged<T>(op: &str, result: Result<T, sqlx::Error>) -> DbResult<T> {
    result.map_err(|e| {
        tracing::error!("Failed to {}: {:?}", op, e);
        e.into()
    })
}

fn rows_changed(op: &str, result: Result<PgQueryResult, sqlx::Error>) -> DbResult<u64> {
    match result {
        Ok(result) => {
            let rows = result.rows_affected();
            if rows > 0 {
                tracing::info!("{}: {} rows affected", op, rows);
            } else {
                tracing::debug!("{}: no rows matched", op);
            }
            Ok(rows)
        }
        Err(e) => {
            tracing::error!("Failed to {}: {:?}", op, e);
            Err(e.into())
        }
    }
}

impl PgUserStore {
    pub fn new(pool: PgPool, cipher: Arc<dyn TokenCipher>) -> Self {
        Self { pool, cipher }
    }

    async fn fetch_user(&self, op: &str, sql: &str, key: &str) -> DbResult<Option<User>> {
        let result = sqlx::query_as::<_, User>(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await;
        logged(op, result)
    }
}

#[async_trait]
impl UserRepository for PgUserStore {
    async fn get_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        tracing::debug!("Finding user by email: {}", email);
        let sql = format!("SELECT {USER_COLUMNS} FROM web_users WHERE email = $1");
        self.fetch_user("find user by email", &sql, email).await
    }

    async fn get_user_by_id(&self, user_id: i32) -> DbResult<Option<User>> {
        tracing::debug!("Finding user by id: {}", user_id);
        let sql = format!("SELECT {USER_COLUMNS} FROM web_users WHERE user_id = $1");
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await;
        logged("find user by id", result)
    }

    async fn get_activated_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        tracing::debug!("Finding activated user by email: {}", email);
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM web_users WHERE email = $1 AND activated = TRUE"
        );
        self.fetch_user("find activated user by email", &sql, email).await
    }

    async fn get_user_by_email_except_id(
        &self,
        email: &str,
        user_id: i32,
    ) -> DbResult<Option<User>> {
        tracing::debug!("Finding user other than {} by email: {}", user_id, email);
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM web_users WHERE email = $1 AND user_id <> $2"
        );
        let result = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await;
        logged("find user by email except id", result)
    }

    async fn get_users(&self) -> DbResult<Vec<User>> {
        tracing::debug!("Listing users");
        let sql = format!("SELECT {USER_COLUMNS} FROM web_users ORDER BY user_id");
        let result = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await;
        logged("list users", result)
    }

    async fn add_user(&self, user: NewUser) -> DbResult<i32> {
        tracing::debug!("Creating user: {}", user.email);

        let result = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO web_users
                (email, first_name, last_name, password, confirmation_token, permitted_pages_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING user_id
            "#,
        )
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password)
        .bind(&user.confirmation_token)
        .bind(&user.permitted_pages_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user_id) => {
                tracing::info!("Created user: {}", user_id);
                Ok(user_id)
            }
            Err(e) => {
                tracing::error!("Failed to create user: {:?}", e);
                Err(e.into())
            }
        }
    }

    async fn update_user(&self, user: UserUpdate) -> DbResult<u64> {
        tracing::debug!("Updating user: {}", user.user_id);
        let result = sqlx::query(
            r#"
            UPDATE web_users
            SET email = $1, first_name = $2, last_name = $3, permitted_pages_id = $4
            WHERE user_id = $5
            "#,
        )
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.permitted_pages_id)
        .bind(user.user_id)
        .execute(&self.pool)
        .await;

        rows_changed("update user", result)
    }

    async fn remove_user(&self, user_id: i32) -> DbResult<u64> {
        tracing::debug!("Removing user: {}", user_id);
        let result = sqlx::query("DELETE FROM web_users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await;

        rows_changed("remove user", result)
    }

    async fn activate_user(&self, activation: ActivateUser) -> DbResult<u64> {
        tracing::debug!("Activating user by confirmation token");
        let result = sqlx::query(
            r#"
            UPDATE web_users
            SET password = $1, activated = TRUE
            WHERE confirmation_token = $2 AND activated = FALSE
            "#,
        )
        .bind(&activation.password)
        .bind(&activation.token)
        .execute(&self.pool)
        .await;

        rows_changed("activate user", result)
    }

    async fn reset_account(&self, email: &str, confirmation_token: &str) -> DbResult<u64> {
        tracing::debug!("Resetting account: {}", email);
        let result = sqlx::query(
            r#"
            UPDATE web_users
            SET confirmation_token = $1, password = NULL, activated = FALSE
            WHERE email = $2
            "#,
        )
        .bind(confirmation_token)
        .bind(email)
        .execute(&self.pool)
        .await;

        rows_changed("reset account", result)
    }

    async fn upload_image_source(&self, user_id: i32, avatar: &str) -> DbResult<u64> {
        tracing::debug!("Setting avatar of user {}: {}", user_id, avatar);
        let result = sqlx::query("UPDATE web_users SET avatar = $1 WHERE user_id = $2")
            .bind(avatar)
            .bind(user_id)
            .execute(&self.pool)
            .await;

        rows_changed("upload image source", result)
    }

    async fn change_password(&self, user_id: i32, password: &str) -> DbResult<u64> {
        tracing::debug!("Changing password of user: {}", user_id);
        let result = sqlx::query("UPDATE web_users SET password = $1 WHERE user_id = $2")
            .bind(password)
            .bind(user_id)
            .execute(&self.pool)
            .await;

        rows_changed("change password", result)
    }

    async fn insert_refresh_token(&self, user_id: i32, refresh_token: &str) -> DbResult<()> {
        tracing::debug!("Storing refresh token for user: {}", user_id);
        let encrypted = self.cipher.encrypt(refresh_token)?;
        let result =
            sqlx::query("INSERT INTO web_refresh_tokens (user_id, refresh_token) VALUES ($1, $2)")
                .bind(user_id)
                .bind(encrypted)
                .execute(&self.pool)
                .await;

        rows_changed("insert refresh token", result).map(|_| ())
    }

    async fn remove_refresh_token(&self, user_id: i32, refresh_token: &str) -> DbResult<u64> {
        tracing::debug!("Removing refresh token for user: {}", user_id);
        let encrypted = self.cipher.encrypt(refresh_token)?;
        let result =
            sqlx::query("DELETE FROM web_refresh_tokens WHERE user_id = $1 AND refresh_token = $2")
                .bind(user_id)
                .bind(encrypted)
                .execute(&self.pool)
                .await;

        rows_changed("remove refresh token", result)
    }

    async fn contains_refresh_token(&self, user_id: i32, refresh_token: &str) -> DbResult<i64> {
        tracing::debug!("Checking refresh token for user: {}", user_id);
        let encrypted = self.cipher.encrypt(refresh_token)?;
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(refresh_token)
            FROM web_users
            JOIN web_refresh_tokens USING (user_id)
            WHERE user_id = $1 AND refresh_token = $2
            "#,
        )
        .bind(user_id)
        .bind(encrypted)
        .fetch_one(&self.pool)
        .await;

        logged("check refresh token", result)
    }

    async fn get_permitted_pages(&self, user_id: i32) -> DbResult<Vec<Page>> {
        tracing::debug!("Finding permitted pages of user: {}", user_id);
        let result = sqlx::query_as::<_, Page>(
            r#"
            SELECT DISTINCT p.page_id, p.path, p.component_name, p.description, p.icon_name
            FROM web_users u
            INNER JOIN web_pages p ON p.page_id = ANY(u.permitted_pages_id)
            WHERE u.user_id = $1
            ORDER BY p.page_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await;

        logged("find permitted pages", result)
    }
}
