use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::user::UserRepository;
use crate::database::models::{ActivateUser, NewUser, Page, RefreshToken, User, UserUpdate};
use crate::error::{DbError, DbResult};
use crate::infrastructure::TokenCipher;

#[derive(Default)]
struct MemoryState {
    next_user_id: i32,
    users: Vec<User>,
    refresh_tokens: Vec<RefreshToken>,
    pages: Vec<Page>,
}

impl MemoryState {
    fn user(&self, user_id: i32) -> Option<&User> {
        self.users.iter().find(|u| u.user_id == user_id)
    }

    fn user_mut(&mut self, user_id: i32) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.user_id == user_id)
    }

    fn email_taken(&self, email: &str, except: Option<i32>) -> bool {
        self.users
            .iter()
            .any(|u| u.email == email && Some(u.user_id) != except)
    }
}

const EMAIL_KEY: &str = "web_users_email_key";
const REFRESH_TOKEN_USER_FKEY: &str = "web_refresh_tokens_user_id_fkey";

/// 内存实现的用户存储库，行为与 Postgres 实现一致，供调用方测试使用
#[derive(Clone)]
pub struct MemoryUserStore {
    state: Arc<RwLock<MemoryState>>,
    cipher: Arc<dyn TokenCipher>,
}

impl MemoryUserStore {
    pub fn new(cipher: Arc<dyn TokenCipher>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState {
                next_user_id: 1,
                ..Default::default()
            })),
            cipher,
        }
    }

    /// 写入页面目录（静态数据）
    pub async fn with_pages(self, pages: Vec<Page>) -> Self {
        self.state.write().await.pages = pages;
        self
    }

    /// 已存储的令牌密文
    pub async fn stored_refresh_tokens(&self, user_id: i32) -> Vec<String> {
        self.state
            .read()
            .await
            .refresh_tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.refresh_token.clone())
            .collect()
    }
}

#[async_trait]
impl UserRepository for MemoryUserStore {
    async fn get_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_id(&self, user_id: i32) -> DbResult<Option<User>> {
        Ok(self.state.read().await.user(user_id).cloned())
    }

    async fn get_activated_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.email == email && u.activated)
            .cloned())
    }

    async fn get_user_by_email_except_id(
        &self,
        email: &str,
        user_id: i32,
    ) -> DbResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.email == email && u.user_id != user_id)
            .cloned())
    }

    async fn get_users(&self) -> DbResult<Vec<User>> {
        let mut users = self.state.read().await.users.clone();
        users.sort_by_key(|u| u.user_id);
        Ok(users)
    }

    async fn add_user(&self, user: NewUser) -> DbResult<i32> {
        let mut state = self.state.write().await;
        if state.email_taken(&user.email, None) {
            return Err(DbError::UniqueViolation(EMAIL_KEY));
        }

        let user_id = state.next_user_id;
        state.next_user_id += 1;
        state.users.push(User {
            user_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password: user.password,
            activated: false,
            confirmation_token: user.confirmation_token,
            permitted_pages_id: user.permitted_pages_id,
            avatar: None,
        });
        Ok(user_id)
    }

    async fn update_user(&self, update: UserUpdate) -> DbResult<u64> {
        let mut state = self.state.write().await;
        if state.user(update.user_id).is_none() {
            return Ok(0);
        }
        if state.email_taken(&update.email, Some(update.user_id)) {
            return Err(DbError::UniqueViolation(EMAIL_KEY));
        }

        if let Some(user) = state.user_mut(update.user_id) {
            user.email = update.email;
            user.first_name = update.first_name;
            user.last_name = update.last_name;
            user.permitted_pages_id = update.permitted_pages_id;
        }
        Ok(1)
    }

    async fn remove_user(&self, user_id: i32) -> DbResult<u64> {
        let mut state = self.state.write().await;
        let before = state.users.len();
        state.users.retain(|u| u.user_id != user_id);
        let removed = (before - state.users.len()) as u64;
        if removed > 0 {
            state.refresh_tokens.retain(|t| t.user_id != user_id);
        }
        Ok(removed)
    }

    async fn activate_user(&self, activation: ActivateUser) -> DbResult<u64> {
        let mut state = self.state.write().await;
        let mut affected = 0;
        for user in state.users.iter_mut().filter(|u| {
            !u.activated && u.confirmation_token.as_deref() == Some(activation.token.as_str())
        }) {
            user.password = Some(activation.password.clone());
            user.activated = true;
            affected += 1;
        }
        Ok(affected)
    }

    async fn reset_account(&self, email: &str, confirmation_token: &str) -> DbResult<u64> {
        let mut state = self.state.write().await;
        match state.users.iter_mut().find(|u| u.email == email) {
            Some(user) => {
                user.confirmation_token = Some(confirmation_token.to_string());
                user.password = None;
                user.activated = false;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn upload_image_source(&self, user_id: i32, avatar: &str) -> DbResult<u64> {
        let mut state = self.state.write().await;
        match state.user_mut(user_id) {
            Some(user) => {
                user.avatar = Some(avatar.to_string());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn change_password(&self, user_id: i32, password: &str) -> DbResult<u64> {
        let mut state = self.state.write().await;
        match state.user_mut(user_id) {
            Some(user) => {
                user.password = Some(password.to_string());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn insert_refresh_token(&self, user_id: i32, refresh_token: &str) -> DbResult<()> {
        let encrypted = self.cipher.encrypt(refresh_token)?;
        let mut state = self.state.write().await;
        if state.user(user_id).is_none() {
            return Err(DbError::ForeignKeyViolation(REFRESH_TOKEN_USER_FKEY));
        }

        state.refresh_tokens.push(RefreshToken {
            user_id,
            refresh_token: encrypted,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn remove_refresh_token(&self, user_id: i32, refresh_token: &str) -> DbResult<u64> {
        let encrypted = self.cipher.encrypt(refresh_token)?;
        let mut state = self.state.write().await;
        let before = state.refresh_tokens.len();
        state
            .refresh_tokens
            .retain(|t| !(t.user_id == user_id && t.refresh_token == encrypted));
        Ok((before - state.refresh_tokens.len()) as u64)
    }

    async fn contains_refresh_token(&self, user_id: i32, refresh_token: &str) -> DbResult<i64> {
        let encrypted = self.cipher.encrypt(refresh_token)?;
        let state = self.state.read().await;
        if state.user(user_id).is_none() {
            return Ok(0);
        }
        let count = state
            .refresh_tokens
            .iter()
            .filter(|t| t.user_id == user_id && t.refresh_token == encrypted)
            .count();
        Ok(count as i64)
    }

    async fn get_permitted_pages(&self, user_id: i32) -> DbResult<Vec<Page>> {
        let state = self.state.read().await;
        let Some(user) = state.user(user_id) else {
            return Ok(Vec::new());
        };

        let mut pages: Vec<Page> = state
            .pages
            .iter()
            .filter(|p| user.can_view_page(p.page_id))
            .cloned()
            .collect();
        pages.sort_by_key(|p| p.page_id);
        pages.dedup();
        Ok(pages)
    }
}
