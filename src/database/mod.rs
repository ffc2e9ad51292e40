// 数据库模块
// 包含实体定义和存储库实现

pub mod models;
pub mod repositories;

use sqlx::PgPool;

use crate::error::DbResult;

pub use models::{ActivateUser, NewUser, Page, RefreshToken, User, UserUpdate};
pub use repositories::{MemoryUserStore, PgUserStore, UserRepository};

/// 内嵌的数据库迁移脚本
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// 执行尚未应用的迁移，已应用的迁移会被跳过
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    tracing::debug!("Applying {} embedded migrations", MIGRATOR.iter().count());
    MIGRATOR.run(pool).await?;
    Ok(())
}
