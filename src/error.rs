use thiserror::Error;

/// 数据访问层错误
///
/// 数据库错误原样透传给调用方，不做分类或重试。
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// 内存存储库的约束冲突，对应数据库的唯一约束
    #[error("duplicate key value violates unique constraint \"{0}\"")]
    UniqueViolation(&'static str),

    /// 内存存储库的约束冲突，对应数据库的外键约束
    #[error("insert or update violates foreign key constraint \"{0}\"")]
    ForeignKeyViolation(&'static str),

    #[error("token cipher failure: {0}")]
    Cipher(String),

    #[error("password hash failure: {0}")]
    Password(#[from] bcrypt::BcryptError),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// 是否为唯一约束冲突（例如邮箱重复）
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Database(sqlx::Error::Database(e)) => e.is_unique_violation(),
            DbError::UniqueViolation(_) => true,
            _ => false,
        }
    }
}
