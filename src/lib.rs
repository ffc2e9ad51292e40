pub mod config;
pub mod database;
pub mod error;
pub mod infrastructure;
pub mod utils;

pub use database::{
    ActivateUser, MemoryUserStore, NewUser, Page, PgUserStore, User, UserRepository, UserUpdate,
};
pub use error::{DbError, DbResult};
