mod memory;
mod user;

pub use memory::MemoryUserStore;
pub use user::{PgUserStore, UserRepository};
