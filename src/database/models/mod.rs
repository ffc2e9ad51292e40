pub mod page;
pub mod token;
pub mod user;

pub use page::Page;
pub use token::RefreshToken;
pub use user::{ActivateUser, NewUser, User, UserUpdate};
