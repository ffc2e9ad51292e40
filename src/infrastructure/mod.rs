pub mod cipher;

pub use cipher::{AesTokenCipher, TokenCipher};
