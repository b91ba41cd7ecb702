//! Reversible field obfuscation.
//!
//! Not encryption: anyone holding the seed, or enough ciphertext, can recover the input. It keeps
//! personal data unreadable in dumps and backups while staying reversible for the application.

mod obfuscator;
mod table;

pub use obfuscator::Obfuscator;
pub use table::{CipherTable, DEFAULT_ALPHABET};
