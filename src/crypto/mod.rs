//! Cryptographic building blocks: key derivation, authenticated
//! encryption and the packed entry payload.

pub mod encryption;
pub mod kdf;
pub mod payload;

pub use encryption::{open, seal};
pub use kdf::{derive_key, KdfParams, KeyStrategy};
