//! Vault services - the cipher state machine and the on-disk container.

mod cipher;
mod store;

pub use cipher::{MetadataBlob, VaultCipher, VAULT_SALT};
pub use store::{VaultEntry, VaultStore};
