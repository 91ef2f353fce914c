//! Vault module — encrypted secret storage.
//!
//! This module provides:
//! - Plaintext encoding of entries and credentials (`codec`)
//! - The document-form record on disk (`format`) and its session (`document`)
//! - The SQLite tabular form (`table`)
//! - Shared rotation steps (`rotation`) and creation options (`options`)
//! - The collaborator-facing `Session` over either form (`session`)

pub mod codec;
pub mod document;
pub mod format;
pub mod options;
pub mod rotation;
pub mod session;
#[cfg(feature = "sqlite-store")]
pub mod table;

// Re-export the most commonly used items.
pub use codec::SecretEntries;
pub use document::DocumentVault;
pub use format::VaultDocument;
pub use options::VaultOptions;
pub use session::{Session, StorageForm, VaultLocation};
#[cfg(feature = "sqlite-store")]
pub use table::TableStore;
