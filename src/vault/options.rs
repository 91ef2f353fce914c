use crate::crypto::kdf::DEFAULT_ITERATIONS;
use crate::errors::{LockboxError, Result};

/// Tunables applied when a vault is created or rotated.
///
/// Opening an existing vault always uses the salt and iteration count
/// stored with it; these options only matter for new key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultOptions {
    /// PBKDF2 work factor for newly derived keys.
    pub iterations: u32,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl VaultOptions {
    /// Options with a custom work factor.
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(LockboxError::InvalidInput(
                "iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
