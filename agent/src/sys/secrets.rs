// agent/src/sys/secrets.rs

use secrecy::{ExposeSecret, SecretString};

/// AdminSecret holds the server administrator / RCON password.
///
/// 1. It cannot be accidentally logged (`{:?}` prints `[REDACTED]`).
/// 2. When dropped, the backing String is zeroized.
#[derive(Debug)]
pub struct AdminSecret {
    token: SecretString,
}

impl AdminSecret {
    /// Takes ownership so the plaintext is not duplicated on the heap.
    pub fn new(raw: String) -> Self {
        Self { token: SecretString::new(raw) }
    }

    /// Exposes the secret for the duration of `action` only.
    pub fn use_secret<F, R>(&self, action: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        action(self.token.expose_secret())
    }

    pub fn is_empty(&self) -> bool {
        self.token.expose_secret().is_empty()
    }
}
