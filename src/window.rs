use zeroize::Zeroize;

/// Number of puzzle secrets retained.
pub const SECRET_WINDOW: usize = 3;

/// Ring of the most recent puzzle secrets, newest first.
///
/// Challenges are issued from the newest secret. Verification walks every
/// retained secret so a solution to a challenge issued just before a rotation
/// is still accepted.
#[derive(Default)]
pub struct SecretWindow {
    secrets: [Option<[u8; 16]>; SECRET_WINDOW],
}

impl SecretWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a fresh secret to the front, dropping the oldest.
    pub fn push(&mut self, secret: [u8; 16]) {
        if let Some(mut oldest) = self.secrets[SECRET_WINDOW - 1].take() {
            oldest.zeroize();
        }
        self.secrets.rotate_right(1);
        self.secrets[0] = Some(secret);
    }

    pub fn newest(&self) -> Option<&[u8; 16]> {
        self.secrets[0].as_ref()
    }

    /// Retained secrets, newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &[u8; 16]> {
        self.secrets.iter().flatten()
    }
}

impl Drop for SecretWindow {
    fn drop(&mut self) {
        for s in self.secrets.iter_mut().flatten() {
            s.zeroize();
        }
    }
}

impl std::fmt::Debug for SecretWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretWindow")
            .field("retained", &self.iter().count())
            .finish()
    }
}
