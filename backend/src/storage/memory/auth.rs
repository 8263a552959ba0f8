use std::sync::Mutex;

use crate::storage::traits::{AuthProvider, UserAccount};

/// Auth provider backed by a settable in-memory user.
///
/// Tests and local development sign users in and out directly; the data
/// access layer only ever asks for the current user.
#[derive(Default)]
pub struct StaticAuthProvider {
    user: Mutex<Option<UserAccount>>,
}

impl StaticAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(email: &str) -> Self {
        let provider = Self::new();
        provider.sign_in(email);
        provider
    }

    pub fn sign_in(&self, email: &str) {
        *self.user.lock().unwrap() = Some(UserAccount {
            email: email.to_string(),
        });
    }

    pub fn sign_out(&self) {
        *self.user.lock().unwrap() = None;
    }
}

impl AuthProvider for StaticAuthProvider {
    fn current_user(&self) -> Option<UserAccount> {
        self.user.lock().unwrap().clone()
    }
}
