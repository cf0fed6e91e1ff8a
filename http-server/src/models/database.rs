use ledger::types::UserId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::User;

#[derive(Default)]
struct Accounts {
    by_session: HashMap<String, User>,
    session_by_user: HashMap<UserId, String>,
    user_by_email: HashMap<String, UserId>,
    next_user_id: UserId,
}

// Simple in-memory storage implementation
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    accounts: Arc<Mutex<Accounts>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the account for `email` under `session_id`.
    /// Returns None if the email is already registered with a different session,
    /// or if the session belongs to another email.
    pub fn get_or_create_account_with_session(&self, email: &str, session_id: &str) -> Option<User> {
        let mut accounts = self.accounts.lock();

        if let Some(user) = accounts.by_session.get(session_id) {
            return (user.email == email).then(|| user.clone());
        }
        if accounts.user_by_email.contains_key(email) {
            return None;
        }

        // User ids start at 1
        accounts.next_user_id += 1;
        let new_user = User {
            user_id: accounts.next_user_id,
            session_id: session_id.to_string(),
            email: email.to_string(),
        };

        accounts
            .session_by_user
            .insert(new_user.user_id, session_id.to_string());
        accounts
            .user_by_email
            .insert(email.to_string(), new_user.user_id);
        accounts
            .by_session
            .insert(session_id.to_string(), new_user.clone());
        Some(new_user)
    }

    // Get user by session ID
    pub fn get_user_by_session_id(&self, session_id: &str) -> Option<User> {
        self.accounts.lock().by_session.get(session_id).cloned()
    }

    pub fn get_user_by_id(&self, user_id: UserId) -> Option<User> {
        let accounts = self.accounts.lock();
        accounts
            .session_by_user
            .get(&user_id)
            .and_then(|session_id| accounts.by_session.get(session_id))
            .cloned()
    }

    pub fn user_count(&self) -> usize {
        self.accounts.lock().by_session.len()
    }
}
