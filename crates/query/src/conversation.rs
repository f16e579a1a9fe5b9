//! Per-user conversation history.
//!
//! Each user id owns its own lock, so requests for one user are serialized
//! while different users never contend. Turns can only be appended.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// User id used when a caller does not supply one.
pub const DEFAULT_USER_ID: &str = "default_user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.text)
    }
}

/// Render turns as `Role: text` lines.
pub fn render_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(Turn::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Exclusive access to one user's conversation for as long as it is held.
pub struct ConversationGuard {
    turns: OwnedMutexGuard<Vec<Turn>>,
}

impl ConversationGuard {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }
}

#[derive(Default)]
pub struct ConversationStore {
    conversations: DashMap<String, Arc<Mutex<Vec<Turn>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn conversation(&self, user_id: &str) -> Arc<Mutex<Vec<Turn>>> {
        // Clone the Arc out so the map shard is not locked while awaiting.
        if let Some(existing) = self.conversations.get(user_id) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.conversations
                .entry(user_id.to_string())
                .or_default()
                .value(),
        )
    }

    /// Lock a user's conversation, creating it on first use.
    pub async fn lock(&self, user_id: &str) -> ConversationGuard {
        ConversationGuard {
            turns: self.conversation(user_id).lock_owned().await,
        }
    }

    pub async fn append(&self, user_id: &str, role: Role, text: impl Into<String>) {
        self.lock(user_id).await.push(Turn::new(role, text));
    }

    /// Append and return the resulting history in one critical section.
    pub async fn append_and_get(&self, user_id: &str, turn: Turn) -> Vec<Turn> {
        let mut guard = self.lock(user_id).await;
        guard.push(turn);
        guard.turns().to_vec()
    }

    /// Snapshot of a user's turns. Unknown users get an empty history and
    /// are not registered.
    pub async fn history(&self, user_id: &str) -> Vec<Turn> {
        let conversation = match self.conversations.get(user_id) {
            Some(c) => Arc::clone(c.value()),
            None => return Vec::new(),
        };
        let turns = conversation.lock().await;
        turns.clone()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_user_has_empty_history() {
        let store = ConversationStore::new();
        assert!(store.history("nobody").await.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_append_keeps_order() {
        let store = ConversationStore::new();
        store.append("u1", Role::User, "halo").await;
        store.append("u1", Role::Assistant, "halo juga").await;
        let history = store.append_and_get("u1", Turn::user("apa kabar?")).await;

        assert_eq!(
            history,
            vec![
                Turn::user("halo"),
                Turn::assistant("halo juga"),
                Turn::user("apa kabar?"),
            ]
        );
        assert_eq!(store.history("u1").await, history);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_render_history() {
        let turns = vec![Turn::user("Siapa CEO Satnusa?"), Turn::assistant("Bapak Alex Sirait")];
        assert_eq!(
            render_history(&turns),
            "User: Siapa CEO Satnusa?\nAssistant: Bapak Alex Sirait"
        );
        assert_eq!(render_history(&[]), "");
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(ConversationStore::new());

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = Arc::clone(&store);
            let user = if i % 2 == 0 { "even" } else { "odd" };
            handles.push(tokio::spawn(async move {
                store.append(user, Role::User, i.to_string()).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let even = store.history("even").await;
        let odd = store.history("odd").await;
        assert_eq!(even.len(), 25);
        assert_eq!(odd.len(), 25);
        assert!(even.iter().all(|t| t.text.parse::<u32>().unwrap() % 2 == 0));
        assert!(odd.iter().all(|t| t.text.parse::<u32>().unwrap() % 2 == 1));
    }

    #[tokio::test]
    async fn test_guard_blocks_same_user_only() {
        let store = Arc::new(ConversationStore::new());
        let guard = store.lock("u1").await;

        // Another user is unaffected while u1 is held.
        store.append("u2", Role::User, "hi").await;

        let blocked = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.append("u1", Role::User, "second").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        drop(guard);
        blocked.await.unwrap();
        assert_eq!(store.history("u1").await, vec![Turn::user("second")]);
    }
}
