//! Identity/role collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Role, UserId};
use tokio::sync::RwLock;

/// Resolves the role of a registered user.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn role_of(&self, user_id: UserId) -> Option<Role>;
}

/// User roles held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    users: Arc<RwLock<HashMap<UserId, Role>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user_id: UserId, role: Role) {
        self.users.write().await.insert(user_id, role);
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn role_of(&self, user_id: UserId) -> Option<Role> {
        self.users.read().await.get(&user_id).copied()
    }
}
