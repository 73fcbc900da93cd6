//! In-memory store of open design sessions
//!
//! Each session owns one [`SchemaDesigner`]; handlers take the write lock for
//! the duration of an edit.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::schema::SchemaDesigner;

#[derive(Clone)]
pub struct DesignSessionStore {
    sessions: Arc<RwLock<HashMap<String, SchemaDesigner>>>,
}

impl DesignSessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a designer and return its session id
    pub async fn create(&self, designer: SchemaDesigner) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), designer);
        id
    }

    pub async fn get(&self, id: &str) -> Option<SchemaDesigner> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Apply `edit` to the session; `None` if there is no such session
    pub async fn update<R>(
        &self,
        id: &str,
        edit: impl FnOnce(&mut SchemaDesigner) -> R,
    ) -> Option<R> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).map(edit)
    }

    pub async fn remove(&self, id: &str) -> Option<SchemaDesigner> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for DesignSessionStore {
    fn default() -> Self {
        Self::new()
    }
}
