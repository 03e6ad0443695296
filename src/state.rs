use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::services::pipeline::{Session, TastePipeline};

/// Shared application state
///
/// Holds the pipeline and one [`Session`] per conversation. Sessions are
/// keyed by UUID so concurrent conversations never share cached history or
/// recommendations.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TastePipeline>,
    pub sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl AppState {
    pub fn new(pipeline: TastePipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Takes a conversation's session out of the map, creating it on first
    /// use. The caller runs its turn against the owned session and returns it
    /// with [`AppState::put_session`]; a conversation processes one turn at a
    /// time.
    pub async fn take_session(&self, session_id: Uuid) -> Session {
        self.sessions
            .write()
            .await
            .remove(&session_id)
            .unwrap_or_default()
    }

    pub async fn put_session(&self, session_id: Uuid, session: Session) {
        self.sessions.write().await.insert(session_id, session);
    }
}
