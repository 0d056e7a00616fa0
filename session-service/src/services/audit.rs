use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use std::sync::Mutex;

use crate::models::{AuthEvent, AuthEventKind};

use super::ServiceError;

/// Append-only sink for session lifecycle events.
#[async_trait]
pub trait AuthEventSink: Send + Sync {
    async fn append(&self, event: AuthEvent) -> Result<(), ServiceError>;
}

/// Auth event log. Writes are fire-and-forget: a failed append is logged as
/// a warning and never fails the authentication operation that produced it.
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn AuthEventSink>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuthEventSink>) -> Self {
        Self { sink }
    }

    pub fn record(&self, event: AuthEvent) {
        let sink = self.sink.clone();
        let kind = event.kind;
        tokio::spawn(async move {
            if let Err(e) = sink.append(event).await {
                tracing::warn!(error = %e, kind = %kind.as_str(), "Failed to append auth event");
            }
        });
    }
}

/// PostgreSQL-backed sink writing to the append-only `auth_events` table.
#[derive(Clone)]
pub struct PgAuthEventSink {
    pool: PgPool,
}

impl PgAuthEventSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthEventSink for PgAuthEventSink {
    async fn append(&self, event: AuthEvent) -> Result<(), ServiceError> {
        sqlx::query(
            "INSERT INTO auth_events (id, principal_id, kind, ip, user_agent, detail, at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(event.id)
        .bind(event.principal_id)
        .bind(event.kind.as_str())
        .bind(&event.ip)
        .bind(&event.user_agent)
        .bind(&event.detail)
        .bind(event.at)
        .execute(&self.pool)
        .await
        .map_err(ServiceError::Database)?;
        Ok(())
    }
}

/// In-memory sink for tests; exposes recorded events for assertions.
#[derive(Default)]
pub struct MemoryAuthEventSink {
    events: Mutex<Vec<AuthEvent>>,
}

impl MemoryAuthEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuthEvent> {
        self.events.lock().expect("audit sink lock poisoned").clone()
    }

    pub fn count_of(&self, kind: AuthEventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

#[async_trait]
impl AuthEventSink for MemoryAuthEventSink {
    async fn append(&self, event: AuthEvent) -> Result<(), ServiceError> {
        self.events
            .lock()
            .expect("audit sink lock poisoned")
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn record_appends_asynchronously() {
        let sink = Arc::new(MemoryAuthEventSink::new());
        let audit = AuditLog::new(sink.clone());

        audit.record(AuthEvent::new(
            AuthEventKind::LoginSuccess,
            Some(Uuid::new_v4()),
            "127.0.0.1".into(),
            "ua".into(),
        ));

        // The write is spawned; yield until it lands
        for _ in 0..50 {
            if sink.count_of(AuthEventKind::LoginSuccess) == 1 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("auth event was never appended");
    }
}
