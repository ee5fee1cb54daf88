//! Per-request context: tenant plus cancellation.

use chatdesk_core::{QueryError, QueryResult, TenantId};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Everything a repository call needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct RequestContext {
    tenant: TenantId,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl RequestContext {
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            deadline: None,
            cancel: None,
        }
    }

    /// Validate a raw tenant id and build a context for it.
    pub fn for_tenant(raw: &str) -> QueryResult<Self> {
        Ok(Self::new(TenantId::parse(raw)?))
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn is_cancelled(&self) -> bool {
        let cancelled = self.cancel.as_ref().is_some_and(|t| t.is_cancelled());
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        cancelled || expired
    }

    /// Fail fast if the request is already cancelled.
    pub fn check(&self, operation: &'static str) -> QueryResult<()> {
        if self.is_cancelled() {
            tracing::warn!(operation, tenant = %self.tenant, "request cancelled");
            return Err(QueryError::Cancelled { operation });
        }
        Ok(())
    }

    /// Race `fut` against the deadline and the cancellation token.
    pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> QueryResult<T>
    where
        F: Future<Output = QueryResult<T>>,
    {
        self.check(operation)?;

        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => {
                tracing::warn!(operation, tenant = %self.tenant, "request cancelled in flight");
                Err(QueryError::Cancelled { operation })
            }
            _ = expired => {
                tracing::warn!(operation, tenant = %self.tenant, "request deadline exceeded");
                Err(QueryError::Cancelled { operation })
            }
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_core::ErrorCode;

    fn ctx() -> RequestContext {
        RequestContext::for_tenant("t1").unwrap()
    }

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let value = ctx().run("noop", async { Ok::<_, QueryError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_rejects_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ctx().with_cancellation(token);
        let err = ctx
            .run("fetch_chats", async { Ok::<_, QueryError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Cancelled { operation: "fetch_chats" }));
        assert_eq!(err.code(), ErrorCode::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let ctx = ctx().with_timeout(Duration::from_millis(50));
        let err = ctx
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, QueryError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Cancelled { operation: "slow" }));
    }

    #[tokio::test]
    async fn test_cancel_in_flight() {
        let token = CancellationToken::new();
        let ctx = ctx().with_cancellation(token.clone());
        let handle = tokio::spawn(async move {
            ctx.run("pending", std::future::pending::<QueryResult<()>>())
                .await
        });
        token.cancel();
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, QueryError::Cancelled { .. }));
    }

    #[test]
    fn test_for_tenant_validates() {
        assert!(RequestContext::for_tenant("").is_err());
        assert_eq!(ctx().tenant().as_str(), "t1");
    }
}
