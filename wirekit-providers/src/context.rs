use crate::ProviderError;
use std::{future::Future, time::Duration};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Cancellation and deadline scope of a call.
///
/// Cloning a context shares its cancellation; [`CallContext::with_deadline`]
/// derives a child that is cancelled with its parent but not the other way
/// around.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a child context that expires at `deadline`, or at the parent's
    /// deadline if that comes first.
    ///
    /// The child is cancelled when the returned guard is dropped.
    pub fn with_deadline(&self, deadline: Instant) -> (Self, DropGuard) {
        let token = self.token.child_token();
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        let guard = token.clone().drop_guard();
        (Self { token, deadline: Some(deadline) }, guard)
    }

    /// Derives a child context that expires `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> (Self, DropGuard) {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancels this context and every context derived from it
    pub fn cancel(&self) {
        self.token.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once the context is cancelled or past its deadline
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }

    /// Drives `fut` to completion unless the context ends first.
    ///
    /// Cancellation yields [`ProviderError::Cancelled`], an expired deadline
    /// [`ProviderError::DeadlineExceeded`]. The future is dropped in both cases.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ProviderError::Cancelled),
            _ = deadline => Err(ProviderError::DeadlineExceeded),
            res = fut => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let (ctx, _guard) = CallContext::background().with_timeout(Duration::from_secs(1));
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        };
        assert!(matches!(ctx.run(slow).await, Err(ProviderError::DeadlineExceeded)));
        assert!(ctx.is_done());
    }

    #[tokio::test]
    async fn cancellation_wins() {
        let ctx = CallContext::background();
        ctx.cancel();
        let res = ctx.run(async { Ok(1) }).await;
        assert!(matches!(res, Err(ProviderError::Cancelled)));
    }

    #[tokio::test]
    async fn child_inherits_parent() {
        let parent = CallContext::background();
        let (early, _early_guard) = parent.with_timeout(Duration::from_secs(1));
        let (child, guard) = early.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), early.deadline());

        parent.cancel();
        assert!(child.is_cancelled());

        let (other, guard2) = CallContext::background().with_timeout(Duration::from_secs(60));
        drop(guard2);
        assert!(other.is_cancelled());
        drop(guard);
    }
}
