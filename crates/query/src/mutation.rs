//! Side-effecting writes with success/error hooks.
//!
//! A [`Mutation`] never touches a [`QueryCache`](crate::cache::QueryCache); callers invalidate
//! affected keys from `on_success`. It tracks whether a write is pending and the last
//! failure, so a view can disable its controls and surface the error. Nothing is retried.

use std::future::Future;
use std::sync::Arc;

use marquee_shared::ClientError;
use parking_lot::Mutex;

type SuccessHook<T> = Box<dyn FnOnce(&T) + Send>;
type ErrorHook = Box<dyn FnOnce(&ClientError) + Send>;

/// Callbacks run after a write settles. Cancellation runs neither.
pub struct MutationHooks<T> {
    on_success: Option<SuccessHook<T>>,
    on_error: Option<ErrorHook>,
}

impl<T> Default for MutationHooks<T> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> MutationHooks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, hook: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl FnOnce(&ClientError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

#[derive(Debug, Default)]
struct MutationState {
    pending: usize,
    error: Option<ClientError>,
}

/// Tracks writes issued through it. Cloning shares the tracked state.
#[derive(Debug, Clone, Default)]
pub struct Mutation {
    state: Arc<Mutex<MutationState>>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `write`, then the matching hook, and returns the write's result unchanged.
    pub async fn mutate<T, Fut>(&self, write: Fut, hooks: MutationHooks<T>) -> Result<T, ClientError>
    where
        Fut: Future<Output = Result<T, ClientError>>,
    {
        {
            let mut state = self.state.lock();
            state.pending += 1;
            state.error = None;
        }

        let result = write.await;

        {
            let mut state = self.state.lock();
            state.pending = state.pending.saturating_sub(1);
            if let Err(e) = &result {
                if !e.is_cancelled() {
                    state.error = Some(e.clone());
                }
            }
        }

        match &result {
            Ok(value) => {
                if let Some(hook) = hooks.on_success {
                    hook(value);
                }
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!("mutation cancelled");
            }
            Err(e) => {
                tracing::warn!(error = %e, code = e.code(), "mutation failed");
                if let Some(hook) = hooks.on_error {
                    hook(e);
                }
            }
        }

        result
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending > 0
    }

    /// The failure of the most recent write, cleared when the next write starts.
    pub fn error(&self) -> Option<ClientError> {
        self.state.lock().error.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use tokio::sync::oneshot;

    use super::*;

    fn flag() -> (Arc<AtomicBool>, Arc<AtomicBool>) {
        let f = Arc::new(AtomicBool::new(false));
        (f.clone(), f)
    }

    #[tokio::test]
    async fn success_runs_only_on_success() {
        let mutation = Mutation::new();
        let (succeeded, s) = flag();
        let (failed, f) = flag();

        let value = mutation
            .mutate(
                async { Ok::<_, ClientError>(4) },
                MutationHooks::new()
                    .on_success(move |v: &i32| s.store(*v == 4, Ordering::SeqCst))
                    .on_error(move |_| f.store(true, Ordering::SeqCst)),
            )
            .await
            .unwrap();

        assert_eq!(value, 4);
        assert!(succeeded.load(Ordering::SeqCst));
        assert!(!failed.load(Ordering::SeqCst));
        assert!(mutation.error().is_none());
    }

    #[tokio::test]
    async fn failure_is_recorded_and_reported() {
        let mutation = Mutation::new();
        let (failed, f) = flag();

        let err = mutation
            .mutate(
                async {
                    Err::<i32, _>(ClientError::Http {
                        status: 422,
                        body: "bad score".into(),
                    })
                },
                MutationHooks::new().on_error(move |e| f.store(e.status() == Some(422), Ordering::SeqCst)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(422));
        assert!(failed.load(Ordering::SeqCst));
        assert_eq!(mutation.error(), Some(err));
    }

    #[tokio::test]
    async fn cancellation_runs_no_hooks() {
        let mutation = Mutation::new();
        let (called, c) = flag();
        let c2 = c.clone();

        let err = mutation
            .mutate(
                async { Err::<i32, _>(ClientError::Cancelled) },
                MutationHooks::new()
                    .on_success(move |_| c.store(true, Ordering::SeqCst))
                    .on_error(move |_| c2.store(true, Ordering::SeqCst)),
            )
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!called.load(Ordering::SeqCst));
        assert!(mutation.error().is_none());
    }

    #[tokio::test]
    async fn pending_while_write_is_in_flight() {
        let mutation = Mutation::new();
        let (tx, rx) = oneshot::channel::<()>();

        let tracked = mutation.clone();
        let handle = tokio::spawn(async move {
            tracked
                .mutate(
                    async move {
                        let _ = rx.await;
                        Ok::<_, ClientError>(())
                    },
                    MutationHooks::new(),
                )
                .await
        });

        tokio::task::yield_now().await;
        assert!(mutation.is_pending());

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(!mutation.is_pending());
    }
}
