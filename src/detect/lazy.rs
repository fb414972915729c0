use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;

/// Default wait before retrying a failed model load.
pub const DEFAULT_LOAD_RETRY: Duration = Duration::from_secs(5);

enum LoadState<M> {
    Unloaded,
    Ready(M),
    Failed { at: Instant },
}

/// Model state that is loaded on first use and cached afterwards.
///
/// A failed load is remembered; the next attempt happens on the first call after
/// `retry_after` has elapsed, or immediately after `reset`.
pub struct LazyModel<M> {
    state: LoadState<M>,
    retry_after: Duration,
    label: &'static str,
}

impl<M> LazyModel<M> {
    pub fn new(label: &'static str) -> Self {
        Self {
            state: LoadState::Unloaded,
            retry_after: DEFAULT_LOAD_RETRY,
            label,
        }
    }

    pub fn with_retry(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, LoadState::Ready(_))
    }

    /// Forget cached state so the next `get_or_load` loads again.
    pub fn reset(&mut self) {
        self.state = LoadState::Unloaded;
    }

    /// Return the cached model, loading it when needed.
    ///
    /// Returns `None` when the model is not available: either the load failed
    /// just now or the retry window of a previous failure is still open.
    pub fn get_or_load(&mut self, load: impl FnOnce() -> Result<M>) -> Option<&mut M> {
        let attempt = match &self.state {
            LoadState::Ready(_) => false,
            LoadState::Unloaded => true,
            LoadState::Failed { at } => at.elapsed() >= self.retry_after,
        };

        if attempt {
            match load() {
                Ok(model) => {
                    log::info!("{}: model loaded", self.label);
                    self.state = LoadState::Ready(model);
                }
                Err(e) => {
                    log::warn!(
                        "{}: model load failed, retrying in {:?}: {:#}",
                        self.label,
                        self.retry_after,
                        e
                    );
                    self.state = LoadState::Failed { at: Instant::now() };
                }
            }
        }

        match &mut self.state {
            LoadState::Ready(model) => Some(model),
            _ => None,
        }
    }
}
