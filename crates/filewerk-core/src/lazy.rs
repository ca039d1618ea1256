// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process-wide heavy resources such as the transcoder binary probe.
//
// A `SharedResource` is created on first use and then reused by every job.
// Callers that arrive while the first initialisation is still running wait on
// that same initialisation instead of starting their own. A failed
// initialisation is not cached; the next caller tries again.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::{FilewerkError, Result};

/// Lazily initialised, shared, at-most-once resource.
pub struct SharedResource<T> {
    name: &'static str,
    cell: OnceCell<Arc<T>>,
}

impl<T> SharedResource<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceCell::const_new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The resource if it has already been initialised.
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().cloned()
    }

    pub fn is_initialised(&self) -> bool {
        self.cell.initialized()
    }

    /// Return the resource, running `init` if nobody has yet.
    ///
    /// Errors from `init` surface as [`FilewerkError::ResourceLoad`].
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let value = self
            .cell
            .get_or_try_init(|| async {
                info!(resource = self.name, "initialising shared resource");
                let started = Instant::now();
                match init().await {
                    Ok(value) => {
                        info!(
                            resource = self.name,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "shared resource ready"
                        );
                        Ok(Arc::new(value))
                    }
                    Err(err) => {
                        warn!(resource = self.name, error = %err, "shared resource failed to initialise");
                        Err(into_resource_error(self.name, err))
                    }
                }
            })
            .await?;
        Ok(Arc::clone(value))
    }
}

fn into_resource_error(name: &str, err: FilewerkError) -> FilewerkError {
    match err {
        FilewerkError::ResourceLoad { .. } => err,
        other => FilewerkError::ResourceLoad {
            resource: name.to_string(),
            detail: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_initialisation() {
        let resource: Arc<SharedResource<String>> = Arc::new(SharedResource::new("model"));
        let inits = Arc::new(AtomicUsize::new(0));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let resource = Arc::clone(&resource);
            let inits = Arc::clone(&inits);
            tasks.spawn(async move {
                resource
                    .get_or_init(|| async move {
                        inits.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(20)).await;
                        Ok("weights".to_string())
                    })
                    .await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let value = joined.expect("task").expect("init");
            assert_eq!(value.as_str(), "weights");
        }
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(resource.is_initialised());
    }

    #[tokio::test]
    async fn failed_initialisation_is_retried() {
        let resource: SharedResource<u32> = SharedResource::new("transcoder");

        let first = resource
            .get_or_init(|| async { Err(FilewerkError::Network("download failed".into())) })
            .await;
        match first {
            Err(FilewerkError::ResourceLoad { resource, detail }) => {
                assert_eq!(resource, "transcoder");
                assert!(detail.contains("download failed"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!resource.is_initialised());

        let second = resource.get_or_init(|| async { Ok(7) }).await.expect("retry");
        assert_eq!(*second, 7);
        assert_eq!(resource.get().as_deref(), Some(&7));
    }
}
