//! Tracking for fire-and-forget side-effect tasks.
//!
//! Acks and route bookkeeping run off the reply path. Tracking them keeps
//! shutdown deterministic: [`BackgroundTasks::drain`] waits for everything
//! still in flight, and task failures are logged instead of vanishing with
//! a dropped [`tokio::task::JoinHandle`].

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    tokio::task::JoinHandle,
    tracing::{debug, warn},
};

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    handles: Mutex<HashMap<u64, JoinHandle<()>>>,
}

/// Registry of in-flight background tasks.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` and track it until it settles. Failures are logged under
    /// `label`; panics surface through [`Self::drain`].
    pub fn track<F>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            if let Err(err) = fut.await {
                warn!(task = label, error = %err, "background task failed");
            } else {
                debug!(task = label, "background task finished");
            }
            let mut handles = inner.handles.lock().unwrap_or_else(|e| e.into_inner());
            handles.remove(&id);
        });
        let mut handles = self.inner.handles.lock().unwrap_or_else(|e| e.into_inner());
        handles.retain(|_, h| !h.is_finished());
        // The wrapper may already have run and removed itself.
        if !handle.is_finished() {
            handles.insert(id, handle);
        }
    }

    /// Number of tasks still in flight.
    pub fn len(&self) -> usize {
        let mut handles = self.inner.handles.lock().unwrap_or_else(|e| e.into_inner());
        handles.retain(|_, h| !h.is_finished());
        handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for every tracked task, including any spawned while draining.
    pub async fn drain(&self) {
        loop {
            let next = {
                let mut handles = self.inner.handles.lock().unwrap_or_else(|e| e.into_inner());
                let id = handles.keys().next().copied();
                id.and_then(|id| handles.remove(&id))
            };
            let Some(handle) = next else { break };
            if let Err(err) = handle.await
                && err.is_panic()
            {
                warn!(error = %err, "background task panicked");
            }
        }
    }
}
