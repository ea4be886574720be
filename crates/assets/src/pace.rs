use crate::AssetError;
use crate::source::{AssetSource, AssetStream};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Permits that let chunks through a [`PacedSource`], one chunk per permit.
///
/// Clones share the same permits. A host releases permits (for example a few
/// per frame) and consumers waiting on the gate are woken.
#[derive(Debug, Clone, Default)]
pub struct ChunkGate {
    inner: Arc<Mutex<GateState>>,
}

#[derive(Debug, Default)]
struct GateState {
    permits: usize,
    waiters: Vec<Waker>,
}

impl ChunkGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `permits` and wake every waiting consumer.
    pub fn release(&self, permits: usize) {
        let waiters = {
            let mut state = self.inner.lock();
            state.permits += permits;
            std::mem::take(&mut state.waiters)
        };
        for waker in waiters {
            waker.wake();
        }
    }

    /// Permits not yet taken.
    pub fn permits(&self) -> usize {
        self.inner.lock().permits
    }

    /// Take one permit, waiting until one is released.
    pub async fn acquire(&self) {
        futures::future::poll_fn(|cx| self.poll_acquire(cx)).await
    }

    fn poll_acquire(&self, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.inner.lock();
        if state.permits > 0 {
            state.permits -= 1;
            return Poll::Ready(());
        }
        if !state.waiters.iter().any(|w| w.will_wake(cx.waker())) {
            state.waiters.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Wraps another source so each chunk waits for a [`ChunkGate`] permit.
///
/// The end of the stream needs no permit, and at most one chunk is pulled
/// from the inner source ahead of the gate.
#[derive(Debug, Clone)]
pub struct PacedSource<S> {
    inner: S,
    gate: ChunkGate,
}

impl<S: AssetSource> PacedSource<S> {
    pub fn new(inner: S, gate: ChunkGate) -> Self {
        Self { inner, gate }
    }

    pub fn gate(&self) -> &ChunkGate {
        &self.gate
    }
}

impl<S: AssetSource> AssetSource for PacedSource<S> {
    fn open(&self, uri: &str) -> Result<AssetStream, AssetError> {
        let opened = self.inner.open(uri)?;
        let gate = self.gate.clone();
        let chunks = opened
            .chunks
            .then(move |chunk| {
                let gate = gate.clone();
                async move {
                    gate.acquire().await;
                    chunk
                }
            })
            .boxed();
        Ok(AssetStream {
            total_len: opened.total_len,
            chunks,
        })
    }
}
