//! Frame-yielding batch evaluation of feature collections.
//!
//! The host ticks a [`FrameClock`] once per animation frame. A batch run
//! tests one chunk synchronously, then awaits the next tick before the
//! following chunk, so large layers never block input or rendering for
//! more than one chunk's worth of work.

use crate::feature::Feature;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Default number of features tested per frame.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

#[derive(Debug, Default)]
struct ClockState {
    frame: u64,
    waiters: Vec<Waker>,
}

/// Host-driven animation frame counter.
///
/// Clones share the same clock. Everything runs on one thread.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    state: Rc<RefCell<ClockState>>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames ticked so far.
    pub fn frame(&self) -> u64 {
        self.state.borrow().frame
    }

    /// Advance to the next frame and wake every task waiting on it.
    pub fn tick(&self) -> u64 {
        let (frame, waiters) = {
            let mut state = self.state.borrow_mut();
            state.frame += 1;
            (state.frame, std::mem::take(&mut state.waiters))
        };
        for waker in waiters {
            waker.wake();
        }
        frame
    }

    /// Tasks currently parked until the next frame.
    pub fn waiting(&self) -> usize {
        self.state.borrow().waiters.len()
    }

    /// Future resolving at the next tick.
    pub fn next_frame(&self) -> NextFrame {
        NextFrame {
            clock: self.clone(),
            target: self.frame() + 1,
        }
    }
}

/// Resolves once the clock reaches the frame after its creation.
#[derive(Debug)]
pub struct NextFrame {
    clock: FrameClock,
    target: u64,
}

impl Future for NextFrame {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.clock.state.borrow_mut();
        if state.frame >= self.target {
            Poll::Ready(())
        } else {
            state.waiters.push(cx.waker().clone());
            Poll::Pending
        }
    }
}

/// Splits a feature collection into fixed-size chunks, one per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchScheduler {
    chunk_size: usize,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl BatchScheduler {
    /// Create a scheduler. Chunk sizes below 1 are raised to 1.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks (and therefore frames) needed for `len` features.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }

    /// Test every feature, yielding to the frame clock between chunks.
    ///
    /// Only the complete matched list is returned, in input order.
    pub async fn schedule<F>(&self, features: Vec<Feature>, clock: FrameClock, mut test: F) -> Vec<Feature>
    where
        F: FnMut(&Feature) -> bool,
    {
        let mut matched = Vec::new();
        let total = self.chunk_count(features.len());
        let mut chunks = features.chunks(self.chunk_size).enumerate().peekable();
        while let Some((index, chunk)) = chunks.next() {
            for feature in chunk {
                if test(feature) {
                    matched.push(feature.clone());
                }
            }
            log::trace!("Tested chunk {}/{} ({} matched so far)", index + 1, total, matched.len());
            if chunks.peek().is_some() {
                clock.next_frame().await;
            }
        }
        matched
    }
}

/// Test every feature in a single synchronous pass.
pub fn evaluate_all<F>(features: &[Feature], mut test: F) -> Vec<Feature>
where
    F: FnMut(&Feature) -> bool,
{
    let mut matched = Vec::new();
    for feature in features {
        if test(feature) {
            matched.push(feature.clone());
        }
    }
    matched
}
