// src/dispatch/mod.rs

//! Bounded fan-out of work items over tokio tasks.
//!
//! Two shapes are supported. `Concurrency::Workers(k)` runs a single producer feeding a
//! bounded queue of capacity `k`, drained by exactly `k` worker tasks. `Concurrency::PerItem`
//! spawns one task per item. Either shape can be paced by a [`RateLimit`]: a ticker gates
//! each item handed out by the producer and a semaphore caps in-flight handlers. Both must
//! admit an item before its handler runs.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{
    sync::{mpsc, Mutex, Semaphore},
    task::JoinSet,
    time::{interval, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod pipeline;

pub use pipeline::{OperationPolicy, Pipeline, RunOutcome, WorkItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// A fixed pool of `k` workers behind a queue of capacity `k`.
    Workers(usize),
    /// One task per item, no cap beyond the rate limit.
    PerItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Minimum spacing between two items leaving the producer.
    pub interval: Duration,
    /// Maximum handlers running at once.
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub concurrency: Concurrency,
    pub rate_limit: Option<RateLimit>,
}

impl DispatchOptions {
    pub fn workers(k: usize) -> Self {
        Self {
            concurrency: Concurrency::Workers(k),
            rate_limit: None,
        }
    }

    pub fn per_item() -> Self {
        Self {
            concurrency: Concurrency::PerItem,
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Items handed to the handler.
    pub dispatched: usize,
    /// Items dropped because the run was cancelled before they were handed out.
    pub cancelled: usize,
    pub elapsed: Duration,
}

fn ticker(rate_limit: Option<RateLimit>) -> Option<Interval> {
    rate_limit.map(|rl| {
        let mut t = interval(rl.interval);
        t.set_missed_tick_behavior(MissedTickBehavior::Delay);
        t
    })
}

/// Wait for the next tick, or return false if the run is cancelled first.
async fn admit(ticker: &mut Option<Interval>, cancel: &CancellationToken) -> bool {
    match ticker {
        Some(t) => tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = t.tick() => true,
        },
        None => !cancel.is_cancelled(),
    }
}

/// Run `handler` once for every item, then wait for all handlers to finish.
///
/// Cancelling `cancel` stops items from being handed out; handlers already running are
/// left to observe the token themselves. Returns once every spawned task has exited.
pub async fn run<T, F, Fut>(
    items: Vec<T>,
    options: &DispatchOptions,
    cancel: &CancellationToken,
    handler: F,
) -> DispatchReport
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let start = Instant::now();
    let total = items.len();
    let handler = Arc::new(handler);
    let in_flight = options
        .rate_limit
        .map(|rl| Arc::new(Semaphore::new(rl.max_in_flight.max(1))));

    info!(
        items = total,
        concurrency = ?options.concurrency,
        rate_limit = ?options.rate_limit,
        "dispatch starting"
    );

    let dispatched = match options.concurrency {
        Concurrency::Workers(k) => {
            run_workers(items, k.max(1), options.rate_limit, in_flight, cancel, handler).await
        }
        Concurrency::PerItem => {
            run_per_item(items, options.rate_limit, in_flight, cancel, handler).await
        }
    };

    let report = DispatchReport {
        dispatched,
        cancelled: total - dispatched,
        elapsed: start.elapsed(),
    };
    if report.cancelled > 0 {
        warn!(cancelled = report.cancelled, "dispatch cancelled before all items ran");
    }
    info!(dispatched = report.dispatched, elapsed = ?report.elapsed, "dispatch finished");
    report
}

async fn run_workers<T, F, Fut>(
    items: Vec<T>,
    workers: usize,
    rate_limit: Option<RateLimit>,
    in_flight: Option<Arc<Semaphore>>,
    cancel: &CancellationToken,
    handler: Arc<F>,
) -> usize
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<T>(workers);
    let rx = Arc::new(Mutex::new(rx));
    let handled = Arc::new(AtomicUsize::new(0));
    let mut tasks = JoinSet::new();

    // ─── producer ───
    let producer_cancel = cancel.clone();
    tasks.spawn(async move {
        let mut ticker = ticker(rate_limit);
        for item in items {
            if !admit(&mut ticker, &producer_cancel).await {
                debug!("producer stopped by cancellation");
                break;
            }
            let sent = tokio::select! {
                biased;
                _ = producer_cancel.cancelled() => false,
                res = tx.send(item) => res.is_ok(),
            };
            if !sent {
                break;
            }
        }
        // tx dropped here; workers exit once the queue is drained
    });

    // ─── workers ───
    for worker in 0..workers {
        let rx = Arc::clone(&rx);
        let handler = Arc::clone(&handler);
        let handled = Arc::clone(&handled);
        let in_flight = in_flight.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            loop {
                let item = { rx.lock().await.recv().await };
                let Some(item) = item else { break };
                if cancel.is_cancelled() {
                    // drain without running so the producer is never blocked
                    continue;
                }
                let _permit = match &in_flight {
                    Some(sem) => match Arc::clone(sem).acquire_owned().await {
                        Ok(p) => Some(p),
                        Err(_) => break,
                    },
                    None => None,
                };
                handled.fetch_add(1, Ordering::SeqCst);
                handler(item).await;
            }
            debug!(worker, "worker exited");
        });
    }

    join_all(&mut tasks).await;
    handled.load(Ordering::SeqCst)
}

async fn run_per_item<T, F, Fut>(
    items: Vec<T>,
    rate_limit: Option<RateLimit>,
    in_flight: Option<Arc<Semaphore>>,
    cancel: &CancellationToken,
    handler: Arc<F>,
) -> usize
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut ticker = ticker(rate_limit);
    let mut tasks = JoinSet::new();
    let mut spawned = 0;

    for item in items {
        if !admit(&mut ticker, cancel).await {
            debug!("spawning stopped by cancellation");
            break;
        }
        let handler = Arc::clone(&handler);
        let in_flight = in_flight.clone();
        tasks.spawn(async move {
            let _permit = match in_flight {
                Some(sem) => match sem.acquire_owned().await {
                    Ok(p) => Some(p),
                    Err(_) => return,
                },
                None => None,
            };
            handler(item).await;
        });
        spawned += 1;
    }

    join_all(&mut tasks).await;
    spawned
}

async fn join_all(tasks: &mut JoinSet<()>) {
    while let Some(res) = tasks.join_next().await {
        if let Err(e) = res {
            error!(error = %e, "dispatch task failed");
        }
    }
}
