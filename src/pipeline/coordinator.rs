use crate::error::Result;
use crate::pipeline::fetcher::{Fetch, FetchedTile};
use crate::pipeline::merger::TileMerger;
use crate::plan::FetchJob;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

/// What happened during one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Tiles handed to a fetch worker.
    pub dispatched: usize,
    /// Tiles merged and cleaned up.
    pub merged: usize,
    /// Largest number of fetched tiles waiting to be merged at any instant.
    pub peak_unmerged: usize,
}

/// Book-keeping shared between fetch workers and the merge loop.
#[derive(Default)]
struct InFlight {
    unmerged: AtomicUsize,
    peak: AtomicUsize,
    abort: AtomicBool,
}

impl InFlight {
    fn fetched(&self) {
        let now = self.unmerged.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn consumed(&self) {
        self.unmerged.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Drives parallel fetch workers into a single sequential merger.
///
/// Dispatch takes a permit from a channel of `queue_capacity` slots before
/// handing a tile to the pool, and the merger returns the permit once the
/// tile is merged. At most `queue_capacity` tiles are therefore fetching or
/// waiting to be merged at any time, which bounds scratch disk use.
pub struct PipelineCoordinator<'a, F: Fetch> {
    fetcher: &'a F,
    workers: usize,
    queue_capacity: usize,
}

impl<'a, F: Fetch> PipelineCoordinator<'a, F> {
    pub fn new(fetcher: &'a F, workers: usize, queue_capacity: usize) -> Self {
        Self {
            fetcher,
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Fetch every job and fold it into `merger`.
    ///
    /// Succeeds once every dispatched tile is merged. The first error from a
    /// fetch worker or from the merge itself stops dispatch; tiles still in
    /// flight are discarded with their scratch directories.
    pub fn run(&self, jobs: Vec<FetchJob>, merger: &mut TileMerger) -> Result<PipelineStats> {
        let total = jobs.len();
        let (done_tx, done_rx) = bounded::<Result<FetchedTile>>(self.queue_capacity);
        let (permit_tx, permit_rx) = bounded::<()>(self.queue_capacity);
        let in_flight = InFlight::default();

        #[cfg(feature = "parallel")]
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("tile-fetch-{i}"))
            .build()
            .map_err(|e| crate::error::Error::WorkerPool(e.to_string()))?;

        log::info!(
            "Merging {} tiles with {} fetch workers, at most {} in flight",
            total,
            self.workers,
            self.queue_capacity
        );

        let (dispatched, merged) = thread::scope(|scope| {
            let in_flight = &in_flight;
            #[cfg(feature = "parallel")]
            let pool = &pool;
            #[cfg(feature = "parallel")]
            let dispatch = move || self.dispatch(pool, jobs, permit_tx, done_tx, in_flight);
            #[cfg(not(feature = "parallel"))]
            let dispatch = move || self.dispatch_inline(jobs, permit_tx, done_tx, in_flight);
            let dispatcher = thread::Builder::new()
                .name("tile-dispatch".to_string())
                .spawn_scoped(scope, dispatch)?;

            let merged = drain(done_rx, permit_rx, merger, in_flight);
            if merged.is_err() {
                in_flight.abort.store(true, Ordering::SeqCst);
            }

            let dispatched = match dispatcher.join() {
                Ok(n) => n,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            Ok::<_, crate::error::Error>((dispatched, merged))
        })?;

        let merged = merged?;
        let stats = PipelineStats {
            dispatched,
            merged,
            peak_unmerged: in_flight.peak.load(Ordering::SeqCst),
        };
        log::info!(
            "Merged {}/{} tiles (peak {} awaiting merge)",
            stats.merged,
            total,
            stats.peak_unmerged
        );
        Ok(stats)
    }

    /// Hand jobs to the worker pool, blocking while `queue_capacity` tiles are
    /// unmerged. Returns once every spawned fetch has finished.
    #[cfg(feature = "parallel")]
    fn dispatch(
        &self,
        pool: &rayon::ThreadPool,
        jobs: Vec<FetchJob>,
        permits: Sender<()>,
        done: Sender<Result<FetchedTile>>,
        in_flight: &InFlight,
    ) -> usize {
        let fetcher = self.fetcher;
        pool.in_place_scope(|s| {
            let mut dispatched = 0;
            for job in jobs {
                if in_flight.abort.load(Ordering::SeqCst) || permits.send(()).is_err() {
                    log::debug!("Dispatch stopped after {} tiles", dispatched);
                    break;
                }
                let done = done.clone();
                s.spawn(move |_| {
                    if in_flight.abort.load(Ordering::SeqCst) {
                        return;
                    }
                    let outcome = fetcher.fetch(&job);
                    in_flight.fetched();
                    // A closed queue means the merge loop has given up
                    let _ = done.send(outcome);
                });
                dispatched += 1;
            }
            dispatched
        })
    }

    #[cfg(not(feature = "parallel"))]
    fn dispatch_inline(
        &self,
        jobs: Vec<FetchJob>,
        permits: Sender<()>,
        done: Sender<Result<FetchedTile>>,
        in_flight: &InFlight,
    ) -> usize {
        let mut dispatched = 0;
        for job in jobs {
            if in_flight.abort.load(Ordering::SeqCst) || permits.send(()).is_err() {
                break;
            }
            let outcome = self.fetcher.fetch(&job);
            in_flight.fetched();
            dispatched += 1;
            if done.send(outcome).is_err() {
                break;
            }
        }
        dispatched
    }
}

/// Merge completed fetches in arrival order until every sender is gone.
///
/// Takes the receivers by value so that returning early closes both
/// channels, which unblocks the dispatcher and the workers.
fn drain(
    done: Receiver<Result<FetchedTile>>,
    permits: Receiver<()>,
    merger: &mut TileMerger,
    in_flight: &InFlight,
) -> Result<usize> {
    let mut merged = 0;
    for outcome in done.iter() {
        in_flight.consumed();
        let fetched = outcome?;
        let tile = fetched.job.tile;
        merger.merge(fetched)?;
        merged += 1;
        let _ = permits.recv();
        log::debug!("Merged tile {} ({} done)", tile, merged);
    }
    Ok(merged)
}
