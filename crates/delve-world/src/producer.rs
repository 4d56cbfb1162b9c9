//! Chunk producers: the asynchronous boundary between the manager and the
//! generator.
//!
//! Both strategies accept requests with [`ChunkProducer::post`] and do all
//! their main-thread work inside [`ChunkProducer::consume`], which is called
//! once per tick. Each call dispatches at most `dispatch_per_tick` queued
//! requests and hands back at most `deliver_per_tick` finished buffers.
//! Results may arrive in any order.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use delve_common::{ConfigError, DelveResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::generation::{ChunkData, ChunkGenerator, ChunkRequest, GenerationJob};

/// Accepts generation requests and returns finished chunk buffers.
pub trait ChunkProducer {
    /// Queues a request. Never blocks.
    fn post(&mut self, request: ChunkRequest);

    /// Advances background work and appends finished buffers to `completed`.
    fn consume(&mut self, completed: &mut Vec<ChunkData>);

    /// Requests posted but not yet returned by `consume`.
    fn in_flight(&self) -> usize;
}

/// Which producer to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerStrategy {
    /// Worker thread pool.
    #[default]
    Threaded,
    /// Cooperative generation on the calling thread.
    Stepped,
}

/// Producer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerSettings {
    /// Strategy
    pub strategy: ProducerStrategy,
    /// Worker threads; 0 picks one less than the available cores
    pub workers: usize,
    /// Requests dispatched per `consume`
    pub dispatch_per_tick: usize,
    /// Results returned per `consume`
    pub deliver_per_tick: usize,
    /// Jobs progressing at once (stepped only)
    pub concurrency: usize,
    /// Brick rows each job advances per `consume` (stepped only)
    pub rows_per_step: u32,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            strategy: ProducerStrategy::Threaded,
            workers: 0,
            dispatch_per_tick: 8,
            deliver_per_tick: 8,
            concurrency: 1,
            rows_per_step: 4,
        }
    }
}

impl ProducerSettings {
    /// Worker count after resolving `0` to the machine's parallelism.
    #[must_use]
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism()
            .map_or(2, NonZeroUsize::get)
            .saturating_sub(1)
            .max(1)
    }

    /// Rejects budgets that would leave chunks ungenerated forever.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch_per_tick == 0 || self.deliver_per_tick == 0 {
            return Err(ConfigError::Invalid(format!(
                "producer budgets must be positive (dispatch_per_tick {}, deliver_per_tick {})",
                self.dispatch_per_tick, self.deliver_per_tick
            )));
        }
        Ok(())
    }

    /// Builds the configured producer.
    pub fn build(&self, generator: Arc<ChunkGenerator>) -> DelveResult<Box<dyn ChunkProducer>> {
        Ok(match self.strategy {
            ProducerStrategy::Threaded => Box::new(ThreadedProducer::new(generator, self)?),
            ProducerStrategy::Stepped => Box::new(SteppedProducer::new(generator, self)),
        })
    }
}

/// Generates chunks on a fixed pool of worker threads.
///
/// Jobs go out over a bounded channel and results come back over an unbounded
/// one. Requests that do not fit the job channel stay queued here until a
/// later `consume`.
pub struct ThreadedProducer {
    queue: VecDeque<ChunkRequest>,
    jobs: Option<Sender<ChunkRequest>>,
    results: Receiver<ChunkData>,
    workers: Vec<JoinHandle<()>>,
    /// Sent to workers but not yet received back
    outstanding: usize,
    dispatch_per_tick: usize,
    deliver_per_tick: usize,
}

impl ThreadedProducer {
    /// Spawns the worker pool.
    pub fn new(generator: Arc<ChunkGenerator>, settings: &ProducerSettings) -> DelveResult<Self> {
        let count = settings.resolved_workers();
        let (job_tx, job_rx) = crossbeam_channel::bounded::<ChunkRequest>(count * 2);
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let mut workers = Vec::with_capacity(count);
        for index in 0..count {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let generator = Arc::clone(&generator);
            let handle = thread::Builder::new()
                .name(format!("chunkgen-{index}"))
                .spawn(move || {
                    while let Ok(request) = jobs.recv() {
                        if results.send(generator.generate(request)).is_err() {
                            break;
                        }
                    }
                })?;
            workers.push(handle);
        }

        info!("Started {} chunk generation workers", count);
        Ok(Self {
            queue: VecDeque::new(),
            jobs: Some(job_tx),
            results: result_rx,
            workers,
            outstanding: 0,
            dispatch_per_tick: settings.dispatch_per_tick,
            deliver_per_tick: settings.deliver_per_tick,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn dispatch(&mut self) -> usize {
        let Some(jobs) = &self.jobs else {
            return 0;
        };
        let mut sent = 0;
        while sent < self.dispatch_per_tick {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            match jobs.try_send(request) {
                Ok(()) => {
                    sent += 1;
                    self.outstanding += 1;
                },
                Err(TrySendError::Full(request)) => {
                    self.queue.push_front(request);
                    break;
                },
                Err(TrySendError::Disconnected(request)) => {
                    warn!("Chunk worker pool disconnected, {} requests stranded", self.queue.len() + 1);
                    self.queue.push_front(request);
                    break;
                },
            }
        }
        sent
    }
}

impl ChunkProducer for ThreadedProducer {
    fn post(&mut self, request: ChunkRequest) {
        self.queue.push_back(request);
    }

    fn consume(&mut self, completed: &mut Vec<ChunkData>) {
        let sent = self.dispatch();

        let mut received = 0;
        while received < self.deliver_per_tick {
            match self.results.try_recv() {
                Ok(data) => {
                    completed.push(data);
                    received += 1;
                },
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        self.outstanding = self.outstanding.saturating_sub(received);

        trace!(
            "Threaded producer: dispatched {}, delivered {}, queued {}, outstanding {}",
            sent,
            received,
            self.queue.len(),
            self.outstanding
        );
    }

    fn in_flight(&self) -> usize {
        self.queue.len() + self.outstanding
    }
}

impl Drop for ThreadedProducer {
    fn drop(&mut self) {
        // Closing the job channel ends each worker's receive loop.
        self.jobs = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Chunk worker panicked");
            }
        }
        debug!("Chunk worker pool stopped");
    }
}

/// Generates chunks on the calling thread, a few brick rows per tick.
pub struct SteppedProducer {
    generator: Arc<ChunkGenerator>,
    queue: VecDeque<ChunkRequest>,
    active: Vec<GenerationJob>,
    finished: VecDeque<ChunkData>,
    dispatch_per_tick: usize,
    deliver_per_tick: usize,
    concurrency: usize,
    rows_per_step: u32,
}

impl SteppedProducer {
    /// Creates a stepped producer.
    #[must_use]
    pub fn new(generator: Arc<ChunkGenerator>, settings: &ProducerSettings) -> Self {
        Self {
            generator,
            queue: VecDeque::new(),
            active: Vec::new(),
            finished: VecDeque::new(),
            dispatch_per_tick: settings.dispatch_per_tick,
            deliver_per_tick: settings.deliver_per_tick,
            concurrency: settings.concurrency.max(1),
            rows_per_step: settings.rows_per_step.max(1),
        }
    }

    /// Jobs currently being advanced.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl ChunkProducer for SteppedProducer {
    fn post(&mut self, request: ChunkRequest) {
        self.queue.push_back(request);
    }

    fn consume(&mut self, completed: &mut Vec<ChunkData>) {
        let mut started = 0;
        while started < self.dispatch_per_tick && self.active.len() < self.concurrency {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            self.active.push(self.generator.start(request));
            started += 1;
        }

        let mut index = 0;
        while index < self.active.len() {
            let job = &mut self.active[index];
            let mut done = job.is_complete();
            for _ in 0..self.rows_per_step {
                if done {
                    break;
                }
                done = job.step(&self.generator);
            }
            if done {
                self.finished.push_back(self.active.remove(index).finish());
            } else {
                index += 1;
            }
        }

        let count = self.deliver_per_tick.min(self.finished.len());
        completed.extend(self.finished.drain(..count));

        trace!(
            "Stepped producer: started {}, delivered {}, active {}, queued {}",
            started,
            count,
            self.active.len(),
            self.queue.len()
        );
    }

    fn in_flight(&self) -> usize {
        self.queue.len() + self.active.len() + self.finished.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use delve_common::ChunkCoord;

    use super::*;
    use crate::generation::tests::test_generator;

    fn settings(strategy: ProducerStrategy) -> ProducerSettings {
        ProducerSettings {
            strategy,
            workers: 2,
            dispatch_per_tick: 2,
            deliver_per_tick: 2,
            concurrency: 1,
            rows_per_step: 4,
        }
    }

    fn requests() -> Vec<ChunkRequest> {
        (0..5)
            .map(|i| ChunkRequest::new(ChunkCoord::new(i * 4, -8), i as u64 + 1))
            .collect()
    }

    fn drain(producer: &mut dyn ChunkProducer, expected: usize) -> Vec<ChunkData> {
        let mut completed = Vec::new();
        for _ in 0..10_000 {
            let before = completed.len();
            producer.consume(&mut completed);
            assert!(completed.len() - before <= 2, "delivery budget exceeded");
            if completed.len() == expected {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        completed
    }

    #[test]
    fn test_threaded_delivers_everything() {
        let generator = Arc::new(test_generator(0.25));
        let mut producer =
            ThreadedProducer::new(Arc::clone(&generator), &settings(ProducerStrategy::Threaded)).expect("spawn failed");
        assert_eq!(producer.worker_count(), 2);

        for request in requests() {
            producer.post(request);
        }
        assert_eq!(producer.in_flight(), 5);

        let mut completed = drain(&mut producer, 5);
        assert_eq!(completed.len(), 5);
        assert_eq!(producer.in_flight(), 0);

        completed.sort_by_key(|data| data.request.ticket);
        for (data, request) in completed.iter().zip(requests()) {
            assert_eq!(data.request, request);
            assert_eq!(*data, generator.generate(request));
        }
    }

    #[test]
    fn test_stepped_delivers_everything() {
        let generator = Arc::new(test_generator(0.25));
        let mut producer = SteppedProducer::new(Arc::clone(&generator), &settings(ProducerStrategy::Stepped));
        for request in requests() {
            producer.post(request);
        }

        let mut completed = Vec::new();
        // 16 brick rows at 4 per tick: each chunk takes 4 ticks.
        for _ in 0..3 {
            producer.consume(&mut completed);
            assert!(completed.is_empty());
            assert_eq!(producer.active_count(), 1);
        }
        producer.consume(&mut completed);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0], generator.generate(requests()[0]));

        let completed = drain(&mut producer, 4);
        assert_eq!(completed.len(), 4);
        assert_eq!(producer.in_flight(), 0);
    }

    #[test]
    fn test_stepped_concurrency_and_budgets() {
        let generator = Arc::new(test_generator(0.25));
        let mut producer = SteppedProducer::new(
            generator,
            &ProducerSettings {
                strategy: ProducerStrategy::Stepped,
                workers: 0,
                dispatch_per_tick: 2,
                deliver_per_tick: 1,
                concurrency: 3,
                rows_per_step: 16,
            },
        );
        for request in requests() {
            producer.post(request);
        }

        let mut completed = Vec::new();
        producer.consume(&mut completed);
        // Two jobs start and finish in one tick, only one is handed back.
        assert_eq!(completed.len(), 1);
        assert_eq!(producer.in_flight(), 4);

        producer.consume(&mut completed);
        assert_eq!(completed.len(), 2);
    }

    #[test]
    fn test_build_from_settings() {
        let generator = Arc::new(test_generator(0.25));
        let mut producer = settings(ProducerStrategy::Stepped)
            .build(Arc::clone(&generator))
            .expect("build failed");
        producer.post(ChunkRequest::new(ChunkCoord::new(0, 8), 1));
        let mut completed = Vec::new();
        producer.consume(&mut completed);
        // Above-ground chunks have no rows to step and finish immediately.
        assert_eq!(completed.len(), 1);

        let threaded = settings(ProducerStrategy::Threaded).build(generator).expect("build failed");
        assert_eq!(threaded.in_flight(), 0);
    }

    #[test]
    fn test_resolved_workers() {
        let mut settings = ProducerSettings::default();
        assert!(settings.resolved_workers() >= 1);
        settings.workers = 3;
        assert_eq!(settings.resolved_workers(), 3);
    }
}
