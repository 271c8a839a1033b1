//! Barrier-synchronized worker pool.
//!
//! Worker `i` owns the rows with `y % n == i`. Each pass is a two-phase
//! rendezvous: `start` releases the workers to sample into their private
//! row buffers, `done` holds the orchestrator until all of them are back.
//! Workers check the stop flag right after `start`, so shutdown is one
//! extra release with the flag set. Workers stay behind a launch gate until
//! the whole pool is up; a failed spawn closes the gate and they exit.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, RwLock};

use super::PassSampler;
use crate::film::PassBuffer;
use crate::integrator::PathIntegrator;
use crate::level::FrameSnapshot;
use crate::util::{seeded_rng, Result};

/// Rows owned by one worker, summed over the samples of the current pass.
struct RowBuffer {
    rows: Vec<u32>,
    pass: PassBuffer,
}

struct Job {
    frame: FrameSnapshot,
    samples: u32,
}

struct Shared {
    start: Barrier,
    done: Barrier,
    job: RwLock<Option<Job>>,
    stop: AtomicBool,
    buffers: Vec<Mutex<RowBuffer>>,
    /// None until every worker is spawned, then whether the pool launched.
    launch: Mutex<Option<bool>>,
    launch_cv: Condvar,
}

impl Shared {
    fn open_launch(&self, launched: bool) {
        *self.launch.lock() = Some(launched);
        self.launch_cv.notify_all();
    }

    fn wait_launch(&self) -> bool {
        let mut launch = self.launch.lock();
        loop {
            if let Some(launched) = *launch {
                return launched;
            }
            self.launch_cv.wait(&mut launch);
        }
    }
}

pub struct ThreadedSampler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadedSampler {
    /// Spawn `threads` workers for a `width`x`height` image.
    pub fn new(integrator: PathIntegrator, threads: usize, width: u32, height: u32, seed: u64) -> Result<Self> {
        let n = threads.max(1);
        let buffers = (0..n)
            .map(|i| {
                let rows: Vec<u32> = (0..height).filter(|y| *y as usize % n == i).collect();
                let pass = PassBuffer::new(width, rows.len() as u32);
                Mutex::new(RowBuffer { rows, pass })
            })
            .collect();

        let shared = Arc::new(Shared {
            start: Barrier::new(n + 1),
            done: Barrier::new(n + 1),
            job: RwLock::new(None),
            stop: AtomicBool::new(false),
            buffers,
            launch: Mutex::new(None),
            launch_cv: Condvar::new(),
        });

        let workers = start_workers(&shared, n, |i, shared| {
            let worker_seed = seed ^ (i as u64 + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15);
            thread::Builder::new()
                .name(format!("spheretrace-worker-{i}"))
                .spawn(move || worker_loop(shared, i, integrator, worker_seed))
        })?;

        tracing::debug!(threads = n, "render workers started");
        Ok(Self { shared, workers })
    }

    pub fn thread_count(&self) -> usize {
        self.shared.buffers.len()
    }

    fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shared.stop.store(true, Ordering::Release);
        self.shared.start.wait();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Spawn `n` workers; if one fails, the ones already running are released and joined.
fn start_workers<F>(shared: &Arc<Shared>, n: usize, mut spawn: F) -> Result<Vec<JoinHandle<()>>>
where
    F: FnMut(usize, Arc<Shared>) -> io::Result<JoinHandle<()>>,
{
    let mut workers = Vec::with_capacity(n);
    for i in 0..n {
        match spawn(i, Arc::clone(shared)) {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                tracing::error!(spawned = workers.len(), threads = n, "worker spawn failed: {e}");
                shared.open_launch(false);
                for handle in workers {
                    let _ = handle.join();
                }
                return Err(e.into());
            }
        }
    }
    shared.open_launch(true);
    Ok(workers)
}

fn worker_loop(shared: Arc<Shared>, index: usize, integrator: PathIntegrator, seed: u64) {
    if !shared.wait_launch() {
        return;
    }
    let mut rng = seeded_rng(seed);
    loop {
        shared.start.wait();
        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        if let Some(job) = shared.job.read().as_ref() {
            let mut guard = shared.buffers[index].lock();
            let buf = &mut *guard;
            let width = buf.pass.width();
            for s in 0..job.samples {
                for (local_y, &y) in buf.rows.iter().enumerate() {
                    for x in 0..width {
                        let c = integrator.sample_radiance(&mut rng, &job.frame, x, y);
                        buf.pass.record(s, x, local_y as u32, c);
                    }
                }
            }
        }

        shared.done.wait();
    }
}

impl PassSampler for ThreadedSampler {
    fn name(&self) -> &'static str {
        "threaded"
    }

    fn render_pass(&mut self, frame: &FrameSnapshot, samples: u32, pass: &mut PassBuffer) {
        *self.shared.job.write() = Some(Job { frame: frame.clone(), samples });
        self.shared.start.wait();
        self.shared.done.wait();
        self.shared.job.write().take();

        for buffer in &self.shared.buffers {
            let buf = buffer.lock();
            for (local_y, &y) in buf.rows.iter().enumerate() {
                pass.row_mut(y).copy_from_slice(buf.pass.row(local_y as u32));
            }
        }
        pass.finish(samples);
    }
}

impl Drop for ThreadedSampler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
