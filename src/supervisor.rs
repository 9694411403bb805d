/*
 * echod - TCP echo server with interruptible blocking I/O
 * This is free and unencumbered software released into the public domain.
 */
use std::collections::{HashMap, HashSet};
use std::io::Result as IoResult;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

use crate::echo;
use crate::reactor::Reactor;
use crate::Connection;

type WorkerId = u64;

enum WorkerEvent {
    Spawned(WorkerId, JoinHandle<()>),
    Finished(WorkerId),
}

/// Spawns one isolated worker thread per accepted connection and reclaims
/// finished workers without ever blocking the accept loop
///
/// Each worker owns its connection and its own [`Reactor`](crate::Reactor);
/// no mutable state is shared between workers, or between a worker and the
/// supervisor. A slow or stalled client therefore only ever occupies its own
/// worker.
///
/// Reaping runs on a dedicated reaper thread fed by completion events: a
/// worker announces its own termination (also when unwinding), and the
/// reaper joins the handle as soon as both the spawn record and the
/// completion have arrived, in whichever order. [`shutdown()`](Supervisor::shutdown())
/// closes the event channel and waits until every outstanding worker has
/// finished; workers are never terminated forcibly.
#[derive(Debug)]
pub struct Supervisor {
    events: Sender<WorkerEvent>,
    reaper: JoinHandle<()>,
    active: Arc<AtomicUsize>,
    next_id: WorkerId,
}

impl Supervisor {
    pub fn new() -> IoResult<Self> {
        let (events, inbox) = crossbeam_channel::unbounded();
        let active = Arc::new(AtomicUsize::new(0));
        let counter = active.clone();

        let reaper = thread::Builder::new()
            .name("echod-reaper".to_owned())
            .spawn(move || reaper_main(inbox, counter))?;

        Ok(Self {
            events,
            reaper,
            active,
            next_id: 0,
        })
    }

    /// Hands the connection off to a new worker thread. On failure the
    /// connection is dropped (and thereby closed); the caller decides
    /// whether to keep accepting.
    pub fn dispatch(&mut self, connection: Connection) -> IoResult<()> {
        let id = self.next_id;
        self.next_id += 1;

        let completion = self.events.clone();
        let handle = thread::Builder::new()
            .name(format!("echod-worker-{}", id))
            .spawn(move || {
                let _completion = CompletionGuard::new(id, completion);
                worker_main(connection);
            })?;

        self.active.fetch_add(1, Ordering::Relaxed);
        if self.events.send(WorkerEvent::Spawned(id, handle)).is_err() {
            warn!("reaper is gone, worker {} will not be reaped", id);
        }
        Ok(())
    }

    /// Number of workers that have been dispatched but not yet reaped.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Stops dispatching and waits for all outstanding workers to finish.
    pub fn shutdown(self) {
        let outstanding = self.active.load(Ordering::Relaxed);
        if outstanding > 0 {
            info!("waiting for {} outstanding worker(s)", outstanding);
        }

        drop(self.events);
        if self.reaper.join().is_err() {
            warn!("reaper thread panicked");
        }
    }
}

fn worker_main(connection: Connection) {
    match Reactor::new() {
        Ok(reactor) => echo::serve_client(&reactor, connection),
        Err(error) => warn!("Failed to set up polling for {}: {}", connection.peer_addr(), error),
    }
}

struct CompletionGuard {
    id: WorkerId,
    events: Sender<WorkerEvent>,
}

impl CompletionGuard {
    fn new(id: WorkerId, events: Sender<WorkerEvent>) -> Self {
        Self {
            id,
            events,
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let _ = self.events.send(WorkerEvent::Finished(self.id));
    }
}

fn reaper_main(inbox: Receiver<WorkerEvent>, active: Arc<AtomicUsize>) {
    let mut running: HashMap<WorkerId, JoinHandle<()>> = HashMap::new();
    let mut finished_early: HashSet<WorkerId> = HashSet::new();

    // The channel closes once the supervisor and every worker have dropped
    // their senders, i.e. once all outstanding workers have finished.
    for event in inbox.iter() {
        match event {
            WorkerEvent::Spawned(id, handle) => match finished_early.remove(&id) {
                true => reap(id, handle, &active),
                false => {
                    running.insert(id, handle);
                },
            },
            WorkerEvent::Finished(id) => match running.remove(&id) {
                Some(handle) => reap(id, handle, &active),
                None => {
                    finished_early.insert(id);
                },
            },
        }
    }

    // Anything left never reported in; join it on the way out.
    for (id, handle) in running {
        reap(id, handle, &active);
    }
}

fn reap(id: WorkerId, handle: JoinHandle<()>, active: &AtomicUsize) {
    if handle.join().is_err() {
        warn!("worker {} panicked", id);
    }
    active.fetch_sub(1, Ordering::Relaxed);
    debug!("worker {} reaped", id);
}
