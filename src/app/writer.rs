//! Single-writer queue for store mutations.
//!
//! Every mutation is a whole-value read-modify-write, so two concurrent
//! writers could silently drop each other's update. All of them go through
//! one thread that applies tasks in arrival order; callers block on a reply
//! channel. Reads don't need the queue.

use std::{
    sync::{mpsc, Arc, Mutex},
    thread::JoinHandle,
};

use crate::{
    classify::LabelScores,
    history::{HistoryStore, UpsertOutcome},
    patterns::PatternStore,
    records::{self, KEY_CUSTOM_LABELS},
    storage::KvStore,
    tags::TagIndex,
};

use super::{backend::Visit, errors::AppError};

type Reply<T> = mpsc::Sender<Result<T, AppError>>;

/// Handles onto every persisted structure.
#[derive(Clone)]
pub struct Stores {
    pub kv: Arc<dyn KvStore>,
    pub history: HistoryStore,
    pub tags: TagIndex,
    pub patterns: PatternStore,
}

impl Stores {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            history: HistoryStore::new(kv.clone()),
            tags: TagIndex::new(kv.clone()),
            patterns: PatternStore::new(kv.clone()),
            kv,
        }
    }
}

pub enum Task {
    /// append a visit to the browsing pattern index
    RecordVisit {
        day: u8,
        hour: u8,
        entry_id: u32,
        reply: Reply<()>,
    },

    /// upsert the entry and count the tags it newly gained
    Upsert {
        visit: Visit,
        labels: LabelScores,
        embedding: Option<Vec<f32>>,
        reply: Reply<UpsertOutcome>,
    },

    /// replace the label vocabulary
    SetLabels {
        labels: Vec<String>,
        reply: Reply<()>,
    },

    /// stop after the tasks already queued
    Shutdown,
}

impl Task {
    fn run(self, stores: &Stores) {
        match self {
            Task::RecordVisit {
                day,
                hour,
                entry_id,
                reply,
            } => {
                let result = stores
                    .patterns
                    .record_visit(day, hour, entry_id)
                    .map_err(AppError::from);
                send(reply, result);
            }
            Task::Upsert {
                visit,
                labels,
                embedding,
                reply,
            } => {
                let result = (|| -> Result<UpsertOutcome, AppError> {
                    let outcome = stores.history.upsert(
                        &visit.title,
                        &visit.url,
                        visit.last_visit_time,
                        &labels,
                        embedding,
                    )?;
                    stores.tags.record_tags(outcome.new_tags().as_slice())?;
                    Ok(outcome)
                })();
                send(reply, result);
            }
            Task::SetLabels { labels, reply } => {
                let result = records::save(stores.kv.as_ref(), KEY_CUSTOM_LABELS, &labels)
                    .map_err(AppError::from);
                send(reply, result);
            }
            Task::Shutdown => unreachable!(),
        }
    }
}

fn send<T>(reply: Reply<T>, result: Result<T, AppError>) {
    // the caller may have given up waiting; the write itself is done
    if reply.send(result).is_err() {
        log::debug!("writer reply dropped");
    }
}

fn start_queue(task_rx: mpsc::Receiver<Task>, stores: Stores) {
    log::debug!("writer waiting for tasks");
    while let Ok(task) = task_rx.recv() {
        if let Task::Shutdown = task {
            log::info!("writer shutting down");
            return;
        }

        task.run(&stores);
    }
}

pub struct Writer {
    task_tx: mpsc::Sender<Task>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Writer {
    pub fn start(stores: Stores) -> Self {
        let (task_tx, task_rx) = mpsc::channel::<Task>();
        let handle = std::thread::spawn(move || start_queue(task_rx, stores));

        Self {
            task_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Queue a task built around a reply channel and wait for its result.
    pub fn submit<T>(&self, make_task: impl FnOnce(Reply<T>) -> Task) -> Result<T, AppError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.task_tx
            .send(make_task(reply_tx))
            .map_err(|_| anyhow::anyhow!("writer is not running"))?;

        reply_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("writer stopped before replying"))?
    }

    /// Finish queued tasks and stop the writer thread.
    pub fn shutdown(&self) {
        let handle = match self.handle.lock() {
            Ok(mut handle) => handle.take(),
            Err(err) => {
                log::error!("writer handle lock poisoned: {err}");
                return;
            }
        };

        let Some(handle) = handle else {
            return;
        };

        if self.task_tx.send(Task::Shutdown).is_err() {
            log::debug!("writer already stopped");
        }

        log::debug!("waiting for writer to finish");
        if let Err(err) = handle.join() {
            log::error!("writer panicked: {err:?}");
        }
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
