//! Background tracking.
//!
//! The training loop sends losses, exploration rates and episode summaries
//! over a channel to one worker thread, which logs them and keeps a
//! [`TrainingHistory`]. The worker never sees the policy or the store.

pub mod history;

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use crate::episode::EpisodeSummary;
use crate::error::Result;

pub use history::TrainingHistory;

/// Work item for the tracker thread
#[derive(Debug)]
pub enum TrackMsg {
    Loss(f32),
    Epsilon(f32),
    Episode(EpisodeSummary),
    /// Acknowledged once everything queued before it is processed
    Barrier(Sender<()>),
    /// Stop after everything queued before it, even if sinks are still alive
    Shutdown,
}

/// Cloneable sending half of a tracker
#[derive(Clone, Debug)]
pub struct TrackSink(Sender<TrackMsg>);

impl TrackSink {
    /// Queue a message. Dropped silently once the tracker has shut down.
    pub fn send(&self, msg: TrackMsg) {
        let _ = self.0.send(msg);
    }
}

fn lock(history: &Mutex<TrainingHistory>) -> MutexGuard<'_, TrainingHistory> {
    history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run(rx: Receiver<TrackMsg>, history: Arc<Mutex<TrainingHistory>>) {
    for msg in rx {
        match msg {
            TrackMsg::Loss(loss) => lock(&history).record_loss(loss),
            TrackMsg::Epsilon(epsilon) => lock(&history).record_epsilon(epsilon),
            TrackMsg::Episode(summary) => {
                info!(
                    episode = summary.index,
                    steps = summary.steps,
                    status = ?summary.status,
                    scalars = ?summary.scalars,
                    "episode finished"
                );
                lock(&history).record_episode(summary);
            }
            TrackMsg::Barrier(ack) => {
                let _ = ack.send(());
            }
            TrackMsg::Shutdown => break,
        }
    }
    debug!("tracker drained");
}

/// Owner of the tracker thread. Dropping it drains the queue and joins,
/// whether or not sinks handed out by [`Tracker::sink`] are still alive.
#[derive(Debug)]
pub struct Tracker {
    sender: Option<Sender<TrackMsg>>,
    worker: Option<JoinHandle<()>>,
    history: Arc<Mutex<TrainingHistory>>,
}

impl Tracker {
    /// Start the worker, keeping at most `history_size` entries per series.
    pub fn spawn(history_size: usize) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let history = Arc::new(Mutex::new(TrainingHistory::new(history_size)));
        let shared = Arc::clone(&history);
        let worker = thread::Builder::new()
            .name("aurum-tracker".to_string())
            .spawn(move || run(rx, shared))?;
        Ok(Tracker {
            sender: Some(tx),
            worker: Some(worker),
            history,
        })
    }

    pub fn sink(&self) -> Option<TrackSink> {
        self.sender.clone().map(TrackSink)
    }

    pub fn send(&self, msg: TrackMsg) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(msg);
        }
    }

    /// Block until every message queued so far has been processed.
    pub fn wait(&self) {
        let Some(sender) = &self.sender else { return };
        let (ack_tx, ack_rx) = mpsc::channel();
        if sender.send(TrackMsg::Barrier(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Snapshot of the history as of the last processed message
    pub fn history(&self) -> TrainingHistory {
        lock(&self.history).clone()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(TrackMsg::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episode::{Aggregator, Episodes};

    #[test]
    fn wait_is_a_barrier_over_queued_messages() {
        let tracker = Tracker::spawn(16).unwrap();
        for i in 0..100 {
            tracker.send(TrackMsg::Loss(i as f32));
        }
        tracker.wait();
        assert_eq!(tracker.history().learn_steps(), 100);
    }

    #[test]
    fn dropped_episodes_reach_the_tracker() {
        let tracker = Tracker::spawn(16).unwrap();
        let sink = tracker.sink().unwrap();
        for episode in Episodes::new(3, 2).with_sink(sink) {
            let score = episode.track_scalar("score", 0.0, Aggregator::Max);
            for _ in episode.steps() {
                score.inc(1.0);
            }
        }
        tracker.wait();
        let history = tracker.history();
        assert_eq!(history.episode_count(), 3);
        assert_eq!(history.total_steps(), 6);
        assert_eq!(history.avg_scalar("score", 3), Some(1.0));
    }

    #[test]
    fn drop_joins_while_sinks_are_alive() {
        let tracker = Tracker::spawn(16).unwrap();
        let sink = tracker.sink().unwrap();
        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            drop(tracker);
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(std::time::Duration::from_secs(5)).is_ok());
        // sends after shutdown are dropped
        sink.send(TrackMsg::Loss(1.0));
    }
}
