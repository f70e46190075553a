//! Timeline playback
//!
//! [`Playback`] walks a [`Timeline`] one tick at a time. For each entry it reports the
//! running pid and a preview of the next few pids (the "ready queue"). After the last
//! entry it yields one terminal snapshot with nothing running, then ends.
//!
//! [`PlaybackClock`] paces the same snapshots in wall time.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use powersched_simulation_engine::{Pid, Timeline};

use crate::config::DEFAULT_PREVIEW_LEN;

/// State of the CPU at one playback tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    /// Process on the CPU (`None` on the terminal snapshot)
    pub running_pid: Option<Pid>,
    /// Upcoming pids, in timeline order
    pub ready_queue_preview: Vec<Pid>,
    pub tick_index: usize,
}

impl PlaybackSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.running_pid.is_none()
    }
}

/// Lazy, finite walk over a timeline
#[derive(Debug, Clone)]
pub struct Playback {
    pids: Vec<Pid>,
    preview_len: usize,
    index: usize,
    finished: bool,
}

impl Playback {
    pub fn new(timeline: &Timeline, preview_len: usize) -> Self {
        Self {
            pids: timeline.pids().collect(),
            preview_len,
            index: 0,
            finished: false,
        }
    }

    /// Snapshots still to come, terminal included
    pub fn remaining(&self) -> usize {
        if self.finished {
            0
        } else {
            self.pids.len() - self.index + 1
        }
    }
}

impl From<&Timeline> for Playback {
    fn from(timeline: &Timeline) -> Self {
        Self::new(timeline, DEFAULT_PREVIEW_LEN)
    }
}

impl Iterator for Playback {
    type Item = PlaybackSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let tick_index = self.index;
        let Some(&running) = self.pids.get(tick_index) else {
            self.finished = true;
            return Some(PlaybackSnapshot {
                running_pid: None,
                ready_queue_preview: Vec::new(),
                tick_index,
            });
        };

        let start = tick_index + 1;
        let end = (start + self.preview_len).min(self.pids.len());
        self.index += 1;

        Some(PlaybackSnapshot {
            running_pid: Some(running),
            ready_queue_preview: self.pids[start..end].to_vec(),
            tick_index,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Playback {}

/// Paces a [`Playback`] at a fixed wall-clock cadence
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    tick_interval: Duration,
}

impl PlaybackClock {
    pub fn new(tick_interval: Duration) -> Self {
        Self { tick_interval }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Yield one snapshot per tick interval, the first after one full interval
    ///
    /// A tick that falls due while the consumer is still handling the previous
    /// snapshot is dropped; the next snapshot waits for the following tick.
    /// Dropping the stream stops playback.
    pub fn stream(&self, playback: Playback) -> Pin<Box<dyn Stream<Item = PlaybackSnapshot> + Send>> {
        let period = self.tick_interval;

        Box::pin(async_stream::stream! {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut idle_since = Instant::now();

            for snapshot in playback {
                while ticker.tick().await < idle_since {}
                yield snapshot;
                idle_since = Instant::now();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use powersched_simulation_engine::{simulate, AlgorithmKind, Process};

    fn demo_timeline(algorithm: AlgorithmKind) -> Timeline {
        simulate(&Process::demo_set(), algorithm).unwrap()
    }

    #[test]
    fn test_fcfs_snapshots() {
        let timeline = demo_timeline(AlgorithmKind::Fcfs);
        let snapshots: Vec<_> = Playback::from(&timeline).collect();

        assert_eq!(snapshots.len(), 17);
        assert_eq!(snapshots[0].running_pid, Some(1));
        assert_eq!(snapshots[0].ready_queue_preview, vec![1, 1, 1]);
        assert_eq!(snapshots[3].ready_queue_preview, vec![1, 2, 2]);

        // Preview shrinks near the end
        assert_eq!(snapshots[14].ready_queue_preview, vec![3]);
        assert!(snapshots[15].ready_queue_preview.is_empty());

        let last = snapshots.last().unwrap();
        assert!(last.is_terminal());
        assert_eq!(last.tick_index, 16);
        assert!(last.ready_queue_preview.is_empty());
    }

    #[test]
    fn test_preview_never_exceeds_len() {
        let timeline = demo_timeline(AlgorithmKind::RoundRobin);
        for snapshot in Playback::new(&timeline, 3) {
            assert!(snapshot.ready_queue_preview.len() <= 3);
        }
    }

    #[test]
    fn test_empty_timeline_yields_terminal_only() {
        let timeline = Timeline::empty(AlgorithmKind::Fcfs);
        let snapshots: Vec<_> = Playback::from(&timeline).collect();
        assert_eq!(
            snapshots,
            vec![PlaybackSnapshot {
                running_pid: None,
                ready_queue_preview: vec![],
                tick_index: 0,
            }]
        );
    }

    #[test]
    fn test_not_restartable() {
        let timeline = demo_timeline(AlgorithmKind::Priority);
        let mut playback = Playback::from(&timeline);
        assert_eq!(playback.len(), 17);

        playback.by_ref().for_each(drop);
        assert_eq!(playback.next(), None);
        assert_eq!(playback.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_paces_snapshots() {
        let timeline = demo_timeline(AlgorithmKind::Fcfs);
        let clock = PlaybackClock::new(Duration::from_secs(1));
        let start = Instant::now();

        let mut stream = clock.stream(Playback::from(&timeline));
        let first = stream.next().await.unwrap();
        assert_eq!(first.tick_index, 0);
        assert_eq!(start.elapsed(), Duration::from_secs(1));

        let rest: Vec<_> = stream.collect().await;
        assert_eq!(rest.len(), 16);
        assert!(rest.last().unwrap().is_terminal());
        assert_eq!(start.elapsed(), Duration::from_secs(17));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_snapshot_before_first_tick() {
        let timeline = demo_timeline(AlgorithmKind::Sjf);
        let clock = PlaybackClock::new(Duration::from_secs(1));
        let mut stream = clock.stream(Playback::from(&timeline));

        let mut next = tokio_test::task::spawn(stream.next());
        tokio_test::assert_pending!(next.poll());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(next.is_woken());

        let snapshot = tokio_test::assert_ready!(next.poll()).unwrap();
        assert_eq!(snapshot.tick_index, 0);
        assert_eq!(snapshot.running_pid, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_consumer_drops_late_ticks() {
        let timeline = demo_timeline(AlgorithmKind::Fcfs);
        let clock = PlaybackClock::new(Duration::from_secs(1));
        let start = Instant::now();

        let mut stream = clock.stream(Playback::from(&timeline));
        let mut delivered = Vec::new();
        for _ in 0..3 {
            let snapshot = stream.next().await.unwrap();
            delivered.push((snapshot.tick_index, start.elapsed().as_millis()));
            tokio::time::sleep(Duration::from_millis(1500)).await;
        }

        // No snapshot is lost, but each one waits for the next tick boundary
        assert_eq!(delivered, vec![(0, 1000), (1, 3000), (2, 5000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_stream_stops_playback() {
        let timeline = demo_timeline(AlgorithmKind::Fcfs);
        let clock = PlaybackClock::new(Duration::from_millis(100));

        let mut stream = clock.stream(Playback::from(&timeline));
        let taken: Vec<_> = (&mut stream).take(3).collect().await;
        drop(stream);

        assert_eq!(taken.len(), 3);
        assert_eq!(taken[2].tick_index, 2);
    }
}
