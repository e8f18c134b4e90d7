//! Rolling window of call outcomes.
//!
//! A count-based window keeps the last `size` outcomes. A time-based window
//! keeps one `(calls, failures)` bucket per second for the last `size`
//! seconds, so its memory does not depend on the call rate.

use std::collections::VecDeque;

use tokio::time::Instant;

use crate::breaker::CallOutcome;
use crate::config::SlidingWindowType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WindowSnapshot {
    pub calls: usize,
    pub failures: usize,
}

impl WindowSnapshot {
    /// Failure rate in percent; zero for an empty window.
    pub fn failure_rate(&self) -> f32 {
        if self.calls == 0 {
            return 0.0;
        }
        self.failures as f32 * 100.0 / self.calls as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SecondBucket {
    second: u64,
    calls: usize,
    failures: usize,
}

#[derive(Debug)]
enum Entries {
    Count(VecDeque<CallOutcome>),
    Time {
        origin: Instant,
        buckets: VecDeque<SecondBucket>,
    },
}

#[derive(Debug)]
pub(crate) struct SlidingWindow {
    size: u32,
    entries: Entries,
    calls: usize,
    failures: usize,
}

impl SlidingWindow {
    pub fn new(kind: SlidingWindowType, size: u32) -> Self {
        let entries = match kind {
            SlidingWindowType::CountBased => {
                Entries::Count(VecDeque::with_capacity(size as usize))
            }
            SlidingWindowType::TimeBased => Entries::Time {
                origin: Instant::now(),
                buckets: VecDeque::new(),
            },
        };

        Self {
            size,
            entries,
            calls: 0,
            failures: 0,
        }
    }

    pub fn record(&mut self, outcome: CallOutcome, now: Instant) {
        let failed = usize::from(outcome == CallOutcome::Failure);

        match &mut self.entries {
            Entries::Count(outcomes) => outcomes.push_back(outcome),
            Entries::Time { origin, buckets } => {
                let second = now.saturating_duration_since(*origin).as_secs();
                match buckets.back_mut() {
                    Some(bucket) if bucket.second == second => {
                        bucket.calls += 1;
                        bucket.failures += failed;
                    }
                    _ => buckets.push_back(SecondBucket {
                        second,
                        calls: 1,
                        failures: failed,
                    }),
                }
            }
        }
        self.calls += 1;
        self.failures += failed;
        self.evict(now);
    }

    pub fn snapshot(&mut self, now: Instant) -> WindowSnapshot {
        self.evict(now);
        WindowSnapshot {
            calls: self.calls,
            failures: self.failures,
        }
    }

    pub fn clear(&mut self) {
        match &mut self.entries {
            Entries::Count(outcomes) => outcomes.clear(),
            Entries::Time { buckets, .. } => buckets.clear(),
        }
        self.calls = 0;
        self.failures = 0;
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        match &self.entries {
            Entries::Count(outcomes) => outcomes.len(),
            Entries::Time { buckets, .. } => buckets.len(),
        }
    }

    fn evict(&mut self, now: Instant) {
        match &mut self.entries {
            Entries::Count(outcomes) => {
                while outcomes.len() > self.size as usize {
                    if let Some(CallOutcome::Failure) = outcomes.pop_front() {
                        self.failures -= 1;
                    }
                    self.calls -= 1;
                }
            }
            Entries::Time { origin, buckets } => {
                let current = now.saturating_duration_since(*origin).as_secs();
                while let Some(bucket) = buckets.front() {
                    if current.saturating_sub(bucket.second) < u64::from(self.size) {
                        break;
                    }
                    self.calls -= bucket.calls;
                    self.failures -= bucket.failures;
                    buckets.pop_front();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn count_window_keeps_last_n() {
        let mut window = SlidingWindow::new(SlidingWindowType::CountBased, 3);
        let now = Instant::now();

        window.record(CallOutcome::Failure, now);
        window.record(CallOutcome::Failure, now);
        window.record(CallOutcome::Success, now);
        window.record(CallOutcome::Success, now);

        let snapshot = window.snapshot(now);
        assert_eq!(snapshot.calls, 3);
        assert_eq!(snapshot.failures, 1);
    }

    #[test]
    fn failure_rate_in_percent() {
        let snapshot = WindowSnapshot {
            calls: 4,
            failures: 1,
        };
        assert_eq!(snapshot.failure_rate(), 25.0);
        assert_eq!(
            WindowSnapshot {
                calls: 0,
                failures: 0
            }
            .failure_rate(),
            0.0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn time_window_expires_old_calls() {
        let mut window = SlidingWindow::new(SlidingWindowType::TimeBased, 2);

        window.record(CallOutcome::Failure, Instant::now());
        tokio::time::advance(Duration::from_secs(1)).await;
        window.record(CallOutcome::Success, Instant::now());

        assert_eq!(window.snapshot(Instant::now()).calls, 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        let snapshot = window.snapshot(Instant::now());
        assert_eq!(snapshot.calls, 1);
        assert_eq!(snapshot.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn time_window_memory_is_bounded_by_seconds() {
        let mut window = SlidingWindow::new(SlidingWindowType::TimeBased, 3);

        for _ in 0..5 {
            for _ in 0..1_000 {
                window.record(CallOutcome::Failure, Instant::now());
            }
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        let snapshot = window.snapshot(Instant::now());
        assert!(window.bucket_count() <= 3);
        assert_eq!(snapshot.calls, 2_000);
        assert_eq!(snapshot.failures, 2_000);
    }

    #[tokio::test(start_paused = true)]
    async fn time_window_merges_calls_in_the_same_second() {
        let mut window = SlidingWindow::new(SlidingWindowType::TimeBased, 10);

        window.record(CallOutcome::Success, Instant::now());
        tokio::time::advance(Duration::from_millis(400)).await;
        window.record(CallOutcome::Failure, Instant::now());

        assert_eq!(window.bucket_count(), 1);
        assert_eq!(
            window.snapshot(Instant::now()),
            WindowSnapshot {
                calls: 2,
                failures: 1
            }
        );
    }

    #[test]
    fn clear_resets_counts() {
        let mut window = SlidingWindow::new(SlidingWindowType::CountBased, 5);
        let now = Instant::now();
        window.record(CallOutcome::Failure, now);
        window.clear();
        assert_eq!(window.snapshot(now), WindowSnapshot { calls: 0, failures: 0 });
    }
}
