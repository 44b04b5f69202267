//! Rest countdown timer.
//!
//! The timer is poll-driven: the host (CLI loop, UI tick) calls [`RestTimer::poll`]
//! at whatever cadence it likes and receives tick and completion signals.
//! Every signal carries the generation counter of the countdown that produced
//! it, so a signal from an abandoned countdown can always be recognized as
//! stale. Elapsed time is measured with `Instant`, which cannot go backwards,
//! so remaining time never increases between polls unless [`RestTimer::adjust`]
//! is called.

use std::time::{Duration, Instant};

/// Lifecycle phase of a countdown
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerPhase {
    /// No countdown started yet
    Idle,
    /// Counting down
    Running,
    /// Countdown frozen; elapsed time stops accumulating
    Paused,
    /// Reached zero or was skipped; completion signal delivered
    Completed,
    /// Stopped before completion; no completion will ever be delivered
    Cancelled,
}

/// Signal produced by polling a running countdown
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerSignal {
    Tick { remaining_ms: u64, generation: u64 },
    Completed { generation: u64 },
}

impl TimerSignal {
    pub fn generation(&self) -> u64 {
        match self {
            TimerSignal::Tick { generation, .. } | TimerSignal::Completed { generation } => {
                *generation
            }
        }
    }
}

/// A single-countdown rest timer.
///
/// Reusable across rests: each [`RestTimer::start`] bumps the generation and
/// begins a fresh countdown, implicitly abandoning the previous one.
#[derive(Debug)]
pub struct RestTimer {
    phase: TimerPhase,
    generation: u64,
    duration: Duration,
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl RestTimer {
    pub fn new() -> Self {
        Self {
            phase: TimerPhase::Idle,
            generation: 0,
            duration: Duration::ZERO,
            started_at: None,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Begin a countdown of `duration_sec` seconds. Always succeeds; any
    /// previous countdown is abandoned and its generation invalidated.
    /// A zero duration completes on the first poll.
    pub fn start(&mut self, duration_sec: u32) {
        self.generation += 1;
        self.phase = TimerPhase::Running;
        self.duration = Duration::from_secs(u64::from(duration_sec));
        self.started_at = Some(Instant::now());
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        tracing::debug!(
            duration_sec,
            generation = self.generation,
            "rest countdown started"
        );
    }

    /// Freeze the countdown. No-op unless running.
    pub fn pause(&mut self) {
        if self.phase == TimerPhase::Running {
            self.paused_at = Some(Instant::now());
            self.phase = TimerPhase::Paused;
        }
    }

    /// Resume a paused countdown; time spent paused does not count as elapsed.
    pub fn resume(&mut self) {
        if self.phase == TimerPhase::Paused {
            if let Some(paused_at) = self.paused_at.take() {
                self.paused_total += paused_at.elapsed();
            }
            self.phase = TimerPhase::Running;
        }
    }

    /// Add or remove whole seconds without resetting elapsed bookkeeping.
    /// Remaining time floors at zero, which completes on the next poll.
    pub fn adjust(&mut self, delta_sec: i64) {
        if !matches!(self.phase, TimerPhase::Running | TimerPhase::Paused) {
            return;
        }
        self.duration = if delta_sec >= 0 {
            self.duration
                .saturating_add(Duration::from_secs(delta_sec as u64))
        } else {
            self.duration
                .saturating_sub(Duration::from_secs(delta_sec.unsigned_abs()))
        };
        tracing::debug!(delta_sec, remaining_ms = self.remaining_ms(), "rest adjusted");
    }

    /// End the countdown now, delivering the completion signal directly.
    /// Returns `None` if nothing was running.
    pub fn skip(&mut self) -> Option<TimerSignal> {
        if !matches!(self.phase, TimerPhase::Running | TimerPhase::Paused) {
            return None;
        }
        self.phase = TimerPhase::Completed;
        Some(TimerSignal::Completed {
            generation: self.generation,
        })
    }

    /// Abandon the countdown. A cancelled countdown never yields a
    /// completion signal.
    pub fn stop(&mut self) {
        if matches!(self.phase, TimerPhase::Running | TimerPhase::Paused) {
            self.phase = TimerPhase::Cancelled;
        }
    }

    /// Advance the countdown. Returns a tick while time remains, the
    /// completion signal exactly once when it runs out, and `None` in every
    /// phase other than `Running`.
    pub fn poll(&mut self) -> Option<TimerSignal> {
        if self.phase != TimerPhase::Running {
            return None;
        }
        let remaining = self.remaining();
        if remaining.is_zero() {
            self.phase = TimerPhase::Completed;
            return Some(TimerSignal::Completed {
                generation: self.generation,
            });
        }
        Some(TimerSignal::Tick {
            remaining_ms: remaining.as_millis() as u64,
            generation: self.generation,
        })
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.phase == TimerPhase::Running
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining().as_millis() as u64
    }

    fn elapsed(&self) -> Duration {
        let Some(started_at) = self.started_at else {
            return Duration::ZERO;
        };
        let gross = match self.paused_at {
            // While paused, the clock stopped at pause time.
            Some(paused_at) => paused_at.duration_since(started_at),
            None => started_at.elapsed(),
        };
        gross.saturating_sub(self.paused_total)
    }

    fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed())
    }
}

impl Default for RestTimer {
    fn default() -> Self {
        Self::new()
    }
}
