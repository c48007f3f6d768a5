//! Timed rotation over memory groups with an optional wall-clock deadline.
//!
//! The carousel never sleeps itself: callers feed it the current instant via
//! [`TimedCarousel::poll`] and ask [`TimedCarousel::next_wake`] when to call
//! again. Every event carries the generation it was produced under, so an
//! event that outlives a `stop()` can be recognized and dropped.

use keepsake_schema::{MemoryGroup, RotationCause};
use tokio::time::{Duration, Instant};

use crate::{FlowError, FlowResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarouselEvent {
    IndexChanged {
        generation: u64,
        index: usize,
        cause: RotationCause,
    },
    /// `at` is the deadline instant, which a late poll may report after the fact.
    Completed {
        generation: u64,
        at: Instant,
    },
}

impl CarouselEvent {
    pub fn generation(&self) -> u64 {
        match self {
            CarouselEvent::IndexChanged { generation, .. }
            | CarouselEvent::Completed { generation, .. } => *generation,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Timers {
    next_tick_at: Instant,
    deadline_at: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct TimedCarousel {
    groups: Vec<MemoryGroup>,
    captions: Vec<String>,
    index: usize,
    period: Duration,
    deadline: Option<Duration>,
    generation: u64,
    timers: Option<Timers>,
}

impl TimedCarousel {
    pub fn new(
        groups: Vec<MemoryGroup>,
        period: Duration,
        deadline: Option<Duration>,
    ) -> FlowResult<Self> {
        if groups.is_empty() {
            return Err(FlowError::config("carousel needs at least one memory group"));
        }
        if period.is_zero() {
            return Err(FlowError::config("carousel period must be positive"));
        }

        Ok(Self {
            groups,
            captions: Vec::new(),
            index: 0,
            period,
            deadline,
            generation: 0,
            timers: None,
        })
    }

    /// Reminder captions cycled by index when a group has none of its own.
    pub fn with_captions(mut self, captions: Vec<String>) -> Self {
        self.captions = captions;
        self
    }

    pub fn start(&mut self, now: Instant) -> FlowResult<()> {
        if self.timers.is_some() {
            return Err(FlowError::InvalidState(
                "carousel already started; stop it first".to_string(),
            ));
        }

        self.generation += 1;
        self.timers = Some(Timers {
            next_tick_at: now + self.period,
            deadline_at: self.deadline.map(|deadline| now + deadline),
        });
        tracing::debug!(
            generation = self.generation,
            groups = self.groups.len(),
            period_ms = self.period.as_millis() as u64,
            "carousel started"
        );
        Ok(())
    }

    /// Manual advance. Restarts the rotation phase; the deadline is untouched.
    pub fn next(&mut self, now: Instant) -> CarouselEvent {
        self.index = (self.index + 1) % self.groups.len();
        if let Some(timers) = self.timers.as_mut() {
            timers.next_tick_at = now + self.period;
        }
        CarouselEvent::IndexChanged {
            generation: self.generation,
            index: self.index,
            cause: RotationCause::Manual,
        }
    }

    pub fn stop(&mut self) {
        if self.timers.take().is_some() {
            self.generation += 1;
            tracing::debug!(generation = self.generation, "carousel stopped");
        }
    }

    /// Stops the timers and rewinds to the first group.
    pub fn reset(&mut self) {
        self.stop();
        self.index = 0;
    }

    /// Fires everything due at or before `now`, oldest first. A tick and the
    /// deadline at the same instant fire tick first.
    pub fn poll(&mut self, now: Instant) -> Vec<CarouselEvent> {
        let mut events = Vec::new();
        let len = self.groups.len();
        let period = self.period;
        let generation = self.generation;

        let Some(timers) = self.timers.as_mut() else {
            return events;
        };

        loop {
            let tick_due = timers.next_tick_at <= now;
            let deadline_due = timers.deadline_at.filter(|at| *at <= now);

            match deadline_due {
                Some(deadline_at) if !tick_due || deadline_at < timers.next_tick_at => {
                    timers.deadline_at = None;
                    events.push(CarouselEvent::Completed {
                        generation,
                        at: deadline_at,
                    });
                }
                _ if tick_due => {
                    self.index = (self.index + 1) % len;
                    timers.next_tick_at += period;
                    events.push(CarouselEvent::IndexChanged {
                        generation,
                        index: self.index,
                        cause: RotationCause::Tick,
                    });
                }
                _ => break,
            }
        }

        events
    }

    pub fn next_wake(&self) -> Option<Instant> {
        self.timers.map(|timers| match timers.deadline_at {
            Some(deadline_at) => deadline_at.min(timers.next_tick_at),
            None => timers.next_tick_at,
        })
    }

    /// Whether `event` was produced by the current run of this carousel.
    pub fn is_current(&self, event: &CarouselEvent) -> bool {
        self.timers.is_some() && event.generation() == self.generation
    }

    pub fn current_group(&self) -> &MemoryGroup {
        &self.groups[self.index]
    }

    pub fn current_caption(&self) -> Option<&str> {
        caption_at(&self.groups, &self.captions, self.index)
    }

    pub fn groups(&self) -> &[MemoryGroup] {
        &self.groups
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.timers.is_some()
    }
}

/// Caption shown with the group at `index`: the group's own caption if it has
/// one, else the reminder `captions[index % len]`.
fn caption_at<'a>(
    groups: &'a [MemoryGroup],
    captions: &'a [String],
    index: usize,
) -> Option<&'a str> {
    if let Some(caption) = groups.get(index).and_then(|group| group.captions.first()) {
        return Some(caption.as_str());
    }
    if captions.is_empty() {
        return None;
    }
    Some(captions[index % captions.len()].as_str())
}
