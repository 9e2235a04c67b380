//! Change detection by snapshot comparison.
//!
//! Each tick compares every model against the copy taken at the end of the
//! previous tick and notifies the bindings of the ones that differ. The
//! first tick compares against nothing, so every present model is notified
//! once and bindings get their initial values.

use web_time::{Duration, Instant};

use crate::error::BindError;
use crate::registry::{BindCx, Change, Registry};
use crate::render_api::RenderTree;
use crate::store::Models;
use crate::value::Value;

/// Structural equality over optional values; absent only equals absent.
pub fn deep_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[derive(Debug, Default)]
pub struct TickReport {
    /// 1-based tick counter.
    pub tick: u64,
    /// Models that were notified, present ones first, then removed ones.
    pub changed: Vec<String>,
    pub invoked: usize,
    pub errors: Vec<BindError>,
}

impl TickReport {
    pub fn is_quiet(&self) -> bool {
        self.changed.is_empty()
    }
}

#[derive(Default)]
pub struct Digest {
    previous: Models,
    ticks: u64,
}

impl Digest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The snapshot the next tick compares against.
    pub fn previous(&self) -> &Models {
        &self.previous
    }

    /// Runs one digest pass.
    ///
    /// Writes made to the store by bindings during this pass are picked up
    /// by the snapshot and will not be notified again.
    pub fn tick<T: RenderTree>(
        &mut self,
        registry: &mut Registry<T>,
        cx: &mut BindCx<'_, T>,
    ) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };

        let changed: Vec<(String, Value)> = cx.store.with(|models| {
            models
                .iter()
                .filter(|&(name, value)| !deep_equal(Some(value), self.previous.get(name)))
                .map(|(name, value)| (name.to_owned(), value.clone()))
                .collect()
        });
        let removed: Vec<String> = self
            .previous
            .names()
            .filter(|name| !cx.store.contains(name))
            .map(str::to_owned)
            .collect();

        for (name, value) in &changed {
            let change = Change {
                model: name,
                new: Some(value),
                old: self.previous.get(name),
            };
            log::trace!("tick {}: `{name}` changed", self.ticks);
            let notified = registry.notify(cx, &change);
            report.invoked += notified.invoked;
            report.errors.extend(notified.errors);
            report.changed.push(name.clone());
        }
        for name in removed {
            let change = Change {
                model: &name,
                new: None,
                old: self.previous.get(&name),
            };
            log::trace!("tick {}: `{name}` removed", self.ticks);
            let notified = registry.notify(cx, &change);
            report.invoked += notified.invoked;
            report.errors.extend(notified.errors);
            report.changed.push(name);
        }

        self.previous = cx.store.snapshot();
        if !report.errors.is_empty() {
            log::warn!(
                "tick {} finished with {} failed binding(s)",
                report.tick,
                report.errors.len()
            );
        }
        report
    }
}

/// Schedules digest ticks at a fixed interval without owning a thread.
#[derive(Clone, Debug)]
pub struct Ticker {
    interval: Duration,
    next: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True when a tick is due at `now`; arms the next deadline if so.
    ///
    /// The first call is always due. A host that falls behind gets one tick,
    /// not a burst of catch-up ticks.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.next {
            Some(next) if now < next => false,
            _ => {
                self.next = Some(now + self.interval);
                true
            }
        }
    }

    pub fn until_next(&self, now: Instant) -> Duration {
        self.next
            .map_or(Duration::ZERO, |next| next.saturating_duration_since(now))
    }
}
