//! Typed facility events and the sinks that collect them.
//!
//! Facilities emit an append-only stream of [`Event`]s at cycle boundaries
//! and on every material movement, plus one [`OutputSample`] per timestep.
//! Where the stream ends up is the host's choice: anything implementing
//! [`EventSink`] / [`TimeSeriesSink`] will do. [`EventLog`] is a bounded
//! in-memory ring buffer and [`OutputSeries`] an unbounded vector.

use crate::fixed::{Fixed64, Ticks};
use crate::id::FacilityId;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Result of a discharge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DischargeOutcome {
    /// This many assemblies moved core → spent.
    Moved(usize),
    /// Spent storage lacked room for a full batch.
    Failed,
}

/// A facility event. All events carry the facility and timestep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CycleStart {
        facility: FacilityId,
        tick: Ticks,
    },
    CycleEnd {
        facility: FacilityId,
        tick: Ticks,
    },
    Discharge {
        facility: FacilityId,
        tick: Ticks,
        outcome: DischargeOutcome,
    },
    Load {
        facility: FacilityId,
        tick: Ticks,
        assemblies: usize,
    },
    Transmute {
        facility: FacilityId,
        tick: Ticks,
        assemblies: usize,
    },
}

/// Discriminant tag for event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CycleStart,
    CycleEnd,
    Discharge,
    Load,
    Transmute,
}

impl EventKind {
    /// Name used by recording backends.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::CycleStart => "CYCLE_START",
            EventKind::CycleEnd => "CYCLE_END",
            EventKind::Discharge => "DISCHARGE",
            EventKind::Load => "LOAD",
            EventKind::Transmute => "TRANSMUTE",
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::CycleStart { .. } => EventKind::CycleStart,
            Event::CycleEnd { .. } => EventKind::CycleEnd,
            Event::Discharge { .. } => EventKind::Discharge,
            Event::Load { .. } => EventKind::Load,
            Event::Transmute { .. } => EventKind::Transmute,
        }
    }

    pub fn facility(&self) -> FacilityId {
        match *self {
            Event::CycleStart { facility, .. }
            | Event::CycleEnd { facility, .. }
            | Event::Discharge { facility, .. }
            | Event::Load { facility, .. }
            | Event::Transmute { facility, .. } => facility,
        }
    }

    pub fn tick(&self) -> Ticks {
        match *self {
            Event::CycleStart { tick, .. }
            | Event::CycleEnd { tick, .. }
            | Event::Discharge { tick, .. }
            | Event::Load { tick, .. }
            | Event::Transmute { tick, .. } => tick,
        }
    }

    /// Value column for recording backends: `"N assemblies"`, `"failed"`,
    /// or empty for cycle boundaries.
    pub fn value(&self) -> String {
        match self {
            Event::CycleStart { .. } | Event::CycleEnd { .. } => String::new(),
            Event::Discharge {
                outcome: DischargeOutcome::Failed,
                ..
            } => "failed".to_string(),
            Event::Discharge {
                outcome: DischargeOutcome::Moved(n),
                ..
            }
            | Event::Load { assemblies: n, .. }
            | Event::Transmute { assemblies: n, .. } => format!("{n} assemblies"),
        }
    }
}

/// Instantaneous output of one facility at one timestep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSample {
    pub facility: FacilityId,
    pub tick: Ticks,
    /// Series name, e.g. `"power"`.
    pub series: String,
    pub value: Fixed64,
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Append-only destination for facility events.
pub trait EventSink {
    fn record(&mut self, event: Event);
}

/// Append-only destination for output samples.
pub trait TimeSeriesSink {
    fn record(&mut self, sample: OutputSample);
}

impl EventSink for Vec<Event> {
    fn record(&mut self, event: Event) {
        self.push(event);
    }
}

impl TimeSeriesSink for Vec<OutputSample> {
    fn record(&mut self, sample: OutputSample) {
        self.push(sample);
    }
}

// ---------------------------------------------------------------------------
// EventLog: bounded ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer of events. When full, the oldest events are
/// dropped.
#[derive(Debug)]
pub struct EventLog {
    events: Vec<Option<Event>>,
    /// Next write position.
    head: usize,
    len: usize,
    total_written: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventLog {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Events from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        (0..self.len).filter_map(move |i| self.events[(start + i) % self.capacity()].as_ref())
    }

    /// Events of one kind, oldest first.
    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind() == kind)
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

impl EventSink for EventLog {
    fn record(&mut self, event: Event) {
        let cap = self.capacity();
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % cap;
        if self.len < cap {
            self.len += 1;
        }
        self.total_written += 1;
    }
}

// ---------------------------------------------------------------------------
// OutputSeries
// ---------------------------------------------------------------------------

/// Every output sample recorded, in arrival order.
#[derive(Debug, Default)]
pub struct OutputSeries {
    samples: Vec<OutputSample>,
}

impl OutputSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[OutputSample] {
        &self.samples
    }

    /// Values of one facility's series, in timestep order.
    pub fn values_for(&self, facility: FacilityId) -> Vec<Fixed64> {
        self.samples
            .iter()
            .filter(|s| s.facility == facility)
            .map(|s| s.value)
            .collect()
    }
}

impl TimeSeriesSink for OutputSeries {
    fn record(&mut self, sample: OutputSample) {
        self.samples.push(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(tick: Ticks, n: usize) -> Event {
        Event::Load {
            facility: FacilityId(0),
            tick,
            assemblies: n,
        }
    }

    #[test]
    fn value_strings() {
        let f = FacilityId(1);
        assert_eq!(load(0, 3).value(), "3 assemblies");
        assert_eq!(
            Event::Discharge {
                facility: f,
                tick: 0,
                outcome: DischargeOutcome::Failed
            }
            .value(),
            "failed"
        );
        assert_eq!(Event::CycleEnd { facility: f, tick: 2 }.value(), "");
        assert_eq!(EventKind::Transmute.as_str(), "TRANSMUTE");
    }

    #[test]
    fn accessors() {
        let e = Event::Transmute {
            facility: FacilityId(4),
            tick: 9,
            assemblies: 1,
        };
        assert_eq!(e.kind(), EventKind::Transmute);
        assert_eq!(e.facility(), FacilityId(4));
        assert_eq!(e.tick(), 9);
    }

    #[test]
    fn ring_buffer_drops_oldest() {
        let mut log = EventLog::new(3);
        for t in 0..5 {
            log.record(load(t, 1));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.total_written(), 5);
        assert_eq!(log.dropped_count(), 2);
        let ticks: Vec<Ticks> = log.iter().map(Event::tick).collect();
        assert_eq!(ticks, vec![2, 3, 4]);
    }

    #[test]
    fn ring_buffer_zero_capacity_clamped() {
        let mut log = EventLog::new(0);
        log.record(load(0, 1));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn filter_by_kind_and_clear() {
        let mut log = EventLog::new(8);
        log.record(load(0, 1));
        log.record(Event::CycleStart {
            facility: FacilityId(0),
            tick: 0,
        });
        assert_eq!(log.of_kind(EventKind::CycleStart).count(), 1);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.iter().count(), 0);
    }

    #[test]
    fn output_series_filters_by_facility() {
        let mut series = OutputSeries::new();
        for (f, v) in [(0, 1.0), (1, 2.0), (0, 3.0)] {
            series.record(OutputSample {
                facility: FacilityId(f),
                tick: 0,
                series: "power".into(),
                value: Fixed64::from_num(v),
            });
        }
        assert_eq!(
            series.values_for(FacilityId(0)),
            vec![Fixed64::from_num(1.0), Fixed64::from_num(3.0)]
        );
    }
}
