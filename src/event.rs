//! The timed MIDI event sequence produced by the generator and consumed by
//! the SMF writer (and produced, inversely, by the SMF reader).

/// One MIDI-domain event, tagged with an absolute time in seconds from the
/// start of the piece.
#[derive(Debug, Clone, PartialEq)]
pub enum TimedEvent {
    NoteOn {
        time: f64,
        channel: u8,
        pitch: u8,
        velocity: u8,
    },
    NoteOff {
        time: f64,
        channel: u8,
        pitch: u8,
    },
    ProgramChange {
        time: f64,
        channel: u8,
        program: u8,
    },
    ControlChange {
        time: f64,
        channel: u8,
        controller: u8,
        value: u8,
    },
    TempoChange {
        time: f64,
        microseconds_per_quarter: u32,
    },
}

impl TimedEvent {
    pub fn time(&self) -> f64 {
        match self {
            TimedEvent::NoteOn { time, .. }
            | TimedEvent::NoteOff { time, .. }
            | TimedEvent::ProgramChange { time, .. }
            | TimedEvent::ControlChange { time, .. }
            | TimedEvent::TempoChange { time, .. } => *time,
        }
    }

    pub fn channel(&self) -> Option<u8> {
        match self {
            TimedEvent::NoteOn { channel, .. }
            | TimedEvent::NoteOff { channel, .. }
            | TimedEvent::ProgramChange { channel, .. }
            | TimedEvent::ControlChange { channel, .. } => Some(*channel),
            TimedEvent::TempoChange { .. } => None,
        }
    }

    /// Tie-break ordering for events that share an absolute time, per
    /// `ProgramChange < ControlChange < NoteOff < NoteOn`.
    pub fn kind_priority(&self) -> u8 {
        match self {
            TimedEvent::TempoChange { .. } => 0,
            TimedEvent::ProgramChange { .. } => 1,
            TimedEvent::ControlChange { .. } => 2,
            TimedEvent::NoteOff { .. } => 3,
            TimedEvent::NoteOn { .. } => 4,
        }
    }
}

/// A full lowering result: the generated events (unsorted, as produced by
/// the generator's traversal order) plus the resolved tempo map used to
/// convert them to SMF ticks.
#[derive(Debug, Clone, Default)]
pub struct EventSequence {
    pub events: Vec<TimedEvent>,
}

impl EventSequence {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: TimedEvent) {
        self.events.push(event);
    }

    /// Derives the tempo map (sorted, deduplicated by strictly increasing
    /// time) implied by this sequence's `TempoChange` events, seeded with a
    /// default of 120 BPM (500,000 µs/quarter) at time zero if none was
    /// emitted at t=0.
    pub fn tempo_map(&self) -> TempoMap {
        let mut points: Vec<(f64, u32)> = self
            .events
            .iter()
            .filter_map(|e| match e {
                TimedEvent::TempoChange {
                    time,
                    microseconds_per_quarter,
                } => Some((*time, *microseconds_per_quarter)),
                _ => None,
            })
            .collect();
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        if points.first().map(|(t, _)| *t) != Some(0.0) {
            points.insert(0, (0.0, 500_000));
        }
        TempoMap { points }
    }
}

/// A non-decreasing sequence of `(time_seconds, microseconds_per_quarter)`
/// breakpoints, shared by every track so tick conversion stays aligned
/// across the whole file (spec's explicit "prior art" warning: tempo must
/// never be computed per-track).
#[derive(Debug, Clone)]
pub struct TempoMap {
    pub points: Vec<(f64, u32)>,
}

impl TempoMap {
    /// Converts an absolute time in seconds to an absolute tick count at
    /// `ticks_per_quarter` resolution, by walking the tempo segments.
    pub fn time_to_ticks(&self, time: f64, ticks_per_quarter: u32) -> u64 {
        let mut accumulated_ticks = 0.0f64;
        let mut segment_start = self.points[0].0;
        let mut segment_tempo = self.points[0].1;
        for &(next_time, next_tempo) in &self.points[1..] {
            if time < next_time {
                break;
            }
            accumulated_ticks += ticks_in_segment(
                next_time - segment_start,
                segment_tempo,
                ticks_per_quarter,
            );
            segment_start = next_time;
            segment_tempo = next_tempo;
        }
        accumulated_ticks += ticks_in_segment(time - segment_start, segment_tempo, ticks_per_quarter);
        accumulated_ticks.round() as u64
    }
}

fn ticks_in_segment(duration_seconds: f64, microseconds_per_quarter: u32, ticks_per_quarter: u32) -> f64 {
    duration_seconds * 1_000_000.0 * f64::from(ticks_per_quarter) / f64::from(microseconds_per_quarter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tempo_map_when_no_tempo_change() {
        let seq = EventSequence::new();
        let map = seq.tempo_map();
        assert_eq!(map.points, vec![(0.0, 500_000)]);
    }

    #[test]
    fn test_time_to_ticks_single_tempo() {
        let map = TempoMap {
            points: vec![(0.0, 500_000)],
        };
        // one quarter note at 120 BPM (500_000 us/quarter) and 480 tpq.
        assert_eq!(map.time_to_ticks(0.5, 480), 480);
    }

    #[test]
    fn test_time_to_ticks_across_tempo_change() {
        let map = TempoMap {
            points: vec![(0.0, 500_000), (1.0, 1_000_000)],
        };
        // 1s at 120 BPM = 960 ticks, then 0.5s at 60 BPM = 480 ticks more.
        assert_eq!(map.time_to_ticks(1.5, 480), 1440);
    }
}
