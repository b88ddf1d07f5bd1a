//! Standard MIDI File parser. Handles format 0 and 1; recognizes channel
//! voice messages (note on/off, program change, control change) and the
//! Set Tempo / End of Track meta events. Unknown meta and sysex events are
//! skipped but their declared lengths are honored, so a reader never loses
//! byte-stream sync on an event kind it doesn't specifically interpret.

use super::vlq;
use crate::error::{AldaError, Result};
use crate::event::{EventSequence, TempoMap, TimedEvent};

struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(AldaError::smf("unexpected end of stream"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn take_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn expect_tag(&mut self, tag: &str) -> Result<()> {
        let actual = self.take(tag.len())?;
        if actual != tag.as_bytes() {
            return Err(AldaError::smf(format!(
                "expected chunk tag '{tag}', found {actual:?}"
            )));
        }
        Ok(())
    }

    fn take_vlq(&mut self) -> Result<u32> {
        let (value, consumed) = vlq::decode(&self.bytes[self.pos..])
            .map_err(|e| AldaError::smf(format!("malformed variable-length quantity: {e}")))?;
        self.pos += consumed;
        Ok(value)
    }
}

/// Parses `bytes` into a timed event sequence plus the tempo map used to
/// derive its absolute times, inverting the writer's tick conversion.
pub fn read_smf(bytes: &[u8]) -> Result<(EventSequence, TempoMap)> {
    let mut cursor = ByteCursor::new(bytes);
    cursor.expect_tag("MThd")?;
    let header_len = cursor.take_u32()?;
    if header_len != 6 {
        return Err(AldaError::smf(format!("unexpected header chunk length {header_len}")));
    }
    let format = cursor.take_u16()?;
    if format > 1 {
        return Err(AldaError::smf(format!("unsupported SMF format {format}")));
    }
    let ntrks = cursor.take_u16()?;
    let division = cursor.take_u16()?;
    if division & 0x8000 != 0 {
        return Err(AldaError::smf("SMPTE-style division is not supported"));
    }
    let ticks_per_quarter = division;

    // First pass: collect raw (tick, event) pairs per track, and the set of
    // tempo breakpoints in ticks, before any tick-to-seconds conversion —
    // the conversion needs the complete tempo map up front.
    let mut raw_tracks: Vec<Vec<(u64, RawEvent)>> = Vec::new();
    for _ in 0..ntrks {
        raw_tracks.push(read_track(&mut cursor)?);
    }

    let mut tempo_points_ticks: Vec<(u64, u32)> = raw_tracks
        .iter()
        .flatten()
        .filter_map(|(tick, event)| match event {
            RawEvent::Tempo(microseconds_per_quarter) => Some((*tick, *microseconds_per_quarter)),
            _ => None,
        })
        .collect();
    tempo_points_ticks.sort_by_key(|(tick, _)| *tick);
    if tempo_points_ticks.first().map(|(t, _)| *t) != Some(0) {
        tempo_points_ticks.insert(0, (0, 500_000));
    }
    let tempo_map = tempo_map_from_ticks(&tempo_points_ticks, u32::from(ticks_per_quarter));

    let mut sequence = EventSequence::new();
    for track in &raw_tracks {
        for (tick, event) in track {
            let time = tempo_map.ticks_to_time(*tick, u32::from(ticks_per_quarter));
            let timed = match event {
                RawEvent::NoteOn { channel, pitch, velocity } => {
                    if *velocity == 0 {
                        TimedEvent::NoteOff { time, channel: *channel, pitch: *pitch }
                    } else {
                        TimedEvent::NoteOn { time, channel: *channel, pitch: *pitch, velocity: *velocity }
                    }
                }
                RawEvent::NoteOff { channel, pitch } => TimedEvent::NoteOff { time, channel: *channel, pitch: *pitch },
                RawEvent::ProgramChange { channel, program } => {
                    TimedEvent::ProgramChange { time, channel: *channel, program: *program }
                }
                RawEvent::ControlChange { channel, controller, value } => {
                    TimedEvent::ControlChange { time, channel: *channel, controller: *controller, value: *value }
                }
                RawEvent::Tempo(microseconds_per_quarter) => {
                    TimedEvent::TempoChange { time, microseconds_per_quarter: *microseconds_per_quarter }
                }
            };
            sequence.push(timed);
        }
    }
    Ok((sequence, tempo_map))
}

enum RawEvent {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    ProgramChange { channel: u8, program: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    Tempo(u32),
}

fn read_track(cursor: &mut ByteCursor) -> Result<Vec<(u64, RawEvent)>> {
    cursor.expect_tag("MTrk")?;
    let chunk_len = cursor.take_u32()? as usize;
    let end = cursor.pos + chunk_len;
    let mut events = Vec::new();
    let mut tick: u64 = 0;
    let mut running_status: Option<u8> = None;
    loop {
        if cursor.pos >= end {
            return Err(AldaError::smf("end of track bytes reached before an End of Track event"));
        }
        let delta = cursor.take_vlq()?;
        tick += u64::from(delta);
        let status = cursor.take_u8()?;
        if status == 0xFF {
            let kind = cursor.take_u8()?;
            let len = cursor.take_vlq()? as usize;
            let body = cursor.take(len)?;
            match kind {
                0x51 if len == 3 => {
                    let microseconds = (u32::from(body[0]) << 16) | (u32::from(body[1]) << 8) | u32::from(body[2]);
                    events.push((tick, RawEvent::Tempo(microseconds)));
                }
                0x2F => {
                    if cursor.pos != end {
                        return Err(AldaError::smf("End of Track event before end of track bytes"));
                    }
                    break;
                }
                _ => {} // unknown meta event; length already honored above.
            }
        } else if status == 0xF0 || status == 0xF7 {
            let len = cursor.take_vlq()? as usize;
            cursor.take(len)?; // sysex event, skipped.
        } else if status & 0x80 != 0 {
            running_status = Some(status);
            read_channel_event(cursor, status, tick, &mut events)?;
        } else {
            // running status: this byte is the first data byte of a
            // repeated channel message.
            let status = running_status
                .ok_or_else(|| AldaError::smf("running status byte with no prior status"))?;
            cursor.pos -= 1;
            read_channel_event(cursor, status, tick, &mut events)?;
        }
    }
    Ok(events)
}

fn read_channel_event(
    cursor: &mut ByteCursor,
    status: u8,
    tick: u64,
    events: &mut Vec<(u64, RawEvent)>,
) -> Result<()> {
    let channel = status & 0x0F;
    let kind = status & 0xF0;
    match kind {
        0x80 => {
            let pitch = cursor.take_u8()?;
            let _velocity = cursor.take_u8()?;
            events.push((tick, RawEvent::NoteOff { channel, pitch }));
        }
        0x90 => {
            let pitch = cursor.take_u8()?;
            let velocity = cursor.take_u8()?;
            events.push((tick, RawEvent::NoteOn { channel, pitch, velocity }));
        }
        0xA0 | 0xE0 => {
            cursor.take(2)?; // polyphonic aftertouch / pitch bend: ignored, 2 data bytes.
        }
        0xB0 => {
            let controller = cursor.take_u8()?;
            let value = cursor.take_u8()?;
            events.push((tick, RawEvent::ControlChange { channel, controller, value }));
        }
        0xC0 => {
            let program = cursor.take_u8()?;
            events.push((tick, RawEvent::ProgramChange { channel, program }));
        }
        0xD0 => {
            cursor.take(1)?; // channel aftertouch: ignored, 1 data byte.
        }
        _ => return Err(AldaError::smf(format!("unrecognized status byte 0x{status:02X}"))),
    }
    Ok(())
}

fn tempo_map_from_ticks(points_ticks: &[(u64, u32)], ticks_per_quarter: u32) -> TempoMap {
    let mut points = Vec::with_capacity(points_ticks.len());
    let mut accumulated_seconds = 0.0;
    let mut prev_tick = 0u64;
    let mut prev_tempo = points_ticks.first().map(|(_, t)| *t).unwrap_or(500_000);
    for &(tick, tempo) in points_ticks {
        let delta_ticks = tick - prev_tick;
        accumulated_seconds += f64::from(delta_ticks as u32) * f64::from(prev_tempo) / (1_000_000.0 * f64::from(ticks_per_quarter));
        points.push((accumulated_seconds, tempo));
        prev_tick = tick;
        prev_tempo = tempo;
    }
    TempoMap { points }
}

impl TempoMap {
    /// Inverse of [`TempoMap::time_to_ticks`]: converts an absolute tick
    /// count back to seconds using the same breakpoint segments.
    pub fn ticks_to_time(&self, tick: u64, ticks_per_quarter: u32) -> f64 {
        // `self.points` stores (time_seconds, microseconds_per_quarter)
        // breakpoints; reconstruct each breakpoint's tick position to find
        // the containing segment.
        let mut accumulated_ticks = 0.0f64;
        let mut seg_time = self.points[0].0;
        let mut seg_tempo = self.points[0].1;
        for i in 1..self.points.len() {
            let (next_time, next_tempo) = self.points[i];
            let seg_ticks = (next_time - seg_time) * 1_000_000.0 * f64::from(ticks_per_quarter) / f64::from(seg_tempo);
            if f64::from(tick as u32) < accumulated_ticks + seg_ticks {
                break;
            }
            accumulated_ticks += seg_ticks;
            seg_time = next_time;
            seg_tempo = next_tempo;
        }
        let remaining_ticks = f64::from(tick as u32) - accumulated_ticks;
        seg_time + remaining_ticks * f64::from(seg_tempo) / (1_000_000.0 * f64::from(ticks_per_quarter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smf::writer::write_smf;

    #[test]
    fn test_round_trip_simple_sequence() {
        let mut seq = EventSequence::new();
        seq.push(TimedEvent::ProgramChange { time: 0.0, channel: 0, program: 0 });
        seq.push(TimedEvent::NoteOn { time: 0.0, channel: 0, pitch: 60, velocity: 100 });
        seq.push(TimedEvent::NoteOff { time: 0.45, channel: 0, pitch: 60 });
        seq.push(TimedEvent::NoteOn { time: 0.5, channel: 0, pitch: 62, velocity: 100 });
        seq.push(TimedEvent::NoteOff { time: 0.95, channel: 0, pitch: 62 });

        let bytes = write_smf(&seq, 480).unwrap();
        let (read_seq, _tempo_map) = read_smf(&bytes).unwrap();

        let note_ons: Vec<(u8, u8)> = read_seq
            .events
            .iter()
            .filter_map(|e| match e {
                TimedEvent::NoteOn { channel, pitch, .. } => Some((*channel, *pitch)),
                _ => None,
            })
            .collect();
        assert_eq!(note_ons, vec![(0, 60), (0, 62)]);

        let note_on_times: Vec<f64> = read_seq
            .events
            .iter()
            .filter_map(|e| match e {
                TimedEvent::NoteOn { time, .. } => Some(*time),
                _ => None,
            })
            .collect();
        assert!((note_on_times[0] - 0.0).abs() < 1e-3);
        assert!((note_on_times[1] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_bad_header_tag() {
        let err = read_smf(b"NOPE0000").unwrap_err();
        assert!(matches!(err, AldaError::SmfError(_)));
    }

    #[test]
    fn test_rejects_truncated_track() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&480u16.to_be_bytes());
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&10u32.to_be_bytes()); // claims 10 bytes but supplies none
        let err = read_smf(&bytes).unwrap_err();
        assert!(matches!(err, AldaError::SmfError(_)));
    }
}
