//! Standard MIDI File (format 1) writer.
//!
//! One track carries only tempo meta-events (written first, per spec), one
//! track per distinct channel carries that channel's MIDI events. No
//! running status is used, so every event is self-contained — this trades
//! a few bytes of file size for byte-exact verifiability.

use super::vlq;
use crate::error::{AldaError, Result};
use crate::event::{EventSequence, TempoMap, TimedEvent};
use std::collections::BTreeMap;

const HEADER_CHUNK_LEN: u32 = 6;
const FORMAT_MULTI_TRACK: u16 = 1;

/// Serializes `sequence` to SMF bytes at `ticks_per_quarter` resolution.
pub fn write_smf(sequence: &EventSequence, ticks_per_quarter: u16) -> Result<Vec<u8>> {
    let tempo_map = sequence.tempo_map();
    let mut channel_events: BTreeMap<u8, Vec<&TimedEvent>> = BTreeMap::new();
    for event in &sequence.events {
        if let Some(channel) = event.channel() {
            channel_events.entry(channel).or_default().push(event);
        }
    }

    let tempo_track = write_track(&tempo_track_events(&tempo_map), &tempo_map, ticks_per_quarter)?;
    let mut tracks = vec![tempo_track];
    for (_channel, events) in channel_events {
        tracks.push(write_track(&events, &tempo_map, ticks_per_quarter)?);
    }

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"MThd");
    bytes.extend_from_slice(&HEADER_CHUNK_LEN.to_be_bytes());
    bytes.extend_from_slice(&FORMAT_MULTI_TRACK.to_be_bytes());
    bytes.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    bytes.extend_from_slice(&ticks_per_quarter.to_be_bytes());
    for track in tracks {
        bytes.extend_from_slice(&track);
    }
    Ok(bytes)
}

fn tempo_track_events(tempo_map: &TempoMap) -> Vec<&TimedEvent> {
    // The tempo track's own events are materialized directly from the map
    // in `write_track`'s tempo-meta branch below; an empty event slice here
    // just means "this track carries no channel/program events", which is
    // correct for the dedicated tempo track.
    let _ = tempo_map;
    Vec::new()
}

/// One timestamped, already-ordered byte-level event ready to be framed as
/// `<delta VLQ><bytes>`.
struct Framed {
    tick: u64,
    priority: u8,
    bytes: Vec<u8>,
}

fn write_track(events: &[&TimedEvent], tempo_map: &TempoMap, ticks_per_quarter: u16) -> Result<Vec<u8>> {
    let mut framed: Vec<Framed> = Vec::new();

    // Tempo meta-events belong on every track whose input slice is the
    // dedicated tempo track (empty `events`, see `tempo_track_events`);
    // they're reconstructed straight from the unified tempo map so every
    // track's tick arithmetic uses the exact same breakpoints.
    if events.is_empty() {
        for &(time, microseconds_per_quarter) in &tempo_map.points {
            let tick = tempo_map.time_to_ticks(time, u32::from(ticks_per_quarter));
            framed.push(Framed {
                tick,
                priority: 0,
                bytes: tempo_meta_bytes(microseconds_per_quarter),
            });
        }
    }

    for event in events {
        let tick = tempo_map.time_to_ticks(event.time(), u32::from(ticks_per_quarter));
        framed.push(Framed {
            tick,
            priority: event.kind_priority(),
            bytes: event_bytes(event),
        });
    }

    framed.sort_by(|a, b| a.tick.cmp(&b.tick).then(a.priority.cmp(&b.priority)));

    let mut data = Vec::new();
    let mut previous_tick = 0u64;
    for item in &framed {
        let delta = (item.tick - previous_tick) as u32;
        data.extend(vlq::encode(delta));
        data.extend_from_slice(&item.bytes);
        previous_tick = item.tick;
    }
    // End of track.
    data.extend(vlq::encode(0));
    data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    let track_len = u32::try_from(data.len())
        .map_err(|_| AldaError::smf("track length overflowed 2^31 bytes"))?;
    let mut chunk = Vec::new();
    chunk.extend_from_slice(b"MTrk");
    chunk.extend_from_slice(&track_len.to_be_bytes());
    chunk.extend_from_slice(&data);
    Ok(chunk)
}

fn tempo_meta_bytes(microseconds_per_quarter: u32) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0x51, 0x03];
    let be = microseconds_per_quarter.to_be_bytes();
    bytes.extend_from_slice(&be[1..4]);
    bytes
}

fn event_bytes(event: &TimedEvent) -> Vec<u8> {
    match event {
        TimedEvent::NoteOn { channel, pitch, velocity, .. } => {
            vec![0x90 | (channel & 0x0F), *pitch, *velocity]
        }
        TimedEvent::NoteOff { channel, pitch, .. } => {
            vec![0x80 | (channel & 0x0F), *pitch, 0]
        }
        TimedEvent::ProgramChange { channel, program, .. } => {
            vec![0xC0 | (channel & 0x0F), *program]
        }
        TimedEvent::ControlChange { channel, controller, value, .. } => {
            vec![0xB0 | (channel & 0x0F), *controller, *value]
        }
        TimedEvent::TempoChange { microseconds_per_quarter, .. } => {
            tempo_meta_bytes(*microseconds_per_quarter)
        }
    }
}
