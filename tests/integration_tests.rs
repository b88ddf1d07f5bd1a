//! End-to-end tests exercising the full scan -> parse -> generate -> write
//! -> read pipeline against the scenarios described for the Alda toolkit.

use alda::{compile, compile_to_smf, read_smf, write_smf, GeneratorOptions, TimedEvent};
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Enables `env_logger` once per test binary so a failing scenario's
/// `debug!`/`warn!` trail from the generator is visible with `--nocapture`.
fn enable_logging() {
    LOGGER.call_once(|| {
        env_logger::Builder::new()
            .filter(None, log::LevelFilter::Warn)
            .init();
    });
}

fn note_ons(events: &[TimedEvent]) -> Vec<(f64, u8)> {
    events
        .iter()
        .filter_map(|e| match e {
            TimedEvent::NoteOn { time, pitch, .. } => Some((*time, *pitch)),
            _ => None,
        })
        .collect()
}

/// Tick rounding in the SMF writer/reader means a round trip only preserves
/// times to sub-millisecond precision, not bit-for-bit.
fn assert_note_ons_close(left: &[(f64, u8)], right: &[(f64, u8)]) {
    assert_eq!(left.len(), right.len(), "note-on counts differ: {left:?} vs {right:?}");
    for ((lt, lp), (rt, rp)) in left.iter().zip(right.iter()) {
        assert_eq!(lp, rp, "pitch mismatch: {left:?} vs {right:?}");
        assert!((lt - rt).abs() < 1e-3, "time mismatch: {lt} vs {rt}");
    }
}

#[test]
fn test_scenario_simple_scale_at_120bpm() {
    enable_logging();
    let sequence = compile("piano: c d e", GeneratorOptions::default()).unwrap();
    assert_eq!(note_ons(&sequence.events), vec![(0.0, 60), (0.5, 62), (1.0, 64)]);
}

#[test]
fn test_scenario_tied_whole_note() {
    enable_logging();
    let sequence = compile("piano: c1~1", GeneratorOptions::default()).unwrap();
    let offs: Vec<f64> = sequence
        .events
        .iter()
        .filter_map(|e| match e {
            TimedEvent::NoteOff { time, .. } => Some(*time),
            _ => None,
        })
        .collect();
    assert_eq!(offs.len(), 1);
    assert!((offs[0] - 3.6).abs() < 1e-9);
}

#[test]
fn test_scenario_slur_into_next_note_without_explicit_duration() {
    enable_logging();
    let sequence = compile("piano: c~ d", GeneratorOptions::default()).unwrap();
    let gated_off = sequence
        .events
        .iter()
        .find_map(|e| match e {
            TimedEvent::NoteOff { time, pitch: 60, .. } => Some(*time),
            _ => None,
        })
        .unwrap();
    // A slurred note's gate is the full duration (100%), not the part's
    // default 90% quant — so the NoteOff lands exactly on the next note's
    // start time rather than short of it.
    assert!((gated_off - 0.5).abs() < 1e-9);
}

#[test]
fn test_scenario_chord_shares_start_time() {
    enable_logging();
    let sequence = compile("piano: c/e/g", GeneratorOptions::default()).unwrap();
    assert_eq!(note_ons(&sequence.events), vec![(0.0, 60), (0.0, 64), (0.0, 67)]);
}

#[test]
fn test_scenario_tempo_attribute_does_not_shift_the_note_it_precedes() {
    enable_logging();
    let sequence = compile("piano: (tempo 60) c4", GeneratorOptions::default()).unwrap();
    assert_eq!(note_ons(&sequence.events), vec![(0.0, 60)]);
}

#[test]
fn test_scenario_cram_triplet_scales_into_the_outer_duration() {
    enable_logging();
    let sequence = compile("piano: {c d e}4", GeneratorOptions::default()).unwrap();
    let ons = note_ons(&sequence.events);
    assert_eq!(ons.len(), 3);
    let step = 0.5 / 3.0;
    assert!((ons[1].0 - step).abs() < 1e-9);
    assert!((ons[2].0 - 2.0 * step).abs() < 1e-9);
}

#[test]
fn test_scenario_variable_reuse_expands_every_reference() {
    enable_logging();
    let sequence = compile("theme = c d e\npiano: theme theme", GeneratorOptions::default()).unwrap();
    assert_eq!(note_ons(&sequence.events).len(), 6);
}

#[test]
fn test_scenario_marker_shared_across_parts() {
    enable_logging();
    let sequence = compile(
        "piano: c %here d\nviolin: @here e",
        GeneratorOptions::default(),
    )
    .unwrap();
    let ons = note_ons(&sequence.events);
    assert!(ons.contains(&(0.5, 62))); // piano's second note, d
    assert!(ons.contains(&(0.5, 64))); // violin's e, resuming from the marker
}

#[test]
fn test_scenario_bracket_repeat_plays_the_body_n_times() {
    enable_logging();
    let sequence = compile("piano: [c d]*3", GeneratorOptions::default()).unwrap();
    assert_eq!(note_ons(&sequence.events).len(), 6);
}

#[test]
fn test_scenario_on_repetitions_filters_to_the_named_passes() {
    enable_logging();
    let sequence = compile("piano: [c d e]*3'1-2", GeneratorOptions::default()).unwrap();
    // 2 of 3 repetitions fire, 3 notes each.
    assert_eq!(note_ons(&sequence.events).len(), 6);
}

#[test]
fn test_invariant_every_note_on_has_a_later_matching_note_off() {
    enable_logging();
    let sequence = compile(
        "piano: c d e f g a b > c\nviolin: e4 f4 g4 a4",
        GeneratorOptions::default(),
    )
    .unwrap();
    for event in &sequence.events {
        if let TimedEvent::NoteOn { time, channel, pitch, .. } = event {
            let has_matching_off = sequence.events.iter().any(|other| {
                matches!(other, TimedEvent::NoteOff { time: off_time, channel: off_channel, pitch: off_pitch }
                    if off_channel == channel && off_pitch == pitch && off_time > time)
            });
            assert!(has_matching_off, "no NoteOff found for NoteOn at {time} on channel {channel} pitch {pitch}");
        }
    }
}

#[test]
fn test_invariant_dotted_duration_formula() {
    enable_logging();
    // dur(denom, dots) = dur(denom, 0) * (2 - 2^-dots); the gap between two
    // consecutive notes reveals the raw generated duration.
    let plain = compile("piano: c4 d", GeneratorOptions::default()).unwrap();
    let dotted = compile("piano: c4. d", GeneratorOptions::default()).unwrap();
    let plain_gap = note_ons(&plain.events)[1].0;
    let dotted_gap = note_ons(&dotted.events)[1].0;
    assert!((dotted_gap - plain_gap * 1.5).abs() < 1e-9);
}

#[test]
fn test_invariant_round_trip_through_smf_preserves_note_ons() {
    enable_logging();
    let sequence = compile("piano: c d e", GeneratorOptions::default()).unwrap();
    let bytes = write_smf(&sequence, 480).unwrap();
    let (read_back, _tempo_map) = read_smf(&bytes).unwrap();
    assert_note_ons_close(&note_ons(&sequence.events), &note_ons(&read_back.events));
}

#[test]
fn test_invariant_tempo_change_survives_smf_round_trip_on_every_channel() {
    enable_logging();
    // A per-part tempo change mid-piece must be reflected identically once
    // every channel's track is re-read, so each part's notes land back at
    // the same absolute times they were generated with.
    let sequence = compile(
        "piano: (tempo 90) c1~1~1~1 d\nviolin: e1~1~1~1 f",
        GeneratorOptions::default(),
    )
    .unwrap();
    let bytes = write_smf(&sequence, 480).unwrap();
    let (read_back, tempo_map) = read_smf(&bytes).unwrap();
    assert_note_ons_close(&note_ons(&sequence.events), &note_ons(&read_back.events));
    assert!(tempo_map.points.len() >= 2);
}

#[test]
fn test_compile_to_smf_produces_a_valid_header() {
    enable_logging();
    let bytes = compile_to_smf("piano: c d e", GeneratorOptions::default()).unwrap();
    assert_eq!(&bytes[0..4], b"MThd");
}

#[test]
fn test_undefined_variable_is_a_generation_error() {
    enable_logging();
    let result = compile("piano: unknown_theme", GeneratorOptions::default());
    assert!(result.is_err());
}

#[test]
fn test_scan_error_on_unterminated_string() {
    enable_logging();
    let result = alda::scan("\"oops", None);
    assert!(result.is_err());
}

#[test]
fn test_syntax_error_on_unclosed_bracket() {
    enable_logging();
    let result = alda::parse("piano: [c d", None);
    assert!(result.is_err());
}
