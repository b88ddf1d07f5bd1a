//! Lowers an AST into a timed MIDI event sequence.
//!
//! One [`Generator`] traverses the whole [`Root`] in a single pass,
//! maintaining one [`PartState`] per declared part plus shared tables for
//! variables (lazily expanded at each reference) and markers (time
//! bookmarks visible across parts). This mirrors the teacher's
//! `generate_playback_data` pass: mutable per-part cursors, a pending-tie
//! style carry-through for tied durations, and the same "expand structural
//! groups into a flat pass" shape it uses for repeat/ending expansion.

use crate::ast::{Duration, DurationComponent, LispForm, Node, NodeKind, Root};
use crate::error::{AldaError, Result};
use crate::event::{EventSequence, TimedEvent};
use crate::instrument;
use log::{debug, warn};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub bpm: f64,
    pub ticks_per_quarter: u32,
    pub default_length: (u32, u32),
    pub default_octave: u32,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            ticks_per_quarter: 480,
            default_length: (4, 0),
            default_octave: 4,
        }
    }
}

#[derive(Debug, Clone)]
struct PartState {
    channel: u8,
    percussion: bool,
    octave: i32,
    quant: u8,
    velocity: u8,
    pan: u8,
    program: u8,
    time: f64,
    default_length: (u32, u32),
    key_signature: HashMap<char, i32>,
    transpose: i32,
    bpm: f64,
}

pub struct Generator {
    options: GeneratorOptions,
    parts: HashMap<String, PartState>,
    part_order: Vec<String>,
    current_part: Option<String>,
    next_channel: u8,
    markers: HashMap<String, f64>,
    variables: HashMap<String, Vec<Node>>,
    sequence: EventSequence,
}

impl Generator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options,
            parts: HashMap::new(),
            part_order: Vec::new(),
            current_part: None,
            next_channel: 0,
            markers: HashMap::new(),
            variables: HashMap::new(),
            sequence: EventSequence::new(),
        }
    }

    pub fn generate(mut self, root: &Root) -> Result<EventSequence> {
        let mut i = 0;
        while i < root.children.len() {
            let node = &root.children[i];
            match &node.kind {
                NodeKind::PartDecl { instruments, alias } => {
                    self.declare_part(instruments, alias.as_deref(), &node.position)?;
                }
                NodeKind::EventSeq(events) => {
                    if self.current_part.is_none() {
                        self.declare_default_part();
                    }
                    self.generate_events(events, 1.0)?;
                }
                other => {
                    return Err(AldaError::generation(
                        node.position.line,
                        node.position.column,
                        format!("unexpected top-level node {other:?}"),
                    ))
                }
            }
            i += 1;
        }
        Ok(self.sequence)
    }

    fn assign_channel(&mut self, percussion: bool) -> u8 {
        if percussion {
            return 9;
        }
        loop {
            let c = self.next_channel;
            self.next_channel = (self.next_channel + 1) % 16;
            if c != 9 {
                return c;
            }
        }
    }

    fn declare_default_part(&mut self) {
        let key = "default".to_string();
        let channel = self.assign_channel(false);
        let state = PartState {
            channel,
            percussion: false,
            octave: self.options.default_octave as i32,
            quant: 90,
            velocity: 100,
            pan: 64,
            program: 0,
            time: 0.0,
            default_length: self.options.default_length,
            key_signature: HashMap::new(),
            transpose: 0,
            bpm: self.options.bpm,
        };
        self.parts.insert(key.clone(), state);
        self.part_order.push(key.clone());
        self.current_part = Some(key);
    }

    fn declare_part(
        &mut self,
        instruments: &[String],
        alias: Option<&str>,
        pos: &crate::token::Position,
    ) -> Result<()> {
        let key = alias
            .map(|a| a.to_string())
            .unwrap_or_else(|| instruments.join("/"));
        if self.parts.contains_key(&key) {
            self.current_part = Some(key);
            return Ok(());
        }
        let first = instruments
            .first()
            .ok_or_else(|| AldaError::generation(pos.line, pos.column, "part declaration has no instrument"))?;
        let gm = instrument::lookup(first).ok_or_else(|| {
            AldaError::generation(pos.line, pos.column, format!("unknown instrument '{first}'"))
        })?;
        let channel = self.assign_channel(gm.percussion);
        self.sequence.push(TimedEvent::ProgramChange {
            time: 0.0,
            channel,
            program: gm.program,
        });
        let state = PartState {
            channel,
            percussion: gm.percussion,
            octave: self.options.default_octave as i32,
            quant: 90,
            velocity: 100,
            pan: 64,
            program: gm.program,
            time: 0.0,
            default_length: self.options.default_length,
            key_signature: HashMap::new(),
            transpose: 0,
            bpm: self.options.bpm,
        };
        self.parts.insert(key.clone(), state);
        self.part_order.push(key.clone());
        self.current_part = Some(key);
        Ok(())
    }

    fn part_mut(&mut self) -> &mut PartState {
        let key = self.current_part.clone().expect("a part must be selected before generation");
        self.parts.get_mut(&key).expect("current part must exist")
    }

    fn generate_events(&mut self, events: &[Node], scale: f64) -> Result<()> {
        for event in events {
            self.generate_node(event, scale, None)?;
        }
        Ok(())
    }

    /// `repetition`, when set, is the 1-based index of the repetition this
    /// node is being generated under — used to resolve nested `OnReps`
    /// filters.
    fn generate_node(&mut self, node: &Node, scale: f64, repetition: Option<u32>) -> Result<()> {
        let pos = &node.position;
        match &node.kind {
            NodeKind::Note { letter, accidentals, duration, slurred } => {
                self.generate_note(*letter, accidentals, duration.as_ref(), *slurred, scale, pos)?;
            }
            NodeKind::Rest { duration } => {
                let seconds = self.resolve_duration_seconds(duration.as_ref(), scale, true)?;
                self.part_mut().time += seconds;
            }
            NodeKind::Chord(members) => {
                self.generate_chord(members, scale, pos)?;
            }
            NodeKind::Barline => {
                debug!("barline at {pos}");
            }
            NodeKind::OctaveSet(n) => {
                self.part_mut().octave = *n as i32;
            }
            NodeKind::OctaveUp => {
                self.part_mut().octave += 1;
            }
            NodeKind::OctaveDown => {
                self.part_mut().octave -= 1;
            }
            NodeKind::Lisp(form) => {
                self.apply_attribute(form, pos)?;
            }
            NodeKind::VarDef { name, events } => {
                self.variables.insert(name.clone(), events.clone());
            }
            NodeKind::VarRef { name } => {
                let events = self
                    .variables
                    .get(name)
                    .ok_or_else(|| {
                        AldaError::generation(pos.line, pos.column, format!("undefined variable '{name}'"))
                    })?
                    .clone();
                self.generate_events(&events, scale)?;
            }
            NodeKind::Marker { name } => {
                let time = self.part_mut().time;
                self.markers.insert(name.clone(), time);
            }
            NodeKind::AtMarker { name } => {
                let time = *self.markers.get(name).ok_or_else(|| {
                    AldaError::generation(pos.line, pos.column, format!("undefined marker '{name}'"))
                })?;
                self.part_mut().time = time;
            }
            NodeKind::VoiceGroup(voices) => {
                self.generate_voice_group(voices, scale)?;
            }
            NodeKind::Cram { events, duration } => {
                self.generate_cram(events, duration.as_ref(), scale, pos)?;
            }
            NodeKind::BracketSeq { events } => {
                self.generate_events(events, scale)?;
            }
            NodeKind::Repeat { inner, count } => {
                for rep in 1..=*count {
                    self.generate_node(inner, scale, Some(rep))?;
                }
            }
            NodeKind::OnReps { inner, on_reps } => {
                if let NodeKind::Repeat { inner: repeat_inner, count } = &inner.kind {
                    for rep in 1..=*count {
                        if on_reps.contains(rep) {
                            self.generate_node(repeat_inner, scale, Some(rep))?;
                        }
                    }
                } else if let Some(rep) = repetition {
                    if on_reps.contains(rep) {
                        self.generate_node(inner, scale, repetition)?;
                    }
                } else {
                    warn!("on-repetitions specifier at {pos} has no enclosing repeat; generating once");
                    self.generate_node(inner, scale, None)?;
                }
            }
            NodeKind::EventSeq(events) => {
                self.generate_events(events, scale)?;
            }
            NodeKind::PartDecl { .. } => {
                return Err(AldaError::generation(
                    pos.line,
                    pos.column,
                    "a part declaration cannot appear inside an event sequence",
                ))
            }
        }
        Ok(())
    }

    fn generate_note(
        &mut self,
        letter: char,
        accidentals: &str,
        duration: Option<&Duration>,
        slurred: bool,
        scale: f64,
        pos: &crate::token::Position,
    ) -> Result<()> {
        let seconds = self.resolve_duration_seconds(duration, scale, true)?;
        let (channel, velocity, quant, time) = {
            let part = self.part_mut();
            (part.channel, part.velocity, part.quant, part.time)
        };
        let pitch = self.midi_pitch(letter, accidentals, pos)?;
        let gate = if slurred {
            1.0
        } else {
            f64::from(quant) / 100.0
        };
        self.sequence.push(TimedEvent::NoteOn {
            time,
            channel,
            pitch,
            velocity,
        });
        self.sequence.push(TimedEvent::NoteOff {
            time: time + seconds * gate,
            channel,
            pitch,
        });
        self.part_mut().time += seconds;
        Ok(())
    }

    /// Chord members share the chord's start time. The cursor advances only
    /// once, by the *first* member's duration (explicit or the part's
    /// default) — later members may specify their own duration only to
    /// control their own note-off gate, per §4.3.
    fn generate_chord(&mut self, members: &[Node], scale: f64, pos: &crate::token::Position) -> Result<()> {
        let start = self.part_mut().time;
        let first_duration = match members.first().map(|m| &m.kind) {
            Some(NodeKind::Note { duration, .. }) | Some(NodeKind::Rest { duration }) => duration.clone(),
            _ => {
                return Err(AldaError::generation(pos.line, pos.column, "a chord must have at least one member"))
            }
        };
        let first_seconds = self.resolve_duration_seconds(first_duration.as_ref(), scale, true)?;
        for member in members {
            self.part_mut().time = start;
            match &member.kind {
                NodeKind::Note { letter, accidentals, duration, slurred } => {
                    let effective = duration.clone().or_else(|| first_duration.clone());
                    self.generate_note(*letter, accidentals, effective.as_ref(), *slurred, scale, &member.position)?;
                }
                NodeKind::Rest { .. } => {
                    // A rest inside a chord contributes no sound; its
                    // duration only matters when it is the first member,
                    // already folded into `first_seconds` above.
                }
                other => {
                    return Err(AldaError::generation(
                        pos.line,
                        pos.column,
                        format!("unexpected chord member {other:?}"),
                    ))
                }
            }
        }
        self.part_mut().time = start + first_seconds;
        Ok(())
    }

    /// Voices normally interleave on the part's single channel; each voice's
    /// notes never collide in pitch, so note ons/offs can share it safely.
    /// If every other channel is already claimed by a declared part, though,
    /// sharing would collide with *those* parts' channels once this one's
    /// voices fan out, so each voice borrows its own channel for the
    /// duration of the group and the part's channel is restored after.
    fn generate_voice_group(&mut self, voices: &[crate::ast::Voice], scale: f64) -> Result<()> {
        let start = self.part_mut().time;
        let mut rejoin = start;
        let original_channel = self.part_mut().channel;
        let saturated = self.channel_space_saturated();
        for voice in voices {
            self.part_mut().time = start;
            if saturated {
                let percussion = self.part_mut().percussion;
                let sub_channel = self.assign_channel(percussion);
                self.part_mut().channel = sub_channel;
            }
            self.generate_events(&voice.events, scale)?;
            rejoin = rejoin.max(self.part_mut().time);
        }
        self.part_mut().channel = original_channel;
        self.part_mut().time = rejoin;
        Ok(())
    }

    /// True once every non-percussion channel (0-8, 10-15, 15 total) has
    /// already been claimed by a declared part, so voices can no longer get
    /// a distinct channel from round-robin `assign_channel` without reusing
    /// one a sibling part owns.
    fn channel_space_saturated(&self) -> bool {
        let claimed: std::collections::HashSet<u8> = self.parts.values().map(|p| p.channel).collect();
        claimed.iter().filter(|&&c| c != 9).count() >= 15
    }

    fn generate_cram(
        &mut self,
        events: &[Node],
        duration: Option<&Duration>,
        scale: f64,
        pos: &crate::token::Position,
    ) -> Result<()> {
        let outer_seconds = self.resolve_duration_seconds(duration, 1.0, false)?;
        let nominal_default = self.part_mut().default_length;
        let nominal_total = self.nominal_total_seconds(events, nominal_default)?;
        if nominal_total <= 0.0 {
            warn!("cram at {pos} has zero nominal duration; skipping time-scaling");
            return self.generate_events(events, scale);
        }
        let inner_scale = scale * (outer_seconds / nominal_total);
        self.generate_events(events, inner_scale)
    }

    /// Computes the unscaled ("nominal") total duration a cram's body would
    /// take outside the cram, used as the divisor in the cram scaling
    /// formula. Threads default-length propagation the same way normal
    /// generation does, but never mutates real part state or emits events.
    fn nominal_total_seconds(&self, events: &[Node], mut default_length: (u32, u32)) -> Result<f64> {
        let mut total = 0.0;
        for event in events {
            match &event.kind {
                NodeKind::Note { duration, .. } | NodeKind::Rest { duration } => {
                    let (seconds, updated) =
                        self.nominal_duration(duration.as_ref(), default_length)?;
                    total += seconds;
                    default_length = updated;
                }
                NodeKind::Chord(members) => {
                    let mut chord_max = 0.0;
                    for member in members {
                        let dur = match &member.kind {
                            NodeKind::Note { duration, .. } => duration.as_ref(),
                            NodeKind::Rest { duration } => duration.as_ref(),
                            _ => None,
                        };
                        let (seconds, updated) = self.nominal_duration(dur, default_length)?;
                        chord_max = f64::max(chord_max, seconds);
                        default_length = updated;
                    }
                    total += chord_max;
                }
                NodeKind::Cram { duration, .. } => {
                    let (seconds, _) = self.nominal_duration(duration.as_ref(), default_length)?;
                    total += seconds;
                }
                _ => {}
            }
        }
        Ok(total)
    }

    fn nominal_duration(
        &self,
        duration: Option<&Duration>,
        default_length: (u32, u32),
    ) -> Result<(f64, (u32, u32))> {
        match duration {
            Some(d) => {
                let seconds = self.duration_seconds(d, self.part_bpm())?;
                let new_default = match d.components.last() {
                    Some(DurationComponent::NoteLength { denominator, dots }) => (*denominator, *dots),
                    _ => default_length,
                };
                Ok((seconds, new_default))
            }
            None => {
                let whole = whole_note_seconds(self.part_bpm());
                let (denom, dots) = default_length;
                Ok((note_length_seconds(whole, denom, dots), default_length))
            }
        }
    }

    fn part_bpm(&self) -> f64 {
        self.current_part
            .as_ref()
            .and_then(|k| self.parts.get(k))
            .map(|p| p.bpm)
            .unwrap_or(self.options.bpm)
    }

    fn resolve_duration_seconds(
        &mut self,
        duration: Option<&Duration>,
        scale: f64,
        update_default: bool,
    ) -> Result<f64> {
        let bpm = self.part_mut().bpm;
        let seconds = match duration {
            Some(d) => {
                let seconds = self.duration_seconds(d, bpm)?;
                if update_default {
                    if let Some(DurationComponent::NoteLength { denominator, dots }) = d.components.last() {
                        self.part_mut().default_length = (*denominator, *dots);
                    }
                }
                seconds
            }
            None => {
                let whole = whole_note_seconds(bpm);
                let (denom, dots) = self.part_mut().default_length;
                note_length_seconds(whole, denom, dots)
            }
        };
        Ok(seconds * scale)
    }

    fn duration_seconds(&self, duration: &Duration, bpm: f64) -> Result<f64> {
        let whole = whole_note_seconds(bpm);
        let mut total = 0.0;
        for component in &duration.components {
            total += match component {
                DurationComponent::NoteLength { denominator, dots } => {
                    note_length_seconds(whole, *denominator, *dots)
                }
                DurationComponent::Milliseconds(ms) => f64::from(*ms) / 1000.0,
                DurationComponent::Seconds(s) => *s,
            };
        }
        Ok(total)
    }

    fn midi_pitch(&mut self, letter: char, accidentals: &str, pos: &crate::token::Position) -> Result<u8> {
        let base = match letter {
            'c' => 0,
            'd' => 2,
            'e' => 4,
            'f' => 5,
            'g' => 7,
            'a' => 9,
            'b' => 11,
            other => {
                return Err(AldaError::generation(
                    pos.line,
                    pos.column,
                    format!("'{other}' is not a note letter"),
                ))
            }
        };
        let part = self.part_mut();
        let accidental_offset = if accidentals.is_empty() {
            *part.key_signature.get(&letter).unwrap_or(&0)
        } else if accidentals.contains('_') {
            0
        } else {
            accidentals.chars().map(|c| if c == '+' { 1 } else { -1 }).sum()
        };
        let octave = part.octave;
        if !(0..=10).contains(&octave) {
            return Err(AldaError::generation(
                pos.line,
                pos.column,
                format!("octave {octave} is out of range 0-10"),
            ));
        }
        let midi = (octave + 1) * 12 + base + accidental_offset + part.transpose;
        Ok(midi.clamp(0, 127) as u8)
    }

    fn apply_attribute(&mut self, form: &LispForm, pos: &crate::token::Position) -> Result<()> {
        let LispForm::List(items) = form else {
            return Err(AldaError::generation(pos.line, pos.column, "expected an attribute call"));
        };
        let Some(LispForm::Symbol(name)) = items.first() else {
            return Err(AldaError::generation(
                pos.line,
                pos.column,
                "attribute call must start with a symbol",
            ));
        };
        let arg = items.get(1);
        let as_number = |arg: Option<&LispForm>| -> Result<f64> {
            match arg {
                Some(LispForm::Number(n)) => Ok(*n),
                _ => Err(AldaError::generation(pos.line, pos.column, format!("'{name}' expects a numeric argument"))),
            }
        };
        match name.as_str() {
            "tempo" => {
                let bpm = as_number(arg)?;
                let time = self.part_mut().time;
                self.part_mut().bpm = bpm;
                self.sequence.push(TimedEvent::TempoChange {
                    time,
                    microseconds_per_quarter: bpm_to_microseconds(bpm),
                });
            }
            "tempo!" => {
                let bpm = as_number(arg)?;
                let time = self.part_mut().time;
                for key in self.part_order.clone() {
                    if let Some(p) = self.parts.get_mut(&key) {
                        p.bpm = bpm;
                    }
                }
                self.sequence.push(TimedEvent::TempoChange {
                    time,
                    microseconds_per_quarter: bpm_to_microseconds(bpm),
                });
            }
            "vol" | "volume" => {
                let v = as_number(arg)?;
                self.part_mut().velocity = v.clamp(0.0, 127.0) as u8;
            }
            "pp" | "p" | "mp" | "mf" | "f" | "ff" => {
                let velocity = match name.as_str() {
                    "pp" => 25,
                    "p" => 40,
                    "mp" => 55,
                    "mf" => 70,
                    "f" => 85,
                    _ => 100,
                };
                self.part_mut().velocity = velocity;
            }
            "key-signature" | "key-sig" => {
                let spec = match arg {
                    Some(LispForm::Str(s)) => s.as_str(),
                    _ => {
                        return Err(AldaError::generation(
                            pos.line,
                            pos.column,
                            format!("'{name}' expects a string argument"),
                        ))
                    }
                };
                let mut key_signature = HashMap::new();
                for token in spec.split_whitespace() {
                    let mut chars = token.chars();
                    let letter = chars.next().ok_or_else(|| {
                        AldaError::generation(pos.line, pos.column, format!("'{name}' has an empty note token"))
                    })?;
                    let offset: i32 = chars
                        .map(|c| if c == '+' { 1 } else { -1 })
                        .sum();
                    key_signature.insert(letter, offset);
                }
                self.part_mut().key_signature = key_signature;
            }
            "quant" | "quantize" => {
                let q = as_number(arg)?;
                self.part_mut().quant = q.clamp(0.0, 100.0) as u8;
            }
            "pan" | "panning" => {
                let p = as_number(arg)?;
                let pan = (((p.clamp(-100.0, 100.0) + 100.0) / 200.0) * 127.0) as u8;
                self.part_mut().pan = pan;
                let (time, channel) = {
                    let part = self.part_mut();
                    (part.time, part.channel)
                };
                self.sequence.push(TimedEvent::ControlChange {
                    time,
                    channel,
                    controller: 10,
                    value: pan,
                });
            }
            "transpose" => {
                let t = as_number(arg)?;
                self.part_mut().transpose = t as i32;
            }
            "octave" => {
                let o = as_number(arg)?;
                self.part_mut().octave = o as i32;
            }
            other => {
                warn!("unknown attribute '{other}' at {pos}; ignoring");
            }
        }
        Ok(())
    }
}

fn whole_note_seconds(bpm: f64) -> f64 {
    4.0 * 60.0 / bpm
}

fn note_length_seconds(whole_seconds: f64, denominator: u32, dots: u32) -> f64 {
    let base = whole_seconds / f64::from(denominator);
    base * (2.0 - 2f64.powi(-(dots as i32)))
}

fn bpm_to_microseconds(bpm: f64) -> u32 {
    (60_000_000.0 / bpm).round() as u32
}

/// Parses and lowers `source` directly to a timed event sequence.
pub fn generate(root: &Root, options: GeneratorOptions) -> Result<EventSequence> {
    Generator::new(options).generate(root)
}
