//! A scanner, recursive-descent parser, MIDI generator, and Standard MIDI
//! File codec for the Alda music notation language.
//!
//! The pipeline mirrors a small compiler:
//!
//! ```text
//! source text --scan--> tokens --parse--> AST --generate--> timed events --write_smf--> bytes
//! ```
//!
//! and the inverse direction, `read_smf`, parses SMF bytes back into a
//! timed event sequence.

pub mod ast;
pub mod error;
pub mod event;
pub mod generator;
pub mod instrument;
pub mod parser;
pub mod scanner;
pub mod smf;
pub mod token;

pub use ast::Root;
pub use error::{AldaError, Result};
pub use event::{EventSequence, TempoMap, TimedEvent};
pub use generator::{generate, Generator, GeneratorOptions};
pub use parser::parse;
pub use scanner::scan;
pub use smf::{read_smf, write_smf};
pub use token::{Position, Token, TokenKind};

/// Scans and parses `source`, then lowers it to a timed event sequence
/// using `options` (or the defaults: 120 BPM, 480 ticks per quarter note,
/// default note length a quarter, default octave 4).
///
/// ```
/// use alda::{compile, GeneratorOptions};
/// let sequence = compile("piano: c d e", GeneratorOptions::default()).unwrap();
/// assert_eq!(sequence.events.iter().filter(|e| matches!(e, alda::TimedEvent::NoteOn { .. })).count(), 3);
/// ```
pub fn compile(source: &str, options: GeneratorOptions) -> Result<EventSequence> {
    let root = parser::parse(source, None)?;
    generator::generate(&root, options)
}

/// Compiles `source` and serializes the result directly to SMF bytes.
///
/// ```
/// use alda::{compile_to_smf, GeneratorOptions};
/// let bytes = compile_to_smf("piano: c", GeneratorOptions::default()).unwrap();
/// assert_eq!(&bytes[0..4], b"MThd");
/// ```
pub fn compile_to_smf(source: &str, options: GeneratorOptions) -> Result<Vec<u8>> {
    let ticks_per_quarter = options.ticks_per_quarter;
    let sequence = compile(source, options)?;
    smf::write_smf(&sequence, ticks_per_quarter as u16)
}
