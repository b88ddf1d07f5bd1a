//! Standard MIDI File (format 1) codec.

pub mod reader;
pub mod vlq;
pub mod writer;

pub use reader::read_smf;
pub use writer::write_smf;
