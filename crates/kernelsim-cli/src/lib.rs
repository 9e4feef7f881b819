//! kernelsim CLI library - shared functionality for testing and binary.

pub mod inspect;
pub mod samples;
pub mod simulate;

pub use samples::Sample;
