//! The compiled bytecode program format (spec §4.A) and the pieces that
//! produce and consume it: the compiler (§4.B) and the decoder (§4.C).

pub mod compiler;
pub mod decoder;
pub mod header;
pub mod instruction;
pub mod operation;

pub use compiler::compile_program;
pub use decoder::Decoder;
pub use header::{ProgramHeader, ProgramType, SizeVariant};
pub use operation::Operation;
