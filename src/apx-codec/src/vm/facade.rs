//! The public entry point for packing/unpacking a single port's value
//! against a compiled program (spec §4.F).
//!
//! Bundles a serializer, a deserializer, a decoder and the parsed program
//! header behind `select_program`/`set_write_buffer`/`set_read_buffer`/
//! `pack_value`/`unpack_value`/`bytes_written`/`bytes_read`. The
//! serializer and deserializer are stateless free functions (each call
//! builds its own `Decoder`), so `Vm` only needs to remember the selected
//! program, its parsed header, and the byte counts from the last call.

use crate::error::Result;
use crate::program::decoder::Decoder;
use crate::program::header::ProgramHeader;
use crate::value::Value;
use crate::vm::deserializer::unpack_value as run_unpack;
use crate::vm::serializer::pack_value as run_pack;

/// A selected program, ready to pack or unpack values against caller
/// buffers.
pub struct Vm<'p> {
    program: &'p [u8],
    header: ProgramHeader,
    bytes_written: usize,
    bytes_read: usize,
}

impl<'p> Vm<'p> {
    /// Parses `program`'s header and selects it for subsequent
    /// pack/unpack calls.
    pub fn select_program(program: &'p [u8]) -> Result<Vm<'p>> {
        let header = Decoder::new(program).parse_program_header()?;
        log::debug!("vm selected program: {header:?}");
        Ok(Vm {
            program,
            header,
            bytes_written: 0,
            bytes_read: 0,
        })
    }

    pub fn header(&self) -> &ProgramHeader {
        &self.header
    }

    /// Packs `value` into `out`. `out` should be sized at least
    /// `header().data_size` bytes (plus room for any self-describing
    /// length prefixes on dynamic arrays/queues).
    pub fn pack_value(&mut self, value: &Value, out: &mut [u8]) -> Result<()> {
        self.bytes_written = run_pack(self.program, value, out)?;
        Ok(())
    }

    /// Unpacks a value from `input`.
    pub fn unpack_value(&mut self, input: &[u8]) -> Result<Value> {
        let (value, read) = run_unpack(self.program, input)?;
        self.bytes_read = read;
        Ok(value)
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }
}
