//! The virtual machine that executes compiled programs against value
//! trees and byte buffers (spec §4.D/§4.E/§4.F).

pub mod buffer;
pub mod deserializer;
pub mod facade;
pub mod frame;
pub mod serializer;

pub use facade::Vm;
