//! APX (AUTOSAR Portable eXchange) schema-driven codec.
//!
//! This crate is the core of a signal-exchange runtime: a bytecode
//! compiler that turns a resolved port signature into pack/unpack
//! programs (`program`), a virtual machine that executes those programs
//! against a value tree and a linear byte buffer (`vm`), and a node
//! manager that parses definitions, instantiates typed port tables and
//! allocates their init data (`manager`, `node`, `port`).
//!
//! The textual APX parser, the attribute parser, socket/TCP/UNIX
//! transport, the remote-file protocol, event dispatch, the client
//! façade and OS-level locking are all out of scope; this crate models
//! them only as the plain data/trait seams `manager` calls through.

pub mod computation;
pub mod element;
pub mod error;
pub mod manager;
pub mod node;
pub mod port;
pub mod program;
pub mod signature;
pub mod type_code;
pub mod value;
pub mod vm;

pub use error::{ApxError, Result};
pub use node::Node;
pub use port::{Port, PortDirection};
pub use value::{Scalar, Value};
pub use vm::Vm;
