//! Per-port static metadata (spec §4.G / §3 "Port instance").
//!
//! Holds a port's compiled programs and derived layout, computed once by
//! [`Port::derive_properties`] and then read many times by the VM façade
//! and the transport.

use crate::error::Result;
use crate::node::{ComputationListId, ElementId};
use crate::program::header::decode_header;

/// Whether a port is an input (consumes bus data) or an output (produces
/// it) of its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Require,
    Provide,
}

/// A single port's compiled programs and the layout/queue metadata derived
/// from them (spec §3 "Port instance", §4.G).
#[derive(Debug, Clone)]
pub struct Port {
    direction: PortDirection,
    port_id: u32,
    name: String,
    pack_program: Vec<u8>,
    /// Only present for require ports (spec §4.I step 3: "for require
    /// ports also compile unpack").
    unpack_program: Option<Vec<u8>>,
    element_id: ElementId,
    offset: u32,
    size: u32,
    queue_length: u32,
    element_size: u32,
    has_dynamic_data: bool,
    computation_list_id: Option<ComputationListId>,
    signature: Option<String>,
}

impl Port {
    pub(crate) fn new(
        direction: PortDirection,
        port_id: u32,
        name: String,
        pack_program: Vec<u8>,
        unpack_program: Option<Vec<u8>>,
        element_id: ElementId,
    ) -> Port {
        Port {
            direction,
            port_id,
            name,
            pack_program,
            unpack_program,
            element_id,
            offset: 0,
            size: 0,
            queue_length: 0,
            element_size: 0,
            has_dynamic_data: false,
            computation_list_id: None,
            signature: None,
        }
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    pub fn port_id(&self) -> u32 {
        self.port_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pack_program(&self) -> &[u8] {
        &self.pack_program
    }

    /// The unpack program. `None` for provide ports, which never unpack
    /// their own data.
    pub fn unpack_program(&self) -> Option<&[u8]> {
        self.unpack_program.as_deref()
    }

    pub fn element_id(&self) -> ElementId {
        self.element_id
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn queue_length(&self) -> u32 {
        self.queue_length
    }

    pub fn is_queued(&self) -> bool {
        self.queue_length > 0
    }

    pub fn element_size(&self) -> u32 {
        self.element_size
    }

    pub fn has_dynamic_data(&self) -> bool {
        self.has_dynamic_data
    }

    pub fn computation_list_id(&self) -> Option<ComputationListId> {
        self.computation_list_id
    }

    pub(crate) fn set_computation_list_id(&mut self, id: ComputationListId) {
        self.computation_list_id = Some(id);
    }

    /// The stable `"<name><data_signature>"` string built in server mode
    /// (spec §4.G), used elsewhere to match compatible ports across nodes.
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub(crate) fn set_signature(&mut self, signature: String) {
        self.signature = Some(signature);
    }

    /// The program whose header describes this port's own wire layout:
    /// the unpack program for a require port (what it reads off the bus),
    /// the pack program for a provide port (what it writes).
    fn layout_program(&self) -> &[u8] {
        match self.direction {
            PortDirection::Require => self.unpack_program.as_deref().unwrap_or(&self.pack_program),
            PortDirection::Provide => &self.pack_program,
        }
    }

    /// Parses this port's own program header and fills in `data_size`,
    /// `queue_length`, `element_size` and `has_dynamic_data` (spec §4.G).
    /// Assigns `offset` within the node's provide/require data region and
    /// returns the size of this port's slot, for the node manager to
    /// accumulate the next port's offset.
    pub(crate) fn derive_properties(&mut self, offset: u32) -> Result<u32> {
        let (header, _) = decode_header(self.layout_program())?;
        self.offset = offset;
        self.size = header.data_size;
        self.queue_length = header.queue_length;
        self.element_size = header.element_size;
        self.has_dynamic_data = header.has_dynamic_data;
        log::trace!(
            "derived port '{}' properties: offset={offset} size={} queue_length={}",
            self.name,
            self.size,
            self.queue_length
        );
        Ok(self.size)
    }
}
