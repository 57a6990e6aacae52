//! A single node's ports, data buffers and dedup pools (spec §3 "Node
//! instance").
//!
//! `Node` is built once, in full, by [`crate::manager::NodeManager`] and is
//! immutable afterwards (spec §5 "Port instances and their programs are
//! immutable after `build_node` returns"); the two data buffers are the
//! sole exception, mutated only by port-write paths outside this crate's
//! scope.

use std::sync::Mutex;

use crate::computation::ComputationList;
use crate::element::DataElement;
use crate::port::{Port, PortDirection};

/// Index into a node's deduplicated effective-data-element pool.
pub type ElementId = u32;
/// Index into a node's deduplicated computation-list pool.
pub type ComputationListId = u32;

/// A node: a unit of schema plus data, containing a set of ports (spec
/// §3). Owns its port instances, the effective data elements and
/// computation lists its ports share, its definition bytes and its two
/// data regions.
pub struct Node {
    name: String,
    definition: Vec<u8>,
    ports: Vec<Port>,
    elements: Vec<DataElement>,
    computation_lists: Vec<ComputationList>,
    provide_port_data: Mutex<Vec<u8>>,
    require_port_data: Mutex<Vec<u8>>,
}

impl Node {
    pub(crate) fn new(
        name: String,
        definition: Vec<u8>,
        ports: Vec<Port>,
        elements: Vec<DataElement>,
        computation_lists: Vec<ComputationList>,
        provide_port_data: Vec<u8>,
        require_port_data: Vec<u8>,
    ) -> Node {
        Node {
            name,
            definition,
            ports,
            elements,
            computation_lists,
            provide_port_data: Mutex::new(provide_port_data),
            require_port_data: Mutex::new(require_port_data),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &[u8] {
        &self.definition
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, port_id: u32) -> Option<&Port> {
        self.ports.get(port_id as usize)
    }

    pub fn port_by_name(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name() == name)
    }

    pub fn provide_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports
            .iter()
            .filter(|p| p.direction() == PortDirection::Provide)
    }

    pub fn require_ports(&self) -> impl Iterator<Item = &Port> {
        self.ports
            .iter()
            .filter(|p| p.direction() == PortDirection::Require)
    }

    pub fn element(&self, id: ElementId) -> Option<&DataElement> {
        self.elements.get(id as usize)
    }

    pub fn computation_list(&self, id: ComputationListId) -> Option<&ComputationList> {
        self.computation_lists.get(id as usize)
    }

    /// Total size, in bytes, of the node's provide-port data region.
    pub fn provide_port_data_size(&self) -> usize {
        self.provide_port_data.lock().unwrap().len()
    }

    /// Total size, in bytes, of the node's require-port data region.
    pub fn require_port_data_size(&self) -> usize {
        self.require_port_data.lock().unwrap().len()
    }

    pub fn with_provide_port_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.provide_port_data.lock().unwrap())
    }

    pub fn with_require_port_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.require_port_data.lock().unwrap())
    }

    /// Reads `port`'s slot out of the region matching its direction.
    /// Transport read path: "reads from init buffers by `(node, port_id,
    /// offset, size)`" (spec §6).
    pub fn read_port_slot(&self, port: &Port) -> Vec<u8> {
        let region = match port.direction() {
            PortDirection::Provide => self.provide_port_data.lock().unwrap(),
            PortDirection::Require => self.require_port_data.lock().unwrap(),
        };
        let start = port.offset() as usize;
        let end = start + port.size() as usize;
        region[start..end].to_vec()
    }

    /// Overwrites `port`'s slot with `bytes`. Transport write path:
    /// "writes require-port-data bytes into buffers" (spec §6). `bytes`
    /// must be exactly `port.size()` long.
    pub fn write_port_slot(&self, port: &Port, bytes: &[u8]) -> Result<(), crate::error::ApxError> {
        if bytes.len() != port.size() as usize {
            log::warn!(
                "write_port_slot rejected {} bytes for port '{}' (expected {})",
                bytes.len(),
                port.name(),
                port.size()
            );
            return Err(crate::error::ApxError::ValueLength {
                expected: port.size(),
                actual: bytes.len() as u32,
            });
        }
        let mut region = match port.direction() {
            PortDirection::Provide => self.provide_port_data.lock().unwrap(),
            PortDirection::Require => self.require_port_data.lock().unwrap(),
        };
        let start = port.offset() as usize;
        let end = start + bytes.len();
        region[start..end].copy_from_slice(bytes);
        Ok(())
    }

    pub(crate) fn fill_provide_slot(&self, offset: usize, bytes: &[u8]) {
        let mut region = self.provide_port_data.lock().unwrap();
        region[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub(crate) fn fill_require_slot(&self, offset: usize, bytes: &[u8]) {
        let mut region = self.require_port_data.lock().unwrap();
        region[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}
