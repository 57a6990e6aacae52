//! The node manager (spec §4.I): parses definitions, instantiates typed
//! port tables, pre-computes init data and exposes stable per-port
//! handles.
//!
//! Owns a name→node registry plus the "announce a file, stream its body,
//! then build" lifecycle used when a definition arrives incrementally
//! over a remote-file transport.

use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::computation::ComputationList;
use crate::element::DataElement;
use crate::error::{ApxError, Result};
use crate::node::Node;
use crate::port::{Port, PortDirection};
use crate::program::compiler::compile_program;
use crate::program::header::ProgramType;
use crate::signature::element_signature;
use crate::value::Value;
use crate::vm::facade::Vm;

/// One require- or provide-port as produced by the (out-of-scope) AST
/// parser: a name, a resolved data element, a direction, and the optional
/// declared init value / computation list the textual definition carried.
#[derive(Debug, Clone)]
pub struct AstPort {
    pub name: String,
    pub direction: PortDirection,
    pub element: DataElement,
    pub init_value: Option<Value>,
    pub computations: Option<ComputationList>,
}

/// A node as produced by the (out-of-scope) AST parser: a name and its
/// ordered ports.
#[derive(Debug, Clone)]
pub struct AstNode {
    pub name: String,
    pub ports: Vec<AstPort>,
}

/// The seam `build_node_from_text` calls through (spec §6 "AST parser"
/// collaborator interface). The textual APX grammar itself is out of
/// scope for this crate; a real implementation plugs in a parser here.
pub trait DefinitionSource {
    fn parse(&self, text: &str) -> Result<AstNode>;
}

/// Longest node (base file) name `init_node_from_file_info` accepts.
/// An empty or over-long announced name is rejected before it ever
/// touches the node registry.
const MAX_NODE_NAME_LEN: usize = 255;

/// A definition file the transport has announced but not yet fully
/// written (spec §4.I `init_node_from_file_info`).
struct PendingNode {
    definition: Vec<u8>,
    written: usize,
}

/// Builds and owns [`Node`]s. The name→node map is the only
/// process-wide mutable state the core owns (spec §5); it is guarded by a
/// single mutex, matching the "single mutex-equivalent" requirement.
pub struct NodeManager {
    server_mode: bool,
    parser: Box<dyn DefinitionSource + Send + Sync>,
    nodes: Mutex<IndexMap<String, Arc<Node>>>,
    pending: Mutex<IndexMap<String, PendingNode>>,
}

impl NodeManager {
    pub fn new(server_mode: bool, parser: Box<dyn DefinitionSource + Send + Sync>) -> NodeManager {
        NodeManager {
            server_mode,
            parser,
            nodes: Mutex::new(IndexMap::new()),
            pending: Mutex::new(IndexMap::new()),
        }
    }

    pub fn node(&self, name: &str) -> Option<Arc<Node>> {
        self.nodes.lock().unwrap().get(name).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.lock().unwrap().len()
    }

    /// Parses `text` through the configured [`DefinitionSource`] and builds
    /// a node from the result (spec §4.I `build_node(text)`, steps 1-8).
    pub fn build_node_from_text(&self, text: &str) -> Result<Arc<Node>> {
        let ast = self.parser.parse(text)?;
        self.build_node(ast, text.as_bytes().to_vec())
    }

    /// Builds a node directly from an already-parsed [`AstNode`] (spec
    /// §4.I steps 2-8). `definition` is the raw bytes the node stores as
    /// its own schema text, for re-announcement/diagnostics.
    pub fn build_node(&self, ast: AstNode, definition: Vec<u8>) -> Result<Arc<Node>> {
        let mut ports = Vec::with_capacity(ast.ports.len());
        let mut elements: Vec<DataElement> = Vec::new();
        let mut element_signatures: Vec<String> = Vec::new();
        let mut computation_lists: Vec<ComputationList> = Vec::new();
        let mut computation_signatures: Vec<String> = Vec::new();

        let mut provide_offset: u32 = 0;
        let mut require_offset: u32 = 0;

        // Step 3: compile programs, derive layout, accumulate offsets.
        for (index, ast_port) in ast.ports.iter().enumerate() {
            ast_port.element.validate()?;

            let pack_program = compile_program(&ast_port.element, ProgramType::Pack)?;
            let unpack_program = match ast_port.direction {
                PortDirection::Require => {
                    Some(compile_program(&ast_port.element, ProgramType::Unpack)?)
                }
                PortDirection::Provide => None,
            };

            // Step 5: dedup effective elements by structural signature.
            let signature = element_signature(&ast_port.element);
            let element_id = match element_signatures.iter().position(|s| *s == signature) {
                Some(id) => id as u32,
                None => {
                    elements.push(ast_port.element.clone());
                    element_signatures.push(signature);
                    (elements.len() - 1) as u32
                }
            };

            let mut port = Port::new(
                ast_port.direction,
                index as u32,
                ast_port.name.clone(),
                pack_program,
                unpack_program,
                element_id,
            );

            // Step 6: dedup computation lists by combined string signature.
            if let Some(list) = &ast_port.computations {
                let signature = list.signature();
                let list_id = match computation_signatures.iter().position(|s| *s == signature) {
                    Some(id) => id as u32,
                    None => {
                        let mut list = list.clone();
                        let id = computation_lists.len() as u32;
                        list.id = Some(id);
                        computation_lists.push(list);
                        computation_signatures.push(signature);
                        id
                    }
                };
                port.set_computation_list_id(list_id);
            }

            let offset = match port.direction() {
                PortDirection::Provide => provide_offset,
                PortDirection::Require => require_offset,
            };
            let size = port.derive_properties(offset)?;
            match port.direction() {
                PortDirection::Provide => provide_offset += size,
                PortDirection::Require => require_offset += size,
            }

            // Step 7: server-mode port signature.
            if self.server_mode {
                let data_signature = element_signature(&ast_port.element);
                port.set_signature(format!("{}{}", port.name(), data_signature));
            }

            ports.push(port);
        }

        // Step 4: allocate init-data buffers of exactly the accumulated sizes.
        let provide_port_data = vec![0u8; provide_offset as usize];
        let require_port_data = vec![0u8; require_offset as usize];

        let node = Node::new(
            ast.name.clone(),
            definition,
            ports,
            elements,
            computation_lists,
            provide_port_data,
            require_port_data,
        );

        // Step 8: run pack programs with each port's declared init value.
        for (ast_port, port) in ast.ports.iter().zip(node.ports().iter()) {
            let init_value = ast_port
                .init_value
                .clone()
                .unwrap_or_else(|| ast_port.element.default_value());
            let mut vm = Vm::select_program(port.pack_program())?;
            let mut slot = vec![0u8; port.size() as usize];
            vm.pack_value(&init_value, &mut slot)?;
            match port.direction() {
                PortDirection::Provide => node.fill_provide_slot(port.offset() as usize, &slot),
                PortDirection::Require => node.fill_require_slot(port.offset() as usize, &slot),
            }
        }

        let node = Arc::new(node);

        // Step 2: key by node name; a duplicate name replaces (frees) the old.
        self.nodes
            .lock()
            .unwrap()
            .insert(ast.name.clone(), node.clone());

        log::debug!(
            "built node '{}' with {} ports ({} provide bytes, {} require bytes)",
            ast.name,
            node.ports().len(),
            provide_offset,
            require_offset
        );

        Ok(node)
    }

    /// Registers an announced `.apx` definition file and allocates its
    /// expected-size buffer (spec §4.I). Returns whether the body still
    /// needs to be requested from the transport (always `true`: the core
    /// never already has the bytes at announcement time).
    pub fn init_node_from_file_info(&self, node_name: &str, definition_size: usize) -> Result<bool> {
        if node_name.is_empty() {
            return Err(ApxError::NameMissing);
        }
        if node_name.len() > MAX_NODE_NAME_LEN {
            return Err(ApxError::NameTooLong {
                len: node_name.len(),
                max: MAX_NODE_NAME_LEN,
            });
        }
        self.pending.lock().unwrap().insert(
            node_name.to_string(),
            PendingNode {
                definition: vec![0u8; definition_size],
                written: 0,
            },
        );
        log::trace!("registered pending definition for '{node_name}' ({definition_size} bytes)");
        Ok(true)
    }

    /// Called by the transport as chunks of a pending definition file
    /// arrive. Once the full body has been written, parses it and builds
    /// the node (spec §4.I `on_definition_data_written`), returning the
    /// built node. Returns `Ok(None)` while the definition is still
    /// incomplete.
    pub fn on_definition_data_written(
        &self,
        node_name: &str,
        offset: usize,
        data: &[u8],
    ) -> Result<Option<Arc<Node>>> {
        let (definition, is_complete) = {
            let mut pending = self.pending.lock().unwrap();
            let entry = pending
                .get_mut(node_name)
                .ok_or_else(|| ApxError::NotFound(node_name.to_string()))?;
            let end = offset.checked_add(data.len()).ok_or(ApxError::BufferBoundary {
                needed: data.len(),
                available: entry.definition.len().saturating_sub(offset),
            })?;
            if end > entry.definition.len() {
                return Err(ApxError::BufferBoundary {
                    needed: end,
                    available: entry.definition.len(),
                });
            }
            entry.definition[offset..end].copy_from_slice(data);
            entry.written += data.len();
            let is_complete = entry.written >= entry.definition.len();
            (entry.definition.clone(), is_complete)
        };

        if !is_complete {
            return Ok(None);
        }
        self.pending.lock().unwrap().shift_remove(node_name);

        let text = std::str::from_utf8(&definition)
            .map_err(|_| ApxError::InvalidFile("definition is not valid utf-8".to_string()))?;
        let ast = self.parser.parse(text)?;
        Ok(Some(self.build_node(ast, definition)?))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FixedDefinitionSource;
    use super::*;
    use crate::type_code::TypeCode;

    fn manager() -> NodeManager {
        NodeManager::new(true, Box::new(FixedDefinitionSource))
    }

    #[test]
    fn build_node_from_text_wires_offsets_and_init_data() {
        let mgr = manager();
        let node = mgr.build_node_from_text("TestNode").unwrap();
        assert_eq!(node.name(), "TestNode");
        assert_eq!(node.ports().len(), 2);

        let speed = node.port_by_name("Speed").unwrap();
        assert_eq!(speed.offset(), 0);
        assert_eq!(speed.size(), 2);
        assert!(speed.signature().is_some());

        let gear = node.port_by_name("Gear").unwrap();
        assert_eq!(gear.offset(), 0);
        assert_eq!(gear.size(), 1);
        assert!(gear.unpack_program().is_some());

        assert_eq!(node.provide_port_data_size(), 2);
        assert_eq!(node.require_port_data_size(), 1);
    }

    #[test]
    fn node_name_map_is_injective_a_rebuild_replaces_the_old_node() {
        let mgr = manager();
        let first = mgr.build_node_from_text("Dup").unwrap();
        let second = mgr.build_node_from_text("Dup").unwrap();
        assert_eq!(mgr.node_count(), 1);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &mgr.node("Dup").unwrap()));
    }

    #[test]
    fn on_definition_data_written_builds_once_the_body_is_complete() {
        let mgr = manager();
        let text = b"ChunkedNode";
        mgr.init_node_from_file_info("ChunkedNode", text.len()).unwrap();

        let first_half = &text[..5];
        let second_half = &text[5..];
        assert!(mgr
            .on_definition_data_written("ChunkedNode", 0, first_half)
            .unwrap()
            .is_none());
        let node = mgr
            .on_definition_data_written("ChunkedNode", 5, second_half)
            .unwrap()
            .expect("node should be built once the definition is complete");
        assert_eq!(node.name(), "ChunkedNode");
    }

    #[test]
    fn dedup_pools_share_a_single_entry_for_identical_elements() {
        let mgr = manager();
        let ast = AstNode {
            name: "DedupNode".to_string(),
            ports: vec![
                AstPort {
                    name: "A".to_string(),
                    direction: PortDirection::Provide,
                    element: DataElement::scalar(TypeCode::U8),
                    init_value: None,
                    computations: None,
                },
                AstPort {
                    name: "B".to_string(),
                    direction: PortDirection::Provide,
                    element: DataElement::scalar(TypeCode::U8),
                    init_value: None,
                    computations: None,
                },
            ],
        };
        let node = mgr.build_node(ast, Vec::new()).unwrap();
        let a = node.port_by_name("A").unwrap();
        let b = node.port_by_name("B").unwrap();
        assert_eq!(a.element_id(), b.element_id());
    }
}
