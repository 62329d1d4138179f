//! Read netlist files into graphs

mod vm;

use std::fs::File;
use std::path::Path;

pub use vm::read_vm;

use crate::graph::{Graph, GraphError};

/// Parse a netlist graph from a file
///
/// Following extensions are supported: .vm
pub fn read_vm_file(path: impl AsRef<Path>) -> Result<Graph, GraphError> {
    let path = path.as_ref();
    match path.extension() {
        Some(ext) if ext == "vm" => {
            let f = File::open(path).map_err(|e| {
                GraphError::BadNetlist(format!("cannot open {}: {}", path.display(), e))
            })?;
            read_vm(f)
        }
        _ => Err(GraphError::BadNetlist(format!(
            "unsupported netlist extension for {}",
            path.display()
        ))),
    }
}
