use core::{fmt, slice};

use crate::graph::config::LutConfig;

/// Direction of a boundary net
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Dir {
    /// Primary input, written by the user before simulation
    Input,
    /// Primary output, read after simulation
    Output,
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dir::Input => write!(f, "input"),
            Dir::Output => write!(f, "output"),
        }
    }
}

/// Operation of a primitive voter gate
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum GateOp {
    /// Output is `One` iff every input is `One`
    And,
    /// Output is `One` iff at least one input is `One`
    Or,
}

/// Kind tag of a node
///
/// Stored explicitly on every node so dispatch and listing never infer the
/// kind from the shape of the record.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum NodeKind {
    /// Boundary net
    PrimeIo,
    /// Configurable look-up block
    Cfg,
    /// Arithmetic cell
    Ari,
    /// Tri-state buffer
    Tri,
    /// Primitive And/Or gate
    Gate,
}

/// A node of the netlist graph, one variant per block kind
///
/// The store owns every node; nets are referenced by name only.
#[derive(Debug, Clone)]
pub enum Node {
    /// Boundary net (primary input or output)
    PrimeIo {
        /// Direction of the boundary net
        dir: Dir,
    },
    /// Configurable look-up block: output = config bit selected by the inputs
    Cfg {
        /// Ordered input nets, n >= 1
        inputs: Box<[String]>,
        /// Driving output net
        output: String,
        /// Packed truth table
        config: LutConfig,
    },
    /// Arithmetic cell emulating a carry-chain slice
    Ari {
        /// A, B, C, D, FCI in order
        inputs: [String; 5],
        /// Y, S, FCO in order
        outputs: [String; 3],
        /// 20-bit packed configuration
        config: LutConfig,
    },
    /// Tri-state buffer: forwards data when ctrl is `One`, else `HighZ`
    Tri {
        /// Data then ctrl
        inputs: [String; 2],
        /// Output net
        output: String,
    },
    /// Primitive multi-input And/Or, generated by the TMR rewrite
    Gate {
        /// Gate operation
        op: GateOp,
        /// Ordered input nets, n >= 2
        inputs: Box<[String]>,
        /// Output net
        output: String,
    },
}

impl Node {
    /// The explicit kind tag of the node
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::PrimeIo { .. } => NodeKind::PrimeIo,
            Node::Cfg { .. } => NodeKind::Cfg,
            Node::Ari { .. } => NodeKind::Ari,
            Node::Tri { .. } => NodeKind::Tri,
            Node::Gate { .. } => NodeKind::Gate,
        }
    }

    /// Ordered input nets of the node; empty for primary IO
    pub fn input_nets(&self) -> &[String] {
        match self {
            Node::PrimeIo { .. } => &[],
            Node::Cfg { inputs, .. } => inputs,
            Node::Ari { inputs, .. } => inputs,
            Node::Tri { inputs, .. } => inputs,
            Node::Gate { inputs, .. } => inputs,
        }
    }

    /// Ordered output nets of the node; empty for primary IO
    pub fn output_nets(&self) -> &[String] {
        match self {
            Node::PrimeIo { .. } => &[],
            Node::Cfg { output, .. } => slice::from_ref(output),
            Node::Ari { outputs, .. } => outputs,
            Node::Tri { output, .. } => slice::from_ref(output),
            Node::Gate { output, .. } => slice::from_ref(output),
        }
    }

    /// Returns whether the node is a logic block rather than a boundary net
    pub fn is_block(&self) -> bool {
        self.kind() != NodeKind::PrimeIo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Box<[String]> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_accessors() {
        let cfg = Node::Cfg {
            inputs: names(&["a", "b", "c"]),
            output: "y".to_string(),
            config: LutConfig::from_hex("c2").unwrap(),
        };
        assert_eq!(cfg.kind(), NodeKind::Cfg);
        assert_eq!(cfg.input_nets(), &["a", "b", "c"]);
        assert_eq!(cfg.output_nets(), &["y"]);
        assert!(cfg.is_block());

        let tri = Node::Tri {
            inputs: ["d".to_string(), "en".to_string()],
            output: "q".to_string(),
        };
        assert_eq!(tri.input_nets(), &["d", "en"]);
        assert_eq!(tri.output_nets(), &["q"]);

        let io = Node::PrimeIo { dir: Dir::Input };
        assert_eq!(io.kind(), NodeKind::PrimeIo);
        assert!(io.input_nets().is_empty());
        assert!(io.output_nets().is_empty());
        assert!(!io.is_block());
    }
}
