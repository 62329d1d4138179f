use core::fmt;

use fxhash::FxHashMap;
use itertools::Itertools;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::graph::config::LutConfig;
use crate::graph::error::GraphError;
use crate::graph::node::{Dir, GateOp, Node, NodeKind};
use crate::graph::value::Value;

/// Role of a net relative to the circuit boundary
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum NetRole {
    /// Primary input, written by the user
    Input,
    /// Primary output, read after simulation
    Output,
    /// Internal net created by a block output
    Internal,
}

/// State of a named net
#[derive(Debug, Clone)]
struct Net {
    value: Option<Value>,
    /// Id of the block driving the net; `None` for primary inputs and
    /// not-yet-driven primary outputs
    driver: Option<String>,
    role: NetRole,
    /// `VCC`/`GND`: the value is a constant and survives resets
    pinned: bool,
}

impl Net {
    fn undriven(role: NetRole) -> Net {
        Net {
            value: None,
            driver: None,
            role,
            pinned: false,
        }
    }
}

/// The netlist graph: node store, net table and fan-out registry
///
/// Nodes are created through the builder API, mutated only by the evaluator
/// (output values) or the TMR rewrite, and live until the graph is dropped.
/// Iteration over blocks is stable in insertion order, which keeps
/// diagnostics and random input generation reproducible.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: FxHashMap<String, Node>,
    /// Insertion order of logic blocks
    order: Vec<String>,
    /// Declaration order of primary IO
    io_order: Vec<String>,
    nets: FxHashMap<String, Net>,
    /// Driving net name to extra sink nets (structural buffering)
    fanout: FxHashMap<String, Vec<String>>,
}

/// Hex config length required for an n-input look-up block
fn cfg_config_digits(nb_inputs: usize) -> usize {
    if nb_inputs <= 2 {
        1
    } else {
        1 << (nb_inputs - 2)
    }
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a primary input or output net
    ///
    /// `VCC` and `GND` declared as inputs are pinned to constant `One` and
    /// `Zero` and can never be written afterwards.
    pub fn add_prime_io(&mut self, id: &str, dir: Dir) -> Result<(), GraphError> {
        if self.nodes.contains_key(id) || self.nets.contains_key(id) {
            return Err(GraphError::DuplicateId(id.to_string()));
        }
        let (value, pinned) = match (id, dir) {
            ("VCC", Dir::Input) => (Some(Value::One), true),
            ("GND", Dir::Input) => (Some(Value::Zero), true),
            _ => (None, false),
        };
        let role = match dir {
            Dir::Input => NetRole::Input,
            Dir::Output => NetRole::Output,
        };
        self.nodes.insert(id.to_string(), Node::PrimeIo { dir });
        self.io_order.push(id.to_string());
        self.nets.insert(
            id.to_string(),
            Net {
                value,
                driver: None,
                role,
                pinned,
            },
        );
        Ok(())
    }

    /// Add a configurable look-up block
    ///
    /// `outputs[0]` is the driving net; any further entries are fan-out sinks
    /// and must be declared primary outputs. The config needs one hex digit
    /// for 1 or 2 inputs and `2^(n-2)` digits for n >= 3.
    pub fn add_cfg(
        &mut self,
        id: &str,
        inputs: &[&str],
        outputs: &[&str],
        config: &str,
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(id) {
            return Err(GraphError::DuplicateId(id.to_string()));
        }
        if inputs.is_empty() {
            return Err(GraphError::InvalidArity {
                id: id.to_string(),
                what: "inputs",
                expected: 1,
                got: 0,
            });
        }
        if outputs.is_empty() {
            return Err(GraphError::InvalidArity {
                id: id.to_string(),
                what: "outputs",
                expected: 1,
                got: 0,
            });
        }
        let expected = cfg_config_digits(inputs.len());
        if config.len() != expected {
            return Err(GraphError::ConfigLengthMismatch {
                id: id.to_string(),
                inputs: inputs.len(),
                expected,
                got: config.len(),
            });
        }
        let config = LutConfig::from_hex(config)?;
        self.check_driver_free(outputs[0])?;
        if outputs.len() > 1 {
            if self.fanout.contains_key(outputs[0]) {
                return Err(GraphError::DuplicateId(outputs[0].to_string()));
            }
            for sink in &outputs[1..] {
                if !self.is_primary_output(sink) {
                    return Err(GraphError::UnknownNet(sink.to_string()));
                }
            }
        }

        self.claim_driver(outputs[0], id);
        if outputs.len() > 1 {
            self.fanout.insert(
                outputs[0].to_string(),
                outputs[1..].iter().map(|s| s.to_string()).collect(),
            );
        }
        self.insert_block(
            id,
            Node::Cfg {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                output: outputs[0].to_string(),
                config,
            },
        );
        Ok(())
    }

    /// Add an arithmetic cell
    ///
    /// Inputs in order A, B, C, D, FCI; outputs in order Y, S, FCO; the
    /// config is exactly 5 hex digits (20 bits).
    pub fn add_ari(
        &mut self,
        id: &str,
        inputs: &[&str],
        outputs: &[&str],
        config: &str,
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(id) {
            return Err(GraphError::DuplicateId(id.to_string()));
        }
        if inputs.len() != 5 {
            return Err(GraphError::InvalidArity {
                id: id.to_string(),
                what: "inputs",
                expected: 5,
                got: inputs.len(),
            });
        }
        if outputs.len() != 3 {
            return Err(GraphError::InvalidArity {
                id: id.to_string(),
                what: "outputs",
                expected: 3,
                got: outputs.len(),
            });
        }
        if config.len() != 5 {
            return Err(GraphError::ConfigLengthMismatch {
                id: id.to_string(),
                inputs: 5,
                expected: 5,
                got: config.len(),
            });
        }
        let config = LutConfig::from_hex(config)?;
        for o in outputs {
            self.check_driver_free(o)?;
        }
        for o in outputs {
            self.claim_driver(o, id);
        }
        self.insert_block(
            id,
            Node::Ari {
                inputs: std::array::from_fn(|i| inputs[i].to_string()),
                outputs: std::array::from_fn(|i| outputs[i].to_string()),
                config,
            },
        );
        Ok(())
    }

    /// Add a tri-state buffer
    pub fn add_tri(
        &mut self,
        id: &str,
        data: &str,
        ctrl: &str,
        output: &str,
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(id) {
            return Err(GraphError::DuplicateId(id.to_string()));
        }
        self.check_driver_free(output)?;
        self.claim_driver(output, id);
        self.insert_block(
            id,
            Node::Tri {
                inputs: [data.to_string(), ctrl.to_string()],
                output: output.to_string(),
            },
        );
        Ok(())
    }

    /// Add a primitive And/Or gate; only the TMR rewrite creates these
    pub(crate) fn add_gate(
        &mut self,
        id: &str,
        op: GateOp,
        inputs: &[&str],
        output: &str,
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(id) {
            return Err(GraphError::DuplicateId(id.to_string()));
        }
        if inputs.len() < 2 {
            return Err(GraphError::InvalidArity {
                id: id.to_string(),
                what: "inputs",
                expected: 2,
                got: inputs.len(),
            });
        }
        self.check_driver_free(output)?;
        self.claim_driver(output, id);
        self.insert_block(
            id,
            Node::Gate {
                op,
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                output: output.to_string(),
            },
        );
        Ok(())
    }

    /// Set the value of a primary input, normalizing any value >= 1 to `One`
    pub fn set_input(&mut self, id: &str, value: u32) -> Result<(), GraphError> {
        match self.nodes.get(id) {
            None => Err(GraphError::UnknownId(id.to_string())),
            Some(Node::PrimeIo { dir: Dir::Input }) => {
                match self.nets.get_mut(id) {
                    Some(net) if net.pinned => Err(GraphError::SetOnNonInput(id.to_string())),
                    Some(net) => {
                        net.value = Some(Value::from_bit(value));
                        Ok(())
                    }
                    None => Err(GraphError::UnknownId(id.to_string())),
                }
            }
            Some(_) => Err(GraphError::SetOnNonInput(id.to_string())),
        }
    }

    /// Drive every primary input except `VCC`/`GND` with a uniform random bit
    ///
    /// The seed makes the assignment reproducible; inputs are visited in
    /// declaration order.
    pub fn set_random_inputs(&mut self, seed: u64) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let ids: Vec<String> = self
            .io_order
            .iter()
            .filter(|id| {
                matches!(self.nodes.get(*id), Some(Node::PrimeIo { dir: Dir::Input }))
                    && !self.nets.get(*id).map_or(false, |n| n.pinned)
            })
            .cloned()
            .collect();
        for id in ids {
            let bit: bool = rng.gen();
            if let Some(net) = self.nets.get_mut(&id) {
                net.value = Some(Value::from(bit));
            }
        }
    }

    /// Get the node with the given id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Current value of a net; `None` if unset or unknown
    pub fn net_value(&self, net: &str) -> Option<Value> {
        self.nets.get(net).and_then(|n| n.value)
    }

    /// Iterate the primary IO in declaration order with their current values
    pub fn prime_ios(&self) -> impl Iterator<Item = (&str, Dir, Option<Value>)> + '_ {
        self.io_order.iter().filter_map(|id| match self.nodes.get(id) {
            Some(Node::PrimeIo { dir }) => Some((id.as_str(), *dir, self.net_value(id))),
            _ => None,
        })
    }

    /// Iterate the primary input names in declaration order
    pub fn primary_inputs(&self) -> impl Iterator<Item = &str> + '_ {
        self.prime_ios()
            .filter(|(_, dir, _)| *dir == Dir::Input)
            .map(|(id, _, _)| id)
    }

    /// Iterate the primary output names in declaration order
    pub fn primary_outputs(&self) -> impl Iterator<Item = &str> + '_ {
        self.prime_ios()
            .filter(|(_, dir, _)| *dir == Dir::Output)
            .map(|(id, _, _)| id)
    }

    /// Iterate the block ids in insertion order
    pub fn blocks(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    /// Number of logic blocks in the graph
    pub fn nb_blocks(&self) -> usize {
        self.order.len()
    }

    /// Number of primary inputs
    pub fn nb_inputs(&self) -> usize {
        self.primary_inputs().count()
    }

    /// Number of primary outputs
    pub fn nb_outputs(&self) -> usize {
        self.primary_outputs().count()
    }

    /// Returns whether the net is a declared primary output
    pub fn is_primary_output(&self, net: &str) -> bool {
        self.nets.get(net).map_or(false, |n| n.role == NetRole::Output)
    }

    /// Fan-out sinks registered for a driving net
    pub fn fanout_sinks(&self, net: &str) -> Option<&[String]> {
        self.fanout.get(net).map(Vec::as_slice)
    }

    /// Block ids of one kind, in insertion order
    pub(crate) fn blocks_of_kind(&self, kind: NodeKind) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.nodes.get(*id).map_or(false, |n| n.kind() == kind))
            .cloned()
            .collect()
    }

    /// Value, driver and is-primary-input flag of a net
    pub(crate) fn net_state(&self, net: &str) -> Option<(Option<Value>, Option<String>, bool)> {
        self.nets
            .get(net)
            .map(|n| (n.value, n.driver.clone(), n.role == NetRole::Input))
    }

    /// Returns whether a net of this name exists
    pub(crate) fn contains_net(&self, net: &str) -> bool {
        self.nets.contains_key(net)
    }

    /// Write a net and broadcast the value to its fan-out sinks
    pub(crate) fn write_net(&mut self, net: &str, value: Value) {
        if let Some(n) = self.nets.get_mut(net) {
            n.value = Some(value);
        }
        if let Some(sinks) = self.fanout.get(net) {
            let sinks = sinks.clone();
            for s in sinks {
                if let Some(n) = self.nets.get_mut(&s) {
                    n.value = Some(value);
                }
            }
        }
    }

    /// Reset every net that is not a primary input to the unset state
    pub(crate) fn reset_non_inputs(&mut self) {
        for net in self.nets.values_mut() {
            if net.role != NetRole::Input {
                net.value = None;
            }
        }
    }

    /// Remove a block, releasing its claim on its output nets
    ///
    /// The output nets themselves are kept so existing references stay valid.
    pub(crate) fn remove_block(&mut self, id: &str) -> Option<Node> {
        let node = self.nodes.remove(id)?;
        self.order.retain(|x| x != id);
        for out in node.output_nets() {
            if let Some(net) = self.nets.get_mut(out) {
                if net.driver.as_deref() == Some(id) {
                    net.driver = None;
                }
            }
        }
        Some(node)
    }

    /// Check that claiming this net as a block output is legal
    fn check_driver_free(&self, net: &str) -> Result<(), GraphError> {
        match self.nets.get(net) {
            None => Ok(()),
            Some(n) if n.role == NetRole::Input => Err(GraphError::DuplicateId(net.to_string())),
            Some(n) if n.driver.is_some() => Err(GraphError::DuplicateId(net.to_string())),
            Some(_) => Ok(()),
        }
    }

    /// Record the block as the single driver of the net
    fn claim_driver(&mut self, net: &str, id: &str) {
        let entry = self
            .nets
            .entry(net.to_string())
            .or_insert_with(|| Net::undriven(NetRole::Internal));
        entry.driver = Some(id.to_string());
    }

    fn insert_block(&mut self, id: &str, node: Node) {
        self.nodes.insert(id.to_string(), node);
        self.order.push(id.to_string());
    }

    /// Check consistency of the datastructure
    pub fn check(&self) {
        for id in &self.order {
            let node = self.nodes.get(id).expect("ordered block must be stored");
            for out in node.output_nets() {
                let net = self.nets.get(out).expect("block output must have a net");
                assert_eq!(
                    net.driver.as_deref(),
                    Some(id.as_str()),
                    "net {out} must be driven by {id}"
                );
            }
        }
        for (driver, sinks) in &self.fanout {
            assert!(self.nets.contains_key(driver), "unknown fan-out driver {driver}");
            for s in sinks {
                assert!(self.is_primary_output(s), "fan-out sink {s} must be a primary output");
            }
        }
    }
}

fn value_str(v: Option<Value>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Graph with {} inputs, {} outputs, {} blocks:",
            self.nb_inputs(),
            self.nb_outputs(),
            self.nb_blocks()
        )?;
        for (id, dir, value) in self.prime_ios() {
            writeln!(f, "\t{} {} = {}", dir, id, value_str(value))?;
        }
        for id in &self.order {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            match node {
                Node::Cfg {
                    inputs,
                    output,
                    config,
                } => {
                    writeln!(
                        f,
                        "\t{} = CFG({}) -> {} [{}]",
                        id,
                        inputs.iter().join(", "),
                        output,
                        config
                    )?;
                }
                Node::Ari {
                    inputs,
                    outputs,
                    config,
                } => {
                    writeln!(
                        f,
                        "\t{} = ARI1({}) -> ({}) [{}]",
                        id,
                        inputs.iter().join(", "),
                        outputs.iter().join(", "),
                        config
                    )?;
                }
                Node::Tri { inputs, output } => {
                    writeln!(f, "\t{} = TRIBUF({}, {}) -> {}", id, inputs[0], inputs[1], output)?;
                }
                Node::Gate { op, inputs, output } => {
                    let name = match op {
                        GateOp::And => "AND",
                        GateOp::Or => "OR",
                    };
                    writeln!(f, "\t{} = {}({}) -> {}", id, name, inputs.iter().join(", "), output)?;
                }
                Node::PrimeIo { .. } => (),
            }
        }
        let mut registered: Vec<_> = self.fanout.iter().collect();
        registered.sort();
        for (driver, sinks) in registered {
            writeln!(f, "\tfanout {} -> {}", driver, sinks.iter().join(", "))?;
        }
        Ok(())
    }
}
