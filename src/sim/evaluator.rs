use core::fmt;

use fxhash::FxHashSet;

use crate::graph::{GateOp, Graph, GraphError, LutConfig, Node, NodeKind, Value};

/// Diagnostics collected over one simulation run
///
/// Each entry names the top-level block whose evaluation chain failed; a
/// failed chain never invalidates the graph or other blocks' results.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimReport {
    /// Per-block errors in encounter order
    pub errors: Vec<(String, GraphError)>,
}

impl SimReport {
    /// Returns whether the run completed without diagnostics
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            writeln!(f, "simulation completed")
        } else {
            writeln!(f, "simulation completed with {} error(s):", self.errors.len())?;
            for (id, err) in &self.errors {
                writeln!(f, "\t{}: {}", id, err)?;
            }
            Ok(())
        }
    }
}

/// Evaluate the combinational logic with the primary inputs already set
///
/// Every net that is not a primary input is reset first, then blocks are
/// evaluated kind by kind (Cfg, Ari, Tri, Gate) in insertion order,
/// recursing into not-yet-evaluated drivers on demand.
pub fn simulate(graph: &mut Graph) -> SimReport {
    Evaluator::new(graph).run()
}

/// Set the given primary inputs from a bit string, then evaluate
///
/// `inputs` and `bits` must have the same length and `bits` must consist of
/// `0` and `1`; each assignment goes through [`Graph::set_input`].
pub fn simulate_with(
    graph: &mut Graph,
    inputs: &[&str],
    bits: &str,
) -> Result<SimReport, GraphError> {
    if inputs.len() != bits.chars().count() {
        return Err(GraphError::PatternMismatch(format!(
            "{} input names for {} bits",
            inputs.len(),
            bits.chars().count()
        )));
    }
    for (id, b) in inputs.iter().zip(bits.chars()) {
        let v = match b {
            '0' => 0,
            '1' => 1,
            _ => {
                return Err(GraphError::PatternMismatch(format!(
                    "bit string `{bits}` is not binary"
                )))
            }
        };
        graph.set_input(id, v)?;
    }
    Ok(simulate(graph))
}

/// Demand-driven recursive evaluator over a graph
struct Evaluator<'a> {
    graph: &'a mut Graph,
    /// Blocks currently on the evaluation stack, for cycle detection
    in_progress: FxHashSet<String>,
    report: SimReport,
}

impl<'a> Evaluator<'a> {
    fn new(graph: &'a mut Graph) -> Evaluator<'a> {
        Evaluator {
            graph,
            in_progress: FxHashSet::default(),
            report: SimReport::default(),
        }
    }

    fn run(mut self) -> SimReport {
        self.graph.reset_non_inputs();
        for kind in [NodeKind::Cfg, NodeKind::Ari, NodeKind::Tri, NodeKind::Gate] {
            for id in self.graph.blocks_of_kind(kind) {
                if self.first_output_unset(&id) {
                    if let Err(err) = self.process(&id) {
                        self.report.errors.push((id, err));
                    }
                }
            }
        }
        self.report
    }

    /// Returns whether the block still needs to be evaluated
    ///
    /// All outputs of a block are written together, so probing the first
    /// one is enough.
    fn first_output_unset(&self, id: &str) -> bool {
        match self.graph.node(id).and_then(|n| n.output_nets().first()) {
            Some(net) => self.graph.net_value(net).is_none(),
            None => false,
        }
    }

    /// Evaluate one block, recursing into its upstream drivers
    fn process(&mut self, id: &str) -> Result<(), GraphError> {
        if self.in_progress.contains(id) {
            return Err(GraphError::CombinationalCycle(id.to_string()));
        }
        self.in_progress.insert(id.to_string());
        let result = self.process_block(id);
        self.in_progress.remove(id);
        result
    }

    fn process_block(&mut self, id: &str) -> Result<(), GraphError> {
        let input_nets: Vec<String> = match self.graph.node(id) {
            Some(node) => node.input_nets().to_vec(),
            None => return Err(GraphError::UnknownId(id.to_string())),
        };
        let mut values = Vec::with_capacity(input_nets.len());
        for net in &input_nets {
            values.push(self.resolve(net)?);
        }
        let node = self
            .graph
            .node(id)
            .ok_or_else(|| GraphError::UnknownId(id.to_string()))?;
        let writes = compute_outputs(node, &values);
        for (net, value) in writes {
            self.graph.write_net(&net, value);
        }
        Ok(())
    }

    /// Get the value of a net, evaluating its driver first if needed
    fn resolve(&mut self, net: &str) -> Result<Value, GraphError> {
        match self.graph.net_state(net) {
            None => Err(GraphError::UnknownNet(net.to_string())),
            Some((Some(value), _, _)) => Ok(value),
            Some((None, _, true)) => Err(GraphError::MissingPrimaryInput(net.to_string())),
            Some((None, Some(driver), false)) => {
                self.process(&driver)?;
                self.graph
                    .net_value(net)
                    .ok_or_else(|| GraphError::UnknownNet(net.to_string()))
            }
            Some((None, None, false)) => Err(GraphError::UnknownNet(net.to_string())),
        }
    }
}

/// Compute the output assignments of a node from its resolved input values
fn compute_outputs(node: &Node, values: &[Value]) -> Vec<(String, Value)> {
    match node {
        Node::Cfg { output, config, .. } => {
            vec![(output.clone(), cfg_value(values, config))]
        }
        Node::Ari {
            outputs, config, ..
        } => {
            let [y, s, fco] = ari_values(values, config);
            vec![
                (outputs[0].clone(), y),
                (outputs[1].clone(), s),
                (outputs[2].clone(), fco),
            ]
        }
        Node::Tri { output, .. } => {
            vec![(output.clone(), tri_value(values[0], values[1]))]
        }
        Node::Gate { op, output, .. } => {
            vec![(output.clone(), gate_value(*op, values))]
        }
        Node::PrimeIo { .. } => Vec::new(),
    }
}

/// Look-up block output
fn cfg_value(inputs: &[Value], config: &LutConfig) -> Value {
    if inputs.iter().any(|v| v.is_z()) {
        return Value::HighZ;
    }
    // A single-input block forwards the raw bit; the config digit is not consulted
    if inputs.len() == 1 {
        return inputs[0];
    }
    let mut index = 0usize;
    for v in inputs {
        index = (index << 1) | usize::from(*v == Value::One);
    }
    config.bit(index).into()
}

/// Pack four bits into a config index, A as the most significant
fn ari_index(a: bool, b: bool, c: bool, d: bool) -> usize {
    (usize::from(a) << 3) | (usize::from(b) << 2) | (usize::from(c) << 1) | usize::from(d)
}

/// Arithmetic cell outputs Y, S, FCO
fn ari_values(inputs: &[Value], config: &LutConfig) -> [Value; 3] {
    if inputs.iter().any(|v| v.is_z()) {
        return [Value::HighZ; 3];
    }
    let bit = |v: Value| v == Value::One;
    let (a, b, c, d) = (bit(inputs[0]), bit(inputs[1]), bit(inputs[2]), bit(inputs[3]));
    let fci = bit(inputs[4]);
    let init = |i: usize| config.bit(i);

    let f0 = init(ari_index(false, b, c, d));
    let f1 = init(ari_index(true, b, c, d));
    let p = init(19) | (!init(19) & init(18));
    let g = (f0 & init(16) & init(17)) | (init(17) & !init(16)) | (f1 & init(16) & init(17));

    let y = init(ari_index(a, b, c, d));
    let s = y ^ fci;
    let fco = (!p & g) | (p & fci);
    [y.into(), s.into(), fco.into()]
}

/// Tri-state buffer output: data when ctrl is `One`, else `HighZ`
fn tri_value(data: Value, ctrl: Value) -> Value {
    if ctrl == Value::One {
        data
    } else {
        Value::HighZ
    }
}

/// Primitive gate output
fn gate_value(op: GateOp, inputs: &[Value]) -> Value {
    if inputs.iter().any(|v| v.is_z()) {
        return Value::HighZ;
    }
    match op {
        GateOp::And => inputs.iter().all(|v| *v == Value::One).into(),
        GateOp::Or => inputs.iter().any(|v| *v == Value::One).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Dir;

    /// Inputs a, b, c and a single 3-input block with config c2 driving y
    fn single_cfg() -> Graph {
        let mut g = Graph::new();
        for id in ["a", "b", "c"] {
            g.add_prime_io(id, Dir::Input).unwrap();
        }
        g.add_prime_io("y", Dir::Output).unwrap();
        g.add_cfg("u1", &["a", "b", "c"], &["y"], "c2").unwrap();
        g
    }

    /// Five inputs and two chained blocks; u2 is inserted first so the
    /// evaluator has to materialize t recursively
    fn chained_cfg() -> Graph {
        let mut g = Graph::new();
        for id in ["a", "b", "c", "d", "e"] {
            g.add_prime_io(id, Dir::Input).unwrap();
        }
        g.add_prime_io("z", Dir::Output).unwrap();
        g.add_cfg("u2", &["d", "t", "e"], &["z"], "57").unwrap();
        g.add_cfg("u1", &["a", "b", "c"], &["t"], "c2").unwrap();
        g
    }

    #[test]
    fn test_single_cfg() {
        let mut g = single_cfg();
        // c2 is 11000010: index 110 -> 1, index 001 -> 1, index 010 -> 0
        let report = simulate_with(&mut g, &["a", "b", "c"], "110").unwrap();
        assert!(report.is_clean());
        assert_eq!(g.net_value("y"), Some(Value::One));

        let report = simulate_with(&mut g, &["a", "b", "c"], "001").unwrap();
        assert!(report.is_clean());
        assert_eq!(g.net_value("y"), Some(Value::One));

        let report = simulate_with(&mut g, &["a", "b", "c"], "010").unwrap();
        assert!(report.is_clean());
        assert_eq!(g.net_value("y"), Some(Value::Zero));
    }

    #[test]
    fn test_cfg_exhaustive() {
        // The output for input vector v is the v-th LSB of the config value
        let expanded = "11000010";
        for vector in 0..8usize {
            let mut g = single_cfg();
            let bits = format!("{vector:03b}");
            let report = simulate_with(&mut g, &["a", "b", "c"], &bits).unwrap();
            assert!(report.is_clean());
            let expected = expanded.as_bytes()[7 - vector] == b'1';
            assert_eq!(g.net_value("y"), Some(Value::from(expected)), "vector {bits}");
        }
    }

    #[test]
    fn test_single_input_cfg_forwards_raw_bit() {
        let mut g = Graph::new();
        g.add_prime_io("a", Dir::Input).unwrap();
        g.add_prime_io("y", Dir::Output).unwrap();
        // Config 0 would force the output low if the table were consulted
        g.add_cfg("u1", &["a"], &["y"], "0").unwrap();
        simulate_with(&mut g, &["a"], "1").unwrap();
        assert_eq!(g.net_value("y"), Some(Value::One));
        simulate_with(&mut g, &["a"], "0").unwrap();
        assert_eq!(g.net_value("y"), Some(Value::Zero));
    }

    #[test]
    fn test_chained_recursion() {
        let mut g = chained_cfg();
        // u1: index 110 -> t = 1; u2 (config 57 = 01010111): index 011 -> 0
        let report = simulate_with(&mut g, &["a", "b", "c", "d", "e"], "11001").unwrap();
        assert!(report.is_clean());
        assert_eq!(g.net_value("t"), Some(Value::One));
        assert_eq!(g.net_value("z"), Some(Value::Zero));

        // u1: index 001 -> t = 1; u2: index 110 -> 1
        let report = simulate_with(&mut g, &["a", "b", "c", "d", "e"], "00110").unwrap();
        assert!(report.is_clean());
        assert_eq!(g.net_value("z"), Some(Value::One));
    }

    #[test]
    fn test_ari_exact() {
        let mut g = Graph::new();
        for id in ["a", "b", "c", "d", "fci"] {
            g.add_prime_io(id, Dir::Input).unwrap();
        }
        for id in ["y", "s", "fco"] {
            g.add_prime_io(id, Dir::Output).unwrap();
        }
        g.add_ari("ari1", &["a", "b", "c", "d", "fci"], &["y", "s", "fco"], "a5d21")
            .unwrap();

        let report = simulate_with(&mut g, &["a", "b", "c", "d", "fci"], "10100").unwrap();
        assert!(report.is_clean());
        // INIT (LSB first) = 10000100 10111010 0101; Y = INIT[10] = 1,
        // S = Y ^ FCI = 1, P = 1, so FCO = P & FCI = 0
        assert_eq!(g.net_value("y"), Some(Value::One));
        assert_eq!(g.net_value("s"), Some(Value::One));
        assert_eq!(g.net_value("fco"), Some(Value::Zero));
    }

    #[test]
    fn test_tri_state_absorption() {
        let mut g = Graph::new();
        for id in ["d", "en", "b"] {
            g.add_prime_io(id, Dir::Input).unwrap();
        }
        g.add_prime_io("y", Dir::Output).unwrap();
        // 8 is the And table: only input vector 11 selects a high bit
        g.add_tri("t1", "d", "en", "q").unwrap();
        g.add_cfg("u1", &["q", "b"], &["y"], "8").unwrap();

        // ctrl low: the buffer and everything downstream read Z
        let report = simulate_with(&mut g, &["d", "en", "b"], "101").unwrap();
        assert!(report.is_clean());
        assert_eq!(g.net_value("q"), Some(Value::HighZ));
        assert_eq!(g.net_value("y"), Some(Value::HighZ));

        // ctrl high: data is forwarded
        let report = simulate_with(&mut g, &["d", "en", "b"], "111").unwrap();
        assert!(report.is_clean());
        assert_eq!(g.net_value("q"), Some(Value::One));
        assert_eq!(g.net_value("y"), Some(Value::One));
    }

    #[test]
    fn test_ari_absorbs_high_z() {
        let mut g = Graph::new();
        for id in ["a", "b", "c", "d", "en"] {
            g.add_prime_io(id, Dir::Input).unwrap();
        }
        g.add_tri("t1", "a", "en", "q").unwrap();
        g.add_ari("ari1", &["a", "b", "c", "d", "q"], &["y", "s", "fco"], "ec9b5")
            .unwrap();
        let report = simulate_with(&mut g, &["a", "b", "c", "d", "en"], "10110").unwrap();
        assert!(report.is_clean());
        assert_eq!(g.net_value("y"), Some(Value::HighZ));
        assert_eq!(g.net_value("s"), Some(Value::HighZ));
        assert_eq!(g.net_value("fco"), Some(Value::HighZ));
    }

    #[test]
    fn test_missing_primary_input() {
        let mut g = Graph::new();
        g.add_prime_io("a", Dir::Input).unwrap();
        g.add_prime_io("b", Dir::Input).unwrap();
        g.add_prime_io("y", Dir::Output).unwrap();
        g.add_cfg("u1", &["a", "b"], &["y"], "e").unwrap();

        let report = simulate(&mut g);
        assert_eq!(
            report.errors,
            vec![(
                "u1".to_string(),
                GraphError::MissingPrimaryInput("a".to_string())
            )]
        );
        assert_eq!(g.net_value("y"), None);
    }

    #[test]
    fn test_unknown_net() {
        let mut g = Graph::new();
        g.add_prime_io("a", Dir::Input).unwrap();
        g.add_prime_io("y", Dir::Output).unwrap();
        g.add_cfg("u1", &["a", "ghost"], &["y"], "e").unwrap();
        g.set_input("a", 1).unwrap();

        let report = simulate(&mut g);
        assert_eq!(
            report.errors,
            vec![("u1".to_string(), GraphError::UnknownNet("ghost".to_string()))]
        );
        assert_eq!(g.net_value("y"), None);
    }

    #[test]
    fn test_combinational_cycle() {
        let mut g = Graph::new();
        g.add_prime_io("a", Dir::Input).unwrap();
        g.add_prime_io("y", Dir::Output).unwrap();
        // u1 and u2 feed each other; u3 is an independent subgraph
        g.add_cfg("u1", &["a", "t2"], &["t1"], "e").unwrap();
        g.add_cfg("u2", &["a", "t1"], &["t2"], "e").unwrap();
        g.add_cfg("u3", &["a", "a"], &["y"], "8").unwrap();
        g.set_input("a", 1).unwrap();

        let report = simulate(&mut g);
        assert_eq!(report.errors.len(), 2);
        for (_, err) in &report.errors {
            assert!(matches!(err, GraphError::CombinationalCycle(_)));
        }
        assert_eq!(g.net_value("t1"), None);
        assert_eq!(g.net_value("t2"), None);
        // The independent block still evaluates (8 = 1000, index 11 -> 1)
        assert_eq!(g.net_value("y"), Some(Value::One));
    }

    #[test]
    fn test_constants() {
        let mut g = Graph::new();
        g.add_prime_io("VCC", Dir::Input).unwrap();
        g.add_prime_io("GND", Dir::Input).unwrap();
        g.add_prime_io("y", Dir::Output).unwrap();
        // 4 is 0100: only input vector 10 selects a high bit
        g.add_cfg("u1", &["VCC", "GND"], &["y"], "4").unwrap();
        let report = simulate(&mut g);
        assert!(report.is_clean());
        assert_eq!(g.net_value("y"), Some(Value::One));
        assert_eq!(g.net_value("VCC"), Some(Value::One));
        assert_eq!(g.net_value("GND"), Some(Value::Zero));
    }

    #[test]
    fn test_fanout_broadcast() {
        let mut g = Graph::new();
        g.add_prime_io("a", Dir::Input).unwrap();
        g.add_prime_io("b", Dir::Input).unwrap();
        g.add_prime_io("y1", Dir::Output).unwrap();
        g.add_prime_io("y2", Dir::Output).unwrap();
        g.add_cfg("u1", &["a", "b"], &["t", "y1", "y2"], "e").unwrap();

        for bits in ["00", "01", "10", "11"] {
            let report = simulate_with(&mut g, &["a", "b"], bits).unwrap();
            assert!(report.is_clean());
            let driver = g.net_value("t");
            assert!(driver.is_some());
            assert_eq!(g.net_value("y1"), driver, "bits {bits}");
            assert_eq!(g.net_value("y2"), driver, "bits {bits}");
        }
    }

    #[test]
    fn test_determinism() {
        let mut g = chained_cfg();
        let report = simulate_with(&mut g, &["a", "b", "c", "d", "e"], "10101").unwrap();
        assert!(report.is_clean());
        let first: Vec<_> = ["t", "z"].iter().map(|n| g.net_value(n)).collect();

        let report = simulate(&mut g);
        assert!(report.is_clean());
        let second: Vec<_> = ["t", "z"].iter().map(|n| g.net_value(n)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_pattern_mismatch() {
        let mut g = single_cfg();
        assert!(matches!(
            simulate_with(&mut g, &["a", "b"], "110"),
            Err(GraphError::PatternMismatch(_))
        ));
        assert!(matches!(
            simulate_with(&mut g, &["a", "b", "c"], "1x0"),
            Err(GraphError::PatternMismatch(_))
        ));
    }
}
