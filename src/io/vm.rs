//! IO for `.vm` (Verilog-like) structural netlists

use std::io::{BufRead, BufReader, Read};

use fxhash::FxHashMap;
use itertools::Itertools;

use crate::graph::{Dir, Graph, GraphError, Node};

/// Wire-to-primary-net mapping collected from the INBUF/OUTBUF instances
type BufferMap = FxHashMap<String, Vec<String>>;

/// Extract the net name between the parentheses of an instance port line
fn port_net(line: &str) -> Result<String, GraphError> {
    line.split(['(', ')'])
        .nth(1)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| GraphError::BadNetlist(format!("expected a port, got `{}`", line.trim())))
}

/// Extract the hex configuration from a `... = h<hex>;` line
fn config_hex(line: &str) -> Result<String, GraphError> {
    let bad = || GraphError::BadNetlist(format!("expected a configuration, got `{}`", line.trim()));
    let rhs = line.split('=').nth(1).ok_or_else(bad)?.trim();
    let hex = rhs.strip_prefix('h').ok_or_else(bad)?.trim_end_matches(';');
    if hex.is_empty() {
        return Err(bad());
    }
    Ok(hex.to_string())
}

fn is_primary_input(graph: &Graph, net: &str) -> bool {
    matches!(graph.node(net), Some(Node::PrimeIo { dir: Dir::Input }))
}

/// Resolve an input-side port through the buffer map
///
/// A wire that reaches both a primary input and primary outputs resolves to
/// the primary input; the outputs are fed by the same wire elsewhere.
fn resolve_input(graph: &Graph, buffers: &BufferMap, name: &str) -> Result<String, GraphError> {
    match buffers.get(name) {
        None => Ok(name.to_string()),
        Some(list) if list.len() == 1 => Ok(list[0].clone()),
        Some(list) => match list.iter().find(|n| is_primary_input(graph, n)) {
            Some(primary) => Ok(primary.clone()),
            None => Err(GraphError::BadNetlist(format!(
                "wire {} maps to several primary nets: {}",
                name,
                list.iter().join(", ")
            ))),
        },
    }
}

/// Resolve an output-side port through the buffer map
///
/// A wire buffered to several primary outputs yields them all; the first one
/// becomes the driving net and the rest are fan-out sinks.
fn resolve_outputs(graph: &Graph, buffers: &BufferMap, name: &str) -> Vec<String> {
    match buffers.get(name) {
        None => vec![name.to_string()],
        Some(list) if list.len() == 1 => vec![list[0].clone()],
        Some(list) => {
            let outputs: Vec<String> = list
                .iter()
                .filter(|n| graph.is_primary_output(n))
                .cloned()
                .collect();
            if outputs.is_empty() {
                list.clone()
            } else {
                outputs
            }
        }
    }
}

/// Read a netlist in `.vm` format
///
/// The format is line-oriented and Verilog-like:
/// ```text
///     // comment
///     module top (N1, N2, N22);
///     input N1;
///     input N2;
///     output N22;
///     wire VCC;
///     INBUF ib1 (
///         .Y(N1_w),
///         .PAD(N1)
///     );
///     OUTBUF ob1 (
///         .PAD(N22),
///         .D(t0)
///     );
///     CFG2 u1 (
///         .A(N1_w),
///         .B(N2_w),
///         .Y(t0)
///     );
///     defparam u1.INIT = h8;
///     endmodule
/// ```
///
/// `input`/`output` lines declare primary IO (`wire VCC;`/`wire GND;` count
/// as inputs). INBUF/OUTBUF instances are elided: every port of a `CFG*` or
/// `ARI1` instance is resolved to its primary net before the graph builder
/// is called. The last port of a `CFG*` instance is its output; the first
/// three ports of an `ARI1` instance are Y, S, FCO and the remaining five
/// are A, B, C, D, FCI.
pub fn read_vm<R: Read>(r: R) -> Result<Graph, GraphError> {
    let mut lines = Vec::new();
    for l in BufReader::new(r).lines() {
        match l {
            Ok(s) => lines.push(s),
            Err(e) => return Err(GraphError::BadNetlist(e.to_string())),
        }
    }

    let mut graph = Graph::new();
    let mut buffers = BufferMap::default();

    // First pass: primary IO declarations and boundary buffers
    let mut i = 0;
    while i < lines.len() {
        let tokens: Vec<&str> = lines[i].split_whitespace().collect();
        if tokens.is_empty() || tokens[0].starts_with("//") {
            i += 1;
            continue;
        }
        match tokens[0] {
            "input" if tokens.len() > 1 => {
                graph.add_prime_io(tokens[1].trim_end_matches(';'), Dir::Input)?;
            }
            "output" if tokens.len() > 1 => {
                graph.add_prime_io(tokens[1].trim_end_matches(';'), Dir::Output)?;
            }
            "wire" if tokens.len() > 1 => {
                let name = tokens[1].trim_end_matches(';');
                if name == "VCC" || name == "GND" {
                    graph.add_prime_io(name, Dir::Input)?;
                }
            }
            "INBUF" | "OUTBUF" => {
                if i + 2 >= lines.len() {
                    return Err(GraphError::BadNetlist(format!(
                        "unterminated {} instance",
                        tokens[0]
                    )));
                }
                let first = port_net(&lines[i + 1])?;
                let second = port_net(&lines[i + 2])?;
                // INBUF lists .Y(wire) then .PAD(pad); OUTBUF the reverse
                let (wire, primary) = if tokens[0] == "INBUF" {
                    (first, second)
                } else {
                    (second, first)
                };
                buffers.entry(wire).or_default().push(primary);
                i += 2;
            }
            _ => (),
        }
        i += 1;
    }

    // Second pass: CFG and ARI1 instances
    let mut i = 0;
    while i < lines.len() {
        let tokens: Vec<&str> = lines[i].split_whitespace().collect();
        if tokens.is_empty() || tokens[0].starts_with("//") {
            i += 1;
            continue;
        }
        let is_cfg = tokens[0].starts_with("CFG");
        let is_ari = tokens[0] == "ARI1";
        if !is_cfg && !is_ari {
            i += 1;
            continue;
        }
        if tokens.len() < 2 {
            return Err(GraphError::BadNetlist(format!(
                "instance `{}` has no name",
                lines[i].trim()
            )));
        }
        let id = tokens[1].to_string();

        // Collect the port nets up to the closing `);`
        let mut ports = Vec::new();
        i += 1;
        while i < lines.len() && lines[i].trim() != ");" {
            ports.push(port_net(&lines[i])?);
            i += 1;
        }
        if i + 1 >= lines.len() {
            return Err(GraphError::BadNetlist(format!("unterminated instance {id}")));
        }
        i += 1;
        let config = config_hex(&lines[i])?;

        if is_cfg {
            if ports.len() < 2 {
                return Err(GraphError::BadNetlist(format!(
                    "instance {id} needs at least one input and one output"
                )));
            }
            let (out_port, in_ports) = ports.split_last().expect("ports checked above");
            let inputs = in_ports
                .iter()
                .map(|p| resolve_input(&graph, &buffers, p))
                .collect::<Result<Vec<String>, GraphError>>()?;
            let outputs = resolve_outputs(&graph, &buffers, out_port);
            let input_refs: Vec<&str> = inputs.iter().map(String::as_str).collect();
            let output_refs: Vec<&str> = outputs.iter().map(String::as_str).collect();
            graph.add_cfg(&id, &input_refs, &output_refs, &config)?;
        } else {
            if ports.len() != 8 {
                return Err(GraphError::BadNetlist(format!(
                    "instance {id} needs 8 ports, got {}",
                    ports.len()
                )));
            }
            let mut outputs = Vec::with_capacity(3);
            for p in &ports[..3] {
                let resolved = resolve_outputs(&graph, &buffers, p);
                if resolved.len() != 1 {
                    return Err(GraphError::BadNetlist(format!(
                        "arithmetic output {p} maps to several primary outputs"
                    )));
                }
                outputs.push(resolved.into_iter().next().expect("length checked above"));
            }
            let inputs = ports[3..]
                .iter()
                .map(|p| resolve_input(&graph, &buffers, p))
                .collect::<Result<Vec<String>, GraphError>>()?;
            let input_refs: Vec<&str> = inputs.iter().map(String::as_str).collect();
            let output_refs: Vec<&str> = outputs.iter().map(String::as_str).collect();
            graph.add_ari(&id, &input_refs, &output_refs, &config)?;
        }
        i += 1;
    }

    graph.check();
    Ok(graph)
}
