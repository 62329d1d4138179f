//! Triple modular redundancy rewrite
//!
//! Replaces a block with three structural replicas and a 2-of-3 majority
//! voter per output, built from primitive And/Or gates in the same graph.
//! A single faulty replica then cannot corrupt the block's outputs.

use crate::graph::{GateOp, Graph, GraphError, Node, NodeKind};

/// Suffixes appended to the replica block ids
const REPLICA_ID_SUFFIXES: [&str; 3] = ["_tripd780", "_tripd781", "_tripd782"];
/// Suffixes appended to the replica output nets
const REPLICA_NET_SUFFIXES: [&str; 3] = ["_trip7280", "_trip7281", "_trip7282"];

/// Replace a block with three replicas and majority voters
///
/// The target must be a Cfg, Ari or Tri block. Afterwards the original block
/// id is gone, while its output nets stay valid: each is now driven by the
/// Or gate of its voter. Input-side references and fan-out registrations are
/// unchanged. On error the graph is left untouched.
pub fn triplicate(graph: &mut Graph, block_id: &str) -> Result<(), GraphError> {
    let node = match graph.node(block_id) {
        None => return Err(GraphError::UnknownId(block_id.to_string())),
        Some(node) => match node.kind() {
            NodeKind::Cfg | NodeKind::Ari | NodeKind::Tri => node.clone(),
            NodeKind::PrimeIo | NodeKind::Gate => {
                return Err(GraphError::NotTriplicatable(block_id.to_string()))
            }
        },
    };

    let inputs: Vec<String> = node.input_nets().to_vec();
    let outputs: Vec<String> = node.output_nets().to_vec();

    let replica_ids: Vec<String> = REPLICA_ID_SUFFIXES
        .iter()
        .map(|s| format!("{block_id}{s}"))
        .collect();
    // Replica output nets, one triple per original output
    let replica_nets: Vec<[String; 3]> = outputs
        .iter()
        .map(|out| std::array::from_fn(|k| format!("{out}{}", REPLICA_NET_SUFFIXES[k])))
        .collect();

    // Refuse before mutating anything if a fresh name is already taken
    for id in &replica_ids {
        if graph.node(id).is_some() {
            return Err(GraphError::DuplicateId(id.clone()));
        }
    }
    for nets in &replica_nets {
        for net in nets {
            if graph.contains_net(net) {
                return Err(GraphError::DuplicateId(net.clone()));
            }
        }
    }
    for j in 0..outputs.len() {
        for k in 0..3 {
            let and_id = format!("{}_and{j}", replica_ids[k]);
            if graph.node(&and_id).is_some() || graph.contains_net(&format!("{and_id}_o")) {
                return Err(GraphError::DuplicateId(and_id));
            }
        }
        let or_id = format!("{}_or{j}", replica_ids[0]);
        if graph.node(&or_id).is_some() {
            return Err(GraphError::DuplicateId(or_id));
        }
    }

    // Remove the original; its output nets stay behind for the voters to drive
    graph.remove_block(block_id);

    let input_refs: Vec<&str> = inputs.iter().map(String::as_str).collect();
    for (k, id) in replica_ids.iter().enumerate() {
        match &node {
            Node::Cfg { config, .. } => {
                let out = replica_nets[0][k].as_str();
                graph.add_cfg(id, &input_refs, &[out], &config.to_string())?;
            }
            Node::Ari { config, .. } => {
                let outs: Vec<&str> = replica_nets.iter().map(|nets| nets[k].as_str()).collect();
                graph.add_ari(id, &input_refs, &outs, &config.to_string())?;
            }
            Node::Tri { .. } => {
                graph.add_tri(id, input_refs[0], input_refs[1], &replica_nets[0][k])?;
            }
            Node::PrimeIo { .. } | Node::Gate { .. } => unreachable!(),
        }
    }

    // One 2-of-3 voter per original output
    for (j, out) in outputs.iter().enumerate() {
        let pairs = [(0, 1), (0, 2), (1, 2)];
        let mut and_outs = Vec::with_capacity(3);
        for (k, &(l, r)) in pairs.iter().enumerate() {
            let and_id = format!("{}_and{j}", replica_ids[k]);
            let and_out = format!("{and_id}_o");
            graph.add_gate(
                &and_id,
                GateOp::And,
                &[replica_nets[j][l].as_str(), replica_nets[j][r].as_str()],
                &and_out,
            )?;
            and_outs.push(and_out);
        }
        let or_id = format!("{}_or{j}", replica_ids[0]);
        let and_refs: Vec<&str> = and_outs.iter().map(String::as_str).collect();
        graph.add_gate(&or_id, GateOp::Or, &and_refs, out)?;
    }
    Ok(())
}
