use thiserror::Error;

/// Errors reported by graph construction, evaluation and rewriting
///
/// Builder errors are local: the offending call is a no-op and the graph
/// remains valid. Evaluator errors abort a single block's evaluation chain
/// and are collected in the simulation report. No error invalidates the
/// graph object.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum GraphError {
    /// A node id, driven net or fan-out key is declared a second time
    #[error("identifier `{0}` already exists")]
    DuplicateId(String),

    /// A constructor received the wrong number of inputs or outputs
    #[error("block `{id}` expects {expected} {what}, got {got}")]
    InvalidArity {
        /// Block being constructed
        id: String,
        /// Which list was wrong ("inputs" or "outputs")
        what: &'static str,
        /// Required length
        expected: usize,
        /// Length received
        got: usize,
    },

    /// The hex configuration length does not match the block's input count
    #[error("block `{id}` with {inputs} inputs needs {expected} config digits, got {got}")]
    ConfigLengthMismatch {
        /// Block being constructed
        id: String,
        /// Number of inputs of the block
        inputs: usize,
        /// Required hex length
        expected: usize,
        /// Hex length received
        got: usize,
    },

    /// The configuration string contains a non-hexadecimal character
    #[error("configuration string `{0}` is not hexadecimal")]
    MalformedConfig(String),

    /// A referenced net is neither a primary input nor any block's output
    #[error("net `{0}` is driven by no block and is not a primary input")]
    UnknownNet(String),

    /// No node with this identifier exists in the graph
    #[error("no node named `{0}` in the graph")]
    UnknownId(String),

    /// A primary input was reached during evaluation without a value
    #[error("primary input `{0}` has no value")]
    MissingPrimaryInput(String),

    /// Evaluation re-entered a block that is still being evaluated
    #[error("combinational cycle through block `{0}`")]
    CombinationalCycle(String),

    /// `set_input` targeted a node that is not a writable primary input
    #[error("`{0}` is not a writable primary input")]
    SetOnNonInput(String),

    /// `triplicate` targeted a primary IO or a voter gate
    #[error("block `{0}` cannot be triplicated")]
    NotTriplicatable(String),

    /// A simulation pattern does not line up with its input list
    #[error("bad input pattern: {0}")]
    PatternMismatch(String),

    /// The netlist text could not be understood
    #[error("netlist syntax: {0}")]
    BadNetlist(String),
}
