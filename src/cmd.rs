//! Command line interface

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use vmgraph::io::read_vm_file;
use vmgraph::sim::{simulate, simulate_with, SimReport};
use vmgraph::tmr::triplicate;
use vmgraph::Graph;

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Command line arguments
#[derive(Subcommand)]
pub enum Commands {
    /// Show the contents of a netlist graph
    ///
    /// Lists the primary IO, the blocks of each kind with their
    /// configurations, and the registered fan-out nets.
    #[clap()]
    Show(ShowArgs),

    /// Simulate a netlist
    ///
    /// Primary inputs are driven either explicitly with --inputs/--bits or
    /// randomly with --random; the resulting primary output values are
    /// printed afterwards.
    #[clap(alias = "sim")]
    Simulate(SimulateArgs),

    /// Triplicate a block, then simulate
    ///
    /// Applies triple modular redundancy to one block and runs the same
    /// simulation flow on the rewritten graph.
    #[clap()]
    Tmr(TmrArgs),
}

fn read_graph(path: &Path) -> Graph {
    match read_vm_file(path) {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("Failed to read {}: {}", path.display(), err);
            process::exit(1);
        }
    }
}

/// How to drive the primary inputs before simulation
#[derive(Args)]
pub struct DriveArgs {
    /// Comma-separated primary input names
    #[arg(short = 'i', long)]
    inputs: Option<String>,

    /// Bit string, one bit per input name
    #[arg(short = 'b', long)]
    bits: Option<String>,

    /// Drive all primary inputs with random bits
    #[arg(long)]
    random: bool,

    /// Seed for random input generation
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

impl DriveArgs {
    fn run(&self, graph: &mut Graph) -> SimReport {
        match (&self.inputs, &self.bits) {
            (Some(inputs), Some(bits)) => {
                let names: Vec<&str> = inputs.split(',').map(str::trim).collect();
                match simulate_with(graph, &names, bits) {
                    Ok(report) => report,
                    Err(err) => {
                        eprintln!("Cannot apply inputs: {}", err);
                        process::exit(1);
                    }
                }
            }
            (None, None) => {
                if self.random {
                    graph.set_random_inputs(self.seed);
                }
                simulate(graph)
            }
            _ => {
                eprintln!("--inputs and --bits must be given together");
                process::exit(1);
            }
        }
    }
}

fn report_results(graph: &Graph, report: &SimReport) {
    println!("Primary IO values:");
    for (id, dir, value) in graph.prime_ios() {
        let value = match value {
            Some(v) => v.to_string(),
            None => "-".to_string(),
        };
        println!("\t{} {} = {}", dir, id, value);
    }
    if !report.is_clean() {
        print!("{}", report);
        process::exit(1);
    }
}

/// Command arguments for showing a netlist
#[derive(Args)]
pub struct ShowArgs {
    /// Netlist to show
    file: PathBuf,
}

impl ShowArgs {
    pub fn run(&self) {
        let graph = read_graph(&self.file);
        print!("{}", graph);
    }
}

/// Command arguments for simulation
#[derive(Args)]
pub struct SimulateArgs {
    /// Netlist to simulate
    file: PathBuf,

    #[command(flatten)]
    drive: DriveArgs,
}

impl SimulateArgs {
    pub fn run(&self) {
        let mut graph = read_graph(&self.file);
        let report = self.drive.run(&mut graph);
        report_results(&graph, &report);
    }
}

/// Command arguments for the TMR rewrite
#[derive(Args)]
pub struct TmrArgs {
    /// Netlist to rewrite
    file: PathBuf,

    /// Block to triplicate
    #[arg(short = 'B', long)]
    block: String,

    #[command(flatten)]
    drive: DriveArgs,
}

impl TmrArgs {
    pub fn run(&self) {
        let mut graph = read_graph(&self.file);
        if let Err(err) = triplicate(&mut graph, &self.block) {
            eprintln!("Cannot triplicate {}: {}", self.block, err);
            process::exit(1);
        }
        let report = self.drive.run(&mut graph);
        report_results(&graph, &report);
    }
}
