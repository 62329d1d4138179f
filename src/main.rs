//! Binary for vmgraph

mod cmd;

use clap::Parser;

#[doc(hidden)]
fn main() {
    let cli = cmd::Cli::parse();

    match cli.command {
        cmd::Commands::Show(a) => a.run(),
        cmd::Commands::Simulate(a) => a.run(),
        cmd::Commands::Tmr(a) => a.run(),
    }
}
