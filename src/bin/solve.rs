//! Solver CLI
//!
//! Solves maintenance-planning instances and generates random ones.
//!
//! Subcommands: solve, generate

use coresolve::*;

fn main() -> anyhow::Result<()> {
    log();
    cli::run()
}
