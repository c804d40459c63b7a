//! ZeptoAgent CLI - terminal coding agent
//!
//! All CLI logic lives in the `cli` module. This file is just the entry point.

mod cli;

fn main() -> anyhow::Result<()> {
    cli::run()
}
