use anyhow::Result;

mod cli;
mod console;
mod simulation;

fn main() -> Result<()> {
    cli::execute()
}
