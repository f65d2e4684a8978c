mod app;
mod cli;
mod render;
mod settings;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    app::run(cli::Cli::parse())
}
