// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pack {
            name,
            output,
            base,
            modules,
            properties,
            keep_structure,
            trust_modules,
        } => commands::pack(
            &name,
            &output,
            &base,
            &modules,
            &properties,
            keep_structure,
            trust_modules,
        ),
        Commands::Install {
            name,
            root,
            base,
            modules,
            properties,
            keep_structure,
            trust_modules,
            update_rule,
        } => commands::install(
            &name,
            &root,
            &base,
            &modules,
            &properties,
            keep_structure,
            trust_modules,
            update_rule,
        ),
        Commands::Manifest {
            name,
            output,
            base,
            modules,
            properties,
            keep_structure,
            trust_modules,
        } => commands::manifest(
            &name,
            output.as_deref(),
            &base,
            &modules,
            &properties,
            keep_structure,
            trust_modules,
        ),
        Commands::Extract {
            package,
            root,
            update_rule,
        } => commands::extract(&package, &root, update_rule),
        Commands::Verify { package } => commands::verify(&package),
        Commands::Show { package, raw } => commands::show(&package, raw),
        Commands::Remove { name, root } => commands::remove(&name, &root),
    }
}
