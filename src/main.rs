use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

mod code_actions;
mod commands;
mod config;
mod create_procedure;
mod documents;
mod handlers;
mod indexer;
mod language;
mod object;
mod parser;
mod procedure;
mod protocol;
mod references;
mod resolver;
mod server;
mod source_handler;
mod syntax;
mod watcher;
mod workspace;

use indexer::Indexer;
use server::run_server;

#[derive(Parser, Debug)]
#[command(name = "al-code-actions")]
#[command(about = "Handler references and missing-procedure quick fixes for AL (Business Central)")]
struct Args {
    /// Index an AL project folder, report what was found and exit
    #[arg(short, long, value_name = "DIR")]
    project: Option<PathBuf>,

    /// Serve LSP over stdio (what happens without --project)
    #[arg(long)]
    lsp: bool,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // stderr only, stdout carries the protocol
    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    if let Some(project) = args.project {
        info!("Indexing project: {}", project.display());
        let mut indexer = Indexer::new();
        indexer.index_directory(&project)?;
        info!("Indexed {} objects", indexer.object_count());

        match workspace::find_app_source_prefixes(&project) {
            Some(prefixes) => info!("Event publisher prefixes: {}", prefixes.join(", ")),
            None => info!("No AppSourceCop prefixes"),
        }
    } else {
        run_server()?;
    }

    Ok(())
}
