//! Distributed dispatch - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use distributed_dispatch::builtins::{builtin_accessors, builtin_registry};
use distributed_dispatch::runtime::dispatch::DistributedAccessor;
use distributed_dispatch::runtime::registry::environment_for;
use distributed_dispatch::runtime::value::TypeDescriptor;
use distributed_dispatch::util::config::load_config;
use distributed_dispatch::util::logger::{self, LogLevel};
use distributed_dispatch::{run_target_in, NAME, VERSION};

/// Run distributed targets locally through the dispatch bridge
#[derive(Parser, Debug)]
#[command(name = "distributed-dispatch")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dispatch a builtin target and print its result
    Run {
        /// Target name
        #[arg(value_name = "TARGET")]
        target: String,

        /// Arguments as a JSON array
        #[arg(short, long, default_value = "[]")]
        args: String,
    },

    /// List builtin targets
    List,

    /// Show the generic environment of a target
    Env {
        /// Target name
        #[arg(value_name = "TARGET")]
        target: String,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.log.level
    };
    logger::init_with_level(level);

    if args.verbose {
        eprintln!("{} version: {}", NAME, VERSION);
        eprintln!("Host: {}", std::env::consts::OS);
    }

    let verbose = args.verbose;
    match args.command {
        Commands::Run { target, args } => {
            let report = run_target_in(&builtin_registry(), &target, &args, &config)?;
            println!("{}", report.value);
            if verbose {
                eprintln!(
                    "steps={} frames allocated={} released={} peak_live={}",
                    report.steps,
                    report.stats.allocations,
                    report.stats.releases,
                    report.stats.peak_live
                );
            }
        }
        Commands::List => {
            for (name, accessor) in builtin_accessors() {
                println!("{:<16} frame_size={}", name, accessor.frame_size());
            }
        }
        Commands::Env { target } => {
            let registry = builtin_registry();
            match environment_for(&registry, target.as_bytes()) {
                Some(environment) => match environment.downcast_ref::<Vec<TypeDescriptor>>() {
                    Some(params) => {
                        let names: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                        println!("{}: <{}>", target, names.join(", "));
                    }
                    None => println!("{}: generic environment present", target),
                },
                None => println!("{}: no generic environment", target),
            }
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}
