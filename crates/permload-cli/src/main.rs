//! permload seeds a Cloud Foundry deployment with orgs, spaces, apps and
//! users for permission-system load tests.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

mod commands;

/// `RUST_LOG` wins over the config's `log_level`.
fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn print_help() {
    println!("permload: seed a Cloud Foundry deployment for permission load tests");
    println!();
    println!("Usage: permload <command> <config.json>");
    println!();
    println!("Commands:");
    println!("  run <config>        Seed the configured Cloud Controller");
    println!("  dry-run <config>    Seed an in-memory platform and print the report");
    println!("  validate <config>   Check the config file and exit");
    println!("  help                Show this help message");
}

fn config_path(args: &[String]) -> PathBuf {
    match args.get(2) {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("Usage: permload {} <config.json>", args[1]);
            std::process::exit(2);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_help();
        std::process::exit(2);
    }

    let report = match args[1].as_str() {
        "run" | "dry-run" => {
            let config = commands::load(&config_path(&args))?;
            init_tracing(&config.log_level);
            if args[1] == "run" {
                commands::run(&config).await?
            } else {
                commands::dry_run(&config).await?
            }
        }
        "validate" => {
            commands::load(&config_path(&args))?;
            println!("Config is valid");
            return Ok(());
        }
        "--help" | "-h" | "help" => {
            print_help();
            return Ok(());
        }
        other => {
            eprintln!("Unknown command: {}. Use 'permload help' for usage.", other);
            std::process::exit(2);
        }
    };

    commands::print_report(&report)?;
    // Completed with isolated failures.
    if report.failed_units() > 0 {
        std::process::exit(3);
    }
    Ok(())
}
