//! veribound command line
//!
//! `check` verifies a class model JSON file, `dump` summarizes one, and
//! the hidden `serve` subcommand is the worker role the manager launches
//! by re-executing this binary.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::error;

use veribound::model::{AccessModifier, ClassModel};
use veribound::transport::DEFAULT_CAPACITY;
use veribound::verifier::{assigned_names, Verifier};
use veribound::worker::{serve_session, ServeOptions};

#[derive(Parser)]
#[command(
    name = "veribound",
    version,
    about = "Bounded contract verification for class models"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify the contracts of a class model
    Check {
        /// Class model JSON file
        file: PathBuf,

        /// Branch/loop/call depth bound
        #[arg(long, default_value_t = 4)]
        max_depth: usize,

        /// Wall-clock budget in seconds
        #[arg(long, default_value_t = 30)]
        max_seconds: u64,

        /// Path to the z3 binary
        #[arg(long)]
        z3: Option<String>,

        /// Dump solver scripts to stderr
        #[arg(long)]
        verbose: bool,
    },
    /// Print a summary of a class model
    Dump {
        /// Class model JSON file
        file: PathBuf,

        /// Re-emit the parsed model as pretty JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Worker loop, launched by the host process
    #[command(hide = true)]
    Serve {
        #[arg(long)]
        session: String,

        #[arg(long, default_value_t = 30_000)]
        idle_ms: u64,

        #[arg(long, default_value_t = DEFAULT_CAPACITY)]
        capacity: usize,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    match cli.command {
        Command::Check {
            file,
            max_depth,
            max_seconds,
            z3,
            verbose,
        } => {
            let model = load_model(&file)?;
            let mut verifier = Verifier::new()
                .with_max_depth(max_depth)
                .with_max_duration(Duration::from_secs(max_seconds))
                .with_verbose(verbose);
            if let Some(path) = &z3 {
                verifier = verifier.with_z3_path(path);
            }
            if !verifier.is_solver_available() {
                return Err("z3 not found; install it or pass --z3 <path>".into());
            }
            let result = verifier.verify(&model)?;
            println!("{}: {result}", model.name());
            for diagnostic in model.unsupported() {
                println!("  note: {diagnostic}");
            }
            Ok(if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Dump { file, json } => {
            let model = load_model(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&model)?);
            } else {
                dump_model(&model);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve {
            session,
            idle_ms,
            capacity,
        } => {
            let options = ServeOptions {
                capacity,
                idle_timeout: Duration::from_millis(idle_ms),
                ..ServeOptions::default()
            };
            serve_session(&session, &options)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_model(path: &Path) -> Result<ClassModel, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let model: ClassModel = serde_json::from_str(&text)
        .map_err(|e| format!("invalid class model in {}: {e}", path.display()))?;
    Ok(model)
}

fn dump_model(model: &ClassModel) {
    println!("class {}", model.name());
    for field in model.fields() {
        println!("  field {}: {}", field.name, field.ty);
    }
    for property in model.properties() {
        println!("  property {}: {}", property.name, property.ty);
    }
    for invariant in model.invariants() {
        println!("  invariant {}", invariant.text);
    }
    for method in model.methods() {
        let access = match method.access {
            AccessModifier::Public => "public",
            AccessModifier::Private => "private",
        };
        let params: Vec<String> = method
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.ty))
            .collect();
        println!(
            "  {access} {}({}) -> {}",
            method.name,
            params.join(", "),
            method.return_type
        );
        for require in &method.requires {
            println!("    require {}", require.text);
        }
        for ensure in &method.ensures {
            println!("    ensure {}", ensure.text);
        }
        let touched = assigned_names(&method.body);
        if !touched.is_empty() {
            println!("    assigns {}", touched.join(", "));
        }
    }
    for diagnostic in model.unsupported() {
        println!("  {diagnostic}");
    }
}
