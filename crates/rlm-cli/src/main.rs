//! `rlm`: run code snippets against a workspace that persists between invocations.

use std::{
    io::{self, Read, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Args, Parser, Subcommand};
use rlm::{
    DEFAULT_MAX_OUTPUT_CHARS, DEFAULT_STATE_PATH, ExecOptions, RlmError, Workspace, logging,
    repo_index::DEFAULT_MAX_FILE_SIZE_MB,
};

#[derive(Debug, Parser)]
#[command(name = "rlm", version)]
#[command(about = "Persistent snippet workspace for exploring large documents and repositories", long_about = None)]
struct Cli {
    /// Path to the state file
    #[arg(long, global = true, env = "RLM_STATE", default_value = DEFAULT_STATE_PATH)]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Initialise state from a context file
    Init(InitArgs),
    /// Initialise state from a code repository (indexes all files)
    InitRepo(InitRepoArgs),
    /// Show current state summary
    Status(StatusArgs),
    /// Delete the current state file
    Reset,
    /// Export buffers to a text file
    ExportBuffers(ExportArgs),
    /// Execute code with persisted state
    Exec(ExecArgs),
}

#[derive(Debug, Args)]
struct InitArgs {
    /// Path to the context file
    context: PathBuf,
    /// Optional cap on bytes read from the context file
    #[arg(long)]
    max_bytes: Option<u64>,
}

#[derive(Debug, Args)]
struct InitRepoArgs {
    /// Path to the repository root directory
    repo_path: PathBuf,
    /// Mark files larger than this many MB as too large
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE_MB)]
    max_file_size_mb: u64,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// List persisted variable names
    #[arg(long)]
    show_vars: bool,
}

#[derive(Debug, Args)]
struct ExportArgs {
    /// Output file path
    out: PathBuf,
}

#[derive(Debug, Args)]
struct ExecArgs {
    /// Inline code; read from stdin when omitted
    #[arg(short, long)]
    code: Option<String>,
    /// Truncate stdout and stderr to this many characters
    #[arg(long, default_value_t = DEFAULT_MAX_OUTPUT_CHARS, allow_negative_numbers = true)]
    max_output_chars: i64,
    /// Report variables that could not be persisted on stderr
    #[arg(long, alias = "warn-unpickleable")]
    warn_unpersistable: bool,
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> Result<(), RlmError> {
    let workspace = Workspace::new(cli.state);
    match cli.command {
        Command::Init(args) => {
            let report = workspace.init_from_file(&args.context, args.max_bytes)?;
            print!("{report}");
        }
        Command::InitRepo(args) => {
            println!("Indexing repository: {}", args.repo_path.display());
            println!("This may take a moment for large repositories...");
            let report = workspace.init_repo(&args.repo_path, args.max_file_size_mb)?;
            println!();
            print!("{report}");
            println!();
            println!("Next steps:");
            println!("  rlm status  # View index status");
            println!("  rlm exec -c 'print(repo_index)' # Explore index");
        }
        Command::Status(args) => {
            let report = workspace.status(args.show_vars)?;
            print!("{report}");
        }
        Command::Reset => {
            let path = workspace.state_path().display();
            if workspace.reset()? {
                println!("Deleted state: {path}");
            } else {
                println!("No state to delete at: {path}");
            }
        }
        Command::ExportBuffers(args) => {
            let count = workspace.export_buffers(&args.out)?;
            println!("Wrote {count} buffers to: {}", args.out.display());
        }
        Command::Exec(args) => {
            let code = match args.code {
                Some(code) => code,
                None => {
                    let mut code = String::new();
                    io::stdin().read_to_string(&mut code).map_err(|source| RlmError::Io {
                        path: PathBuf::from("<stdin>"),
                        source,
                    })?;
                    code
                }
            };
            let options = ExecOptions {
                max_output_chars: args.max_output_chars,
                warn_unpersistable: args.warn_unpersistable,
            };
            let report = workspace.exec(&code, options)?;
            // a closed pipe on either stream is not a workspace fault
            if !report.stdout.is_empty() {
                let _ = io::stdout().write_all(report.stdout.as_bytes());
            }
            if !report.stderr.is_empty() {
                let _ = io::stderr().write_all(report.stderr.as_bytes());
            }
        }
    }
    Ok(())
}
