use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tracing::debug;
use tracing_subscriber::EnvFilter;

use stack_vm::asm::{self, dump};
use stack_vm::config::RuntimeConfig;
use stack_vm::debugger;
use stack_vm::runner::{self, RunError};
use stack_vm::vm::{VM, Word, bytecode};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum ListingFormatArg {
    #[default]
    Human,
    Json,
}

#[derive(Parser)]
#[command(name = "svm")]
#[command(about = "A small stack-based bytecode virtual machine", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bytecode program
    Run {
        /// The program file to run
        file: PathBuf,

        /// Operand stack capacity in words
        #[arg(long)]
        stack_size: Option<usize>,

        /// Return stack capacity in words
        #[arg(long)]
        return_stack_size: Option<usize>,

        /// Configuration file (defaults to svm.toml in the working directory)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Execution timeout in seconds (0 = no timeout)
        #[arg(long)]
        timeout: Option<u64>,

        /// Log every executed instruction to stderr
        #[arg(long)]
        trace: bool,
    },
    /// Assemble a source file into a bytecode program
    Asm {
        /// The assembly source file
        src: PathBuf,

        /// Output file (defaults to the source path with a .bin extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print a listing of a bytecode program
    Disasm {
        /// The program file to list
        file: PathBuf,

        /// Listing format (human or json)
        #[arg(long, value_enum, default_value = "human")]
        format: ListingFormatArg,
    },
    /// Debug a bytecode program with TUI debugger
    Debug {
        /// The program file to debug
        file: PathBuf,

        /// Configuration file (defaults to svm.toml in the working directory)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            stack_size,
            return_stack_size,
            config,
            timeout,
            trace,
        } => load_config(config.as_deref()).and_then(|mut config| {
            if let Some(size) = stack_size {
                config.vm.stack_size = size;
            }
            if let Some(size) = return_stack_size {
                config.vm.return_stack_size = size;
            }
            if let Some(secs) = timeout {
                config.run.timeout = secs;
            }
            config.run.trace |= trace;

            init_logging(config.run.trace);
            run_file(&file, &config)
        }),
        Commands::Asm { src, output } => {
            init_logging(false);
            let output = output.unwrap_or_else(|| src.with_extension("bin"));
            assemble_file(&src, &output)
        }
        Commands::Disasm { file, format } => {
            init_logging(false);
            disassemble_file(&file, format)
        }
        Commands::Debug { file, config } => load_config(config.as_deref()).and_then(|config| {
            let words = read_program(&file)?;
            debugger::run_debugger(words, config.vm)
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Logs go to stderr; `RUST_LOG` takes precedence over `--trace`.
fn init_logging(trace: bool) {
    let default = if trace { "stack_vm=trace,svm=trace" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig, String> {
    match path {
        Some(path) => RuntimeConfig::load(path),
        None => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            RuntimeConfig::discover(&cwd)
        }
    }
}

fn read_program(path: &Path) -> Result<Vec<Word>, String> {
    let data = fs::read(path)
        .map_err(|e| format!("error loading file {}: {}", path.display(), e))?;
    bytecode::decode(&data).map_err(|e| format!("error reading program: {}", e))
}

fn run_file(path: &Path, config: &RuntimeConfig) -> Result<(), String> {
    println!("stack-vm ({})", env!("CARGO_PKG_VERSION"));

    let words = read_program(path)?;
    debug!(file = %path.display(), words = words.len(), "program decoded");

    let mut vm = VM::new_with_config(config.vm, Box::new(io::stdout()))
        .map_err(|e| format!("error loading program: {}", e))?;
    vm.load_program(&words)
        .map_err(|e| format!("error loading program: {}", e))?;

    let cancel = if config.run.timeout > 0 {
        runner::cancel_after(Duration::from_secs(config.run.timeout))
    } else {
        Arc::new(AtomicBool::new(false))
    };

    let result = runner::run_supervised(&mut vm, &cancel, config.run.trace);

    match result {
        Ok(summary) => {
            debug!(steps = summary.steps, "run finished");
            io::stdout()
                .flush()
                .map_err(|e| format!("error running program: output error: {}", e))
        }
        Err(RunError::Cancelled { steps }) => Err(format!(
            "error running program: execution timed out after {} seconds ({} steps)",
            config.run.timeout, steps
        )),
        Err(e) => Err(format!("error running program: {}", e)),
    }
}

fn assemble_file(src: &Path, output: &Path) -> Result<(), String> {
    let source = fs::read_to_string(src)
        .map_err(|e| format!("error loading file {}: {}", src.display(), e))?;
    let words = asm::assemble(&source)
        .map_err(|e| {
            asm::render_diagnostic(&src.display().to_string(), &source, &e)
                .trim_end()
                .to_string()
        })?;
    if words.is_empty() {
        return Err(format!("error: {} assembles to an empty program", src.display()));
    }

    fs::write(output, bytecode::encode(&words))
        .map_err(|e| format!("error writing {}: {}", output.display(), e))?;
    debug!(output = %output.display(), words = words.len(), "program assembled");
    Ok(())
}

fn disassemble_file(path: &Path, format: ListingFormatArg) -> Result<(), String> {
    let words = read_program(path)?;
    let lines = dump::disassemble(&words);
    match format {
        ListingFormatArg::Human => print!("{}", dump::render_human(&lines)),
        ListingFormatArg::Json => println!("{}", dump::render_json(&lines)),
    }
    Ok(())
}
