//! cmmc compiler driver
//!
//! Front end for a small C-like language.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::debug;

use cmmc::utils::{Diagnostic, Report};
use cmmc::{compile_source, Compilation};

/// cmmc Compiler
#[derive(Parser, Debug)]
#[command(name = "cmmc")]
#[command(version = "0.1.0")]
#[command(about = "Front end for a small C-like language")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file (.cmm)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Kind of output to produce
    #[arg(long, value_enum, default_value_t = OutputType::Exe)]
    output_type: OutputType,

    /// Print the token vector
    #[arg(long)]
    emit_tokens: bool,

    /// Print the syntax tree
    #[arg(long)]
    emit_ast: bool,

    /// How diagnostics are printed
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    message_format: MessageFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file
    Build {
        /// Input source file
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a source file for errors
    Check {
        /// Input source file
        input: PathBuf,
    },
    /// Print version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputType {
    Asm,
    Object,
    Exe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MessageFormat {
    Human,
    Json,
}

/// Everything one compiler run needs to know
#[derive(Debug)]
struct CompileOptions {
    input: PathBuf,
    output: Option<PathBuf>,
    output_type: OutputType,
    emit_tokens: bool,
    emit_ast: bool,
    message_format: MessageFormat,
}

impl CompileOptions {
    fn from_cli(cli: &Cli, input: &Path, output: Option<PathBuf>) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.or_else(|| cli.output.clone()),
            output_type: cli.output_type,
            emit_tokens: cli.emit_tokens,
            emit_ast: cli.emit_ast,
            message_format: cli.message_format,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let options = match &cli.command {
        Some(Commands::Build { input, output }) => CompileOptions::from_cli(&cli, input, output.clone()),
        Some(Commands::Check { input }) => CompileOptions {
            emit_tokens: false,
            emit_ast: false,
            ..CompileOptions::from_cli(&cli, input, None)
        },
        Some(Commands::Version) => {
            println!("cmmc 0.1.0");
            println!("License: Apache-2.0");
            return;
        }
        None => match &cli.input {
            Some(input) => CompileOptions::from_cli(&cli, input, None),
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: cmmc <FILE> or cmmc build <FILE>");
                process::exit(1);
            }
        },
    };

    match run(&options) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Run the front end. `Ok(false)` means the source had a fatal error,
/// which has already been reported.
fn run(options: &CompileOptions) -> Result<bool> {
    let source = fs::read_to_string(&options.input)
        .with_context(|| format!("could not read {}", options.input.display()))?;
    let filename = options.input.display().to_string();
    debug!(
        "compiling {} (output type {:?}, output {:?})",
        filename, options.output_type, options.output
    );

    match compile_source(&source, &filename) {
        Ok(compilation) => {
            report(options, &compilation.program.warnings, None);
            emit(options, &compilation)?;
            Ok(true)
        }
        Err(err) => {
            report(options, &[], Some(&err));
            Ok(false)
        }
    }
}

fn report(options: &CompileOptions, warnings: &[Diagnostic], error: Option<&cmmc::utils::Error>) {
    match options.message_format {
        MessageFormat::Json => println!("{}", Report::new(warnings, error).to_json()),
        MessageFormat::Human => {
            for warning in warnings {
                eprintln!("{}", warning.render());
            }
            if let Some(err) = error {
                eprintln!("{}", Diagnostic::from(err).render());
            }
        }
    }
}

/// Write the requested dumps to the output file, or stdout without one
fn emit(options: &CompileOptions, compilation: &Compilation) -> Result<()> {
    let mut out = String::new();
    if options.emit_tokens {
        for token in &compilation.tokens {
            out.push_str(&format!("{}: {}\n", token.pos, token.kind));
        }
    }
    if options.emit_ast {
        let program = &compilation.program;
        out.push_str(&program.ast.dump(&program.roots));
    }
    if out.is_empty() {
        return Ok(());
    }

    match &options.output {
        Some(path) => fs::write(path, out).with_context(|| format!("could not write {}", path.display())),
        None => {
            print!("{}", out);
            Ok(())
        }
    }
}
