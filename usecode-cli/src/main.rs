//! usecode - usecode disassembly to Lua scaffold converter
//! Command-line interface for the usecode scaffold converter

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usecode_core::parser::parse_hex_word;
use usecode_core::{
    Config, Diagnostics, OpcodeTable, Resolver, Severity, Tables, convert, parse,
};

#[derive(Parser)]
#[command(name = "usecode")]
#[command(author = "Silvano Neto")]
#[command(version = "2026.1.16")]
#[command(about = "Usecode disassembly to annotated Lua scaffolds", long_about = None)]
struct Cli {
    /// Show debug output from the converter
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert functions to Lua scaffold files
    Convert {
        /// Disassembly listing
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Directory for the generated files
        #[arg(value_name = "OUTPUT_DIR")]
        output_dir: PathBuf,

        /// Function number in hex (repeatable); all functions when omitted
        #[arg(short = 'f', long = "function", value_name = "HEX", value_parser = parse_func_number)]
        functions: Vec<u16>,

        /// Configuration file (default: ./usecode.toml if present)
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },

    /// Print the scaffold of one function
    Show {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Function number in hex
        #[arg(value_name = "FUNC_HEX", value_parser = parse_func_number)]
        function: u16,

        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },

    /// Summarize every function in a listing
    Dump {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Print the parse result as JSON
        #[arg(long)]
        json: bool,

        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },

    /// Parse and resolve a listing, reporting diagnostics
    Check {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },

    /// List the effective intrinsic table
    Intrinsics {
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Convert {
            input,
            output_dir,
            functions,
            config,
        } => convert_command(&input, &output_dir, &functions, config.as_deref()).and_then(
            |converted| {
                if converted == 0 {
                    bail!("no functions converted");
                }
                Ok(())
            },
        ),
        Commands::Show {
            input,
            function,
            config,
        } => show_command(&input, function, config.as_deref()),
        Commands::Dump {
            input,
            json,
            config,
        } => dump_command(&input, json, config.as_deref()),
        Commands::Check { input, config } => check_command(&input, config.as_deref()),
        Commands::Intrinsics { config } => intrinsics_command(config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "usecode=debug,usecode_core=debug"
    } else {
        "usecode=info,usecode_core=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_func_number(text: &str) -> Result<u16, String> {
    parse_hex_word(text).ok_or_else(|| format!("'{}' is not a hex function number", text))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_path(path)?,
        None => Config::discover(&std::env::current_dir()?)?,
    };
    Ok(config)
}

fn read_listing(input: &Path) -> anyhow::Result<String> {
    fs::read_to_string(input).with_context(|| format!("cannot read {}", input.display()))
}

fn print_diagnostics(scope: &str, diagnostics: &Diagnostics) {
    for diagnostic in diagnostics {
        let prefix = match diagnostic.severity() {
            Severity::Warning => "warning:".yellow().bold(),
            Severity::Note => "note:".cyan().bold(),
        };
        eprintln!("{} [{}] {}", prefix, scope, diagnostic);
    }
}

// ============================================================================
// Conversion commands
// ============================================================================

/// Returns the number of functions written
fn convert_command(
    input: &Path,
    output_dir: &Path,
    functions: &[u16],
    config: Option<&Path>,
) -> anyhow::Result<usize> {
    let source = read_listing(input)?;
    let config = load_config(config)?;
    let intrinsics = config.intrinsic_table()?;
    let tables = Tables::new(OpcodeTable::standard(), &intrinsics);

    println!(
        "{} {}",
        "Converting".green().bold(),
        input.display().to_string().cyan()
    );

    let conversion = convert(&source, &tables, &config, functions)?;
    print_diagnostics("file", &conversion.diagnostics);
    for number in &conversion.missing {
        eprintln!(
            "{} function {:04X} not found in listing",
            "warning:".yellow().bold(),
            number
        );
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create {}", output_dir.display()))?;
    for unit in &conversion.units {
        let path = output_dir.join(&unit.file_name);
        fs::write(&path, &unit.text).with_context(|| format!("cannot write {}", path.display()))?;
        print_diagnostics(&format!("{:04X}", unit.func_number), &unit.diagnostics);
        tracing::debug!("wrote {}", path.display());
    }

    println!(
        "{} {} function(s)",
        " Converted".green().bold(),
        conversion.units.len()
    );
    let unresolved = conversion.unresolved_count();
    if unresolved > 0 {
        println!("{} {} unresolved reference(s)", "      Note".cyan().bold(), unresolved);
    }

    Ok(conversion.units.len())
}

fn show_command(input: &Path, function: u16, config: Option<&Path>) -> anyhow::Result<()> {
    let source = read_listing(input)?;
    let config = load_config(config)?;
    let intrinsics = config.intrinsic_table()?;
    let tables = Tables::new(OpcodeTable::standard(), &intrinsics);

    let conversion = convert(&source, &tables, &config, &[function])?;
    let Some(unit) = conversion.units.first() else {
        bail!("function {:04X} not found in {}", function, input.display());
    };
    print!("{}", unit.text);
    Ok(())
}

// ============================================================================
// Inspection commands
// ============================================================================

fn dump_command(input: &Path, json: bool, config: Option<&Path>) -> anyhow::Result<()> {
    let source = read_listing(input)?;
    let mut result = parse(&source)?;

    if json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    let config = load_config(config)?;
    let intrinsics = config.intrinsic_table()?;
    let resolver = Resolver::new(&intrinsics);
    println!(
        "{}",
        "func  argc  locals  externs  segments  strings  instructions  calls".bold()
    );
    for function in result.iter_mut() {
        resolver.resolve(function);
        let calls = resolver.call_sites(function).len();
        println!(
            "{:04X}  {:>4}  {:>6}  {:>7}  {:>8}  {:>7}  {:>12}  {:>5}",
            function.func_number,
            function.argc,
            function.localc,
            function.externs.len(),
            function.data_segments.len(),
            function.string_segments().count(),
            function.instructions.len(),
            calls
        );
    }
    println!("{} function(s)", result.len());
    Ok(())
}

fn check_command(input: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let source = read_listing(input)?;
    let config = load_config(config)?;
    let intrinsics = config.intrinsic_table()?;

    println!(
        "{} {}",
        "Checking".green().bold(),
        input.display().to_string().cyan()
    );

    let mut result = parse(&source)?;
    let resolver = Resolver::new(&intrinsics);
    let mut warnings = result.diagnostics().count(Severity::Warning);
    let mut notes = result.diagnostics().count(Severity::Note);
    print_diagnostics("file", result.diagnostics());

    for function in result.iter_mut() {
        let scope = format!("{:04X}", function.func_number);
        let report = resolver.resolve(function);
        let resolved = report.diagnostics();

        print_diagnostics(&scope, &function.diagnostics);
        print_diagnostics(&scope, &resolved);
        warnings += function.diagnostics.count(Severity::Warning) + resolved.count(Severity::Warning);
        notes += function.diagnostics.count(Severity::Note) + resolved.count(Severity::Note);
    }

    println!(
        "{} {} function(s), {} warning(s), {} note(s)",
        "    Finished".green().bold(),
        result.len(),
        warnings,
        notes
    );
    Ok(())
}

fn intrinsics_command(config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let table = config.intrinsic_table()?;
    for entry in table.sorted() {
        println!(
            "{}  {:<32} {}  {}",
            format!("{:04X}", entry.id).cyan(),
            entry.name,
            entry.params,
            entry.description
        );
    }
    println!("{} intrinsic(s)", table.len());
    Ok(())
}
