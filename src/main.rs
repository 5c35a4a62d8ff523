use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use eyre::{bail, WrapErr};
use tracing_subscriber::{prelude::*, EnvFilter};

use rvdecode::tablegen::{
    fixtures, Artifact, CompiledTable, DispatchPolicy, RenderOptions, Target, TrialOrder,
};
use rvdecode::{compile_file, parse_word, selftest, write_artifacts};

/// Compiles riscv-opcodes instruction descriptions into decoder tables.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log pipeline details (`RUST_LOG` takes precedence)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the identifiers, decoder and executor sources
    Generate(GenerateArgs),
    /// Decode instruction words with the compiled tables
    Decode(DecodeArgs),
    /// Dump the compiled tables as JSON
    Inspect(InspectArgs),
    /// Check the compiled tables against every canonical encoding
    Selftest(SelftestArgs),
}

#[derive(Args, Debug)]
struct TableArgs {
    /// Path to `instr_dict.yaml` or `instr_dict.json` produced by riscv-opcodes
    #[arg(value_name = "DESCRIPTION")]
    description: PathBuf,

    /// Probe order for opcodes with several masks: specificity or numeric-descending
    #[arg(long, default_value = "specificity")]
    trial_order: TrialOrder,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("outputs")
        .required(true)
        .multiple(true)
        .args(["enum_path", "decoder", "exec"])
))]
struct GenerateArgs {
    #[command(flatten)]
    table: TableArgs,

    /// Path to the generated header with the instruction identifiers
    #[arg(long = "enum", value_name = "PATH")]
    enum_path: Option<PathBuf>,

    /// Path to the generated decoder implementation
    #[arg(long, value_name = "PATH")]
    decoder: Option<PathBuf>,

    /// Path to the generated executor callback table
    #[arg(long, value_name = "PATH")]
    exec: Option<PathBuf>,

    /// Output language: cpp or rust
    #[arg(long, default_value = "cpp")]
    target: Target,

    /// Decoder shape: switch or flat
    #[arg(long, default_value = "switch")]
    dispatch: DispatchPolicy,

    /// Namespace wrapping the generated C++
    #[arg(long, default_value = "yarvs")]
    namespace: String,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    #[command(flatten)]
    table: TableArgs,

    /// Hexadecimal instruction words
    #[arg(value_name = "WORD", required = true)]
    words: Vec<String>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    #[command(flatten)]
    table: TableArgs,

    /// Pretty-print the JSON
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct SelftestArgs {
    /// Description to check; the built-in RV64 description when omitted
    #[arg(value_name = "DESCRIPTION")]
    description: Option<PathBuf>,
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate(args) => generate(args),
        Commands::Decode(args) => decode(args),
        Commands::Inspect(args) => inspect(args),
        Commands::Selftest(args) => run_selftest(args),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let log_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let log_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .with_filter(log_filter);
    tracing_subscriber::registry().with(log_layer).init();
}

fn compile(args: &TableArgs) -> eyre::Result<CompiledTable> {
    compile_file(&args.description, args.trial_order)
}

fn generate(args: GenerateArgs) -> eyre::Result<()> {
    let table = compile(&args.table)?;
    let outputs: Vec<(Artifact, PathBuf)> = [
        (Artifact::Identifiers, args.enum_path),
        (Artifact::Decoder, args.decoder),
        (Artifact::Executor, args.exec),
    ]
    .into_iter()
    .filter_map(|(artifact, path)| Some((artifact, path?)))
    .collect();
    let options = RenderOptions {
        target: args.target,
        dispatch: args.dispatch,
        namespace: args.namespace,
    };
    write_artifacts(&table, &outputs, &options)
}

fn decode(args: DecodeArgs) -> eyre::Result<()> {
    let table = compile(&args.table)?;
    let decoder = table.decoder();
    let mut failures = 0;
    for word in &args.words {
        let raw = parse_word(word)?;
        match decoder.decode(raw) {
            Ok(decoded) => println!("{raw:#010x}: {}", decoder.disassemble(&decoded)),
            Err(err) => {
                failures += 1;
                println!("{raw:#010x}: {err}");
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} words did not decode", args.words.len());
    }
    Ok(())
}

fn inspect(args: InspectArgs) -> eyre::Result<()> {
    let table = compile(&args.table)?;
    let report = table.report();
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .wrap_err("failed to serialize the compiled table")?;
    println!("{json}");
    Ok(())
}

fn run_selftest(args: SelftestArgs) -> eyre::Result<()> {
    let table = match &args.description {
        Some(path) => compile_file(path, TrialOrder::default())?,
        None => {
            let description =
                fixtures::rv64_base().wrap_err("built-in description is invalid")?;
            CompiledTable::compile(&description).wrap_err("built-in description does not compile")?
        }
    };
    let report = selftest(&table)?;
    tracing::info!(
        instructions = report.instructions,
        words = report.words,
        "selftest passed"
    );
    Ok(())
}
