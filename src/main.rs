//! flowprov CLI Entry Point
//!
//! Provides command-line access to graph building, validation and
//! comparison.
//!
//! # Usage
//!
//! ```bash
//! # Build a graph from a flow plan and its input
//! flowprov plan flow.json input.json --output ro-crate-metadata.json
//!
//! # Infer transfers from a tool manifest and write the flow plan
//! flowprov tools tools.yaml --flow --output flow.json
//!
//! # Validate a graph document
//! flowprov validate ro-crate-metadata.json
//!
//! # Compare the prospective part against a reference
//! flowprov compare actual.json expected.json --parts prospective --refs retrospective
//! ```

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use log::{error, info};
use serde_json::Value;

use flowprov::params::{augmented_sequence, infer_transfers, ToolManifest};
use flowprov::plan::{load_input, load_plan};
use flowprov::validation::{Comparator, CrateCategory, SchemaTable, Validator};
use flowprov::{build_from_plan, build_from_tools, ProvConfig, APP_NAME, VERSION};

/// Sub-command selected on the command line.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Plan { plan: PathBuf, input: PathBuf },
    Tools { manifest: PathBuf },
    Validate { document: PathBuf },
    Compare { actual: PathBuf, expected: PathBuf },
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    command: Command,
    config_path: Option<PathBuf>,
    output: Option<PathBuf>,
    schema: Option<PathBuf>,
    parts: Vec<CrateCategory>,
    refs: Vec<CrateCategory>,
    write_flow: bool,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Writes the application banner with version information.
///
/// The banner goes to stderr with the log, keeping stdout for documents.
fn write_banner(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{} v{}", APP_NAME, VERSION)?;
    writeln!(out, "Prospective provenance for flow plans")?;
    writeln!(out)
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: flowprov <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  plan <PLAN> <INPUT>          Build a graph from a flow plan and its input");
    println!("  tools <MANIFEST>             Infer transfers and build a graph from tools");
    println!("  validate <DOCUMENT>          Validate a graph document");
    println!("  compare <ACTUAL> <EXPECTED>  Compare selected parts of two graphs");
    println!();
    println!("Options:");
    println!("  --config PATH     Build configuration (YAML or JSON)");
    println!("  --output PATH     Write the result to a file instead of stdout");
    println!("  --schema PATH     Schema table used by 'validate'");
    println!("  --parts LIST      Comma-separated parts compared by 'compare'");
    println!("  --refs LIST       Parts also compared when only referenced");
    println!("  --flow            Emit the generated flow plan from 'tools'");
    println!("  --verbose         Enable debug logging");
    println!("  --help            Show this help message");
    println!("  --version         Show version information");
    println!();
    println!("Parts: prospective, retrospective, orchestration, metadata, other");
}

fn parse_categories(list: &str) -> Result<Vec<CrateCategory>, String> {
    list.split(',')
        .filter(|item| !item.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut positional = Vec::new();
    let mut config_path = None;
    let mut output = None;
    let mut schema = None;
    let mut parts = Vec::new();
    let mut refs = Vec::new();
    let mut write_flow = false;
    let mut verbose = false;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => verbose = true,
            "--flow" => write_flow = true,
            "--config" | "--output" | "--schema" | "--parts" | "--refs" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| format!("{} requires an argument", arg))?;
                match arg.as_str() {
                    "--config" => config_path = Some(PathBuf::from(value)),
                    "--output" => output = Some(PathBuf::from(value)),
                    "--schema" => schema = Some(PathBuf::from(value)),
                    "--parts" => parts = parse_categories(value)?,
                    _ => refs = parse_categories(value)?,
                }
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => positional.push(arg.clone()),
        }
        i += 1;
    }

    let command = parse_command(&positional)?;
    if matches!(command, Command::Compare { .. }) && parts.is_empty() {
        return Err("compare requires --parts".to_string());
    }

    Ok(Config {
        command,
        config_path,
        output,
        schema,
        parts,
        refs,
        write_flow,
        verbose,
    })
}

fn parse_command(positional: &[String]) -> Result<Command, String> {
    let path = |i: usize| PathBuf::from(&positional[i]);

    match (positional.first().map(String::as_str), positional.len()) {
        (None, _) => Err("No command given".to_string()),
        (Some("plan"), 3) => Ok(Command::Plan { plan: path(1), input: path(2) }),
        (Some("tools"), 2) => Ok(Command::Tools { manifest: path(1) }),
        (Some("validate"), 2) => Ok(Command::Validate { document: path(1) }),
        (Some("compare"), 3) => Ok(Command::Compare { actual: path(1), expected: path(2) }),
        (Some(name @ ("plan" | "tools" | "validate" | "compare")), _) => {
            Err(format!("Wrong number of arguments for '{}'", name))
        }
        (Some(other), _) => Err(format!("Unknown command: {}", other)),
    }
}

fn load_config(config: &Config) -> Result<ProvConfig, Box<dyn std::error::Error>> {
    match &config.config_path {
        Some(path) => Ok(ProvConfig::load(path)?),
        None => {
            info!("No configuration given, using defaults");
            Ok(ProvConfig::default())
        }
    }
}

fn load_document(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    info!("Loading document: {}", path.display());
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Writes text to the output file, or stdout when none is given.
fn emit(output: Option<&Path>, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, text)?;
            info!("Written: {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn status_line(passed: bool, label: &str) -> String {
    let mark = if passed { "✓".green() } else { "✗".red() };
    format!("{} {}", mark, label)
}

/// Prints a pass/fail line. Failure details are left to `main`.
fn report(
    outcome: Result<(), flowprov::ProvError>,
    success: &str,
    failure: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        Ok(()) => {
            println!("{}", status_line(true, success));
            Ok(())
        }
        Err(e) => {
            println!("{}", status_line(false, failure));
            Err(e.into())
        }
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    write_banner(&mut io::stderr())?;

    match &config.command {
        Command::Plan { plan, input } => {
            let prov = load_config(&config)?;
            let flow = load_plan(plan)?;
            let input = load_input(input)?;

            let graph = build_from_plan(&flow, &input, &prov).map_err(|e| {
                error!("Failed to build graph: {}", e);
                e
            })?;
            info!("Graph built: {} nodes", graph.len());
            emit(config.output.as_deref(), &graph.to_json_pretty()?)
        }
        Command::Tools { manifest } => {
            let prov = load_config(&config)?;
            let registry = ToolManifest::load(manifest)?.into_registry()?;

            let transfers = infer_transfers(registry.tools(), &prov)?;
            let sequence = augmented_sequence(registry.tools(), &transfers);
            info!("Inferred {} transfers", transfers.len());
            for name in sequence.state_names() {
                info!("  {}", name);
            }

            if config.write_flow {
                let flow = sequence.to_flow_plan(&prov);
                emit(config.output.as_deref(), &serde_json::to_string_pretty(&flow)?)
            } else {
                let graph = build_from_tools(&registry, &prov)?;
                info!("Graph built: {} nodes", graph.len());
                emit(config.output.as_deref(), &graph.to_json_pretty()?)
            }
        }
        Command::Validate { document } => {
            let doc = load_document(document)?;
            let custom = match &config.schema {
                Some(path) => Some(SchemaTable::from_path(path)?),
                None => None,
            };
            let validator = match &custom {
                Some(schema) => Validator::new(schema),
                None => Validator::default(),
            };
            report(
                validator.validate(&doc),
                &format!("Document '{}' is valid", document.display()),
                &format!("Document '{}' is invalid", document.display()),
            )
        }
        Command::Compare { actual, expected } => {
            let actual = load_document(actual)?;
            let expected_doc = load_document(expected)?;
            let comparator = Comparator::new(&expected_doc, config.parts.clone(), config.refs.clone())?;
            report(
                comparator.compare(&actual),
                &format!("Document matches '{}'", expected.display()),
                &format!("Document differs from '{}'", expected.display()),
            )
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
