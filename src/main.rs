use anyhow::Result;
use clap::Parser;
use corowave::cli::{Cli, Commands, OutputFormat};
use corowave::config::{DbConfig, SuspendRules};
use corowave::db::MethodDatabase;
use corowave::diag::LogDiagnostics;
use corowave::scan::scan_tree;
use serde::Serialize;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let db = build_database(&cli)?;

    match cli.command.clone() {
        Commands::Scan { path, format } => {
            let report = scan_tree(&db, &path)?;
            let work_list = db
                .work_list()
                .into_iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect();
            let output = ScanOutput { report, work_list };
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
                OutputFormat::Text => {
                    println!(
                        "scanned: {} queued: {} instrumented: {} failed: {}",
                        output.report.scanned,
                        output.report.queued,
                        output.report.already_instrumented,
                        output.report.failed
                    );
                    for file in &output.work_list {
                        println!("{file}");
                    }
                }
            }
        }
        Commands::Classify {
            class_name,
            method_name,
            method_desc,
            no_super,
        } => {
            let class_name = normalize_class_name(&class_name);
            let verdict = db.classify(&class_name, &method_name, &method_desc, !no_super);
            let output = ClassifyOutput {
                class_name,
                method_name,
                method_desc,
                suspend_type: verdict.mnemonic(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Super { class_a, class_b } => {
            let class_a = normalize_class_name(&class_a);
            let class_b = normalize_class_name(&class_b);
            let common = db.common_superclass(&class_a, &class_b);
            let output = SuperOutput {
                class_a,
                class_b,
                common_superclass: common,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Exception { class_name } => {
            let class_name = normalize_class_name(&class_name);
            let is_exception = db.is_exception(&class_name);
            let output = ExceptionOutput {
                class_name,
                is_exception,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    let filter = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}

fn build_database(cli: &Cli) -> Result<MethodDatabase> {
    let config = DbConfig {
        allow_monitors: cli.allow_monitors,
        allow_blocking: cli.allow_blocking,
        verbose: cli.verbose,
        debug: cli.debug,
        ..DbConfig::default()
    };

    let db = MethodDatabase::with_classpath(config, cli.classpath.clone(), Arc::new(LogDiagnostics));
    match cli.rules.as_deref() {
        Some(path) => Ok(db.with_rules(SuspendRules::load(path)?)),
        None => Ok(db),
    }
}

/// Accepts dotted (`com.example.Foo`) or slashed (`com/example/Foo`)
/// fully-qualified names; the database keys on the slashed internal form.
fn normalize_class_name(raw: &str) -> String {
    raw.trim().replace('.', "/")
}

#[derive(Debug, Serialize)]
struct ScanOutput {
    report: corowave::scan::ScanReport,
    work_list: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ClassifyOutput {
    class_name: String,
    method_name: String,
    method_desc: String,
    suspend_type: &'static str,
}

#[derive(Debug, Serialize)]
struct SuperOutput {
    class_a: String,
    class_b: String,
    common_superclass: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExceptionOutput {
    class_name: String,
    is_exception: bool,
}
