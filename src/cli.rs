use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "corowave")]
#[command(about = "Classify JVM methods as suspendable and queue classes for coroutine instrumentation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Classpath root: a directory of class files or a .jar (repeatable)
    #[arg(long = "cp", value_name = "PATH", global = true)]
    pub classpath: Vec<PathBuf>,

    /// JSON rules file overriding method suspend classifications
    #[arg(long, value_name = "FILE", global = true)]
    pub rules: Option<PathBuf>,

    /// Permit synchronized suspendable methods
    #[arg(long, global = true)]
    pub allow_monitors: bool,

    /// Permit calls classified as blocking
    #[arg(long, global = true)]
    pub allow_blocking: bool,

    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Scan a directory tree of class files and build the work list
    Scan {
        path: PathBuf,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Resolve one method's suspend classification
    Classify {
        class_name: String,
        method_name: String,
        method_desc: String,

        /// Do not search superclasses for the method
        #[arg(long)]
        no_super: bool,
    },
    /// Nearest common superclass of two classes
    Super { class_a: String, class_b: String },
    /// Whether a class descends from the exception root type
    Exception { class_name: String },
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
