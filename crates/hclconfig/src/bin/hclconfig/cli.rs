//! hclconfig cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; hclconfig ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[clap(flatten)]
    pub output: OutputArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a resource reference and print its components
    Fqrn(FqrnCommand),

    /// Navigate a json, yaml or hcl document
    ///
    /// Reads the document from stdin unless --file is provided
    Lookup(LookupCommand),

    /// Load resources and resolve a reference against them
    ///
    /// Reads HCL from stdin unless any other source is provided (via --input-*)
    #[command(alias = "eval")]
    Resolve(ResolveCommand),

    /// Reconstruct a schema document and describe it again
    ///
    /// Reads the schema from stdin unless --file is provided
    Schema(SchemaCommand),
}

#[derive(Parser, Debug)]
pub struct FqrnCommand {
    /// Reference, e.g. module.db.resource.container.main.network[0]
    pub reference: String,
}

#[derive(Parser, Debug)]
pub struct LookupCommand {
    /// Document to load (.json, .yaml, .yml or .hcl)
    #[clap(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Match keys and field names ignoring ASCII case
    #[clap(short = 'i', long = "ignore-case")]
    pub ignore_case: bool,

    /// Tag key to match struct fields by
    #[clap(long = "alias")]
    pub aliases: Vec<String>,

    /// Dotted path, e.g. network[0].name or network.*.name
    pub path: String,
}

#[derive(Parser, Debug)]
pub struct ResolveCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    /// Register a resource kind from a schema document
    #[clap(short = 's', long = "schema", value_name = "KIND=FILE")]
    pub schemas: Vec<String>,

    /// Reference (or literal) to resolve
    pub expression: String,
}

#[derive(Parser, Debug)]
pub struct SchemaCommand {
    /// Schema document to load (.json, .yaml or .yml)
    #[clap(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Leave out nested structs below this depth
    #[clap(long = "depth")]
    pub depth: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Load files from work directory
    #[clap(short = 'w', long = "input-workdir")]
    pub workdir: bool,

    /// Load a file
    #[clap(short = 'f', long = "input-file")]
    pub files: Vec<PathBuf>,

    /// Load files from given directory
    #[clap(short = 'd', long = "input-dir")]
    pub directories: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t, global = true)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
