mod cli;

use hclconfig::fqrn::Fqrn;
use hclconfig::hcl_documents::HclDocuments;
use hclconfig::lookup::Navigator;
use hclconfig::path::Path;
use hclconfig::registry::Registry;
use hclconfig::schema::{self, SchemaNode};
use hclconfig::value::Value;
use serde::de::DeserializeOwned;
use std::path::PathBuf;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("HCLCONFIG_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Fqrn(fqrn_cli) => fqrn(fqrn_cli, &cli.output),
        cli::Command::Lookup(lookup_cli) => lookup(lookup_cli, &cli.output),
        cli::Command::Resolve(resolve_cli) => resolve(resolve_cli, &cli.output),
        cli::Command::Schema(schema_cli) => describe(schema_cli, &cli.output),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

#[derive(serde::Serialize)]
struct FqrnOutput {
    #[serde(flatten)]
    fqrn: Fqrn,
    canonical: String,
}

pub fn fqrn(cli: cli::FqrnCommand, output_args: &cli::OutputArgs) -> anyhow::Result<()> {
    let fqrn = Fqrn::parse(&cli.reference)?;
    let canonical = fqrn.to_string();

    output(output_args, &FqrnOutput { fqrn, canonical })
}

pub fn lookup(cli: cli::LookupCommand, output_args: &cli::OutputArgs) -> anyhow::Result<()> {
    let document = match &cli.file {
        Some(file_path) => read_document(file_path)?,
        None => {
            let stdin = std::io::read_to_string(std::io::stdin())?;
            serde_yaml::from_str::<serde_json::Value>(&stdin)?.into()
        }
    };

    let navigator = cli
        .aliases
        .iter()
        .fold(Navigator::new(), |navigator, alias| navigator.with_alias(alias))
        .case_insensitive(cli.ignore_case);

    let path = Path::parse(&cli.path)?;
    let found = navigator.lookup(&document, &path)?;

    output(output_args, &found.into_value())
}

/// Loads a document by file extension
fn read_document(file_path: &std::path::Path) -> anyhow::Result<Value> {
    let contents = std::fs::read_to_string(file_path)?;

    let value = match file_path.extension().and_then(|e| e.to_str()) {
        Some("hcl") => hcl::from_str::<hcl::Value>(&contents)?.into(),
        Some("json") => serde_json::from_str::<serde_json::Value>(&contents)?.into(),
        Some("yaml" | "yml") => serde_yaml::from_str::<serde_json::Value>(&contents)?.into(),
        _ => anyhow::bail!("unsupported document type: {}", file_path.display()),
    };

    Ok(value)
}

pub fn resolve(cli: cli::ResolveCommand, output_args: &cli::OutputArgs) -> anyhow::Result<()> {
    let mut registry = Registry::default();
    for schema in &cli.schemas {
        let (kind, file_path) = schema
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected KIND=FILE, got {schema}"))?;
        let node: SchemaNode = read_structured(&PathBuf::from(file_path))?;
        registry.register_schema(kind, &node)?;
    }

    let documents = load(&cli.input)?;
    let mut resources = match documents.resources(&registry) {
        Ok(resources) => resources,
        Err(errors) => {
            for issue in errors.issues() {
                let source = documents
                    .source_of(issue)
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "<stdin>".to_string());
                eprintln!("{source}: {issue:?}");
            }
            return Err(errors.into());
        }
    };

    let navigator = Navigator::new().with_alias("hcl").with_alias("json");
    let applied = resources.apply_references(&navigator)?;
    tracing::debug!(applied, resources = resources.len(), "references applied");

    let expr: hcl_edit::expr::Expression = cli.expression.parse()?;
    let value = match hcl::Expression::from(expr) {
        hcl::Expression::Traversal(traversal) => {
            let fqrn = Fqrn::try_from(traversal.as_ref())?;
            resources.resolve(&fqrn, &navigator)?
        }
        other => Value::try_from(other)?,
    };

    output(output_args, &value)
}

fn load(input: &cli::InputArgs) -> anyhow::Result<HclDocuments> {
    if !input.workdir && input.files.is_empty() && input.directories.is_empty() {
        let stdin = std::io::read_to_string(std::io::stdin())?;
        let body = hcl_edit::parser::parse_body(&stdin)?;
        return Ok(body.into());
    }

    let mut documents = HclDocuments::default();

    if input.workdir {
        documents.load_directory(&std::env::current_dir()?)?;
    }

    for file_path in &input.files {
        documents.load_file(file_path)?;
    }

    for dir_path in &input.directories {
        documents.load_directory(dir_path)?;
    }

    anyhow::ensure!(documents.source_count() > 0, "No files loaded");

    Ok(documents)
}

pub fn describe(cli: cli::SchemaCommand, output_args: &cli::OutputArgs) -> anyhow::Result<()> {
    let node: SchemaNode = match &cli.file {
        Some(file_path) => read_structured(file_path)?,
        None => serde_yaml::from_reader(std::io::stdin())?,
    };

    let reconstructed = schema::reconstruct(&node)?;
    tracing::debug!(ty = %reconstructed.ty(), "schema reconstructed");

    output(output_args, &reconstructed.describe(cli.depth)?)
}

/// json or yaml, by file extension
fn read_structured<T: DeserializeOwned>(file_path: &std::path::Path) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(file_path)?;

    match file_path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(serde_json::from_str(&contents)?),
        Some("yaml" | "yml") => Ok(serde_yaml::from_str(&contents)?),
        _ => anyhow::bail!("unsupported document type: {}", file_path.display()),
    }
}

fn output<T: serde::Serialize>(output: &cli::OutputArgs, value: &T) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}
