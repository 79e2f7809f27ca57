//! Command-line interface for xsdcheck

#[cfg(feature = "cli")]
use clap::{ArgGroup, Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use xsdcheck::loaders::{stitch, FileLoader};
#[cfg(feature = "cli")]
use xsdcheck::namespaces::NamespaceContext;
#[cfg(feature = "cli")]
use xsdcheck::validators::{Import, Schema, SchemaChecker};
#[cfg(feature = "cli")]
use xsdcheck::xpath::{compile, parse_field, parse_selector, SymbolTable};
#[cfg(feature = "cli")]
use xsdcheck::Limits;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xsdcheck")]
#[command(author, version, about = "Structural checker for XML Schema component models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a raw schema model (JSON) and report every diagnostic
    Check {
        /// Path to the raw schema JSON file
        #[arg(value_name = "SCHEMA")]
        schema: PathBuf,

        /// Load a namespace from a file: NAMESPACE=PATH
        #[arg(short, long = "import", value_name = "NS=PATH")]
        imports: Vec<String>,

        /// Traversal limits (JSON)
        #[arg(short, long, value_name = "FILE")]
        limits: Option<PathBuf>,

        /// Print diagnostics as a JSON array
        #[arg(short, long)]
        json: bool,
    },

    /// Compile an identity-constraint XPath and print its op program
    #[command(group(ArgGroup::new("expression").required(true).args(["field", "selector"])))]
    Xpath {
        /// Parse as a field XPath
        #[arg(long, value_name = "EXPR")]
        field: Option<String>,

        /// Parse as a selector XPath
        #[arg(long, value_name = "EXPR")]
        selector: Option<String>,

        /// Namespace binding: PREFIX=URI (an empty prefix sets the default)
        #[arg(short, long = "ns", value_name = "PREFIX=URI")]
        namespaces: Vec<String>,
    },
}

#[cfg(feature = "cli")]
fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            schema,
            imports,
            limits,
            json,
        } => cmd_check(&schema, &imports, limits.as_deref(), json),
        Commands::Xpath {
            field,
            selector,
            namespaces,
        } => cmd_xpath(field, selector, &namespaces),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "cli")]
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn split_binding<'a>(binding: &'a str, what: &str) -> Result<(&'a str, &'a str), String> {
    binding
        .split_once('=')
        .ok_or_else(|| format!("invalid {} '{}': expected KEY=VALUE", what, binding))
}

/// Returns `Ok(false)` when the schema has diagnostics
#[cfg(feature = "cli")]
fn cmd_check(
    schema_path: &Path,
    imports: &[String],
    limits_path: Option<&Path>,
    json_output: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(schema_path)
        .map_err(|e| format!("failed to read '{}': {}", schema_path.display(), e))?;
    let root: Schema = serde_json::from_str(&content)?;

    let limits = match limits_path {
        Some(path) => serde_json::from_str::<Limits>(&fs::read_to_string(path)?)?,
        None => Limits::default(),
    };

    let base_dir = schema_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut loader = FileLoader::new(base_dir);
    let mut extra = Vec::new();
    for binding in imports {
        let (namespace, path) = split_binding(binding, "import")?;
        loader = loader.with_mapping(namespace, path);
        extra.push(Import {
            namespace: namespace.to_string(),
            schema_location: None,
        });
    }
    let schema = stitch(root, &extra, &loader)?;

    let errors = SchemaChecker::new(limits).diagnose(&schema);
    if json_output {
        println!("{}", serde_json::to_string_pretty(&errors)?);
    } else if errors.is_empty() {
        println!("{}: ok", schema_path.display());
    } else {
        for error in &errors {
            println!("{}", error);
        }
    }
    Ok(errors.is_empty())
}

#[cfg(feature = "cli")]
fn cmd_xpath(
    field: Option<String>,
    selector: Option<String>,
    bindings: &[String],
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut namespaces = NamespaceContext::new();
    for binding in bindings {
        let (prefix, uri) = split_binding(binding, "namespace binding")?;
        if prefix.is_empty() {
            namespaces.set_default_namespace(uri);
        } else {
            namespaces.add_prefix(prefix, uri);
        }
    }

    let parsed = match (field, selector) {
        (Some(expr), _) => parse_field(&expr, &namespaces)?,
        (None, Some(expr)) => parse_selector(&expr, &namespaces)?,
        (None, None) => return Err("one of --field or --selector is required".into()),
    };
    let mut symbols = SymbolTable::new();
    let compiled = compile(&parsed, &mut symbols);
    println!("{}", compiled.render(&symbols));
    Ok(true)
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
