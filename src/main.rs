use clap::{Parser, Subcommand};
use log::error;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use eqtble_semantic::{
    config::{StoreConfig, ValidatorConfig},
    dialect::SqlDialect,
    generate::{generate_document, introspection::JsonCatalogIntrospector, render_with_placeholders},
    semantic_model::{codec, local_store::LocalDocumentStore, store::DocumentStore, BaseTableRef},
    validate_text,
    validation::{self, Finding},
    AcceptedDocument, Rejection,
};

#[derive(Parser)]
#[command(name = "eqtble-semantic")]
#[command(about = "Validate, draft and publish semantic model documents")]
#[command(version)]
struct Cli {
    /// Overrides SEMANTIC_DIALECT
    #[arg(short, long, global = true)]
    dialect: Option<SqlDialect>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every validation stage over a document
    Validate {
        /// Path to the YAML document
        file: PathBuf,

        /// Print findings as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the token and byte measures of a document
    Budget {
        file: PathBuf,
    },

    /// Draft a document from an exported catalog
    Generate {
        /// JSON catalog describing the physical tables
        #[arg(short, long)]
        catalog: PathBuf,

        /// Name of the new document
        #[arg(short, long)]
        name: String,

        /// Fully qualified table, `database.schema.table`; repeatable
        #[arg(short, long = "table", required = true)]
        tables: Vec<String>,

        /// Write the draft here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a document and store it under SEMANTIC_STORE_PATH
    Publish {
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = ValidatorConfig::new().map_err(|e| {
        error!("Failed to initialize validator config: {}", e);
        e
    })?;
    if let Some(dialect) = cli.dialect {
        config.dialect = dialect;
    }

    match cli.command {
        Commands::Validate { file, json } => {
            let outcome = validate_text(&read_document(&file)?, &config);
            report(&outcome, json)?;
            if outcome.is_err() {
                process::exit(1);
            }
        }
        Commands::Budget { file } => {
            let document = codec::deserialize(&read_document(&file)?).map_err(|e| {
                error!("Failed to parse {}: {}", file.display(), e);
                e
            })?;
            let report = validation::enforce(&document, &config)?;
            println!(
                "tokens: {} / {} ({})",
                report.measure.tokens, config.token_ceiling, config.token_policy
            );
            println!("bytes:  {} / {}", report.measure.bytes, config.byte_ceiling);

            let findings = report.findings;
            print_findings(&findings);
            if !findings.is_empty() {
                process::exit(1);
            }
        }
        Commands::Generate {
            catalog,
            name,
            tables,
            output,
        } => {
            let introspector = JsonCatalogIntrospector::from_path(&catalog).map_err(|e| {
                error!("Failed to load catalog {}: {}", catalog.display(), e);
                e
            })?;
            let tables = tables
                .iter()
                .map(|t| BaseTableRef::from_str(t))
                .collect::<Result<Vec<_>, _>>()?;

            let document = generate_document(&name, &tables, &introspector, &config)?;
            let text = render_with_placeholders(&document)?;
            match output {
                Some(path) => fs::write(&path, text).map_err(|e| {
                    error!("Failed to write {}: {}", path.display(), e);
                    e
                })?,
                None => print!("{}", text),
            }
        }
        Commands::Publish { file } => {
            let store_config = StoreConfig::new().map_err(|e| {
                error!("Failed to initialize store config: {}", e);
                e
            })?;
            let outcome = validate_text(&read_document(&file)?, &config);
            report(&outcome, false)?;

            let Ok(accepted) = outcome else {
                process::exit(1);
            };
            let store = LocalDocumentStore::from_config(&store_config);
            let location = store.publish(&accepted).map_err(|e| {
                error!("Failed to publish {}: {}", accepted.document().name, e);
                e
            })?;
            println!("published to {}", location);
        }
    }

    Ok(())
}

fn read_document(path: &Path) -> Result<String, std::io::Error> {
    fs::read_to_string(path).map_err(|e| {
        error!("Failed to read {}: {}", path.display(), e);
        e
    })
}

fn report(outcome: &Result<AcceptedDocument, Rejection>, json: bool) -> Result<(), serde_json::Error> {
    let findings = match outcome {
        Ok(accepted) => accepted.advisories(),
        Err(rejection) => rejection.findings.as_slice(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(findings)?);
        return Ok(());
    }

    print_findings(findings);
    match outcome {
        Ok(accepted) => println!(
            "accepted '{}' ({} tokens, {} bytes)",
            accepted.document().name,
            accepted.measure().tokens,
            accepted.measure().bytes
        ),
        Err(rejection) => println!("{}", rejection),
    }
    Ok(())
}

fn print_findings(findings: &[Finding]) {
    for finding in findings {
        println!("{}", finding);
    }
}
