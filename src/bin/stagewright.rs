//! Stagewright CLI - compile resolver manifests into schema and templates
//!
//! Provides subcommands for compiling a whole API and for printing only its
//! schema.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use stagewright::{CompiledApi, CompilerConfig, Manifest};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "stagewright")]
#[command(about = "Compile typed resolver programs into GraphQL pipeline templates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every resolver and the schema
    Compile {
        /// Manifest file
        manifest: PathBuf,

        /// Compiler configuration file (overrides the manifest's)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory (prints to stdout when absent)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print only the schema
    Schema {
        /// Manifest file
        manifest: PathBuf,
    },
}

fn compile(manifest: &Path, config: Option<&Path>) -> Result<CompiledApi> {
    let config = config
        .map(CompilerConfig::load)
        .transpose()
        .context("loading compiler configuration")?;
    let api = Manifest::load(manifest)
        .and_then(|manifest| manifest.into_api(config))
        .with_context(|| format!("loading manifest {}", manifest.display()))?;
    Ok(api.compile()?)
}

fn write_outputs(compiled: &CompiledApi, schema: &str, out: Option<&Path>) -> Result<()> {
    let Some(dir) = out else {
        println!("{schema}");
        for resolver in &compiled.resolvers {
            println!(
                "# {}.{}\n{}",
                resolver.type_name,
                resolver.field_name,
                serde_json::to_string_pretty(resolver)?
            );
        }
        return Ok(());
    };

    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    fs::write(dir.join("schema.graphql"), schema)?;
    for resolver in &compiled.resolvers {
        let path = dir.join(format!(
            "{}.{}.json",
            resolver.type_name, resolver.field_name
        ));
        fs::write(&path, serde_json::to_string_pretty(resolver)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    println!(
        "Wrote schema and {} resolvers to {}",
        compiled.resolvers.len(),
        dir.display()
    );
    Ok(())
}

fn report(compiled: &CompiledApi) -> Result<&str> {
    for failure in &compiled.failures {
        eprintln!("error: {failure}");
    }
    match &compiled.schema {
        Ok(schema) => Ok(schema),
        Err(errors) => {
            for error in errors {
                eprintln!("schema error: {error}");
            }
            bail!("schema generation failed with {} errors", errors.len())
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            manifest,
            config,
            out,
        } => {
            let compiled = compile(&manifest, config.as_deref())?;
            let schema = report(&compiled)?;
            write_outputs(&compiled, schema, out.as_deref())?;
            if !compiled.failures.is_empty() {
                bail!("{} fields failed to compile", compiled.failures.len());
            }
        }
        Commands::Schema { manifest } => {
            let compiled = compile(&manifest, None)?;
            let schema = report(&compiled)?;
            print!("{schema}");
        }
    }

    Ok(())
}
