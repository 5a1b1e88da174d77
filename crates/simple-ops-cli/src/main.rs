//! simple-ops CLI - GitOps manifest generation from layered configuration

use clap::{Parser, Subcommand, ValueEnum};
use simple_ops_core::Workspace;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod exit_codes;

#[derive(Parser)]
#[command(name = "simple-ops")]
#[command(version)]
#[command(about = "Generate Kubernetes manifests for every component and environment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root
    #[arg(short = 'w', long, global = true, default_value = ".", env = "SIMPLE_OPS_WORKDIR")]
    workdir: PathBuf,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workspace layout
    Init {
        /// Initialize even if the directory is not empty
        #[arg(long)]
        force: bool,
    },

    /// Regenerate the deploy/ tree
    Generate,

    /// Check that deploy/ matches what generate would produce
    Verify {
        /// Also check chart archives against the lock file
        #[arg(long)]
        charts: bool,
    },

    /// Set a value in a component config file
    Set {
        /// Dotted path; the first segment names the file under config/
        path: String,

        /// Value, stored as a string
        value: Option<String>,

        /// Read a YAML value from stdin instead
        #[arg(long, conflicts_with = "value")]
        stdin: bool,
    },

    /// Show the resolved configuration of one deployment
    Deploy {
        /// Deployment id (<environment>.<component>)
        id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// List container images in the generated manifests
    Images {
        /// Only this deployment (<environment>.<component>)
        id: Option<String>,

        /// Group images by manifest file
        #[arg(long, conflicts_with = "id")]
        per_file: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Show container resource requests and limits in the generated manifests
    ContainerResources {
        /// Only this deployment (<environment>.<component>)
        id: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Print part of a deployment's chart
    Show {
        #[arg(value_enum)]
        part: commands::show::ShowPart,

        /// Deployment id (<environment>.<component>)
        id: String,
    },

    /// Register a downloaded chart archive in the lock file
    Add {
        /// Chart name
        name: String,

        /// Repository the chart came from
        #[arg(long)]
        repo: String,

        /// Chart version
        #[arg(long)]
        version: String,

        /// Also create config/<name>.yml pointing at the chart
        #[arg(long)]
        add_config: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> ExitCode {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(exit_codes::USAGE_ERROR)
            } else {
                ExitCode::from(exit_codes::SUCCESS)
            };
        }
    };
    init_tracing(cli.verbose);
    tracing::debug!(workdir = %cli.workdir.display(), "using workspace");

    let workspace = Workspace::new(&cli.workdir);
    let result = match cli.command {
        Commands::Init { force } => commands::init::run(&workspace, force),
        Commands::Generate => commands::generate::run(&workspace),
        Commands::Verify { charts } => commands::verify::run(&workspace, charts),
        Commands::Set { path, value, stdin } => commands::set::run(&workspace, &path, value.as_deref(), stdin),
        Commands::Deploy { id, output } => commands::deploy::run(&workspace, &id, output),
        Commands::Images { id, per_file, output } => {
            commands::images::run(&workspace, id.as_deref(), per_file, output)
        }
        Commands::ContainerResources { id, output } => commands::resources::run(&workspace, id.as_deref(), output),
        Commands::Show { part, id } => commands::show::run(&workspace, part, &id),
        Commands::Add {
            name,
            repo,
            version,
            add_config,
        } => commands::add::run(&workspace, &name, &repo, &version, add_config),
    };

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}
