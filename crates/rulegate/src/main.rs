use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use rulegate::{explain, load_policies, CompiledPolicy, RootConfig, RootError};
use rulegate_core::Context;

/// Rulegate: composable access-control policies
///
/// Evaluate a named policy from a policy document against a context given
/// as key=value assignments.
#[derive(Parser, Debug)]
#[command(name = "rulegate", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Policy document, overriding the configured policy_path
    #[arg(short, long, global = true)]
    policies: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a policy against a context
    Check {
        /// Policy name (defaults to the configured default_policy)
        policy: Option<String>,

        /// Context attribute as key=value; values parse as JSON, else string
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Fail unless the policy explicitly allows
        #[arg(long)]
        enforce: bool,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the rules a policy compiles to
    Explain {
        /// Policy name (defaults to the configured default_policy)
        policy: Option<String>,
    },

    /// List the policies in the document
    List,
}

fn init_tracing(verbose: bool, filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("rulegate=debug,rulegate_policy=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RootConfig, RootError> {
    match path {
        Some(p) => RootConfig::load(p),
        None => {
            let default_path = RootConfig::default_config_path();
            RootConfig::load(&default_path)
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(cli.verbose, "rulegate=info");
            error!("{}", e);
            std::process::exit(1);
        }
    };
    init_tracing(cli.verbose, &config.logging.filter);

    if let Err(e) = run(cli, config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, mut config: RootConfig) -> Result<(), RootError> {
    if let Some(path) = cli.policies {
        config.policy_path = path;
    }
    match cli.command {
        Commands::Check {
            policy,
            set,
            enforce,
            json,
        } => cmd_check(&config, policy.as_deref(), &set, enforce, json),
        Commands::Explain { policy } => cmd_explain(&config, policy.as_deref()),
        Commands::List => cmd_list(&config),
    }
}

fn cmd_check(
    config: &RootConfig,
    policy: Option<&str>,
    assignments: &[String],
    enforce: bool,
    json: bool,
) -> Result<(), RootError> {
    let name = config.policy_name(policy)?;
    let document = load_policies(config)?;
    let context = Context::from_assignments(assignments)?;
    info!(policy = name, attributes = context.len(), "checking policy");

    let compiled = CompiledPolicy::compile(&document, name)?;
    let verdict = compiled.evaluate(&context);
    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else {
        match &verdict.decided_by {
            Some(by) => println!(
                "{}  (rule #{}: {})",
                verdict.decision, by.index, by.label
            ),
            None => println!("{}  (no rule decided)", verdict.decision),
        }
    }

    if enforce {
        compiled.enforce(&verdict, &context, config.enforcement.audit)?;
    }
    Ok(())
}

fn cmd_explain(config: &RootConfig, policy: Option<&str>) -> Result<(), RootError> {
    let name = config.policy_name(policy)?;
    let document = load_policies(config)?;
    let summary = explain(&document, name)?;

    println!("Policy: {}", summary.name);
    if let Some(description) = &summary.description {
        println!("  {}", description);
    }
    if summary.rules.is_empty() {
        println!("  (no rules: every request is undecided)");
    }
    for (index, label) in summary.rules.iter().enumerate() {
        println!("  {:>3}. {}", index, label);
    }
    Ok(())
}

fn cmd_list(config: &RootConfig) -> Result<(), RootError> {
    let document = load_policies(config)?;
    println!("Policies in {}:", config.policy_path.display());
    if document.policies.is_empty() {
        println!("  (none)");
    }
    for (name, spec) in &document.policies {
        match &spec.description {
            Some(description) => println!("  {}  {}", name, description),
            None => println!("  {}", name),
        }
    }
    Ok(())
}
