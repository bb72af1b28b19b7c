mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Cadence transition-system simulator.
#[derive(Parser)]
#[command(
    name = "cadence",
    version,
    about = "Cadence transition-system simulator"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log engine progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that loads a bundle.
#[derive(Args, Debug, Clone)]
pub(crate) struct LoadArgs {
    /// Path to the resolved program bundle (JSON)
    pub bundle: PathBuf,
    /// Module to load (default: the last module in the bundle)
    #[arg(long)]
    pub module: Option<String>,
    /// TOML file with simulation settings; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Constant override as NAME=JSON (trace encoding), repeatable
    #[arg(long = "const", value_name = "NAME=JSON")]
    pub constants: Vec<String>,
}

/// Sampling options for `run` and `test`.
#[derive(Args, Debug, Clone)]
pub(crate) struct SampleArgs {
    /// Steps after init per sample
    #[arg(long)]
    pub max_steps: Option<usize>,
    /// Number of samples
    #[arg(long)]
    pub max_samples: Option<usize>,
    /// Base seed (default: random, reported in the output)
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a module and check its invariants
    Run {
        #[command(flatten)]
        load: LoadArgs,
        #[command(flatten)]
        sample: SampleArgs,
        /// Invariant to check, repeatable (default: all declared)
        #[arg(long = "invariant", value_name = "NAME")]
        invariants: Vec<String>,
        /// Also evaluate declared temporal properties on each trace
        #[arg(long)]
        temporal: bool,
    },

    /// Execute the runs declared in a module
    Test {
        #[command(flatten)]
        load: LoadArgs,
        #[command(flatten)]
        sample: SampleArgs,
        /// Only runs whose name contains this string
        #[arg(long = "match", value_name = "PATTERN")]
        filter: Option<String>,
    },

    /// List the distinct states an action can produce
    Successors {
        #[command(flatten)]
        load: LoadArgs,
        /// Action to enumerate (default: init, or step with --from)
        #[arg(long)]
        action: Option<String>,
        /// State to start from, as ITF JSON (a state object or a trace)
        #[arg(long)]
        from: Option<PathBuf>,
        /// Maximum number of choice sequences to replay
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run {
            load,
            sample,
            invariants,
            temporal,
        } => {
            commands::run::cmd_run(&load, &sample, invariants, temporal, cli.output, cli.quiet);
        }
        Commands::Test {
            load,
            sample,
            filter,
        } => {
            commands::test::cmd_test(&load, &sample, filter.as_deref(), cli.output, cli.quiet);
        }
        Commands::Successors {
            load,
            action,
            from,
            limit,
        } => {
            commands::successors::cmd_successors(
                &load,
                action.as_deref(),
                from.as_deref(),
                limit,
                cli.output,
                cli.quiet,
            );
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else if quiet {
            EnvFilter::new("error")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Report `msg` and exit with status 1.
pub(crate) fn fail(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(msg, output, quiet);
    process::exit(1);
}
