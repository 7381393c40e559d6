use clap::Parser;

const CMD_NAME: &str = "bf";
const DEFAULT_OUTPUT: &str = "output";

/// Stores our command-line args format.
#[derive(Parser)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Pipeline definition file
    #[arg(value_name = "CONFIG")]
    pub config: String,

    /// Global config file (batch system, stage commands, fatal log patterns)
    #[arg(short, long, value_name = "FILE")]
    #[arg(env = "BATCHFLOW_GLOBAL")]
    pub global: Option<String>,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = DEFAULT_OUTPUT)]
    #[arg(env = "BATCHFLOW_OUTPUT")]
    pub output: String,

    /// Regenerate every task, even if it is up to date
    #[arg(short, long)]
    pub refresh: bool,

    /// Regenerate tasks of this stage kind and every later kind
    #[arg(short, long, value_name = "STAGE")]
    pub start: Option<String>,

    /// Only build stage kinds up to and including this one
    #[arg(short, long, value_name = "STAGE")]
    pub finish: Option<String>,

    /// Name of target task (with -x)
    #[arg(short, long = "task", value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Invalidate specified tasks, so they regenerate on the next run
    #[arg(short = 'x', long)]
    pub invalidate: bool,

    /// Bypass user confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Print additional debugging info (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Dry run; print the plan but don't modify anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}
