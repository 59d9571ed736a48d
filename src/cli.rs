mod choices;

use clap::{ArgAction, Parser, Subcommand};
pub use choices::{
    ColorMode, ModeChoice, OutputFormat, PriorityChoice, ScopeChoice, StrategyChoice,
};
use std::path::PathBuf;

/// Compile news query token forests into filter expressions
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration profile (TOML)
    #[arg(short, long, global = true, env = "QUERY_COMPILER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'F', long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Also write the output to this file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print nothing to stdout
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// When to use colors
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    pub color: ColorMode,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize a token forest and compile it into one expression tree
    Compile {
        /// JSON or JSON5 file holding the token forest
        forest: PathBuf,

        /// Combination strategy for top-level tokens
        #[arg(short, long, value_enum, default_value_t = StrategyChoice::Smart)]
        strategy: StrategyChoice,

        /// Operator binding order
        #[arg(short, long, value_enum, default_value_t = PriorityChoice::Boolean)]
        priority: PriorityChoice,

        /// Compile the forest as given, skipping normalization
        #[arg(long)]
        raw: bool,
    },
    /// List entities of one category found in the compiled expression
    Extract {
        forest: PathBuf,

        /// Category to collect (name or configured alias)
        #[arg(long)]
        category: String,

        /// Maximum number of entities (defaults to the profile limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Render the filter markup and destination for a token forest
    Filter {
        forest: PathBuf,

        /// Filter name attribute
        #[arg(long, default_value = "filter")]
        name: String,

        #[arg(long, value_enum, default_value_t = ScopeChoice::HeadlineOnly)]
        scope: ScopeChoice,

        #[arg(long, value_enum, default_value_t = ModeChoice::Normal)]
        mode: ModeChoice,

        /// Repository to search (repeatable, defaults to NewsWire)
        #[arg(short, long = "repository")]
        repositories: Vec<String>,
    },
    /// Map repository identifiers to the destination code
    Destination {
        #[arg(required = true)]
        repositories: Vec<String>,
    },
    /// Combine the public organisations and languages of a forest
    Select { forest: PathBuf },
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
