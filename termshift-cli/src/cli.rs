use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use termshift::ApplyMode;

#[derive(Parser, Debug)]
#[command(
    name = "termshift",
    version,
    about = "Detect sensitive terms in localization files and produce per-business variants"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Project config file (default: $TERMSHIFT_CONFIG, then ./termshift.json)"
    )]
    pub config: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Log per-entry decisions")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize the term dictionary
    Catalog,
    /// Plan substitutions for one language and write a reviewable plan
    Scan {
        #[arg(long, short)]
        language: Option<String>,
        #[arg(long, short, default_value = "termshift-plan.json")]
        output: PathBuf,
        #[arg(long, help = "Mark every proposal that replaces something as approved")]
        approve_all: bool,
        #[arg(long, help = "Plan on all cores")]
        parallel: bool,
    },
    /// Write one resource file per business type from a reviewed plan
    Apply {
        #[arg(long, short)]
        plan: PathBuf,
        #[arg(long, short)]
        language: Option<String>,
        #[arg(long, value_enum, default_value_t = Mode::Full)]
        mode: Mode,
        #[arg(long = "business-type", short = 'b', help = "Limit to these business types")]
        business_types: Vec<String>,
        #[arg(long, help = "Overrides output_dir from the config")]
        output_dir: Option<PathBuf>,
    },
    /// Merge resource trees, reporting conflicts by full key path
    Merge {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long, short)]
        output: PathBuf,
        #[arg(long, help = "JSON file of chosen values: {\"a.b\": \"v\"} or [{\"key_path\": [..], \"value\": \"v\"}]")]
        resolutions: Option<PathBuf>,
        #[arg(long, help = "Nest each input under its file stem (e.g. per language)")]
        nest: bool,
        #[arg(long, help = "Print conflicts as JSON")]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Mode {
    Full,
    Partial,
}

impl From<Mode> for ApplyMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Full => ApplyMode::Full,
            Mode::Partial => ApplyMode::Partial,
        }
    }
}
