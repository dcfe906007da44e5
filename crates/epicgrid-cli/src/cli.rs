use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "epicgrid",
    about = "Epicgrid: Epic × Feature × Version grid over a tracker project directory",
    version
)]
pub struct Cli {
    /// Write logs to stderr as JSON lines (level from EPICGRID_LOG)
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the project and its settings live.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Project directory holding project.json and issues.jsonl
    #[arg(long, default_value = ".")]
    pub data: String,

    /// Path to epicgrid.toml (defaults to <data>/epicgrid.toml when present)
    #[arg(long)]
    pub config: Option<String>,
}

/// Grid shaping flags; unset flags fall back to the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GridArgs {
    /// Filter as key=value (repeatable), e.g. --filter status_id_in=1
    #[arg(long = "filter")]
    pub filters: Vec<String>,

    /// Drop closed issues from the entity maps
    #[arg(long)]
    pub exclude_closed: bool,

    /// Keep closed versions in the version columns
    #[arg(long)]
    pub with_closed_versions: bool,

    /// Epic and feature order: subject, id or date
    #[arg(long)]
    pub epic_sort: Option<String>,

    /// Epic and feature direction: asc or desc
    #[arg(long)]
    pub epic_direction: Option<String>,

    /// Version order: subject, id or date
    #[arg(long)]
    pub version_sort: Option<String>,

    /// Version direction: asc or desc
    #[arg(long)]
    pub version_direction: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StatsScope {
    Project,
    Epic,
    Feature,
    UserStory,
    Version,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the grid index (and the full wire payload with --json)
    Grid {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        grid: GridArgs,

        /// Output the wire payload as JSON
        #[arg(long)]
        json: bool,
    },

    /// Statistics for the project or one epic, feature, user story or version
    Stats {
        #[command(flatten)]
        source: SourceArgs,

        /// Report scope
        #[arg(long, value_enum, default_value = "project")]
        scope: StatsScope,

        /// Issue or version id (required unless --scope project)
        #[arg(long)]
        id: Option<u64>,

        /// Reference date for schedule figures (YYYY-MM-DD, default today)
        #[arg(long)]
        today: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check tracker parent/child rules across the issue tree
    Check {
        #[command(flatten)]
        source: SourceArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply board actions to the grid and print the resulting board
    Board {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        grid: GridArgs,

        /// JSON file holding an array of board actions
        #[arg(long)]
        actions: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve the grid over HTTP
    Serve {
        #[command(flatten)]
        source: SourceArgs,

        /// Bind address (overrides [server].bind)
        #[arg(long)]
        bind: Option<String>,
    },
}
