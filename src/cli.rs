use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cutforge")]
#[command(author, version, about = "Plan-driven video editing")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize, repair and execute an edit plan on a video
    Run {
        /// Source video
        #[arg(required = true)]
        input: PathBuf,

        /// Plan document (JSON task list)
        #[arg(short, long)]
        plan: PathBuf,

        /// Where to write the edited video
        #[arg(short, long)]
        output: PathBuf,

        /// Local media library used by fetch tasks
        #[arg(long)]
        library: Option<PathBuf>,

        /// Scratch directory for intermediate files
        #[arg(long)]
        scratch: Option<PathBuf>,

        /// Execute the plan as written, without repairs
        #[arg(long)]
        no_repair: bool,
    },

    /// Print the repaired canonical form of a plan
    Repair {
        /// Plan document (JSON task list)
        #[arg(short, long)]
        plan: PathBuf,

        /// Slots JSON used to add inserts when the plan has none
        #[arg(long)]
        slots: Option<PathBuf>,
    },

    /// Compute insertion slots from a transcript
    Slots {
        /// Transcript JSON (`{text, segments}` or a segment array)
        #[arg(short, long, required_unless_present = "media")]
        transcript: Option<PathBuf>,

        /// Media duration in seconds
        #[arg(short, long, required_unless_present = "media")]
        duration: Option<f64>,

        /// Media file; supplies the duration via ffprobe and, without
        /// --transcript, the transcript from `<file>.transcript.json`
        #[arg(long)]
        media: Option<PathBuf>,

        /// Recorded slot proposals (JSON list) to fix up; falls back to
        /// transcript boundaries when none survive
        #[arg(long)]
        proposals: Option<PathBuf>,

        /// Override the configured insert limit
        #[arg(long)]
        max_inserts: Option<usize>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
