use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use stock_feed::chart::ChartMode;

#[derive(Parser)]
#[command(name = "stock-feed")]
#[command(about = "Poll A-share quotes and project them into line or bar charts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON config file; defaults to config.json or config/config.json
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll realtime quotes for one instrument
    Watch {
        /// Instrument code (e.g. sh600000)
        code: String,

        /// Polling interval in milliseconds; overrides the config
        #[arg(short, long)]
        interval_ms: Option<u64>,

        #[arg(short, long, value_enum, default_value_t = ModeArg::Line)]
        mode: ModeArg,

        /// Stop after this many quotes
        #[arg(short, long)]
        ticks: Option<usize>,
    },

    /// Load daily bars for a date range
    History {
        /// Instrument code (e.g. sz000001)
        code: String,

        /// First day, YYYY-MM-DD
        #[arg(short, long)]
        start: NaiveDate,

        /// Last day, YYYY-MM-DD
        #[arg(short, long)]
        end: NaiveDate,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Line,
    Bars,
}

impl From<ModeArg> for ChartMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Line => ChartMode::Line,
            ModeArg::Bars => ChartMode::Bars,
        }
    }
}
