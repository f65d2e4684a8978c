//! Command-line surface for the pipeline monitor.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use pipeline_core::{PipelineVariant, StageId, TargetSelection};
use pipeline_logging::LogDestination;
use serde::Deserialize;

pub const DEFAULT_CONFIG: &str = "pipeline.ron";

#[derive(Parser, Debug)]
#[command(
    name = "pipeline-sync",
    version,
    about = "Live view of the outreach pipeline and its stage actions"
)]
pub struct Cli {
    /// RON settings file; defaults are used when it does not exist
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Backend root URL, overriding the settings file
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Which pipeline to follow, overriding the settings file
    #[arg(long, value_enum)]
    pub variant: Option<VariantArg>,

    /// Where log output goes, overriding the settings file
    #[arg(long, value_enum)]
    pub log: Option<LogTarget>,

    /// Log at debug level
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Watch)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Keep polling and print every change until interrupted (default)
    Watch,
    /// Print one snapshot and exit
    Once,
    /// Run a stage action and report the backend's answer
    Run {
        #[arg(value_enum)]
        stage: StageArg,
        /// Explicit record ids; the backend picks ready records when omitted
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<String>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantArg {
    Website,
    Social,
}

impl From<VariantArg> for PipelineVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Website => PipelineVariant::Website,
            VariantArg::Social => PipelineVariant::Social,
        }
    }
}

#[derive(ValueEnum, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogTarget {
    File,
    #[default]
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageArg {
    Discovery,
    Scraping,
    Verification,
    Qualification,
    Drafting,
    Sending,
    #[value(name = "followup")]
    FollowUp,
}

impl From<StageArg> for StageId {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Discovery => StageId::Discovery,
            StageArg::Scraping => StageId::Scraping,
            StageArg::Verification => StageId::Verification,
            StageArg::Qualification => StageId::Qualification,
            StageArg::Drafting => StageId::Drafting,
            StageArg::Sending => StageId::Sending,
            StageArg::FollowUp => StageId::FollowUp,
        }
    }
}

pub fn selection(ids: &[String]) -> TargetSelection {
    if ids.is_empty() {
        TargetSelection::AutoSelect
    } else {
        TargetSelection::Ids(ids.to_vec())
    }
}
