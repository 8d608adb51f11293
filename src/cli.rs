use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use docsage::config::EnhancementFeature;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file
    #[clap(short, long, default_value = "docsage.yaml")]
    pub config: PathBuf,

    /// Log at debug level (RUST_LOG takes precedence)
    #[clap(short, long, default_value = "false")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Grammar,
    Clarity,
    Consistency,
}

impl From<Feature> for EnhancementFeature {
    fn from(feature: Feature) -> Self {
        match feature {
            Feature::Grammar => EnhancementFeature::Grammar,
            Feature::Clarity => EnhancementFeature::Clarity,
            Feature::Consistency => EnhancementFeature::Consistency,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Show entry count, size and hit rate
    Stats {},
    /// Remove every cached entry
    Clear {},
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index every markdown file under a directory and save the index
    Index {
        /// Documentation root
        docs_dir: PathBuf,
    },

    /// Search the index
    Search {
        query: String,

        /// Maximum number of results
        #[clap(short, long)]
        limit: Option<usize>,

        /// Semantic share of the score, 0.0 (keywords only) to 1.0
        #[clap(short = 'w', long)]
        semantic_weight: Option<f32>,
    },

    /// Print index statistics
    Stats {},

    /// Enhance a markdown file and show the changes
    Enhance {
        file: PathBuf,

        /// Write the result back to the file
        #[clap(long, default_value = "false")]
        apply: bool,

        /// Passes to run, comma separated. Defaults to the configured ones
        #[clap(long, value_delimiter = ',')]
        features: Option<Vec<Feature>>,
    },

    /// Inspect or clear the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}
