use clap::{Parser, Subcommand};

mod errors;
mod handlers;
mod validation;

pub use handlers::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start histag as a service.
    Daemon {
        /// Address to listen on. Defaults to `listen` from config.yaml
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// Record a page visit: classify it and update history
    Visit {
        /// Page title
        #[clap(short, long)]
        title: String,

        /// Page url
        #[clap(short, long)]
        url: String,

        /// Visit time in epoch milliseconds. Defaults to now
        #[clap(long)]
        time: Option<f64>,
    },

    /// Classify a page without storing anything
    Classify {
        /// Page title
        #[clap(short, long)]
        title: String,

        /// Page url
        #[clap(short, long, default_value = "")]
        url: String,
    },

    /// Semantic search over visited pages
    Search {
        query: String,

        /// Minimum cosine similarity. Defaults to semantic_search.default_threshold
        #[clap(short, long, allow_hyphen_values = true)]
        min_score: Option<f32>,
    },

    /// Recommend pages for the current time of day, optionally biased by a query
    Recommend {
        query: Option<String>,

        #[clap(short, long)]
        limit: Option<usize>,
    },

    /// List visited pages, most recent first
    History {
        /// Show a single entry
        #[clap(short, long)]
        id: Option<u32>,

        /// Only pages carrying all of these tags (comma separated)
        #[clap(short = 'g', long)]
        tags: Option<String>,

        #[clap(short, long)]
        limit: Option<usize>,

        /// Print the count
        #[clap(short = 'c', long, default_value = "false")]
        count: bool,
    },

    /// Print cumulative tag counts (times each tag was newly seen on a page)
    Tags {},

    /// Print aggregate browsing statistics
    Stats {},

    /// Print or replace the label vocabulary
    Labels {
        /// Replace labels (comma separated)
        #[clap(short, long)]
        set: Option<String>,
    },

    /// Import a JSON array of visits ({title, url, lastVisitTime})
    Import { file: String },
}
