use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build or refresh the corpus embedding index
    Index {
        /// Discard cached embeddings and re-encode the whole corpus
        #[clap(long, default_value = "false")]
        rebuild: bool,
    },

    /// Find the patents most similar to a free-text problem description
    Search {
        /// Free-text description of a technical problem
        query: String,

        /// Number of results to return
        #[clap(short = 'k', long)]
        top_k: Option<usize>,

        /// Print results as JSON
        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Show full detail for one patent record
    Show {
        /// Publication number of the record
        publication_number: String,

        /// Translate the abstract to the configured target language
        #[clap(short, long, default_value = "false")]
        translate: bool,

        /// Print the record as JSON
        #[clap(long, default_value = "false")]
        json: bool,
    },
}
