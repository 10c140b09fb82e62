use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "flashapi")]
#[command(author, version, about = "Telegram Mini App relay for flashcard progress and daily stats", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Keep state in process memory instead of the remote store
        #[arg(long)]
        memory_store: bool,
    },

    /// Check an initData string against the configured bot token
    Verify {
        /// Raw initData query string, as sent by the Telegram client
        init_data: String,

        /// Maximum accepted age of auth_date in seconds (overrides INIT_DATA_MAX_AGE_SECS)
        #[arg(long)]
        max_age: Option<u64>,
    },

    /// Produce a signed initData string for local testing
    Sign {
        /// Telegram user id
        #[arg(short, long)]
        user_id: i64,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        first_name: Option<String>,

        /// Unix timestamp to sign (defaults to now)
        #[arg(long)]
        auth_date: Option<i64>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
