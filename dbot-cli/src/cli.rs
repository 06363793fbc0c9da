//! CLI parser.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dbot")]
#[command(about = "Telegram dispatch demo bot", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the demo bot with long polling (config from env; token can override BOT_TOKEN).
    Run {
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Dispatch one text message through the demo handlers offline and print the result.
    Route {
        /// Message text, e.g. "/echo hello".
        text: String,
        #[arg(long, default_value_t = 1)]
        chat_id: i64,
        #[arg(long, default_value_t = 1)]
        user_id: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route() {
        let cli = Cli::try_parse_from(["dbot", "route", "/echo hi", "--chat-id", "5"]).unwrap();
        match cli.command {
            Commands::Route { text, chat_id, user_id } => {
                assert_eq!(text, "/echo hi");
                assert_eq!(chat_id, 5);
                assert_eq!(user_id, 1);
            }
            _ => panic!("expected route"),
        }
    }

    #[test]
    fn test_parse_run_with_token() {
        let cli = Cli::try_parse_from(["dbot", "run", "--token", "abc"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { token: Some(t) } if t == "abc"));
    }
}
