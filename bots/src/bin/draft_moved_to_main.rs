//! Reports recent moves out of the Draft namespace into the main namespace,
//! grounded on `orlodrimbot/draft_moved_to_main/draft_moved_to_main_lib.cpp`.

use std::path::PathBuf;

use clap::Parser;
use wiki::types::LogType;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long)]
    url: String,
    #[arg(long)]
    user: String,
    #[arg(long, default_value = "WIKI_BOT_PASSWORD")]
    password_env: String,
    #[arg(long, default_value = "session.txt")]
    session_file: PathBuf,
    #[arg(long, default_value_t = 50)]
    limit: i64,
}

#[tokio::main]
async fn main() -> wiki::Result<()> {
    bots::init_logging();
    let args = Args::parse();
    let password = std::env::var(&args.password_env).unwrap_or_default();
    let wiki = bots::connect(&args.session_file, &args.url, &args.user, &password).await?;

    let events = wiki.get_log_events(Some(LogType::Move), args.limit).await?;
    for event in events {
        if event.title.starts_with("Brouillon:") {
            if let Some(params) = &event.move_params {
                if !params.new_title.starts_with("Brouillon:") {
                    tracing::info!(from = %event.title, to = %params.new_title, "draft moved to main");
                }
            }
        }
    }
    Ok(())
}
