//! Archives a single fixed bot-requests noticeboard page, grounded on
//! `orlodrimbot/bot_requests_archiver/bot_requests_archiver_lib.cpp`. The
//! noticeboard uses the same `{{Archivage par bot}}` convention as any other
//! talk page, so this is a one-page specialization of the generic archiver.

use std::path::PathBuf;

use clap::Parser;
use wiki::archiver::{frwiki_algorithms::frwiki_algorithms, Archiver};

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
    /// The noticeboard page to archive.
    #[arg(long, default_value = "Wikipédia:Bot/Requêtes")]
    page: String,
}

#[tokio::main]
async fn main() -> wiki::Result<()> {
    bots::init_logging();
    let args = Args::parse();
    let password = std::env::var(&args.password_env).unwrap_or_default();
    let wiki = bots::connect(&args.session_file, &args.url, &args.user, &password).await?;

    let archiver = Archiver::new(&wiki, args.user.clone(), frwiki_algorithms());
    match archiver.archive_page(&args.page).await {
        Ok(Some(stats)) => tracing::info!(archived = stats.archived, erased = stats.erased, "archived"),
        Ok(None) => tracing::debug!("nothing due"),
        Err(e) => tracing::warn!(error = %e, "archiving failed"),
    }
    Ok(())
}
