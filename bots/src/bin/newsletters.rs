//! Delivers a newsletter page to every subscriber on its distribution list,
//! grounded on `orlodrimbot/newsletters/newsletter_distributor.cpp`.

use std::path::PathBuf;

use clap::Parser;
use wiki::types::EditFlags;
use wiki::wiki::RevProp;

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
    /// The newsletter issue to deliver.
    #[arg(long)]
    issue: String,
    /// Page listing one subscriber talk page per line.
    #[arg(long)]
    subscriber_list: String,
    #[arg(long, default_value = "Distribution de la newsletter")]
    summary: String,
}

#[tokio::main]
async fn main() -> wiki::Result<()> {
    bots::init_logging();
    let args = Args::parse();
    let password = std::env::var(&args.password_env).unwrap_or_default();
    let wiki = bots::connect(&args.session_file, &args.url, &args.user, &password).await?;

    let issue = wiki.read_page(&args.issue, RevProp::CONTENT).await?;
    let content = issue
        .content
        .ok_or_else(|| wiki::Error::InvalidState(format!("{} has no content", args.issue)))?;

    let list = wiki.read_page(&args.subscriber_list, RevProp::CONTENT).await?;
    let subscribers = list.content.unwrap_or_default();

    let mut delivered = 0usize;
    for talk_page in subscribers.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match wiki.append_to_page(talk_page, &content, &args.summary, EditFlags::empty()).await {
            Ok(_) => delivered += 1,
            Err(e) => tracing::warn!(%talk_page, error = %e, "delivery failed"),
        }
    }
    tracing::info!(delivered, "newsletter distributed");
    Ok(())
}
