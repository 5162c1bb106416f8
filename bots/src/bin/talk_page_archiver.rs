//! Drives [`wiki::archiver::Archiver`] over every talk page transcluding the
//! archiving configuration template, grounded on
//! `orlodrimbot/talk_page_archiver/main.cpp`. Out of scope to fully port;
//! this pins down the public surface the real bot would consume.

use std::path::PathBuf;

use clap::Parser;
use wiki::archiver::{frwiki_algorithms::frwiki_algorithms, Archiver, StableRevids};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// API entry point, e.g. https://fr.wikipedia.org/w/api.php
    #[arg(long)]
    url: String,

    /// Bot account name.
    #[arg(long)]
    user: String,

    /// Environment variable holding the bot password.
    #[arg(long, default_value = "WIKI_BOT_PASSWORD")]
    password_env: String,

    /// Where to keep the saved login session.
    #[arg(long, default_value = "session.txt")]
    session_file: PathBuf,

    /// Where to keep the stable-revid cache between runs.
    #[arg(long, default_value = "stable_revids.txt")]
    stable_revids_file: PathBuf,

    /// Template whose transclusions are the candidate talk pages, e.g.
    /// "Modèle:Archivage par bot".
    #[arg(long, default_value = "Modèle:Archivage par bot")]
    template: String,
}

#[tokio::main]
async fn main() -> wiki::Result<()> {
    bots::init_logging();
    let args = Args::parse();
    let password = std::env::var(&args.password_env).unwrap_or_default();

    let wiki = bots::connect(&args.session_file, &args.url, &args.user, &password).await?;
    let mut stable_revids = StableRevids::load_from_file(&args.stable_revids_file)
        .await
        .unwrap_or_default();

    let archiver = Archiver::new(&wiki, args.user.clone(), frwiki_algorithms());
    let results = archiver
        .archive_all(&args.template, &mut stable_revids)
        .await?;

    for (title, result) in &results {
        match result {
            Ok(Some(stats)) => tracing::info!(%title, archived = stats.archived, erased = stats.erased, "archived"),
            Ok(None) => tracing::debug!(%title, "nothing due"),
            Err(e) => tracing::warn!(%title, error = %e, "archiving failed"),
        }
    }

    stable_revids
        .save_to_file(&args.stable_revids_file)
        .await
        .map_err(wiki::Error::System)?;
    Ok(())
}
