//! Refreshes the main page from its source templates and reports failures
//! back onto a wiki page, grounded on
//! `orlodrimbot/update_main_page/update_main_page_lib.cpp`.

use std::path::PathBuf;

use clap::Parser;
use wiki::types::EditFlags;

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
    /// The page whose content is regenerated from `source`.
    #[arg(long)]
    target: String,
    /// The page whose current wikitext is copied onto `target` verbatim.
    #[arg(long)]
    source: String,
    /// Where to report failures, if the refresh can't complete.
    #[arg(long)]
    error_report: Option<String>,
}

#[tokio::main]
async fn main() -> wiki::Result<()> {
    bots::init_logging();
    let args = Args::parse();
    let password = std::env::var(&args.password_env).unwrap_or_default();
    let wiki = bots::connect(&args.session_file, &args.url, &args.user, &password).await?;

    let source = wiki.read_page(&args.source, wiki::wiki::RevProp::CONTENT).await;
    let result = async {
        let source = source?;
        let content = source.content.ok_or_else(|| {
            wiki::Error::InvalidState(format!("{} has no content", args.source))
        })?;
        let (_, token) = wiki.read_page_for_write(&args.target).await?;
        wiki.write_page(&token, &content, "Mise à jour automatique", EditFlags::empty()).await
    }
    .await;

    match result {
        Ok(_) => tracing::info!(target = %args.target, "main page refreshed"),
        Err(e) => {
            tracing::warn!(error = %e, "refresh failed");
            if let Some(report_page) = &args.error_report {
                let (_, token) = wiki.read_page_for_write(report_page).await?;
                let report = format!("* {}\n", e);
                wiki.write_page(&token, &report, "Rapport d'erreur", EditFlags::ALLOW_BLANKING)
                    .await?;
            }
        }
    }
    Ok(())
}
