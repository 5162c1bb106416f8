//! Counts current transclusions for a list of templates and writes the
//! tally to a report page, grounded on
//! `orlodrimbot/templates_stats/parse_templates_lib.cpp`.

use std::path::PathBuf;

use clap::Parser;
use wiki::types::EditFlags;
use wiki::wiki::PAGER_ALL;

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
    /// Fully-namespaced template titles to tally, e.g. "Modèle:Infobox".
    #[arg(long, required = true)]
    templates: Vec<String>,
    #[arg(long)]
    report_page: String,
}

#[tokio::main]
async fn main() -> wiki::Result<()> {
    bots::init_logging();
    let args = Args::parse();
    let password = std::env::var(&args.password_env).unwrap_or_default();
    let wiki = bots::connect(&args.session_file, &args.url, &args.user, &password).await?;

    let mut report = String::from("{| class=\"wikitable sortable\"\n! Modèle !! Utilisations\n");
    for template in &args.templates {
        let count = wiki.get_transclusions(template, PAGER_ALL).await?.len();
        report.push_str(&format!("|-\n| [[{template}]] || {count}\n"));
        tracing::info!(%template, count, "tallied");
    }
    report.push_str("|}\n");

    let (_, token) = wiki.read_page_for_write(&args.report_page).await?;
    wiki.write_page(&token, &report, "Mise à jour des statistiques", EditFlags::ALLOW_BLANKING)
        .await?;
    Ok(())
}
