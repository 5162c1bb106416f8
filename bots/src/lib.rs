//! Shared wiring for the bot binaries in this crate: each one is a thin
//! driver over the `wiki` library, kept here only to pin down the public
//! surface those bots consume (the bots themselves are out of scope).

use std::path::Path;

use wiki::session::LoginParams;
use wiki::transport::ReqwestTransport;
use wiki::{Result, Wiki};

/// Common CLI-independent connection step: resume a saved session if one
/// exists at `session_path`, otherwise log in fresh (§4.5).
pub async fn connect(session_path: &Path, url: &str, user_name: &str, password: &str) -> Result<Wiki> {
    let params = LoginParams {
        url: url.to_owned(),
        user_name: user_name.to_owned(),
        password: password.to_owned(),
        client_login: true,
        read_site_info: true,
        ..Default::default()
    };
    let transport = ReqwestTransport::new()?;
    Wiki::from_session_file(session_path, params, transport).await
}

pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
