//! Provisioning portal
//!
//! While the device is its own access point, an HTTP responder serves the
//! credential form and a DNS responder steers every hostname at it. The
//! session ends on the first valid submission or on the overall timeout,
//! after which the access point and both responders are torn down.

use std::net::Ipv4Addr;

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tower_http::trace::TraceLayer;

use super::{dns, Credentials};
use crate::config::PortalConfig;
use crate::connectivity::NetworkLink;
use crate::{Error, Result};

/// Minimum passphrase length accepted by the form (WPA2 requirement)
const MIN_PASSPHRASE: usize = 8;

/// Extensions that get a plain 404 instead of the captive redirect
const ASSET_EXTENSIONS: &[&str] = &[
    ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2",
];

/// Credential form fields
#[derive(Debug, Deserialize)]
pub struct CredentialForm {
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

/// Validate a submission: non-empty network name, passphrase of at least
/// eight characters.
fn validate(form: &CredentialForm) -> std::result::Result<Credentials, &'static str> {
    let ssid = form.ssid.trim();
    if ssid.is_empty() {
        return Err("Network name must not be empty.");
    }
    if form.password.len() < MIN_PASSPHRASE {
        return Err("Passphrase must be at least 8 characters.");
    }
    Ok(Credentials {
        ssid: ssid.to_string(),
        passphrase: form.password.clone(),
    })
}

/// Run one provisioning session: AP up, responders up, wait for a valid
/// submission or the timeout, tear everything down.
///
/// Returns the submitted credentials, or `None` on timeout.
///
/// # Errors
///
/// Returns error if the access point or a responder cannot be started.
pub async fn run(link: &dyn NetworkLink, config: &PortalConfig) -> Result<Option<Credentials>> {
    link.start_access_point(&config.ssid, config.address).await?;

    // Bind before spawning so a failed bind aborts the session instead of
    // leaving the portal up without its captive redirect
    let dns_socket = dns::bind(config.dns_port).await?;
    let dns_task = tokio::spawn(dns::serve(dns_socket, config.address));

    let (tx, mut rx) = mpsc::channel(1);
    let shutdown = std::sync::Arc::new(Notify::new());

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.http_port))
        .await
        .map_err(|e| Error::Provisioning(format!("portal bind failed: {e}")))?;
    tracing::info!(port = config.http_port, "provisioning portal listening");

    let server_shutdown = std::sync::Arc::clone(&shutdown);
    let app = router(tx);
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.notified().await })
            .await
    });

    let credentials = tokio::time::timeout(config.timeout, rx.recv())
        .await
        .ok()
        .flatten();

    match &credentials {
        Some(c) => tracing::info!(ssid = %c.ssid, "credentials collected"),
        None => tracing::warn!("provisioning timed out without a submission"),
    }

    // Tear down both responders and the AP before switching modes
    shutdown.notify_waiters();
    if let Err(e) = server.await {
        tracing::debug!(error = %e, "portal server task ended abnormally");
    }
    dns_task.abort();
    if let Err(e) = link.stop_access_point().await {
        tracing::warn!(error = %e, "failed to stop access point");
    }

    Ok(credentials)
}

/// Build the portal router; exposed for tests
pub fn router(tx: mpsc::Sender<Credentials>) -> Router {
    Router::new()
        .route("/", get(form_page))
        .route("/save", post(save))
        .fallback(captive_fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(tx)
}

async fn form_page() -> Html<String> {
    Html(render_form(None))
}

async fn save(
    State(tx): State<mpsc::Sender<Credentials>>,
    Form(form): Form<CredentialForm>,
) -> Html<String> {
    match validate(&form) {
        Ok(credentials) => {
            let ssid = credentials.ssid.clone();
            if tx.send(credentials).await.is_err() {
                // Session already completed; re-submissions land here
                tracing::debug!("credential submission after session end");
            }
            Html(render_success(&ssid))
        }
        Err(message) => Html(render_form(Some(message))),
    }
}

/// Unrecognized paths produce the captive-portal experience: a redirect to
/// the form, except for asset lookups which get a plain 404.
async fn captive_fallback(uri: Uri) -> axum::response::Response {
    let path = uri.path();
    if ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        StatusCode::NOT_FOUND.into_response()
    } else {
        Redirect::temporary("/").into_response()
    }
}

fn render_form(error: Option<&str>) -> String {
    let error_block = error.map_or_else(String::new, |message| {
        format!(r#"<p class="error">{message}</p>"#)
    });
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Chime Setup</title><meta name="viewport" content="width=device-width, initial-scale=1"></head>
<body>
<h1>Connect your Chime</h1>
{error_block}
<form method="post" action="/save">
  <label>Network name <input name="ssid" required></label><br>
  <label>Passphrase <input name="password" type="password" minlength="8" required></label><br>
  <button type="submit">Save</button>
</form>
</body>
</html>"#
    )
}

fn render_success(ssid: &str) -> String {
    format!(
        r"<!DOCTYPE html>
<html>
<head><title>Chime Setup</title></head>
<body>
<h1>Saved</h1>
<p>Chime will now connect to {ssid}. You can close this page.</p>
</body>
</html>"
    )
}
