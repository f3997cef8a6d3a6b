use std::collections::HashMap;

use serde::Deserialize;
use tiny_http::{Response, Server};
use tracing::debug;
use url::Url;

use super::pkce::{random_string, PkceChallenge, CHALLENGE_METHOD};
use crate::connection::Http;
use crate::error::{Error, Result};

const CALLBACK_PATH: &str = "/callback";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    /// Some servers omit the refresh token on refresh; callers keep the old one.
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

pub fn token_url(auth_url: &str) -> String {
    format!("{}/protocol/openid-connect/token", auth_url.trim_end_matches('/'))
}

fn authorize_url(auth_url: &str) -> String {
    format!("{}/protocol/openid-connect/auth", auth_url.trim_end_matches('/'))
}

fn logout_url(auth_url: &str) -> String {
    format!("{}/protocol/openid-connect/logout", auth_url.trim_end_matches('/'))
}

fn auth_failed(reason: impl Into<String>) -> Error {
    Error::AuthenticationFailed {
        reason: reason.into(),
    }
}

/// Exchanges a refresh token for a new token pair.
pub fn refresh_token(
    http: &Http,
    auth_url: &str,
    client_id: &str,
    refresh_token: &str,
    scopes: &[String],
) -> Result<TokenPair> {
    let scope = scopes.join(" ");
    let params = [
        ("grant_type", "refresh_token"),
        ("client_id", client_id),
        ("refresh_token", refresh_token),
        ("scope", scope.as_str()),
    ];
    request_tokens(http, auth_url, &params)
}

fn exchange_code_for_token(
    http: &Http,
    auth_url: &str,
    client_id: &str,
    code: &str,
    verifier: &str,
    redirect_uri: &str,
) -> Result<TokenPair> {
    let params = [
        ("grant_type", "authorization_code"),
        ("client_id", client_id),
        ("code", code),
        ("code_verifier", verifier),
        ("redirect_uri", redirect_uri),
    ];
    request_tokens(http, auth_url, &params)
}

fn request_tokens(http: &Http, auth_url: &str, params: &[(&str, &str)]) -> Result<TokenPair> {
    let url = token_url(auth_url);
    debug!(%url, grant_type = params[0].1, "requesting tokens");

    let response = http
        .send(http.client().post(&url).form(params))
        .map_err(|e| auth_failed(format!("could not reach {url}: {e}")))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| auth_failed(format!("could not read token response: {e}")))?;

    let parsed: Option<TokenResponse> = serde_json::from_str(&body).ok();
    if let Some(TokenResponse {
        error: Some(error),
        error_description,
        ..
    }) = &parsed
    {
        return Err(match error_description {
            Some(desc) if !desc.is_empty() => auth_failed(format!("{error}: {desc}")),
            _ => auth_failed(error.clone()),
        });
    }
    if !status.is_success() {
        return Err(auth_failed(format!("token endpoint returned {status}")));
    }

    let response = parsed.ok_or_else(|| auth_failed("malformed token response"))?;
    let access_token = response
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| auth_failed("token response is missing an access token"))?;

    Ok(TokenPair {
        access_token,
        refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
    })
}

/// Ends the SSO session tied to `refresh_token`.
pub fn logout(http: &Http, auth_url: &str, client_id: &str, refresh_token: &str) -> Result<()> {
    let url = logout_url(auth_url);
    let params = [("client_id", client_id), ("refresh_token", refresh_token)];
    let response = http.send(http.client().post(&url).form(&params))?;
    if !response.status().is_success() {
        return Err(auth_failed(format!(
            "logout endpoint returned {}",
            response.status()
        )));
    }
    Ok(())
}

/// Browser login using the authorization-code flow with PKCE. A local
/// callback server on a random port receives the authorization code.
pub fn login_with_browser(
    http: &Http,
    auth_url: &str,
    client_id: &str,
    scopes: &[String],
    open: bool,
) -> Result<TokenPair> {
    let pkce = PkceChallenge::generate();
    let state = random_string(32);

    let server = Server::http("127.0.0.1:0")
        .map_err(|e| auth_failed(format!("could not start local callback server: {e}")))?;
    let port = server
        .server_addr()
        .to_ip()
        .map(|addr| addr.port())
        .ok_or_else(|| auth_failed("callback server is not listening on a TCP port"))?;
    let redirect_uri = format!("http://localhost:{port}{CALLBACK_PATH}");

    let authorize = authorize_url(auth_url);
    let mut url = Url::parse(&authorize).map_err(|source| Error::InvalidUrl {
        input: authorize,
        source,
    })?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &redirect_uri)
        .append_pair("scope", &scopes.join(" "))
        .append_pair("state", &state)
        .append_pair("code_challenge", &pkce.challenge)
        .append_pair("code_challenge_method", CHALLENGE_METHOD);

    if open {
        eprintln!("Opening browser for authentication...");
        eprintln!("If browser doesn't open, visit:\n{}", url);
        if let Err(e) = open_browser(url.as_str()) {
            debug!(error = %e, "could not open browser");
        }
    } else {
        eprintln!("Visit this URL to log in:\n{}", url);
    }

    eprintln!("Waiting for authorization...");
    let code = wait_for_code(&server, &state)?;

    exchange_code_for_token(
        http,
        auth_url,
        client_id,
        &code,
        &pkce.verifier,
        &redirect_uri,
    )
}

fn wait_for_code(server: &Server, state: &str) -> Result<String> {
    for request in server.incoming_requests() {
        let Ok(parsed) = Url::parse(&format!("http://localhost{}", request.url())) else {
            let _ = request.respond(Response::from_string("Bad request").with_status_code(400));
            continue;
        };
        if parsed.path() != CALLBACK_PATH {
            let _ = request.respond(Response::from_string("Not found").with_status_code(404));
            continue;
        }
        let params: HashMap<_, _> = parsed.query_pairs().collect();

        if let Some(error) = params.get("error") {
            let desc = params
                .get("error_description")
                .map(|s| s.to_string())
                .unwrap_or_default();
            let _ = request.respond(Response::from_string(format!(
                "Authorization failed: {} - {}",
                error, desc
            )));
            return Err(auth_failed(format!("{error}: {desc}")));
        }

        if let (Some(code), Some(recv_state)) = (params.get("code"), params.get("state")) {
            if recv_state.as_ref() != state {
                let _ = request.respond(Response::from_string("State mismatch! Please try again."));
                return Err(auth_failed("OAuth state mismatch"));
            }

            let _ = request.respond(Response::from_string(
                "Authentication successful! You can close this window and return to your terminal.",
            ));
            return Ok(code.to_string());
        }

        let _ = request.respond(Response::from_string("Missing code").with_status_code(400));
    }

    Err(auth_failed(
        "callback server stopped before authorization completed",
    ))
}

fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    std::process::Command::new("open").arg(url).spawn()?;

    #[cfg(target_os = "linux")]
    std::process::Command::new("xdg-open").arg(url).spawn()?;

    #[cfg(target_os = "windows")]
    std::process::Command::new("cmd")
        .args(["/C", "start", url])
        .spawn()?;

    Ok(())
}
