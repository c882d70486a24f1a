//! Credential exchange with the Yggdrasil-style identity service

use crate::error::AuthError;
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_AUTH_SERVER: &str = "https://authserver.mojang.com";
const AGENT_NAME: &str = "Minecraft";
const AGENT_VERSION: u32 = 1;

/// Proof of a successful login, handed to the transport for online mode.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationToken {
    pub username: String,
    pub access_token: String,
    pub client_token: String,
    pub profile_id: String,
}

#[derive(Serialize)]
struct Agent<'a> {
    name: &'a str,
    version: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateRequest<'a> {
    agent: Agent<'a>,
    username: &'a str,
    password: &'a str,
    client_token: &'a str,
    request_user: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateResponse {
    access_token: String,
    client_token: String,
    selected_profile: Option<Profile>,
}

#[derive(Deserialize)]
struct Profile {
    id: String,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_message: String,
}

/// Random 32 hex digit token identifying this client to the identity service.
pub fn generate_client_token() -> String {
    let mut rng = rand::thread_rng();
    (0..16).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

/// Exchanges a username and password for an [`AuthenticationToken`].
pub async fn authenticate(
    auth_server: &str,
    username: &str,
    password: &str,
) -> Result<AuthenticationToken, AuthError> {
    let client_token = generate_client_token();
    let url = format!("{}/authenticate", auth_server.trim_end_matches('/'));

    let request = AuthenticateRequest {
        agent: Agent {
            name: AGENT_NAME,
            version: AGENT_VERSION,
        },
        username,
        password,
        client_token: &client_token,
        request_user: true,
    };

    debug!("Authenticating {} against {}", username, url);
    let response = reqwest::Client::new().post(url).json(&request).send().await?;
    let body: Value = response.json().await?;

    let token = parse_response(body)?;
    info!("Authenticated as {}", token.username);
    Ok(token)
}

fn parse_response(body: Value) -> Result<AuthenticationToken, AuthError> {
    if body.get("error").is_some() {
        let error: ErrorResponse =
            serde_json::from_value(body).map_err(|e| AuthError::Malformed(e.to_string()))?;
        return Err(AuthError::Service {
            error: error.error,
            message: error.error_message,
        });
    }

    let response: AuthenticateResponse =
        serde_json::from_value(body).map_err(|e| AuthError::Malformed(e.to_string()))?;
    let profile = response
        .selected_profile
        .ok_or_else(|| AuthError::Malformed("account has no selected profile".to_string()))?;

    Ok(AuthenticationToken {
        username: profile.name,
        access_token: response.access_token,
        client_token: response.client_token,
        profile_id: profile.id,
    })
}
