//! Microsoft OAuth authentication module
//!
//! Refreshes Microsoft access tokens and exchanges them for Minecraft
//! service tokens before a launch.

use crate::game::launcher::error::AuthError;
use crate::game::launcher::traits::AuthService;
use crate::game::launcher::types::Credential;
use async_trait::async_trait;
use chrono::Utc;
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{AuthUrl, ClientId, RefreshToken, RequestTokenError, TokenResponse, TokenUrl};

/// Microsoft OAuth endpoints
const AUTHORIZATION_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/authorize";
const TOKEN_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";

/// Minecraft OAuth client ID - Official Minecraft Launcher client ID
pub const CLIENT_ID: &str = "9c203c7d-1816-4d24-87f2-9731ce05e187";

/// Tokens expiring within this many minutes are refreshed before launch
pub const REFRESH_SKEW_MINUTES: i64 = 5;

/// Used when the service reports no lifetime
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Create OAuth2 client for Microsoft authentication
pub fn get_auth_client() -> Result<BasicClient, AuthError> {
    let auth_url = AuthUrl::new(AUTHORIZATION_URL.to_string())
        .map_err(|e| AuthError::Network(e.to_string()))?;
    let token_url =
        TokenUrl::new(TOKEN_URL.to_string()).map_err(|e| AuthError::Network(e.to_string()))?;

    Ok(BasicClient::new(
        ClientId::new(CLIENT_ID.to_string()),
        None,
        auth_url,
        Some(token_url),
    ))
}

/// Refresh an expired access token using refresh token
pub async fn refresh_access_token(
    client: &BasicClient,
    refresh_token: String,
) -> Result<BasicTokenResponse, AuthError> {
    log::info!("[auth] Attempting to refresh Microsoft access token");
    match client
        .exchange_refresh_token(&RefreshToken::new(refresh_token))
        .request_async(async_http_client)
        .await
    {
        Ok(token) => {
            log::info!(
                "[auth] Successfully refreshed Microsoft access token (expires_in: {:?})",
                token.expires_in()
            );
            Ok(token)
        }
        Err(RequestTokenError::ServerResponse(resp))
            if *resp.error() == BasicErrorResponseType::InvalidGrant =>
        {
            log::warn!("[auth] Refresh token was rejected; the session has expired");
            Err(AuthError::SessionExpired)
        }
        Err(RequestTokenError::Request(e)) => {
            log::error!("[auth] Token refresh request failed: {}", e);
            Err(AuthError::Network(e.to_string()))
        }
        Err(e) => {
            log::error!("[auth] Failed to refresh Microsoft access token: {:?}", e);
            Err(AuthError::Network(format!("{:?}", e)))
        }
    }
}

/// Exchange Microsoft access token for Minecraft token
pub async fn exchange_for_minecraft_token(
    microsoft_access_token: &str,
) -> Result<minecraft_msa_auth::MinecraftAuthenticationResponse, AuthError> {
    // minecraft-msa-auth uses reqwest 0.12, so we use reqwest12 alias
    let client = reqwest12::Client::new();
    log::info!("[auth] Exchanging Microsoft access token for Minecraft token");
    minecraft_msa_auth::MinecraftAuthorizationFlow::new(client)
        .exchange_microsoft_token(microsoft_access_token)
        .await
        .map(|resp| {
            log::info!("[auth] Successfully exchanged Microsoft token for Minecraft token");
            resp
        })
        .map_err(|e| {
            log::error!("[auth] Failed to exchange for Minecraft token: {:?}", e);
            AuthError::Exchange(format!("{:?}", e))
        })
}

/// `AuthService` backed by Microsoft and Minecraft services
pub struct MicrosoftAuthService {
    client: BasicClient,
    skew: chrono::Duration,
}

impl MicrosoftAuthService {
    pub fn new() -> Result<Self, AuthError> {
        Ok(Self {
            client: get_auth_client()?,
            skew: chrono::Duration::minutes(REFRESH_SKEW_MINUTES),
        })
    }

    pub fn needs_refresh(&self, credential: &Credential) -> bool {
        credential.is_online() && credential.expires_within(Utc::now(), self.skew)
    }
}

#[async_trait]
impl AuthService for MicrosoftAuthService {
    async fn validate_and_refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        if !self.needs_refresh(credential) {
            return Ok(credential.clone());
        }

        let refresh_token = credential
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MissingRefreshToken(credential.username.clone()))?;

        let token = refresh_access_token(&self.client, refresh_token).await?;
        let ms_access_token = token.access_token().secret().clone();
        let ms_refresh_token = token.refresh_token().map(|r| r.secret().clone());

        let minecraft = exchange_for_minecraft_token(&ms_access_token).await?;
        let expires_in_secs = match minecraft.expires_in() as u64 {
            0 => DEFAULT_TOKEN_LIFETIME_SECS,
            secs => secs,
        };

        let mut refreshed = credential.clone();
        refreshed.access_token = minecraft.access_token().clone().into_inner();
        if let Some(rt) = ms_refresh_token {
            refreshed.refresh_token = Some(rt);
        }
        refreshed.expires_at =
            Some(Utc::now() + chrono::Duration::seconds(expires_in_secs as i64));

        log::info!("[auth] Refreshed tokens for account: {}", credential.uuid);
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::launcher::types::AccountKind;

    fn online(expires_in: chrono::Duration) -> Credential {
        let mut cred = Credential::offline("Alex", "uuid-1");
        cred.kind = AccountKind::Msa;
        cred.access_token = "mc-token".to_string();
        cred.expires_at = Some(Utc::now() + expires_in);
        cred
    }

    #[tokio::test]
    async fn fresh_token_passes_through() {
        let service = MicrosoftAuthService::new().unwrap();
        let cred = online(chrono::Duration::hours(2));
        assert!(!service.needs_refresh(&cred));
        assert_eq!(service.validate_and_refresh(&cred).await.unwrap(), cred);
    }

    #[tokio::test]
    async fn offline_credential_is_never_refreshed() {
        let service = MicrosoftAuthService::new().unwrap();
        let cred = Credential::offline("Steve", "uuid-2");
        assert_eq!(service.validate_and_refresh(&cred).await.unwrap(), cred);
    }

    #[tokio::test]
    async fn expiring_token_without_refresh_token_fails() {
        let service = MicrosoftAuthService::new().unwrap();
        let cred = online(chrono::Duration::minutes(1));
        assert!(service.needs_refresh(&cred));
        assert!(matches!(
            service.validate_and_refresh(&cred).await,
            Err(AuthError::MissingRefreshToken(name)) if name == "Alex"
        ));
    }
}
