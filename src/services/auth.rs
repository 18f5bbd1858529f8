use crate::db::{Database, UserAuthRecord};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

const AUTHORIZE_BASE_URL: &str = "https://shapes.inc/authorize";

/// Credentials sent instead of the bot's API key for an authorized user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub app_id: String,
    pub auth_token: String,
}

impl From<UserAuthRecord> for UserCredentials {
    fn from(record: UserAuthRecord) -> Self {
        Self {
            app_id: record.app_id,
            auth_token: record.auth_token,
        }
    }
}

#[derive(Serialize)]
struct NonceRequest<'a> {
    app_id: &'a str,
    code: &'a str,
}

#[derive(Deserialize)]
struct NonceResponse {
    auth_token: Option<String>,
}

/// Per-user Shapes authorization (`/auth`).
pub struct UserAuthService {
    db: Database,
    http: reqwest::Client,
    auth_url: String,
}

impl UserAuthService {
    pub fn new(db: Database, http: reqwest::Client, auth_url: &str) -> Self {
        Self {
            db,
            http,
            auth_url: auth_url.trim_end_matches('/').to_string(),
        }
    }

    /// App IDs are UUIDs issued by the Shapes developer portal.
    pub fn validate_app_id(raw: &str) -> Option<String> {
        uuid::Uuid::parse_str(raw.trim())
            .ok()
            .map(|id| id.hyphenated().to_string())
    }

    pub fn authorize_url(app_id: &str) -> String {
        format!("{}?app_id={}", AUTHORIZE_BASE_URL, app_id)
    }

    pub async fn credentials(&self, user_id: u64) -> anyhow::Result<Option<UserCredentials>> {
        let user_id = user_id.to_string();
        let record = self
            .db
            .run_blocking(move |db| db.get_user_auth(&user_id))
            .await?;
        Ok(record.map(UserCredentials::from))
    }

    /// Returns true when a token was stored.
    pub async fn revoke(&self, user_id: u64) -> anyhow::Result<bool> {
        let key = user_id.to_string();
        let removed = self
            .db
            .run_blocking(move |db| db.delete_user_auth(&key))
            .await?;
        if removed > 0 {
            info!("Removed Shapes auth token for user {}", user_id);
        }
        Ok(removed > 0)
    }

    /// Trade the one-time code from the authorize page for a user token and store it.
    pub async fn exchange_code(
        &self,
        user_id: u64,
        app_id: &str,
        code: &str,
    ) -> Result<(), ApiError> {
        let res = self
            .http
            .post(format!("{}/nonce", self.auth_url))
            .json(&NonceRequest {
                app_id,
                code: code.trim(),
            })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!("Auth token exchange failed: {} - {}", status, body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let token = res
            .json::<NonceResponse>()
            .await?
            .auth_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("missing auth_token".to_string()))?;

        let (key, app_id) = (user_id.to_string(), app_id.to_string());
        self.db
            .run_blocking(move |db| db.set_user_auth(&key, &app_id, &token))
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("could not store token: {}", e)))?;

        info!("Stored Shapes auth token for user {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    fn service() -> UserAuthService {
        let db = Database::new(&test_config()).unwrap();
        db.execute_init().unwrap();
        UserAuthService::new(db, reqwest::Client::new(), "https://api.shapes.inc/auth/")
    }

    #[test]
    fn test_app_id_validation() {
        assert_eq!(
            UserAuthService::validate_app_id(" 6F8a1c1e-2b1d-4d6e-9b4a-0c8e2f1a9d3b "),
            Some("6f8a1c1e-2b1d-4d6e-9b4a-0c8e2f1a9d3b".to_string())
        );
        assert_eq!(UserAuthService::validate_app_id("not-an-id"), None);
        assert_eq!(UserAuthService::validate_app_id(""), None);
    }

    #[test]
    fn test_authorize_url() {
        assert_eq!(
            UserAuthService::authorize_url("abc"),
            "https://shapes.inc/authorize?app_id=abc"
        );
        assert_eq!(service().auth_url, "https://api.shapes.inc/auth");
    }

    #[tokio::test]
    async fn test_credentials_and_revoke() {
        let auth = service();
        assert!(auth.credentials(9).await.unwrap().is_none());

        auth.db.set_user_auth("9", "app", "tok").unwrap();
        let creds = auth.credentials(9).await.unwrap().unwrap();
        assert_eq!(creds.auth_token, "tok");

        assert!(auth.revoke(9).await.unwrap());
        assert!(!auth.revoke(9).await.unwrap());
    }
}
