use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::client::{decode, is_success, rejected, MboxClient};
use super::AuthApi;
use crate::error::{ApiError, ApiResult};
use crate::models::{RawUser, Session, UserProfile};

const USER_PATH: &str = "/mbox/user";
const VERIFIED_MARKER: &str = "Email Verified Successfully";

#[derive(Debug, Deserialize)]
struct SignInResponse {
    status: Option<String>,
    message: Option<String>,
    token: Option<String>,
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SingleUserResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(rename = "Add", alias = "data")]
    user: Option<RawUser>,
}

#[async_trait]
impl AuthApi for MboxClient {
    async fn sign_in(&self, email: &str, password: &str) -> ApiResult<Session> {
        let url = format!("{}/signin", self.url(USER_PATH));
        let body = self
            .send_lenient(
                self.client
                    .post(&url)
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;
        let parsed: SignInResponse = decode(&body)?;
        if !is_success(parsed.status.as_deref()) {
            return Err(rejected(parsed.message));
        }
        let token = parsed
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::Malformed("sign-in reply without token".into()))?;
        let user = parsed
            .user
            .map(UserProfile::from)
            .ok_or_else(|| ApiError::Malformed("sign-in reply without user".into()))?;
        Ok(Session { token, user })
    }

    async fn sign_up(&self, name: &str, email: &str, password: &str) -> ApiResult<()> {
        let url = format!("{}/signup", self.url(USER_PATH));
        let body = self
            .send_lenient(self.client.post(&url).json(&json!({
                "name": name,
                "email": email,
                "password": password
            })))
            .await?;
        let parsed: StatusResponse = decode(&body)?;
        if !is_success(parsed.status.as_deref()) {
            return Err(rejected(parsed.message));
        }
        Ok(())
    }

    async fn verify_email(&self, token: &str) -> ApiResult<bool> {
        let url = format!(
            "{}/verify/{}",
            self.url(USER_PATH),
            urlencoding::encode(token)
        );
        let body = self.send_lenient(self.client.get(&url)).await?;
        Ok(String::from_utf8_lossy(&body).contains(VERIFIED_MARKER))
    }

    async fn resend_verification(&self, email: &str) -> ApiResult<()> {
        let url = format!("{}/verify", self.url(USER_PATH));
        let body = self
            .send_lenient(self.client.post(&url).json(&json!({ "email": email })))
            .await?;
        let parsed: StatusResponse = decode(&body)?;
        if !is_success(parsed.status.as_deref()) {
            return Err(rejected(parsed.message));
        }
        Ok(())
    }

    async fn fetch_user(&self, token: &str, user_id: &str) -> ApiResult<UserProfile> {
        let url = format!(
            "{}/single/{}",
            self.url(USER_PATH),
            urlencoding::encode(user_id)
        );
        let parsed: SingleUserResponse = self
            .get_json(self.client.get(&url).bearer_auth(token))
            .await?;
        if !is_success(parsed.status.as_deref()) {
            return Err(rejected(parsed.message));
        }
        parsed
            .user
            .map(UserProfile::from)
            .ok_or_else(|| ApiError::Rejected {
                message: "Failed to retrieve user data".to_string(),
            })
    }
}
