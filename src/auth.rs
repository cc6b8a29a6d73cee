//! Login, registration and session restore against the remote API.

use reqwest::Method;

use crate::api::{to_body, ApiClient};
use crate::config::endpoints;
use crate::error::{BoardError, Result};
use crate::models::{Credentials, LoginResponse, NewAccount, RegisterResponse, User};

pub const REGISTERED_NOTICE: &str = "Account created. Log in to continue.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() || self.email.trim().is_empty() || self.password.is_empty() {
            return Err(BoardError::validation("Username, email and password are required"));
        }
        if self.password != self.confirm_password {
            return Err(BoardError::validation("Passwords do not match"));
        }
        Ok(())
    }
}

/// Exchange credentials for a token and start the session.
pub async fn login(client: &ApiClient, username: &str, password: &str) -> Result<User> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(BoardError::validation("Username and password are required"));
    }

    let body = to_body(&Credentials { username, password })?;
    let response: LoginResponse = client
        .request_as(Method::POST, endpoints::LOGIN, Some(&body))
        .await?;

    client
        .session()
        .login(response.user.clone(), response.token)?;
    Ok(response.user)
}

/// Create an account. Does not log in.
pub async fn register(client: &ApiClient, form: &RegisterForm) -> Result<User> {
    form.validate()?;

    let body = to_body(&NewAccount {
        username: form.username.trim(),
        email: form.email.trim(),
        password: &form.password,
    })?;
    let response: RegisterResponse = client
        .request_as(Method::POST, endpoints::REGISTER, Some(&body))
        .await?;

    if let Some(message) = &response.message {
        log::info!("{}", message);
    }
    Ok(response.user)
}

/// Validate a stored token by asking who it belongs to. A rejected token
/// ends the session; other failures are returned untouched.
pub async fn restore(client: &ApiClient) -> Result<Option<User>> {
    if !client.session().is_authenticated() {
        return Ok(None);
    }

    match client.current_user().await {
        Ok(user) => {
            client.session().set_user(user.clone());
            Ok(Some(user))
        }
        Err(err) if err.is_unauthorized() => {
            log::warn!("Stored session rejected: {}", err);
            client.session().logout()?;
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

pub fn logout(client: &ApiClient) -> Result<()> {
    client.session().logout()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::SessionHandle;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server_uri: &str) -> ApiClient {
        let config = Config {
            api_url: server_uri.to_string(),
            data_dir: std::env::temp_dir(),
            timeout: Duration::from_secs(5),
        };
        ApiClient::new(&config, SessionHandle::in_memory()).unwrap()
    }

    fn form(password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            username: "ana".to_string(),
            email: "ana@example.com".to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[tokio::test]
    async fn mismatched_passwords_send_nothing() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server.uri());

        let err = register(&client, &form("a", "b")).await.unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_posts_account_without_confirmation() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/register"))
            .and(body_json(json!({
                "username": "ana",
                "email": "ana@example.com",
                "password": "pw"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "message": "User created successfully!",
                "user": {"id": 3, "username": "ana", "email": "ana@example.com"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let user = register(&client, &form("pw", "pw")).await.unwrap();
        assert_eq!(user.id, 3);
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn login_stores_token_used_by_later_requests() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "jwt-123",
                "user": {"id": 1, "username": "ana", "email": "ana@example.com"}
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/me"))
            .and(header("authorization", "Bearer jwt-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"id": 1, "username": "ana", "email": "ana@example.com"}),
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let user = login(&client, "ana", "pw").await.unwrap();
        assert_eq!(user.username, "ana");
        assert_eq!(client.session().token(), Some("jwt-123".to_string()));

        let me = restore(&client).await.unwrap();
        assert_eq!(me.map(|u| u.id), Some(1));
    }

    #[tokio::test]
    async fn bad_credentials_surface_server_message() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials!"})),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let err = login(&client, "ana", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials!");
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn blank_login_is_rejected_locally() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server.uri());
        assert!(login(&client, "  ", "pw").await.unwrap_err().is_validation());
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_stored_token_logs_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/me"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Token is invalid!"})),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let stale = User {
            id: 1,
            username: "ana".to_string(),
            email: String::new(),
            extra: serde_json::Map::new(),
        };
        client.session().login(stale, "expired".to_string()).unwrap();

        assert_eq!(restore(&client).await.unwrap(), None);
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn restore_without_token_does_not_call_server() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server.uri());
        assert_eq!(restore(&client).await.unwrap(), None);
        assert!(mock_server.received_requests().await.unwrap().is_empty());
    }
}
