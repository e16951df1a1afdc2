//! Minimal W3C WebDriver client for an Appium server
//!
//! Covers what session bootstrap needs: opening and deleting a session,
//! timeouts, and `execute/sync` for Appium's `mobile:` extension commands.

use std::time::Duration;

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, trace};

use crate::capabilities::SessionCapabilities;
use crate::error::{E2eError, E2eResult};

/// W3C error payload (`{"value": {"error": ..., "message": ...}}`)
#[derive(Debug, Deserialize)]
struct W3cError {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSessionValue {
    session_id: String,
    #[serde(default)]
    capabilities: Value,
}

/// HTTP client bound to one Appium endpoint
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: Client,
    endpoint: String,
}

impl WebDriverClient {
    pub fn new(endpoint: &str, request_timeout: Duration) -> E2eResult<Self> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Open a session. Any failure here is fatal to the caller.
    pub async fn new_session(&self, capabilities: &SessionCapabilities) -> E2eResult<RemoteSession> {
        info!(endpoint = %self.endpoint, "Opening Appium session");

        let value = self
            .command(Method::POST, "/session", Some(capabilities.to_new_session_body()))
            .await
            .map_err(|e| match e {
                E2eError::WebDriver { error, message } => {
                    E2eError::SessionNotCreated(format!("{error}: {message}"))
                }
                other => other,
            })?;

        let created: NewSessionValue =
            serde_json::from_value(value).map_err(|e| E2eError::UnexpectedResponse {
                endpoint: format!("{}/session", self.endpoint),
                reason: format!("no session id in response: {e}"),
            })?;

        info!(session_id = %created.session_id, "Appium session opened");

        Ok(RemoteSession {
            client: self.clone(),
            session_id: created.session_id,
            capabilities: created.capabilities,
        })
    }

    /// Handle for a session opened earlier, e.g. one left running by `start --keep`.
    /// Server capabilities are unknown and reported as null.
    pub fn attach(&self, session_id: impl Into<String>) -> RemoteSession {
        RemoteSession {
            client: self.clone(),
            session_id: session_id.into(),
            capabilities: Value::Null,
        }
    }

    /// Send one command and unwrap the `value` envelope
    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> E2eResult<Value> {
        let url = format!("{}{}", self.endpoint, path);
        trace!(%method, %url, "WebDriver request");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let envelope: Value = serde_json::from_str(&text).map_err(|e| E2eError::UnexpectedResponse {
            endpoint: url.clone(),
            reason: format!("HTTP {status}, body is not JSON: {e}"),
        })?;

        let value = envelope.get("value").cloned().unwrap_or(Value::Null);

        if let Ok(err) = W3cError::deserialize(&value) {
            return Err(E2eError::WebDriver {
                error: err.error,
                message: err.message,
            });
        }

        if !status.is_success() {
            return Err(E2eError::UnexpectedResponse {
                endpoint: url,
                reason: format!("HTTP {status}: {text}"),
            });
        }

        Ok(value)
    }
}

/// An open Appium session
#[derive(Debug, Clone)]
pub struct RemoteSession {
    client: WebDriverClient,
    session_id: String,
    capabilities: Value,
}

impl RemoteSession {
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Capabilities as returned by the server
    pub fn capabilities(&self) -> &Value {
        &self.capabilities
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    fn path(&self, suffix: &str) -> String {
        format!("/session/{}{}", self.session_id, suffix)
    }

    pub async fn set_implicit_wait(&self, wait: Duration) -> E2eResult<()> {
        let body = json!({ "implicit": wait.as_millis() as u64 });
        self.client
            .command(Method::POST, &self.path("/timeouts"), Some(body))
            .await?;
        Ok(())
    }

    /// `POST /session/{id}/execute/sync`
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> E2eResult<Value> {
        debug!(session_id = %self.session_id, script, "Executing script");
        let body = json!({ "script": script, "args": args });
        self.client
            .command(Method::POST, &self.path("/execute/sync"), Some(body))
            .await
    }

    /// Run a shell command on the device through `mobile: shell`.
    /// Needs the Appium server started with `--relaxed-security`.
    pub async fn mobile_shell(&self, command: &str, args: &[&str], timeout: Duration) -> E2eResult<String> {
        let value = self
            .execute(
                "mobile: shell",
                vec![json!({
                    "command": command,
                    "args": args,
                    "timeout": timeout.as_millis() as u64,
                })],
            )
            .await?;

        Ok(match value {
            Value::String(stdout) => stdout,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    /// Start the app, or bring it to the front when it already runs
    pub async fn activate_app(&self, app_id: &str) -> E2eResult<()> {
        self.execute("mobile: activateApp", vec![json!({ "appId": app_id })])
            .await?;
        Ok(())
    }

    /// `DELETE /session/{id}`
    pub async fn delete(&self) -> E2eResult<()> {
        info!(session_id = %self.session_id, "Deleting Appium session");
        self.client
            .command(Method::DELETE, &self.path(""), None)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let client = WebDriverClient::new("http://127.0.0.1:4723/wd/hub/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:4723/wd/hub");
    }

    #[test]
    fn test_attach_builds_session_paths() {
        let client = WebDriverClient::new("http://127.0.0.1:4723", Duration::from_secs(5)).unwrap();
        let session = client.attach("abc-123");
        assert_eq!(session.id(), "abc-123");
        assert_eq!(session.endpoint(), "http://127.0.0.1:4723");
        assert_eq!(session.path("/timeouts"), "/session/abc-123/timeouts");
        assert!(session.capabilities().is_null());
    }

    #[test]
    fn test_w3c_error_shape() {
        let value = json!({
            "error": "session not created",
            "message": "Could not find a connected Android device",
            "stacktrace": "",
        });
        let err = W3cError::deserialize(&value).unwrap();
        assert_eq!(err.error, "session not created");
        assert_eq!(err.message, "Could not find a connected Android device");
    }

    #[test]
    fn test_plain_values_are_not_errors() {
        assert!(W3cError::deserialize(&json!("u0_a1 1234 com.foo")).is_err());
        assert!(W3cError::deserialize(&Value::Null).is_err());
        assert!(W3cError::deserialize(&json!({ "sessionId": "abc" })).is_err());
    }
}
