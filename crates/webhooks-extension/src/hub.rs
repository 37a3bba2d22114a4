//! Registration of the physical webhook at the Git provider.
//!
//! GitHub (and GitHub Enterprise) expose a PubSubHubbub endpoint which creates or removes a
//! repository webhook for a topic like `https://github.com/<org>/<repo>/events/push`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use snafu::{ResultExt, Snafu, ensure};

use crate::{
    constants::{PULL_REQUEST_EVENT, PUSH_EVENT},
    credentials::WebhookTokens,
    git::GitRepository,
};

const PUBLIC_GITHUB_HOST: &str = "github.com";
const PUBLIC_GITHUB_HUB_URL: &str = "https://api.github.com/hub";
const HUB_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Events every webhook is subscribed to.
pub const HUB_EVENTS: [&str; 2] = [PUSH_EVENT, PULL_REQUEST_EVENT];

#[derive(Debug, Snafu)]
pub enum HubError {
    #[snafu(display("failed to construct hub http client"))]
    BuildClient { source: reqwest::Error },

    #[snafu(display("failed to send hub {mode} request for {event:?} events"))]
    SendRequest {
        source: reqwest::Error,
        mode: HubMode,
        event: &'static str,
    },

    #[snafu(display("hub {mode} request for {event:?} events was answered with {status}"))]
    UnexpectedStatus {
        mode: HubMode,
        event: &'static str,
        status: StatusCode,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum HubMode {
    Subscribe,
    Unsubscribe,
}

/// Creates and removes webhooks at the Git provider.
#[async_trait]
pub trait WebhookSubscriber: Send + Sync {
    async fn request(
        &self,
        mode: HubMode,
        repository: &GitRepository,
        callback: &str,
        tokens: &WebhookTokens,
    ) -> Result<(), HubError>;
}

/// Returns the PubSubHubbub endpoint responsible for `repository`.
pub fn hub_api_url(repository: &GitRepository) -> String {
    if repository.server() == PUBLIC_GITHUB_HOST {
        PUBLIC_GITHUB_HUB_URL.to_owned()
    } else {
        format!(
            "{scheme}://{host}/api/v3/hub",
            scheme = repository.url().scheme(),
            host = repository.server()
        )
    }
}

/// [`WebhookSubscriber`] talking to the GitHub PubSubHubbub API.
#[derive(Clone, Debug)]
pub struct GitHubHub {
    client: reqwest::Client,
}

impl GitHubHub {
    pub fn new(ssl_verification_enabled: bool) -> Result<Self, HubError> {
        if !ssl_verification_enabled {
            tracing::warn!("TLS certificate verification of the Git provider is disabled");
        }

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!ssl_verification_enabled)
            .timeout(HUB_REQUEST_TIMEOUT)
            .build()
            .context(BuildClientSnafu)?;
        Ok(Self { client })
    }

    /// Sends one hub request per event in [`HUB_EVENTS`] to `hub_url`.
    pub async fn send(
        &self,
        hub_url: &str,
        mode: HubMode,
        topic_base: &str,
        callback: &str,
        tokens: &WebhookTokens,
    ) -> Result<(), HubError> {
        for event in HUB_EVENTS {
            let topic = format!("{topic_base}/events/{event}");
            let mode_value = mode.to_string();
            tracing::debug!(%hub_url, %topic, %mode, "sending hub request");

            let response = self
                .client
                .post(hub_url)
                .bearer_auth(&tokens.access_token)
                .form(&[
                    ("hub.mode", mode_value.as_str()),
                    ("hub.topic", topic.as_str()),
                    ("hub.callback", callback),
                    ("hub.secret", tokens.secret_token.as_str()),
                ])
                .send()
                .await
                .context(SendRequestSnafu { mode, event })?;

            let status = response.status();
            ensure!(
                status == StatusCode::NO_CONTENT,
                UnexpectedStatusSnafu {
                    mode,
                    event,
                    status
                }
            );
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookSubscriber for GitHubHub {
    async fn request(
        &self,
        mode: HubMode,
        repository: &GitRepository,
        callback: &str,
        tokens: &WebhookTokens,
    ) -> Result<(), HubError> {
        self.send(
            &hub_api_url(repository),
            mode,
            repository.base_url(),
            callback,
            tokens,
        )
        .await
    }
}


#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use axum::{
        Form, Router,
        extract::State,
        http::{HeaderMap, StatusCode as AxumStatusCode},
        routing::post,
    };
    use rstest::rstest;

    use super::*;

    type Received = Arc<Mutex<Vec<(Option<String>, HashMap<String, String>)>>>;

    #[rstest]
    #[case("https://github.com/owner/repo", "https://api.github.com/hub")]
    #[case("https://github.ibm.com/owner/repo", "https://github.ibm.com/api/v3/hub")]
    #[case("http://git.example.com/owner/repo.git", "http://git.example.com/api/v3/hub")]
    fn hub_url_depends_on_server(#[case] url: &str, #[case] expected: &str) {
        let repository = GitRepository::parse(url).expect("url must be valid");
        assert_eq!(hub_api_url(&repository), expected);
    }

    #[test]
    fn modes_render_lowercase() {
        assert_eq!(HubMode::Subscribe.to_string(), "subscribe");
        assert_eq!(HubMode::Unsubscribe.to_string(), "unsubscribe");
    }

    async fn serve_hub(status: AxumStatusCode) -> (String, Received) {
        async fn hub(
            State((received, status)): State<(Received, AxumStatusCode)>,
            headers: HeaderMap,
            Form(form): Form<HashMap<String, String>>,
        ) -> AxumStatusCode {
            let authorization = headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            received
                .lock()
                .expect("lock poisoned")
                .push((authorization, form));
            status
        }

        let received = Received::default();
        let router = Router::new()
            .route("/api/v3/hub", post(hub))
            .with_state((received.clone(), status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("test listener must bind");
        let address = listener.local_addr().expect("test listener has an address");
        tokio::spawn(async move { axum::serve(listener, router).await });

        (format!("http://{address}/api/v3/hub"), received)
    }

    fn tokens() -> WebhookTokens {
        WebhookTokens {
            access_token: "access".to_owned(),
            secret_token: "secret".to_owned(),
        }
    }

    #[tokio::test]
    async fn sends_one_request_per_event() {
        let (hub_url, received) = serve_hub(AxumStatusCode::NO_CONTENT).await;
        let hub = GitHubHub::new(true).expect("client must build");

        hub.send(
            &hub_url,
            HubMode::Subscribe,
            "https://github.com/owner/repo",
            "http://callback.example.com",
            &tokens(),
        )
        .await
        .expect("hub request must succeed");

        let received = received.lock().expect("lock poisoned").clone();
        assert_eq!(received.len(), 2);

        let (authorization, form) = &received[0];
        assert_eq!(authorization.as_deref(), Some("Bearer access"));
        assert_eq!(form["hub.mode"], "subscribe");
        assert_eq!(form["hub.topic"], "https://github.com/owner/repo/events/push");
        assert_eq!(form["hub.callback"], "http://callback.example.com");
        assert_eq!(form["hub.secret"], "secret");

        let (_, form) = &received[1];
        assert_eq!(
            form["hub.topic"],
            "https://github.com/owner/repo/events/pull_request"
        );
    }

    #[tokio::test]
    async fn non_204_status_fails() {
        let (hub_url, received) = serve_hub(AxumStatusCode::UNPROCESSABLE_ENTITY).await;
        let hub = GitHubHub::new(true).expect("client must build");

        let result = hub
            .send(
                &hub_url,
                HubMode::Unsubscribe,
                "https://github.com/owner/repo",
                "http://callback.example.com",
                &tokens(),
            )
            .await;

        assert!(matches!(
            result,
            Err(HubError::UnexpectedStatus {
                mode: HubMode::Unsubscribe,
                event: "push",
                ..
            })
        ));
        assert_eq!(received.lock().expect("lock poisoned").len(), 1);
    }
}
