//! The REST API consumed by the Tekton dashboard.

use std::{path::Path, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path as UrlPath, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    cluster::ClusterClient,
    credentials::{Credential, CredentialRequest, CredentialStore},
    registrar::Registrar,
    webhook::Webhook,
};

mod error;

pub use error::{ApiError, CredentialError, RequestError};
use error::{InvalidBodySnafu, InvalidQueryParameterSnafu};

/// Values the dashboard uses to prefill its forms.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Defaults {
    pub namespace: String,

    #[serde(rename = "endpointurl")]
    pub endpoint_url: String,

    pub platform: String,
}

pub struct AppState<C> {
    pub registrar: Arc<Registrar<C>>,
    pub credentials: Arc<CredentialStore<C>>,
    pub defaults: Arc<Defaults>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            registrar: self.registrar.clone(),
            credentials: self.credentials.clone(),
            defaults: self.defaults.clone(),
        }
    }
}

/// Builds the router serving the webhook and credential API, the health probes and the static
/// web resources in `web_dir` under `/web/`.
pub fn router<C: ClusterClient>(state: AppState<C>, web_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route(
            "/webhooks",
            post(create_webhook::<C>).get(list_webhooks::<C>),
        )
        .route("/webhooks/defaults", get(defaults::<C>))
        .route(
            "/webhooks/credentials",
            post(create_credential::<C>).get(list_credentials::<C>),
        )
        .route(
            "/webhooks/credentials/{name}",
            delete(delete_credential::<C>),
        )
        .route("/webhooks/{name}", delete(delete_webhook::<C>))
        .route("/liveness", get(|| async { StatusCode::NO_CONTENT }))
        .route("/readiness", get(|| async { StatusCode::NO_CONTENT }))
        .nest_service("/web", ServeDir::new(web_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn create_webhook<C: ClusterClient>(
    State(state): State<AppState<C>>,
    body: Result<Json<Webhook>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(webhook) = body.context(InvalidBodySnafu)?;
    state.registrar.create_webhook(webhook).await?;
    Ok(StatusCode::CREATED)
}

async fn list_webhooks<C: ClusterClient>(
    State(state): State<AppState<C>>,
) -> Result<Json<Vec<Webhook>>, ApiError> {
    Ok(Json(state.registrar.list_webhooks().await?))
}

#[derive(Debug, Deserialize)]
struct DeleteWebhookQuery {
    #[serde(default)]
    repository: String,

    #[serde(rename = "deletepipelineruns")]
    delete_pipeline_runs: Option<String>,
}

async fn delete_webhook<C: ClusterClient>(
    State(state): State<AppState<C>>,
    UrlPath(name): UrlPath<String>,
    Query(query): Query<DeleteWebhookQuery>,
) -> Result<StatusCode, ApiError> {
    let delete_pipeline_runs = match query.delete_pipeline_runs.as_deref() {
        None | Some("") => false,
        Some(value) => value.parse::<bool>().context(InvalidQueryParameterSnafu {
            name: "deletepipelineruns",
            value,
        })?,
    };

    state
        .registrar
        .delete_webhook(&name, &query.repository, delete_pipeline_runs)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn defaults<C: ClusterClient>(State(state): State<AppState<C>>) -> Json<Defaults> {
    Json(Defaults::clone(&state.defaults))
}

async fn create_credential<C: ClusterClient>(
    State(state): State<AppState<C>>,
    body: Result<Json<CredentialRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.context(InvalidBodySnafu)?;
    state
        .credentials
        .create(&request)
        .await
        .map_err(CredentialError::Create)?;

    Ok((
        StatusCode::CREATED,
        [(
            header::CONTENT_LOCATION,
            format!("/webhooks/credentials/{}", request.name),
        )],
    ))
}

async fn list_credentials<C: ClusterClient>(
    State(state): State<AppState<C>>,
) -> Result<Json<Vec<Credential>>, ApiError> {
    let credentials = state
        .credentials
        .list()
        .await
        .map_err(CredentialError::List)?;
    Ok(Json(credentials))
}

async fn delete_credential<C: ClusterClient>(
    State(state): State<AppState<C>>,
    UrlPath(name): UrlPath<String>,
) -> Result<StatusCode, ApiError> {
    state
        .credentials
        .delete(&name)
        .await
        .map_err(CredentialError::Delete)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, Response},
    };
    use k8s_openapi::api::core::v1::Secret;
    use kube::api::ObjectMeta;
    use tower::ServiceExt;
    use webhooks_extension_crd::{
        EventListener, TriggerBinding, TriggerBindingSpec, TriggerTemplate, TriggerTemplateSpec,
    };

    use super::*;
    use crate::{
        cluster::fake::FakeCluster,
        constants::EVENT_LISTENER_NAME,
        dashboard::DashboardLocator,
        hub::fake::RecordingSubscriber,
        network::{NetworkResources, Platform},
        token::TokenGenerator,
    };

    const NAMESPACE: &str = "tekton-pipelines";
    const CALLBACK: &str = "http://hooks.example.com";

    struct TestApp {
        cluster: Arc<FakeCluster>,
        router: Router,
        /// Removed on drop, so tests must keep it alive while sending requests.
        web_dir: tempfile::TempDir,
    }

    fn app() -> TestApp {
        let cluster = Arc::new(FakeCluster::new());
        for (name, binding) in [
            ("pl-push-binding", true),
            ("pl-pullrequest-binding", true),
            ("pl-template", false),
        ] {
            let metadata = ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some(NAMESPACE.to_owned()),
                ..ObjectMeta::default()
            };
            if binding {
                cluster.seed(&TriggerBinding {
                    metadata,
                    spec: TriggerBindingSpec::default(),
                });
            } else {
                cluster.seed(&TriggerTemplate {
                    metadata,
                    spec: TriggerTemplateSpec::default(),
                });
            }
        }

        let credentials = Arc::new(CredentialStore::new(
            cluster.clone(),
            NAMESPACE,
            TokenGenerator::seeded(42),
        ));
        let registrar = Registrar::new(
            cluster.clone(),
            credentials.clone(),
            Arc::new(RecordingSubscriber::default()),
            NetworkResources::new(cluster.clone(), NAMESPACE, Platform::Kubernetes, CALLBACK),
            DashboardLocator::new(
                cluster.clone(),
                reqwest::Client::new(),
                NAMESPACE,
                Platform::Kubernetes,
            ),
            NAMESPACE,
            CALLBACK,
        );
        let state = AppState {
            registrar: Arc::new(registrar),
            credentials,
            defaults: Arc::new(Defaults {
                namespace: NAMESPACE.to_owned(),
                endpoint_url: CALLBACK.to_owned(),
                platform: String::new(),
            }),
        };

        let web_dir = tempfile::tempdir().expect("temp dir must be created");
        std::fs::write(web_dir.path().join("extension.js"), "console.log('hi');")
            .expect("web resource must be written");

        TestApp {
            router: router(state, web_dir.path()),
            cluster,
            web_dir,
        }
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<&str>,
    ) -> Response<Body> {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_owned())),
            None => request.body(Body::empty()),
        }
        .expect("request must build");

        router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body must be readable");
        String::from_utf8(bytes.to_vec()).expect("body must be utf-8")
    }

    const WEBHOOK: &str = r#"{
        "name": "foo",
        "namespace": "foons",
        "accesstoken": "github",
        "pipeline": "pl",
        "gitrepositoryurl": "https://github.com/owner/repo"
    }"#;

    async fn create_credential_and_webhook(router: &Router) {
        let response = send(
            router,
            Method::POST,
            "/webhooks/credentials",
            Some(r#"{"name": "github", "accesstoken": "token"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(router, Method::POST, "/webhooks", Some(WEBHOOK)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn health_probes_return_no_content() {
        let TestApp {
            router,
            web_dir: _web_dir,
            ..
        } = app();

        for uri in ["/liveness", "/readiness"] {
            let response = send(&router, Method::GET, uri, None).await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }
    }

    #[tokio::test]
    async fn serves_web_resources() {
        let TestApp {
            router,
            web_dir: _web_dir,
            ..
        } = app();

        let response = send(&router, Method::GET, "/web/extension.js", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "console.log('hi');");
    }

    #[tokio::test]
    async fn defaults_are_returned() {
        let TestApp {
            router,
            web_dir: _web_dir,
            ..
        } = app();

        let response = send(&router, Method::GET, "/webhooks/defaults", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let defaults: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("body must be json");
        assert_eq!(
            defaults,
            serde_json::json!({
                "namespace": NAMESPACE,
                "endpointurl": CALLBACK,
                "platform": ""
            })
        );
    }

    #[tokio::test]
    async fn credential_lifecycle() {
        let TestApp {
            router,
            web_dir: _web_dir,
            ..
        } = app();

        let response = send(
            &router,
            Method::POST,
            "/webhooks/credentials",
            Some(r#"{"name": "cred1", "accesstoken": "token1"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers()[header::CONTENT_LOCATION],
            "/webhooks/credentials/cred1"
        );

        let response = send(&router, Method::GET, "/webhooks/credentials", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let credentials: Vec<Credential> =
            serde_json::from_str(&body_text(response).await).expect("body must be json");
        assert_eq!(credentials.len(), 1);
        assert_eq!(credentials[0].name, "cred1");
        assert_eq!(credentials[0].access_token, "token1");
        assert_eq!(credentials[0].secret_token.len(), 20);

        let response = send(&router, Method::DELETE, "/webhooks/credentials/cred1", None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&router, Method::DELETE, "/webhooks/credentials/cred1", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_credentials_are_rejected() {
        let TestApp {
            router,
            cluster,
            web_dir: _web_dir,
        } = app();

        let response = send(
            &router,
            Method::POST,
            "/webhooks/credentials",
            Some(r#"{"name": "", "accesstoken": "token"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("Name cannot be empty"));

        let response = send(
            &router,
            Method::POST,
            "/webhooks/credentials",
            Some(r#"{"name": "cred"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(
            body_text(response)
                .await
                .contains("AccessToken cannot be empty")
        );

        let response = send(&router, Method::POST, "/webhooks/credentials", Some("{")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(cluster.objects::<Secret>().is_empty());
    }

    #[tokio::test]
    async fn webhook_lifecycle() {
        let TestApp {
            router,
            cluster,
            web_dir: _web_dir,
        } = app();
        create_credential_and_webhook(&router).await;

        let response = send(&router, Method::GET, "/webhooks", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let webhooks: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("body must be json");
        assert_eq!(
            webhooks,
            serde_json::json!([{
                "name": "foo",
                "namespace": "foons",
                "serviceaccount": "default",
                "accesstoken": "github",
                "pipeline": "pl",
                "gitrepositoryurl": "https://github.com/owner/repo"
            }])
        );

        let response = send(
            &router,
            Method::DELETE,
            "/webhooks/foo?repository=https://github.com/owner/repo&deletepipelineruns=true",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(
            cluster
                .object::<EventListener>(NAMESPACE, EVENT_LISTENER_NAME)
                .is_none()
        );

        let response = send(&router, Method::GET, "/webhooks", None).await;
        assert_eq!(body_text(response).await, "[]");
    }

    #[tokio::test]
    async fn invalid_webhooks_are_rejected() {
        let TestApp {
            router,
            web_dir: _web_dir,
            ..
        } = app();

        let response = send(
            &router,
            Method::POST,
            "/webhooks",
            Some(&WEBHOOK.replace("\"foo\"", "\"foo-bar\"")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("must not contain hyphens"));

        // The referenced credential does not exist.
        let response = send(&router, Method::POST, "/webhooks", Some(WEBHOOK)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&router, Method::POST, "/webhooks", Some("not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_webhook_errors() {
        let TestApp {
            router,
            web_dir: _web_dir,
            ..
        } = app();

        let response = send(&router, Method::DELETE, "/webhooks/foo", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &router,
            Method::DELETE,
            "/webhooks/foo?repository=https://github.com/owner/repo",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        create_credential_and_webhook(&router).await;

        let response = send(
            &router,
            Method::DELETE,
            "/webhooks/foo?repository=https://github.com/owner/repo&deletepipelineruns=maybe",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("deletepipelineruns"));

        let response = send(
            &router,
            Method::DELETE,
            "/webhooks/bar?repository=https://github.com/owner/repo",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
