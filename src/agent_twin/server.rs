//! HTTP surface of the twin.
//!
//! [`router`] wires every endpoint onto an axum [`Router`] over a cloneable [`AppState`];
//! [`serve`] binds it to an address. Every non-2xx answer carries `{"detail": "..."}`.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/` | service info |
//! | GET | `/health` | liveness plus number of known agents |
//! | GET | `/agents` | directory snapshot |
//! | POST | `/agents/register?agent_id=..&agent_url=..` | add or overwrite a peer |
//! | POST | `/agents/refresh` | re-fetch the registry |
//! | DELETE | `/agents/{agent_id}` | forget a peer |
//! | GET | `/agentfacts` | NANDA facts for this twin |
//! | POST | `/query` | ask this twin directly |
//! | POST | `/a2a` | route an `@mention` message to a peer |
//! | POST | `/search` | pick the best catalog agent and ask it |

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::agent_twin::agent::Agent;
use crate::agent_twin::agent_facts;
use crate::agent_twin::audit::AuditLog;
use crate::agent_twin::catalog::CatalogClient;
use crate::agent_twin::client_wrapper::ClientWrapper;
use crate::agent_twin::clients::openai::{OpenAIClient, DEFAULT_BASE_URL};
use crate::agent_twin::config::TwinConfig;
use crate::agent_twin::directory::Directory;
use crate::agent_twin::envelope::{
    now_rfc3339, A2ARequest, A2AResponse, QueryRequest, QueryResponse, SearchRequest,
    SearchResponse, SelectedAgent,
};
use crate::agent_twin::forwarder::{to_query_endpoint, ForwardError, Forwarder};
use crate::agent_twin::handler::{A2aHandler, HandlerError};
use crate::agent_twin::selector::AgentSelector;

const ANONYMOUS_USER: &str = "anonymous";

/// HTTP-shaped failure of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub status: StatusCode,
    pub detail: String,
}

impl ServerError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.detail)
    }
}

impl Error for ServerError {}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<HandlerError> for ServerError {
    fn from(err: HandlerError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ServerError::new(status, err.to_string())
    }
}

impl From<ForwardError> for ServerError {
    fn from(err: ForwardError) -> Self {
        HandlerError::from(err).into()
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::new(rejection.status(), rejection.body_text())
    }
}

/// [`Json`] body whose rejections answer with `{"detail"}` like every other error.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

/// [`Query`] string counterpart of [`JsonBody`].
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(QueryParams(value))
    }
}

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TwinConfig>,
    pub agent: Arc<Agent>,
    pub directory: Arc<Directory>,
    pub forwarder: Arc<Forwarder>,
    pub handler: Arc<A2aHandler>,
    pub catalog: Arc<CatalogClient>,
    pub selector: Arc<AgentSelector>,
    pub facts: Arc<Value>,
}

impl AppState {
    /// Wire every component from `config`, using `client` for both answering and
    /// agent selection.
    pub fn new(config: TwinConfig, client: Arc<dyn ClientWrapper>) -> Self {
        let directory = Arc::new(
            Directory::new(config.agent_username.clone(), config.registry_url.clone())
                .with_timeout(config.registry_timeout),
        );
        let forwarder = Arc::new(
            Forwarder::new(directory.clone(), config.caller_identity())
                .with_timeout(config.forward_timeout),
        );
        let audit = Arc::new(AuditLog::from_path(config.audit_log_path.as_deref()));
        let handler = Arc::new(A2aHandler::new(
            config.agent_username.clone(),
            forwarder.clone(),
            audit,
        ));
        let catalog = Arc::new(
            CatalogClient::new(config.agentfacts_db_url.clone())
                .with_timeout(config.registry_timeout),
        );
        let selector = Arc::new(AgentSelector::with_llm(client.clone()));
        let mut agent = Agent::new(
            config.agent_username.clone(),
            config.agent_name.clone(),
            client,
        )
        .with_expertise(config.agent_description.clone());
        if let Some(personality) = &config.agent_personality {
            agent = agent.with_personality(personality.clone());
        }
        if let Some(backstory) = &config.agent_backstory {
            agent = agent.with_backstory(backstory.clone());
        }
        let agent = Arc::new(agent);

        // Resolve the facts once so the advertised id stays stable for the process.
        let facts = Arc::new(agent_facts::generate(&config));

        Self {
            config: Arc::new(config),
            agent,
            directory,
            forwarder,
            handler,
            catalog,
            selector,
            facts,
        }
    }

    /// Build the state with an OpenAI-compatible client taken from `config`.
    pub fn from_config(config: TwinConfig) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or("OPENAI_API_KEY is not set")?;
        let base_url = config
            .openai_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = OpenAIClient::new_with_base_url(&api_key, &config.model, &base_url)
            .with_timeout(config.llm_timeout);
        Ok(Self::new(config, Arc::new(client)))
    }
}

/// Every route of the twin, with permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/agents", get(list_agents))
        .route("/agents/register", post(register_agent))
        .route("/agents/refresh", post(refresh_agents))
        .route("/agents/{agent_id}", delete(unregister_agent))
        .route("/agentfacts", get(get_agent_facts))
        .route("/query", post(query))
        .route("/a2a", post(a2a))
        .route("/search", post(search))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

/// Bind `addr` and serve until the process stops.
pub async fn serve(state: AppState, addr: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, state).await
}

/// Serve on an already bound listener.
pub async fn serve_on(
    listener: TcpListener,
    state: AppState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    log::info!(
        "server: @{} listening on {} ({} known agents)",
        state.config.agent_username,
        addr,
        state.directory.len()
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Personal Agent Twin API",
        "version": state.config.agent_version,
        "agent_id": state.config.agent_username,
        "agent_name": state.config.agent_name,
        "a2a_enabled": true,
        "known_agents": state.directory.known_ids(),
        "endpoints": {
            "health": "GET /health",
            "query": "POST /query",
            "a2a": "POST /a2a",
            "search": "POST /search",
            "agentfacts": "GET /agentfacts",
            "agents": "GET /agents",
            "register": "POST /agents/register",
            "refresh": "POST /agents/refresh",
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "a2a_enabled": true,
        "known_agents": state.directory.len(),
    }))
}

async fn list_agents(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "my_agent_id": state.config.agent_username,
        "my_agent_name": state.config.agent_name,
        "known_agents": state.directory.snapshot(),
        "usage": "Send A2A messages with @agent-id to route to other agents",
    }))
}

#[derive(Deserialize)]
struct RegisterParams {
    agent_id: String,
    agent_url: String,
}

async fn register_agent(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<RegisterParams>,
) -> Result<Json<Value>, ServerError> {
    state
        .directory
        .register(&params.agent_id, &params.agent_url)
        .map_err(|err| ServerError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let agent_id = params.agent_id.trim();
    Ok(Json(json!({
        "message": format!("Agent {} registered successfully", agent_id),
        "agent_id": agent_id,
        "agent_url": params.agent_url.trim(),
        "total_known_agents": state.directory.len(),
    })))
}

async fn refresh_agents(State(state): State<AppState>) -> Result<Json<Value>, ServerError> {
    let refreshed = state
        .directory
        .refresh()
        .await
        .map_err(|err| ServerError::new(StatusCode::BAD_GATEWAY, err.to_string()))?;
    Ok(Json(json!({
        "refreshed": refreshed,
        "known_agents": state.directory.len(),
    })))
}

async fn unregister_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    if !state.directory.unregister(&agent_id) {
        return Err(ServerError::new(
            StatusCode::NOT_FOUND,
            format!("Agent '{}' not found", agent_id),
        ));
    }
    Ok(Json(json!({
        "message": format!("Agent {} unregistered", agent_id),
        "agent_id": agent_id,
        "total_known_agents": state.directory.len(),
    })))
}

async fn get_agent_facts(State(state): State<AppState>) -> Json<Value> {
    Json(state.facts.as_ref().clone())
}

async fn query(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<QueryRequest>,
) -> Result<Json<QueryResponse>, ServerError> {
    let started = Instant::now();
    let user_id = request.user_id.as_deref().unwrap_or(ANONYMOUS_USER);
    let answer = state
        .agent
        .answer(&request.question, user_id)
        .await
        .map_err(|err| {
            log::error!("server: /query failed: {}", err);
            ServerError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing query: {}", err),
            )
        })?;
    Ok(Json(QueryResponse {
        answer,
        timestamp: now_rfc3339(),
        processing_time: started.elapsed().as_secs_f64(),
    }))
}

async fn a2a(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<A2ARequest>,
) -> Result<Json<A2AResponse>, ServerError> {
    let response = state.handler.handle(&request).await?;
    Ok(Json(response))
}

async fn search(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SearchRequest>,
) -> Result<Json<SearchResponse>, ServerError> {
    let started = Instant::now();

    let catalog = state.catalog.fetch().await;
    if catalog.is_empty() {
        return Err(ServerError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "No agents available in the database",
        ));
    }
    log::info!(
        "server: /search over {} catalog agents for {:?}",
        catalog.len(),
        request.query
    );

    let selected = state
        .selector
        .select(&request.query, &catalog)
        .await
        .ok_or_else(|| {
            ServerError::new(StatusCode::NOT_FOUND, "No suitable agent found for this query")
        })?;

    let endpoint = selected.preferred_endpoint().ok_or_else(|| {
        ServerError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Selected agent '{}' has no valid endpoint", selected.label),
        )
    })?;
    let endpoint = to_query_endpoint(endpoint);

    let user_id = request.user_id.as_deref().unwrap_or(ANONYMOUS_USER);
    let agent_response = state
        .forwarder
        .query_url(&endpoint, &request.query, user_id)
        .await?;

    Ok(Json(SearchResponse {
        selected_agent: SelectedAgent {
            id: selected.id,
            label: selected.label,
            description: selected.description,
            endpoint,
        },
        agent_response,
        timestamp: now_rfc3339(),
        processing_time: started.elapsed().as_secs_f64(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_errors_keep_their_status() {
        let err: ServerError = ForwardError::Timeout {
            agent_id: "slow".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.detail, "Timeout connecting to agent 'slow'");

        let err: ServerError = HandlerError::NoTarget {
            message: "no".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
