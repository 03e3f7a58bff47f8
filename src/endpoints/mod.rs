//! Endpoint handlers and the request dispatcher.
//!
//! [`handle`] is the single entry point used by the proxy: it routes the
//! request, opens the accounting ticket, applies the maintenance gate,
//! runs the handler and maps any error onto the endpoint's failure shape.
//! The ticket is finished before the response is returned, so accounting
//! always observes the final status.

pub mod admin;
pub mod chat;
pub mod download;
pub mod generate;
pub mod result;
pub mod stats;
pub mod system;
pub mod tools;

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::{ErrorClass, GatewayError};
use crate::params::QueryParams;
use crate::responder::EndpointResponse;
use crate::router::{Route, Router};
use crate::state::AppState;

/// Transport-independent view of an inbound request.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    pub method: String,
    /// Raw path, still percent-encoded
    pub path: String,
    pub query: Option<String>,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub client_ip: String,
    pub body: Bytes,
}

impl IncomingRequest {
    pub fn get(path_and_query: &str) -> Self {
        Self::new("GET", path_and_query)
    }

    pub fn new(method: &str, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (path_and_query.to_string(), None),
        };
        Self {
            method: method.to_string(),
            path,
            query,
            headers: HashMap::new(),
            client_ip: "127.0.0.1".to_string(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_client_ip(mut self, ip: &str) -> Self {
        self.client_ip = ip.to_string();
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn params(&self) -> QueryParams {
        QueryParams::parse(self.query.as_deref())
    }

    /// Caller's user id from the `user` parameter or `X-User-Id` header.
    pub fn user_id(&self, params: &QueryParams) -> Option<String> {
        params
            .get("user")
            .or_else(|| self.header("x-user-id"))
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(String::from)
    }
}

fn log_failure(request_id: &str, endpoint: &str, error: &GatewayError) {
    match error.class() {
        ErrorClass::ClientParameter | ErrorClass::ServerControl => tracing::info!(
            request_id = %request_id,
            endpoint = %endpoint,
            error_class = error.class().as_str(),
            status_code = error.status_code(),
            error = %error,
            "Request rejected"
        ),
        ErrorClass::Upstream => tracing::warn!(
            request_id = %request_id,
            endpoint = %endpoint,
            error_class = error.class().as_str(),
            status_code = error.status_code(),
            error = %error,
            "Upstream failure"
        ),
        ErrorClass::Storage | ErrorClass::Internal => tracing::error!(
            request_id = %request_id,
            endpoint = %endpoint,
            error_class = error.class().as_str(),
            status_code = error.status_code(),
            error = %error,
            "Request failed"
        ),
    }
}

async fn run(
    state: &AppState,
    route: &Route,
    request: &IncomingRequest,
) -> Result<EndpointResponse, GatewayError> {
    if route.is_gated() {
        admin::check_gate(state, route.endpoint_name()).await?;
    }

    match route {
        Route::Text2Img => generate::text2img(state, request).await,
        Route::Imagine { segment } => generate::imagine(state, request, segment).await,
        Route::Watermark => tools::watermark(state, request).await,
        Route::Chat => chat::chat(state, request).await,
        Route::AudioDownload => download::audio(state, request).await,
        Route::Result { kind, id } => result::retrieve(state, request, kind, id).await,
        Route::Stats => stats::summary(state).await,
        Route::StatsLogs => stats::logs(state, request).await,
        Route::StatsVisit => stats::visit(state).await,
        Route::AdminMaintenance => admin::maintenance(state, request).await,
        Route::AdminStatus => admin::status(state, request).await,
        Route::MethodNotAllowed { .. } => Err(GatewayError::MethodNotAllowed(
            request.method.to_ascii_uppercase(),
        )),
        Route::NotFound => Err(GatewayError::NotFound(format!(
            "no endpoint at {}",
            request.path
        ))),
        Route::Health | Route::Metrics | Route::Preflight => Err(GatewayError::Internal(
            "unaccounted route reached dispatcher".to_string(),
        )),
    }
}

/// Handle one request end to end.
pub async fn handle(state: &AppState, request: &IncomingRequest) -> EndpointResponse {
    let route = Router::route(&request.method, &request.path);
    match route {
        Route::Preflight => return EndpointResponse::preflight(),
        Route::Health => return system::health(state).await,
        Route::Metrics => return system::metrics(state),
        _ => {}
    }

    let endpoint = route.endpoint_name();
    let ticket = state.accountant.begin(
        endpoint,
        &request.method,
        &request.path,
        &request.client_ip,
        request.header("user-agent").map(String::from),
    );
    let request_id = ticket.request_id().to_string();

    let response = match run(state, &route, request).await {
        Ok(response) => response,
        Err(error) => {
            log_failure(&request_id, endpoint, &error);
            match route {
                // Browser-facing flow: failures land on the error page
                Route::Imagine { .. } => EndpointResponse::error_redirect(
                    &state.config.server.error_page,
                    &error,
                    endpoint,
                ),
                _ => EndpointResponse::error_envelope(state.creator(), &error),
            }
        }
    };

    ticket.finish(response.status);
    response.with_header("X-Request-ID", request_id)
}
