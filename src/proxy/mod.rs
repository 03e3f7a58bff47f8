// Proxy module - Pingora ProxyHttp implementation
// Every request is answered in request_filter; there is no upstream peer.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use pingora_core::upstreams::peer::HttpPeer;
use pingora_core::Result;
use pingora_http::ResponseHeader;
use pingora_proxy::{ProxyHttp, Session};
use std::sync::Arc;

use crate::constants::MAX_REQUEST_BODY_BYTES;
use crate::endpoints::{self, IncomingRequest};
use crate::error::GatewayError;
use crate::responder::EndpointResponse;
use crate::state::LazyState;

pub mod helpers;

/// Per-request context.
#[derive(Debug, Default)]
pub struct GatewayContext {
    /// Status written to the client, for Pingora's own logging hook
    pub status: Option<u16>,
}

/// KagamiProxy implements the Pingora ProxyHttp trait.
pub struct KagamiProxy {
    state: Arc<LazyState>,
}

impl KagamiProxy {
    pub fn new(state: Arc<LazyState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<LazyState> {
        &self.state
    }

    /// Answer one request once the state is available.
    async fn respond(&self, request: Option<IncomingRequest>) -> EndpointResponse {
        let creator = &self.state.config().server.creator;
        let request = match request {
            Some(request) => request,
            None => {
                tracing::warn!(limit = MAX_REQUEST_BODY_BYTES, "Request body too large");
                return EndpointResponse::error_envelope(
                    creator,
                    &GatewayError::invalid(
                        "body",
                        format!("larger than {} bytes", MAX_REQUEST_BODY_BYTES),
                    ),
                );
            }
        };
        match self.state.get().await {
            Ok(state) => endpoints::handle(state, &request).await,
            Err(e) => {
                tracing::error!(error = %e, path = %request.path, "Backends unavailable");
                EndpointResponse::error_envelope(
                    creator,
                    &GatewayError::Unavailable("backends are starting".to_string()),
                )
            }
        }
    }

    /// Read the request body up to `MAX_REQUEST_BODY_BYTES`.
    ///
    /// Returns `None` when the body is larger than the limit.
    async fn read_body(session: &mut Session) -> Result<Option<Bytes>> {
        let mut body = BytesMut::new();
        while let Some(chunk) = session.read_request_body().await? {
            if body.len() + chunk.len() > MAX_REQUEST_BODY_BYTES {
                return Ok(None);
            }
            body.extend_from_slice(&chunk);
        }
        Ok(Some(body.freeze()))
    }

    /// Build the transport-independent request from the session.
    async fn incoming_request(&self, session: &mut Session) -> Result<Option<IncomingRequest>> {
        let req = session.req_header();
        let method = req.method.as_str().to_string();
        let path = req.uri.path().to_string();
        let query = req.uri.query().map(String::from);
        let headers = helpers::extract_headers(req);
        let client_ip =
            helpers::get_client_ip(session, self.state.config().server.trust_forwarded_for);

        let body = if method.eq_ignore_ascii_case("POST") {
            match Self::read_body(session).await? {
                Some(body) => body,
                None => return Ok(None),
            }
        } else {
            Bytes::new()
        };

        Ok(Some(IncomingRequest {
            method,
            path,
            query,
            headers,
            client_ip,
            body,
        }))
    }

    async fn write_response(
        session: &mut Session,
        response: EndpointResponse,
        head_only: bool,
    ) -> Result<()> {
        let mut header = ResponseHeader::build(response.status, None)?;
        for (name, value) in &response.headers {
            header.append_header(name.clone(), value.as_str())?;
        }
        header.insert_header("Content-Length", response.body.len().to_string())?;

        let body = if head_only || response.body.is_empty() {
            None
        } else {
            Some(response.body)
        };
        let header_only = body.is_none();
        session
            .write_response_header(Box::new(header), header_only)
            .await?;
        if let Some(body) = body {
            session.write_response_body(Some(body), true).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProxyHttp for KagamiProxy {
    type CTX = GatewayContext;

    fn new_ctx(&self) -> Self::CTX {
        GatewayContext::default()
    }

    /// Never reached: request_filter answers every request.
    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        Err(pingora_core::Error::explain(
            pingora_core::ErrorType::InternalError,
            "gateway requests are answered locally",
        ))
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let head_only = session.req_header().method.as_str() == "HEAD";

        let request = self.incoming_request(session).await?;
        let response = self.respond(request).await;

        ctx.status = Some(response.status);
        Self::write_response(session, response, head_only).await?;
        Ok(true)
    }
}
