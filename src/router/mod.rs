// Router module
//
// Maps method + path onto a Route. Matching is on the raw (still
// percent-encoded) path so that legacy segments like `a%20cat&width=512`
// reach the parameter resolver intact.

/// Resolved route for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Text2Img,
    /// Raw, undecoded segment after `/api/ai/imagine/`
    Imagine { segment: String },
    Watermark,
    Chat,
    AudioDownload,
    Result { kind: String, id: String },
    Stats,
    StatsLogs,
    StatsVisit,
    AdminMaintenance,
    AdminStatus,
    Health,
    Metrics,
    Preflight,
    MethodNotAllowed { endpoint: &'static str },
    NotFound,
}

impl Route {
    /// Logical endpoint name used for accounting, quota and toggles.
    pub fn endpoint_name(&self) -> &'static str {
        match self {
            Route::Text2Img => "text2img",
            Route::Imagine { .. } => "imagine",
            Route::Watermark => "watermark",
            Route::Chat => "chat",
            Route::AudioDownload => "audio_download",
            Route::Result { .. } => "result",
            Route::Stats => "stats",
            Route::StatsLogs => "stats_logs",
            Route::StatsVisit => "stats_visit",
            Route::AdminMaintenance => "admin_maintenance",
            Route::AdminStatus => "admin_status",
            Route::Health => "health",
            Route::Metrics => "metrics",
            Route::Preflight => "preflight",
            Route::MethodNotAllowed { endpoint } => *endpoint,
            Route::NotFound => "unknown",
        }
    }

    /// Whether the request goes through usage accounting.
    pub fn is_accounted(&self) -> bool {
        !matches!(self, Route::Health | Route::Metrics | Route::Preflight)
    }

    /// Whether maintenance and server-status toggles apply.
    pub fn is_gated(&self) -> bool {
        matches!(
            self,
            Route::Text2Img
                | Route::Imagine { .. }
                | Route::Watermark
                | Route::Chat
                | Route::AudioDownload
                | Route::Result { .. }
        )
    }
}

pub struct Router;

impl Router {
    pub fn route(method: &str, path: &str) -> Route {
        if method.eq_ignore_ascii_case("OPTIONS") {
            return Route::Preflight;
        }

        let trimmed = match path.trim_end_matches('/') {
            "" => "/",
            other => other,
        };
        let is_get = method.eq_ignore_ascii_case("GET");
        // HEAD only on side-effect-free reads; generation endpoints would
        // spend quota and persist an artifact for a discarded body
        let is_read = is_get || method.eq_ignore_ascii_case("HEAD");
        let is_post = method.eq_ignore_ascii_case("POST");

        let (route, allowed) = match trimmed {
            "/api/ai/text2img" => (Route::Text2Img, is_get),
            "/api/tools/watermark" => (Route::Watermark, is_get),
            "/api/ai/chat" => (Route::Chat, is_get),
            "/api/download/audio" => (Route::AudioDownload, is_get),
            "/api/stats" => (Route::Stats, is_get),
            "/api/stats/logs" => (Route::StatsLogs, is_get),
            "/api/stats/visit" => (Route::StatsVisit, is_post),
            "/api/admin/maintenance" => (Route::AdminMaintenance, is_get || is_post),
            "/api/admin/status" => (Route::AdminStatus, is_get || is_post),
            "/health" => (Route::Health, is_read),
            "/metrics" => (Route::Metrics, is_read),
            other => match Self::route_prefixed(other) {
                Some(route @ Route::Result { .. }) => (route, is_read),
                Some(route) => (route, is_get),
                None => return Route::NotFound,
            },
        };

        if allowed {
            route
        } else {
            Route::MethodNotAllowed {
                endpoint: route.endpoint_name(),
            }
        }
    }

    fn route_prefixed(path: &str) -> Option<Route> {
        if let Some(segment) = path.strip_prefix("/api/ai/imagine/") {
            if segment.is_empty() || segment.contains('/') {
                return None;
            }
            return Some(Route::Imagine {
                segment: segment.to_string(),
            });
        }

        let rest = path.strip_prefix("/api/result/")?;
        let (kind, id) = rest.split_once('/')?;
        if kind.is_empty() || id.is_empty() || id.contains('/') {
            return None;
        }
        Some(Route::Result {
            kind: kind.to_string(),
            id: id.to_string(),
        })
    }
}
