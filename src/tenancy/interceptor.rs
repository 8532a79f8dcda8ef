use axum::{
    extract::{Request, State},
    http::{header, uri::PathAndQuery, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, warn};

use super::host::classify;
use crate::{
    auth::{
        handlers::LOGIN_PATH,
        session::{session_token, SessionVerifier},
    },
    config::AppConfig,
    state::AppState,
};

pub const PROTECTED_PREFIXES: &[&str] = &["/intake", "/admin"];
pub const TENANT_PAGE_ROOT: &str = "/portfolio";

/// Fixed routing rules, borrowed from the process configuration.
#[derive(Debug, Clone, Copy)]
pub struct EdgePolicy<'a> {
    pub root_domain: Option<&'a str>,
    pub protected_prefixes: &'a [&'a str],
    pub login_path: &'a str,
    pub tenant_page_root: &'a str,
}

impl<'a> EdgePolicy<'a> {
    pub fn from_config(cfg: &'a AppConfig) -> Self {
        Self {
            root_domain: cfg.root_domain.as_deref(),
            protected_prefixes: PROTECTED_PREFIXES,
            login_path: LOGIN_PATH,
            tenant_page_root: TENANT_PAGE_ROOT,
        }
    }

    /// A prefix matches the whole path or a path continuing with `/`.
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

/// The parts of a request the decision depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFacts {
    pub host: String,
    pub path: String,
    pub query: Option<String>,
    pub session_token: Option<String>,
}

impl RequestFacts {
    pub fn from_request(req: &Request, cookie_name: &str) -> Self {
        // A header that is not visible ASCII reads as empty and classifies as Root.
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| req.uri().host())
            .unwrap_or_default()
            .to_string();
        Self {
            host,
            path: req.uri().path().to_string(),
            query: req.uri().query().map(str::to_string),
            session_token: session_token(req.headers(), cookie_name).map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    PassThrough,
    Rewrite { path_and_query: String },
    Redirect { location: String },
}

/// Pure routing decision for one request. The session gate runs first; the
/// tenant rewrite only applies to `/` on a tenant host.
pub fn decide(policy: &EdgePolicy<'_>, facts: &RequestFacts, sessions: &dyn SessionVerifier) -> Decision {
    if policy.is_protected(&facts.path) {
        let has_session = facts
            .session_token
            .as_deref()
            .and_then(|token| sessions.verify(token))
            .is_some();
        if !has_session {
            return Decision::Redirect {
                location: policy.login_path.to_string(),
            };
        }
    }

    let class = classify(&facts.host, policy.root_domain.unwrap_or_default());
    match class.tenant() {
        Some(slug) if facts.path == "/" => {
            let mut path_and_query = format!("{}/{}", policy.tenant_page_root, slug);
            if let Some(q) = &facts.query {
                path_and_query.push('?');
                path_and_query.push_str(q);
            }
            Decision::Rewrite { path_and_query }
        }
        _ => Decision::PassThrough,
    }
}

/// Edge middleware. Must wrap the whole router so a rewritten path is the one
/// that gets routed.
pub async fn intercept(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let facts = RequestFacts::from_request(&req, &state.config.session_cookie);
    let policy = EdgePolicy::from_config(&state.config);

    match decide(&policy, &facts, state.sessions.as_ref()) {
        Decision::PassThrough => next.run(req).await,
        Decision::Redirect { location } => {
            debug!(path = %facts.path, "no session on protected path; redirecting to login");
            Redirect::temporary(&location).into_response()
        }
        Decision::Rewrite { path_and_query } => {
            match rewrite_uri(req.uri(), &path_and_query) {
                Some(uri) => {
                    debug!(host = %facts.host, to = %path_and_query, "tenant rewrite");
                    *req.uri_mut() = uri;
                }
                None => warn!(to = %path_and_query, "tenant rewrite produced an invalid uri; passing through"),
            }
            next.run(req).await
        }
    }
}

fn rewrite_uri(original: &Uri, path_and_query: &str) -> Option<Uri> {
    let mut parts = original.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}
