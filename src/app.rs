use std::net::SocketAddr;

use axum::{middleware, routing::get, Router};
use tower::Layer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, billing, intake, newsletter, profiles, tenancy::interceptor::intercept};

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(intake::router())
        .merge(profiles::router())
        .merge(newsletter::router())
        .merge(billing::router())
        .route("/health", get(|| async { "ok" }))
}

/// The interceptor wraps the finished router rather than being added with
/// `Router::layer`, so a tenant rewrite is seen by route matching.
pub fn build_app(state: AppState) -> Router {
    let inner = routes().with_state(state.clone());
    let edge = middleware::from_fn_with_state(state, intercept).layer(inner);

    Router::new()
        .fallback_service(edge)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let host = req
                        .headers()
                        .get(axum::http::header::HOST)
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!("http_request", %method, uri = %uri, %host, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
