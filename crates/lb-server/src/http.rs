//! HTTP transport: `POST /rpc` and `GET /health`

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lb_core::Session;
use serde_json::json;
use tracing::{debug, warn};

use crate::rpc::{self, RpcError};

pub fn router(session: Arc<Session>) -> Router {
    Router::new()
        .route("/rpc", post(rpc_handler))
        .route("/health", get(health_handler))
        .with_state(session)
}

/// Request-scoped failures are the client's to fix; engine trouble is worth a retry
fn status_for(error: Option<&RpcError>) -> StatusCode {
    match error {
        None => StatusCode::OK,
        Some(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        Some(_) => StatusCode::BAD_REQUEST,
    }
}

async fn rpc_handler(State(session): State<Arc<Session>>, body: Bytes) -> Response {
    let (response, error) = rpc::handle(&session, &body).await;
    match &error {
        Some(e) if e.is_transient() => warn!(code = e.code(), error = %e, "rpc failed"),
        Some(e) => debug!(code = e.code(), error = %e, "rpc rejected"),
        None => {}
    }
    (status_for(error.as_ref()), Json(response)).into_response()
}

async fn health_handler(State(session): State<Arc<Session>>) -> Response {
    Json(json!({
        "status": "ok",
        "fields": session.list_fields().len(),
        "plots": session.plot_count(),
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_core::{EngineQueue, SessionError, SessionSettings};
    use lb_core::{ColumnData, Table};
    use lb_render::RasterEngine;

    fn session() -> Arc<Session> {
        let table = Table::from_columns(vec![ColumnData {
            name: "Met".into(),
            label: "Met".into(),
            values: vec![1.0, 2.0],
        }])
        .unwrap();
        let (engine, _worker) = EngineQueue::spawn(RasterEngine::new(Arc::new(table)), 4);
        Arc::new(Session::new(SessionSettings::default(), engine))
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(None), StatusCode::OK);
        let stale = RpcError::Session(SessionError::RenderSuperseded(0));
        assert_eq!(status_for(Some(&stale)), StatusCode::SERVICE_UNAVAILABLE);
        let bad = RpcError::InvalidRequest("nope".into());
        assert_eq!(status_for(Some(&bad)), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_handlers() {
        let session = session();

        let body = Bytes::from_static(br#"{"method": "createPlot"}"#);
        let response = rpc_handler(State(session.clone()), body).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = Bytes::from_static(br#"{"method": "requestImage", "params": {"plotId": 7, "width": 1, "height": 1}}"#);
        let response = rpc_handler(State(session.clone()), body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = health_handler(State(session.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(session.plot_count(), 1);
    }
}
