//! JSON request surface of the session
//!
//! A request names a method and carries its parameters as a JSON object;
//! [`execute`] validates them, runs the matching session operation and wraps
//! the outcome in a status envelope.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lb_core::{Axis, AxisInfo, ImageResponse, PlotId, SelectionRect, Session, SessionError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// Opaque caller identity, only used for logging
    #[serde(default)]
    pub client: Option<Value>,
    pub method: RpcMethod,
    #[serde(default = "empty_params")]
    pub params: Value,
}

fn empty_params() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RpcMethod {
    ListFields,
    CreatePlot,
    RequestImage,
    GetAxisInfo,
    SetPlotAxis,
    SetFilter,
    ClearFilter,
    SetFilterRange,
    SetSelection,
    SetBrushFilter,
    SetBrushEnabled,
    SetBrushBlend,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestImageParams {
    plot_id: i64,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlotParams {
    plot_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlotAxisParams {
    plot_id: i64,
    axis: Axis,
    field_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterParams {
    filter_slot_index: i64,
    field_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterSlotParams {
    filter_slot_index: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterRangeParams {
    filter_slot_index: i64,
    min_pct: f64,
    max_pct: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionParams {
    plot_id: i64,
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrushFilterParams {
    plot_id: i64,
    source_filter_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrushFlagParams {
    plot_id: i64,
    value: bool,
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RpcError {
    pub fn code(&self) -> &'static str {
        match self {
            RpcError::Session(e) => e.code(),
            RpcError::InvalidRequest(_) => "invalid_request",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Session(e) if e.is_transient())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RpcResponse {
    Ok { result: Value },
    Error { error: ErrorBody },
}

impl RpcResponse {
    pub fn error(code: &str, message: String) -> Self {
        RpcResponse::Error {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        }
    }
}

impl From<&RpcError> for RpcResponse {
    fn from(error: &RpcError) -> Self {
        RpcResponse::error(error.code(), error.to_string())
    }
}

/// Axis metadata in the flat shape clients draw labels from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisPayload {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub xlabel: String,
    pub ylabel: String,
}

impl From<AxisInfo> for AxisPayload {
    fn from(info: AxisInfo) -> Self {
        Self {
            xmin: info.x.min,
            xmax: info.x.max,
            ymin: info.y.min,
            ymax: info.y.max,
            xlabel: info.x.label,
            ylabel: info.y.label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub plot_id: PlotId,
    pub width: u32,
    pub height: u32,
    /// Base64 PNG; empty when the previous image is still current
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis: Option<AxisPayload>,
}

impl From<ImageResponse> for ImagePayload {
    fn from(response: ImageResponse) -> Self {
        match response {
            ImageResponse::Unchanged { plot } => Self {
                plot_id: plot,
                width: 0,
                height: 0,
                image: String::new(),
                axis: None,
            },
            ImageResponse::Rendered { plot, image, axis } => Self {
                plot_id: plot,
                width: image.width,
                height: image.height,
                image: STANDARD.encode(&image.data),
                axis: Some(axis.into()),
            },
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|e| RpcError::InvalidRequest(e.to_string()))
}

fn plot_id(session: &Session, id: i64) -> Result<PlotId, RpcError> {
    usize::try_from(id).map_err(|_| {
        SessionError::IndexOutOfRange {
            kind: "plot",
            index: id,
            len: session.plot_count(),
        }
        .into()
    })
}

fn selection_id(session: &Session, id: i64) -> Result<usize, RpcError> {
    usize::try_from(id).map_err(|_| {
        SessionError::IndexOutOfRange {
            kind: "selection filter",
            index: id,
            len: session.plot_count(),
        }
        .into()
    })
}

fn filter_slot(session: &Session, index: i64) -> Result<usize, RpcError> {
    usize::try_from(index).map_err(|_| {
        SessionError::InvalidSlot {
            index,
            capacity: session.base_filter_slots(),
        }
        .into()
    })
}

/// Run one request against the session
pub async fn execute(session: &Session, request: RpcRequest) -> Result<Value, RpcError> {
    debug!(client = ?request.client, method = ?request.method, "rpc");
    let params = request.params;

    let result = match request.method {
        RpcMethod::ListFields => {
            let fields: Vec<Value> = session
                .list_fields()
                .into_iter()
                .map(|f| json!({ "name": f.name, "label": f.label }))
                .collect();
            json!(fields)
        }
        RpcMethod::CreatePlot => {
            let plot = session.create_plot()?;
            json!({ "plotId": plot.id, "width": plot.width, "height": plot.height })
        }
        RpcMethod::RequestImage => {
            let p: RequestImageParams = parse_params(params)?;
            let plot = plot_id(session, p.plot_id)?;
            let response = session.request_image(plot, p.width, p.height).await?;
            json!(ImagePayload::from(response))
        }
        RpcMethod::GetAxisInfo => {
            let p: PlotParams = parse_params(params)?;
            let info = session.axis_info(plot_id(session, p.plot_id)?)?;
            json!(AxisPayload::from(info))
        }
        RpcMethod::SetPlotAxis => {
            let p: PlotAxisParams = parse_params(params)?;
            session.set_plot_axis(plot_id(session, p.plot_id)?, p.axis, &p.field_name)?;
            Value::Null
        }
        RpcMethod::SetFilter => {
            let p: FilterParams = parse_params(params)?;
            session.set_filter(filter_slot(session, p.filter_slot_index)?, &p.field_name)?;
            Value::Null
        }
        RpcMethod::ClearFilter => {
            let p: FilterSlotParams = parse_params(params)?;
            session.clear_filter(filter_slot(session, p.filter_slot_index)?)?;
            Value::Null
        }
        RpcMethod::SetFilterRange => {
            let p: FilterRangeParams = parse_params(params)?;
            let slot = filter_slot(session, p.filter_slot_index)?;
            session.set_filter_range(slot, p.min_pct, p.max_pct)?;
            Value::Null
        }
        RpcMethod::SetSelection => {
            let p: SelectionParams = parse_params(params)?;
            let rect = SelectionRect {
                min_x: p.min_x,
                max_x: p.max_x,
                min_y: p.min_y,
                max_y: p.max_y,
            };
            session.set_selection(plot_id(session, p.plot_id)?, rect)?;
            Value::Null
        }
        RpcMethod::SetBrushFilter => {
            let p: BrushFilterParams = parse_params(params)?;
            let plot = plot_id(session, p.plot_id)?;
            session.set_brush_filter(plot, selection_id(session, p.source_filter_id)?)?;
            Value::Null
        }
        RpcMethod::SetBrushEnabled => {
            let p: BrushFlagParams = parse_params(params)?;
            session.set_brush_enabled(plot_id(session, p.plot_id)?, p.value)?;
            Value::Null
        }
        RpcMethod::SetBrushBlend => {
            let p: BrushFlagParams = parse_params(params)?;
            session.set_brush_blend(plot_id(session, p.plot_id)?, p.value)?;
            Value::Null
        }
    };

    Ok(result)
}

/// Parse, run and wrap a request body
pub async fn handle(session: &Session, body: &[u8]) -> (RpcResponse, Option<RpcError>) {
    let request: RpcRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => {
            let error = RpcError::InvalidRequest(format!("invalid JSON request: {err}"));
            return (RpcResponse::from(&error), Some(error));
        }
    };

    match execute(session, request).await {
        Ok(result) => (RpcResponse::Ok { result }, None),
        Err(error) => (RpcResponse::from(&error), Some(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lb_core::{ColumnData, EngineQueue, FieldKind, SessionSettings, Table};
    use lb_render::RasterEngine;
    use std::sync::Arc;

    async fn session() -> Session {
        let table = Table::from_columns(vec![
            ColumnData {
                name: "ZMass".into(),
                label: "Z mass".into(),
                values: vec![80.0, 91.0, 100.0],
            },
            ColumnData {
                name: "ZPt".into(),
                label: "ZPt".into(),
                values: vec![1.0, 2.0, 3.0],
            },
        ])
        .unwrap();
        let table = Arc::new(table);

        let (engine, _worker) = EngineQueue::spawn(RasterEngine::new(table.clone()), 8);
        let session = Session::new(SessionSettings::default(), engine);
        for i in 0..table.num_columns() {
            session
                .register_field(table.column_name(i), FieldKind::Float, table.label(i), table.extent(i))
                .await
                .unwrap();
        }
        session
    }

    async fn call(session: &Session, body: Value) -> RpcResponse {
        handle(session, body.to_string().as_bytes()).await.0
    }

    fn result(response: RpcResponse) -> Value {
        match response {
            RpcResponse::Ok { result } => result,
            RpcResponse::Error { error } => panic!("unexpected error {error:?}"),
        }
    }

    fn error_code(response: RpcResponse) -> String {
        match response {
            RpcResponse::Error { error } => error.code,
            RpcResponse::Ok { result } => panic!("unexpected success {result}"),
        }
    }

    #[tokio::test]
    async fn test_list_fields_and_create_plot() {
        let session = session().await;

        let fields = result(call(&session, json!({"client": 1, "method": "listFields"})).await);
        assert_eq!(fields[0]["label"], "Z mass");
        assert_eq!(fields[1]["name"], "ZPt");

        let plot = result(call(&session, json!({"method": "createPlot", "params": {}})).await);
        assert_eq!(plot, json!({"plotId": 0, "width": 400, "height": 400}));
    }

    #[tokio::test]
    async fn test_image_then_unchanged() {
        let session = session().await;
        call(&session, json!({"method": "createPlot"})).await;
        for (axis, field) in [("x", "ZMass"), ("y", "ZPt")] {
            let params = json!({"plotId": 0, "axis": axis, "fieldName": field});
            result(call(&session, json!({"method": "setPlotAxis", "params": params})).await);
        }

        let request = json!({"method": "requestImage", "params": {"plotId": 0, "width": 64, "height": 48}});
        let image = result(call(&session, request.clone()).await);
        assert_eq!(image["width"], 64);
        assert_eq!(image["axis"]["xlabel"], "Z mass");
        assert_eq!(image["axis"]["ymax"], 3.0);
        let png = STANDARD.decode(image["image"].as_str().unwrap()).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");

        let unchanged = result(call(&session, request).await);
        assert_eq!(unchanged, json!({"plotId": 0, "width": 0, "height": 0, "image": ""}));
    }

    #[tokio::test]
    async fn test_error_codes() {
        let session = session().await;
        call(&session, json!({"method": "createPlot"})).await;

        let cases = [
            (json!({"method": "setFilter", "params": {"filterSlotIndex": -1, "fieldName": "ZPt"}}), "invalid_slot"),
            (json!({"method": "setFilter", "params": {"filterSlotIndex": 9, "fieldName": "ZPt"}}), "invalid_slot"),
            (json!({"method": "setFilter", "params": {"filterSlotIndex": 0, "fieldName": "Met"}}), "unknown_field"),
            (json!({"method": "requestImage", "params": {"plotId": -2, "width": 1, "height": 1}}), "index_out_of_range"),
            (json!({"method": "setBrushFilter", "params": {"plotId": 0, "sourceFilterId": 5}}), "index_out_of_range"),
            (json!({"method": "setSelection", "params": {"plotId": 0}}), "invalid_request"),
            (json!({"method": "dropTable"}), "invalid_request"),
        ];
        for (request, code) in cases {
            assert_eq!(error_code(call(&session, request.clone()).await), code, "{request}");
        }

        let (response, error) = handle(&session, b"{ not json").await;
        assert_eq!(error_code(response), "invalid_request");
        assert!(!error.unwrap().is_transient());
    }

    #[tokio::test]
    async fn test_brush_relink_over_rpc() {
        let session = session().await;
        for _ in 0..2 {
            call(&session, json!({"method": "createPlot"})).await;
        }
        let image = |plot: i64| json!({"method": "requestImage", "params": {"plotId": plot, "width": 8, "height": 8}});
        for plot in 0..2 {
            result(call(&session, image(plot)).await);
        }

        let relink = json!({"method": "setBrushFilter", "params": {"plotId": 1, "sourceFilterId": 0}});
        result(call(&session, relink).await);
        let select = json!({"method": "setSelection", "params": {"plotId": 0, "minX": 0.0, "maxX": 1.0, "minY": 0.0, "maxY": 1.0}});
        result(call(&session, select).await);

        assert!(session.is_dirty(1).unwrap());
        assert_eq!(result(call(&session, image(1)).await)["width"], 8);
    }
}
