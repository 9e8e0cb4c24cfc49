//! Control-panel HTTP API.
//!
//! Thin transport over the shared [`Context`]: one snapshot endpoint for the
//! UI and a handful of mutating endpoints that delegate to the configuration
//! store or the device client. Mutating endpoints answer
//! `{success, error?}`; configuration validation failures are 400-class and
//! never systemic.

use std::collections::HashMap;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::device::DeviceAddr;
use crate::device::DeviceInfo;
use crate::engine::Context;
use crate::engine::TallyState;
use crate::error::ConfigError;
use crate::error::DeviceError;
use crate::tracker::Scene;
use crate::tracker::SceneId;

/// Full snapshot consumed by the control panel.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DataResponse {
    devices: Vec<DeviceView>,
    scenes: Vec<Scene>,
    lights: HashMap<String, LightView>,
    switcher_connected: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceView {
    fqdn: String,
    addresses: Vec<IpAddr>,
    port: u16,
    alive: bool,
    configured: bool,
    info: Option<DeviceInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LightView {
    brightness: u8,
    visible_in_scenes: Vec<SceneId>,
    /// Intended state from the last reconciliation pass, if any.
    desired: Option<TallyState>,
    /// False while the device has not acknowledged the intended state;
    /// the panel renders this as a staleness indicator.
    confirmed: bool,
}

#[derive(Deserialize)]
struct UpdateScenesBody {
    scenes: Vec<SceneId>,
}

/// Uniform `{success, error?}` reply for mutating endpoints.
struct ApiReply {
    status: StatusCode,
    success: bool,
    error: Option<String>,
}

#[derive(Serialize)]
struct ApiReplyBody {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiReply {
    fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            error: None,
        }
    }

    fn err(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            error: Some(error.into()),
        }
    }
}

impl IntoResponse for ApiReply {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(ApiReplyBody {
                success: self.success,
                error: self.error,
            }),
        )
            .into_response()
    }
}

impl From<Result<(), ConfigError>> for ApiReply {
    fn from(result: Result<(), ConfigError>) -> Self {
        match result {
            Ok(()) => ApiReply::ok(),
            Err(err @ ConfigError::NotFound(_)) => {
                ApiReply::err(StatusCode::NOT_FOUND, err.to_string())
            }
            Err(err) => ApiReply::err(StatusCode::BAD_REQUEST, err.to_string()),
        }
    }
}

impl From<Result<(), DeviceError>> for ApiReply {
    fn from(result: Result<(), DeviceError>) -> Self {
        match result {
            Ok(()) => ApiReply::ok(),
            Err(err) => ApiReply::err(StatusCode::BAD_GATEWAY, err.to_string()),
        }
    }
}

#[tracing::instrument(skip(ctx))]
async fn data(State(ctx): State<Arc<Context>>) -> impl IntoResponse {
    let lights_config = ctx.store.lights().await;
    let statuses = ctx.status.light_statuses().await;
    let info = ctx.status.device_info().await;

    let devices = ctx
        .registry
        .list()
        .await
        .into_iter()
        .map(|d| DeviceView {
            alive: d.last_alive.is_some(),
            configured: lights_config.contains_key(&d.fqdn),
            info: info.get(&d.fqdn).cloned(),
            fqdn: d.fqdn,
            addresses: d.addresses,
            port: d.port,
        })
        .collect();

    let lights = lights_config
        .into_iter()
        .map(|(fqdn, cfg)| {
            let status = statuses.get(&fqdn);
            let mut visible: Vec<SceneId> = cfg.visible_in_scenes.into_iter().collect();
            visible.sort();
            (
                fqdn,
                LightView {
                    brightness: cfg.brightness,
                    visible_in_scenes: visible,
                    desired: status.map(|s| s.desired),
                    confirmed: status.is_some_and(|s| s.confirmed),
                },
            )
        })
        .collect();

    Json(DataResponse {
        devices,
        scenes: ctx.tracker.scenes().await,
        lights,
        switcher_connected: ctx.tracker.snapshot().await.is_connected(),
    })
}

#[tracing::instrument(skip(ctx))]
async fn add(State(ctx): State<Arc<Context>>, Path(fqdn): Path<String>) -> ApiReply {
    ctx.store.add(&fqdn).await.into()
}

#[tracing::instrument(skip(ctx))]
async fn remove(State(ctx): State<Arc<Context>>, Path(fqdn): Path<String>) -> ApiReply {
    ctx.store.remove(&fqdn).await.into()
}

#[tracing::instrument(skip(ctx))]
async fn set_brightness(
    State(ctx): State<Arc<Context>>,
    Path((fqdn, value)): Path<(String, i64)>,
) -> ApiReply {
    ctx.store.set_brightness(&fqdn, value).await.into()
}

#[tracing::instrument(skip(ctx, body))]
async fn update_scenes(
    State(ctx): State<Arc<Context>>,
    Path(fqdn): Path<String>,
    Json(body): Json<UpdateScenesBody>,
) -> ApiReply {
    ctx.store
        .set_visible_scenes(&fqdn, body.scenes.into_iter().collect())
        .await
        .into()
}

#[tracing::instrument(skip(ctx))]
async fn identify(State(ctx): State<Arc<Context>>, Path(fqdn): Path<String>) -> ApiReply {
    match device_target(&ctx, &fqdn).await {
        Ok(target) => ctx.client.identify(target).await.into(),
        Err(reply) => reply,
    }
}

#[tracing::instrument(skip(ctx))]
async fn restart(State(ctx): State<Arc<Context>>, Path(fqdn): Path<String>) -> ApiReply {
    match device_target(&ctx, &fqdn).await {
        Ok(target) => ctx.client.restart(target).await.into(),
        Err(reply) => reply,
    }
}

async fn device_target(ctx: &Context, fqdn: &str) -> Result<DeviceAddr, ApiReply> {
    let Some(device) = ctx.registry.get(fqdn).await else {
        return Err(ApiReply::err(StatusCode::NOT_FOUND, "device not discovered"));
    };
    let Some(ip) = device.address() else {
        return Err(ApiReply::err(
            StatusCode::BAD_GATEWAY,
            "device advertised no address",
        ));
    };
    Ok(DeviceAddr {
        ip,
        port: device.port,
    })
}

pub fn create_router(ctx: Arc<Context>) -> Router {
    Router::new()
        .route("/api/data", get(data))
        .route("/api/add/:fqdn", get(add))
        .route("/api/remove/:fqdn", get(remove))
        .route("/api/setBrightness/:fqdn/:value", get(set_brightness))
        .route("/api/updateScenes/:fqdn", post(update_scenes))
        .route("/api/identify/:fqdn", get(identify))
        .route("/api/restart/:fqdn", get(restart))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Serve the control-panel API until the shutdown signal fires.
///
/// Failing to bind is the one unrecoverable startup error in the system and
/// propagates out of here to terminate startup.
pub async fn serve(
    listen: String,
    port: u16,
    ctx: Arc<Context>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(ctx);
    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("control panel listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("control panel shutting down");
        })
        .await?;
    Ok(())
}
