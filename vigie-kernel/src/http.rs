/**
 * API REST VIGIE - Surface d'administration du moteur de polling
 *
 * RÔLE :
 * Inspection de l'état du moteur et déclenchement manuel d'un cycle.
 * Le CRUD du parc reste hors du moteur : /targets n'est qu'une lecture.
 *
 * ROUTES :
 * - GET  /health         : liveness, toujours accessible
 * - GET  /system/health  : compteurs, dernier cycle, mémoire, MQTT
 * - GET  /cycles/last    : résumé du dernier cycle (404 si aucun)
 * - GET  /targets        : parc tel que le verra le prochain cycle, secrets masqués
 * - POST /poll           : 202 si un cycle démarre, 409 si un cycle tourne déjà
 *
 * SÉCURITÉ :
 * Header x-api-key obligatoire sur toutes routes sauf /health.
 * Sans clé configurée, tout est refusé.
 */

use crate::coordinator::{CycleSummary, Trigger};
use crate::health::KernelHealth;
use crate::models::{Component, SnmpVersion, Target};
use crate::registry::TargetRegistry;
use crate::scheduler::Scheduler;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

pub const API_KEY_ENV: &str = "VIGIE_API_KEY";

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub registry: Arc<dyn TargetRegistry>,
    pub api_key: Option<String>,
}

#[derive(Serialize)]
struct TargetView {
    id: u64,
    name: String,
    ip: String,
    brand: String,
    snmp_version: SnmpVersion,
    /// "community" ou "user", jamais le secret lui-même
    credential_mode: &'static str,
    auth_user: Option<String>,
    auth_proto: Option<String>,
    priv_proto: Option<String>,
    components: Vec<Component>,
}

fn to_view(t: Target) -> TargetView {
    let credential_mode = match t.snmp_version {
        SnmpVersion::V2c => "community",
        SnmpVersion::V3 => "user",
    };
    TargetView {
        id: t.id,
        name: t.name,
        ip: t.ip,
        brand: t.brand,
        snmp_version: t.snmp_version,
        credential_mode,
        auth_user: t.auth_user,
        auth_proto: t.auth_proto,
        priv_proto: t.priv_proto,
        components: t.components,
    }
}

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let Some(expected) = app.api_key.as_deref().filter(|k| !k.is_empty()) else {
        warn!("{API_KEY_ENV} not set, API access denied");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!(path = %req.uri().path(), "rejected request with missing or wrong API key");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/cycles/last", get(get_last_cycle))
        .route("/targets", get(get_targets))
        .route("/poll", post(trigger_poll))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.scheduler.health().get_health(app.scheduler.is_running()))
}

// GET /cycles/last
async fn get_last_cycle(State(app): State<AppState>) -> Result<Json<CycleSummary>, StatusCode> {
    app.scheduler.health().last_cycle().map(Json).ok_or(StatusCode::NOT_FOUND)
}

// GET /targets
async fn get_targets(State(app): State<AppState>) -> Result<Json<Vec<TargetView>>, StatusCode> {
    match app.registry.list_targets().await {
        Ok(targets) => Ok(Json(targets.into_iter().map(to_view).collect())),
        Err(e) => {
            error!(error = %e, "failed to read target registry");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

// POST /poll
async fn trigger_poll(State(app): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match app.scheduler.spawn_trigger(Trigger::Manual) {
        Some(_) => (StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "started" }))),
        None => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "status": "busy", "msg": "a polling cycle is already running" })),
        ),
    }
}
