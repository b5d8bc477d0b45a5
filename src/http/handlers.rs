//! Request handlers.
//!
//! Entity collections are addressed by their path segment: `clusters`,
//! `storage`, `policies`, `routines`, `secret-agents`.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::convert::{restore_policy_dto, ConvertError};
use crate::config::edit::{self, EditError, Entity};
use crate::config::holder::UpdateError;
use crate::config::loader::ConfigError;
use crate::config::schema::{ConfigDto, RestorePolicyDto};
use crate::config::validation::{validate_restore_policy, EntityKind, ValidationError};
use crate::http::server::AppState;
use crate::jobs::CurrentBackups;
use crate::storage::AccessorError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("unknown collection {0:?}")]
    UnknownCollection(String),

    #[error("invalid {kind} body: {source}")]
    Body {
        kind: EntityKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} {name:?} not found")]
    NotFound { kind: EntityKind, name: String },

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl From<UpdateError> for ApiError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::Edit(e) => ApiError::Edit(e),
            UpdateError::Config(e) => ApiError::Config(e),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Config(e) => match e {
                ConfigError::Decode { .. } | ConfigError::Validation { .. } | ConfigError::Convert { .. } => {
                    StatusCode::BAD_REQUEST
                }
                ConfigError::Write {
                    source: AccessorError::Unsupported { .. },
                    ..
                } => StatusCode::METHOD_NOT_ALLOWED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Edit(e) => match e {
                EditError::NotFound { .. } => StatusCode::NOT_FOUND,
                EditError::AlreadyExists { .. } | EditError::InUse { .. } => StatusCode::CONFLICT,
                EditError::EmptyName { .. } | EditError::NotEditable { .. } => StatusCode::BAD_REQUEST,
            },
            ApiError::Validation(_) | ApiError::Convert(_) | ApiError::Body { .. } => StatusCode::BAD_REQUEST,
            ApiError::UnknownCollection(_) | ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

fn collection(segment: &str) -> Result<EntityKind, ApiError> {
    match segment {
        "clusters" => Ok(EntityKind::Cluster),
        "storage" => Ok(EntityKind::Storage),
        "policies" => Ok(EntityKind::BackupPolicy),
        "routines" => Ok(EntityKind::BackupRoutine),
        "secret-agents" => Ok(EntityKind::SecretAgent),
        other => Err(ApiError::UnknownCollection(other.to_string())),
    }
}

fn entity(kind: EntityKind, body: Value) -> Result<Entity, ApiError> {
    let parsed = match kind {
        EntityKind::Cluster => serde_json::from_value(body).map(Entity::Cluster),
        EntityKind::Storage => serde_json::from_value(body).map(Entity::Storage),
        EntityKind::BackupPolicy => serde_json::from_value(body).map(Entity::BackupPolicy),
        EntityKind::BackupRoutine => serde_json::from_value(body).map(Entity::BackupRoutine),
        EntityKind::SecretAgent => serde_json::from_value(body).map(Entity::SecretAgent),
        other => return Err(ApiError::UnknownCollection(other.to_string())),
    };
    parsed.map_err(|source| ApiError::Body { kind, source })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(ApiError::Encode)
}

fn collection_json(document: &ConfigDto, kind: EntityKind) -> Result<Value, ApiError> {
    match kind {
        EntityKind::Cluster => to_json(&document.aerospike_clusters),
        EntityKind::Storage => to_json(&document.storage),
        EntityKind::BackupPolicy => to_json(&document.backup_policies),
        EntityKind::BackupRoutine => to_json(&document.backup_routines),
        EntityKind::SecretAgent => to_json(&document.secret_agents),
        other => Err(ApiError::UnknownCollection(other.to_string())),
    }
}

#[derive(Serialize)]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn version() -> Json<VersionInfo> {
    Json(VersionInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

pub async fn get_config(State(state): State<AppState>) -> Result<Json<ConfigDto>, ApiError> {
    Ok(Json(state.holder.document()?))
}

pub async fn put_config(State(state): State<AppState>, Json(document): Json<ConfigDto>) -> Result<StatusCode, ApiError> {
    state.holder.apply(document).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reload_config(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.holder.reload().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_entities(
    State(state): State<AppState>,
    Path(segment): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let kind = collection(&segment)?;
    let document = state.holder.document()?;
    Ok(Json(collection_json(&document, kind)?))
}

pub async fn get_entity(
    State(state): State<AppState>,
    Path((segment, name)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let kind = collection(&segment)?;
    let document = state.holder.document()?;
    match collection_json(&document, kind)?.get(&name) {
        Some(entry) => Ok(Json(entry.clone())),
        None => Err(ApiError::NotFound { kind, name }),
    }
}

pub async fn add_entity(
    State(state): State<AppState>,
    Path((segment, name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let entity = entity(collection(&segment)?, body)?;
    state.holder.update(|doc| edit::add(doc, &name, entity)).await?;
    Ok(StatusCode::CREATED)
}

pub async fn update_entity(
    State(state): State<AppState>,
    Path((segment, name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let entity = entity(collection(&segment)?, body)?;
    state.holder.update(|doc| edit::update(doc, &name, entity)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_entity(
    State(state): State<AppState>,
    Path((segment, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let kind = collection(&segment)?;
    state.holder.update(|doc| edit::delete(doc, kind, &name)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn current_jobs(State(state): State<AppState>) -> Json<BTreeMap<String, CurrentBackups>> {
    Json(state.jobs.all())
}

pub async fn routine_jobs(
    State(state): State<AppState>,
    Path(routine): Path<String>,
) -> Result<Json<CurrentBackups>, ApiError> {
    if !state.holder.snapshot().backup_routines.contains_key(&routine) {
        return Err(ApiError::NotFound {
            kind: EntityKind::BackupRoutine,
            name: routine,
        });
    }
    Ok(Json(state.jobs.current(&routine)))
}

/// Validate a restore policy and echo it back with defaults applied.
pub async fn check_restore_policy(
    State(state): State<AppState>,
    Json(policy): Json<RestorePolicyDto>,
) -> Result<Json<RestorePolicyDto>, ApiError> {
    validate_restore_policy("restore", &policy)?;
    let policy = state.holder.converter().restore_policy(&policy)?;
    Ok(Json(restore_policy_dto(&policy)))
}
