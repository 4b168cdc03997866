use crate::errors::ApiError;
use crate::models::*;
use crate::state::{AppState, Deployment};
use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;
use zkdocs::protocol::{Command, Validation};
use zkdocs::Address;

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/v1/instances", post(deploy_instance))
        .route("/api/v1/instances/:id/institutions", post(add_institution))
        .route("/api/v1/instances/:id/fields", post(post_fields))
        .route("/api/v1/instances/:id/attestations", post(attest))
        .route("/api/v1/instances/:id/validations", post(validate))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/instances/:id", get(get_instance))
        .route("/api/v1/instances/:id/program", get(get_program))
        .route("/api/v1/instances/:id/circuit.circom", get(get_circom))
        .route("/api/v1/instances/:id/keys", get(get_keys))
        .route("/api/v1/instances/:id/fields/:index", get(get_field))
        .route("/api/v1/instances/:id/submitters/:address/fields/:position", get(get_field_index))
        .route("/api/v1/instances/:id/validated", get(list_validated))
        .merge(protected_routes)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(provided_key) = headers.get("X-API-KEY") {
        if provided_key == state.config.api_key.as_str() {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!("unauthorized access attempt");
    Err(StatusCode::UNAUTHORIZED)
}

async fn deploy_instance(
    State(state): State<AppState>,
    Json(req): Json<DeployRequest>,
) -> Result<Json<DeployResponse>, ApiError> {
    // Groth16 setup is CPU-bound.
    let deployment = tokio::task::spawn_blocking(move || Deployment::build(&req.name, &req.schema, req.admin))
        .await
        .map_err(|_| ApiError::Internal)??;

    let resp = DeployResponse {
        instance_id: deployment.id,
        schema_hash: deployment.instance.schema_hash().to_string(),
        num_fields: deployment.instance.num_fields(),
        constants: deployment.instance.constants().to_vec(),
    };

    let id = state.insert(deployment).await;
    tracing::info!(instance_id = %id, schema_hash = %resp.schema_hash, "instance deployed");

    Ok(Json(resp))
}

async fn get_instance(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<InstanceResponse>, ApiError> {
    let deployment = state.deployment(id).await?;
    let d = deployment.lock().await;

    let fields = d
        .schema
        .fields()
        .iter()
        .map(|f| FieldInfo {
            field_name: f.field_name.clone(),
            human_name: f.human_name.clone(),
            description: f.description.clone(),
            is_string: f.is_string,
        })
        .collect();

    Ok(Json(InstanceResponse {
        instance_id: id,
        name: d.schema.name().to_string(),
        deployed_at: d.deployed_at,
        schema_hash: d.instance.schema_hash().to_string(),
        admin: d.instance.admin(),
        num_fields: d.instance.num_fields(),
        constants: d.instance.constants().to_vec(),
        fields,
        trusted_institutions: d.schema.trusted_institutions().iter().map(|t| t.address).collect(),
        num_field_slots: d.instance.num_field_slots(),
        validated_submitters: d.instance.list_validated_submitters().to_vec(),
    }))
}

async fn get_program(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<zkdocs::ConstraintProgram>, ApiError> {
    let deployment = state.deployment(id).await?;
    let program = deployment.lock().await.program.clone();
    Ok(Json(program))
}

async fn get_circom(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<CircomParams>,
) -> Result<Response, ApiError> {
    let deployment = state.deployment(id).await?;
    let text = deployment
        .lock()
        .await
        .program
        .to_circom(params.include_prefix.as_deref().unwrap_or(""));
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response())
}

async fn get_keys(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<KeysResponse>, ApiError> {
    let deployment = state.deployment(id).await?;
    let d = deployment.lock().await;
    let b64 = base64::engine::general_purpose::STANDARD;

    Ok(Json(KeysResponse {
        curve: "bn254".to_string(),
        proof_system: "groth16".to_string(),
        pk_b64: b64.encode(&d.pk_bytes),
        vk_b64: b64.encode(&d.vk_bytes),
    }))
}

async fn get_field(
    State(state): State<AppState>,
    Path((id, field_index)): Path<(Uuid, usize)>,
) -> Result<Json<FieldResponse>, ApiError> {
    let deployment = state.deployment(id).await?;
    let d = deployment.lock().await;
    let field = d.instance.field_commitment(field_index)?.clone();
    Ok(Json(FieldResponse { field_index, field }))
}

async fn get_field_index(
    State(state): State<AppState>,
    Path((id, submitter, position)): Path<(Uuid, Address, usize)>,
) -> Result<Json<FieldIndexResponse>, ApiError> {
    let deployment = state.deployment(id).await?;
    let field_index = deployment.lock().await.instance.field_index_of(&submitter, position)?;
    Ok(Json(FieldIndexResponse { submitter, position, field_index }))
}

async fn list_validated(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ValidatedResponse>, ApiError> {
    let deployment = state.deployment(id).await?;
    let validated_submitters = deployment.lock().await.instance.list_validated_submitters().to_vec();
    Ok(Json(ValidatedResponse { validated_submitters }))
}

async fn add_institution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddInstitutionRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let deployment = state.deployment(id).await?;
    let mut d = deployment.lock().await;
    let verifier = d.verifier.clone();
    d.instance.add_valid_institution(req.caller, req.address, verifier.as_ref())?;
    Ok(Json(OkResponse { ok: true }))
}

async fn post_fields(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PostFieldsRequest>,
) -> Result<Json<PostFieldsResponse>, ApiError> {
    let deployment = state.deployment(id).await?;
    let mut d = deployment.lock().await;
    let verifier = d.verifier.clone();
    let first_index = d
        .instance
        .post_fields(req.submitter, req.commitments, req.attesters, verifier.as_ref())?;
    Ok(Json(PostFieldsResponse { submitter: req.submitter, first_index }))
}

async fn attest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AttestRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let deployment = state.deployment(id).await?;
    let mut d = deployment.lock().await;
    let verifier = d.verifier.clone();
    d.instance.attest(req.attester, req.field_index, verifier.as_ref())?;
    Ok(Json(OkResponse { ok: true }))
}

/// Proof verification runs on a blocking thread against a snapshot of the instance while
/// the deployment lock is held. The resulting event is applied only if the check finishes
/// within the configured timeout.
async fn validate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let proof = base64::engine::general_purpose::STANDARD
        .decode(&req.proof_b64)
        .map_err(|_| ApiError::BadRequest("invalid proof_b64".to_string()))?;

    let deployment = state.deployment(id).await?;
    let mut d = deployment.lock().await;

    let snapshot = d.instance.clone();
    let verifier = d.verifier.clone();
    let command = Command::Validate { submitter: req.submitter, proof };
    let check = tokio::task::spawn_blocking(move || snapshot.decide(&command, verifier.as_ref()));

    let decision = match tokio::time::timeout(state.config.proof_timeout, check).await {
        Ok(joined) => joined.map_err(|_| ApiError::Internal)?,
        Err(_) => {
            tracing::warn!(instance_id = %id, submitter = %req.submitter, "proof verification timed out");
            return Err(ApiError::Timeout);
        }
    };

    let outcome = match decision {
        Ok(Some(event)) => {
            tracing::info!(instance_id = %id, ?event, "transition applied");
            d.instance.apply(event);
            Validation::Validated
        }
        Ok(None) => Validation::AlreadyValidated,
        Err(e) => {
            tracing::warn!(instance_id = %id, error = %e, "transition rejected");
            return Err(e.into());
        }
    };

    Ok(Json(ValidateResponse { submitter: req.submitter, outcome }))
}
