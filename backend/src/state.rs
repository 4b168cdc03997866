use crate::config::Config;
use crate::errors::ApiError;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;
use zkdocs::groth16::{serialize_pk, serialize_vk, setup_keys, Groth16Verifier};
use zkdocs::{compile, Address, ConstraintProgram, DocumentInstance, Schema};

/// One deployed schema: its compiled program, Groth16 keys and the live instance.
pub struct Deployment {
    pub id: Uuid,
    pub deployed_at: DateTime<Utc>,
    pub schema: Schema,
    pub program: ConstraintProgram,
    pub instance: DocumentInstance,
    pub pk_bytes: Vec<u8>,
    pub vk_bytes: Vec<u8>,
    pub verifier: Arc<Groth16Verifier>,
}

impl Deployment {
    /// Parse, compile and run the trusted setup for `raw_schema`.
    ///
    /// CPU-heavy; call from a blocking thread.
    pub fn build(name: &str, raw_schema: &str, admin: Address) -> Result<Self, ApiError> {
        let schema = Schema::parse(raw_schema, name)?;
        let program = compile(&schema)?;

        // Single-party setup: the service operator holds the toxic waste.
        let mut rng = OsRng;
        let (pk, vk) = setup_keys(&program, &mut rng)?;

        let instance = DocumentInstance::new(&schema, admin, &program.constants, program.num_fields)?;

        Ok(Self {
            id: Uuid::new_v4(),
            deployed_at: Utc::now(),
            pk_bytes: serialize_pk(&pk)?,
            vk_bytes: serialize_vk(&vk)?,
            verifier: Arc::new(Groth16Verifier::new(&vk)),
            schema,
            program,
            instance,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    deployments: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Deployment>>>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            deployments: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, deployment: Deployment) -> Uuid {
        let id = deployment.id;
        self.deployments.write().await.insert(id, Arc::new(Mutex::new(deployment)));
        id
    }

    /// Every transition on an instance runs under its deployment lock.
    pub async fn deployment(&self, id: Uuid) -> Result<Arc<Mutex<Deployment>>, ApiError> {
        self.deployments
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("instance {id} not found")))
    }
}
