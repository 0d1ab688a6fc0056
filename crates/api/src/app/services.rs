//! Backend wiring: builds the identity provider, document store and repair
//! log selected by [`Config`], and the provisioner over them.

use std::sync::Arc;

use axum::response::Response;
use thiserror::Error;
use tracing::{error, info, warn};

use staffgate_infra::document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore, StoreError};
use staffgate_infra::identity::{HttpIdentityProvider, IdentityError, IdentityProvider, InMemoryIdentityProvider};
use staffgate_infra::repairs::{InMemoryRepairLog, PostgresRepairLog, RepairLog};
use staffgate_infra::StaffProvisioner;

use crate::app::errors;
use crate::config::{Config, DocumentBackend, IdentityBackend, InitFailure};

/// Backend initialisation failure.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("--identity-url is required when --identity-backend=http")]
    MissingIdentityUrl,

    #[error("--database-url is required when --document-backend=postgres")]
    MissingDatabaseUrl,

    #[error("identity provider: {0}")]
    Identity(#[from] IdentityError),

    #[error("document store: {0}")]
    Store(#[from] StoreError),
}

/// Services shared by every request.
#[derive(Clone)]
pub enum AppServices {
    Ready { provisioner: Arc<StaffProvisioner> },
    /// Backends failed to initialise and the process was told to keep serving.
    Unavailable { reason: String },
}

impl AppServices {
    pub fn ready(provisioner: Arc<StaffProvisioner>) -> Self {
        AppServices::Ready { provisioner }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        AppServices::Unavailable {
            reason: reason.into(),
        }
    }

    /// The provisioner, or the 503 response to send when there is none.
    pub fn provisioner(&self) -> Result<&Arc<StaffProvisioner>, Response> {
        match self {
            AppServices::Ready { provisioner } => Ok(provisioner),
            AppServices::Unavailable { reason } => Err(errors::unavailable(reason)),
        }
    }
}

async fn build_provisioner(config: &Config) -> Result<StaffProvisioner, InitError> {
    let timeout = config.backend_timeout();

    let identity: Arc<dyn IdentityProvider> = match config.identity_backend {
        IdentityBackend::Memory => {
            warn!("using in-memory identity provider; accounts are lost on restart");
            Arc::new(InMemoryIdentityProvider::new())
        }
        IdentityBackend::Http => {
            let url = config
                .identity_url
                .clone()
                .ok_or(InitError::MissingIdentityUrl)?;
            info!(url = %url, "using HTTP identity provider");
            let provider = HttpIdentityProvider::new(url, config.identity_token.clone(), timeout)?;
            Arc::new(provider)
        }
    };

    let (store, repairs): (Arc<dyn DocumentStore>, Arc<dyn RepairLog>) = match config.document_backend {
        DocumentBackend::Memory => {
            warn!("using in-memory document store; records are lost on restart");
            let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
            let repairs: Arc<dyn RepairLog> = Arc::new(InMemoryRepairLog::new());
            (store, repairs)
        }
        DocumentBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(InitError::MissingDatabaseUrl)?;
            let store = PostgresDocumentStore::connect(url, timeout).await?;
            let repairs = PostgresRepairLog::new(store.pool().clone());
            repairs.ensure_schema().await?;
            info!("using Postgres document store");
            let store: Arc<dyn DocumentStore> = Arc::new(store);
            let repairs: Arc<dyn RepairLog> = Arc::new(repairs);
            (store, repairs)
        }
    };

    Ok(StaffProvisioner::new(identity, store, repairs)
        .with_policy(config.compensation_policy())
        .with_timeout(timeout))
}

/// Build the services for `config`, applying the configured init-failure policy.
pub async fn build_services(config: &Config) -> Result<AppServices, InitError> {
    match build_provisioner(config).await {
        Ok(provisioner) => Ok(AppServices::ready(Arc::new(provisioner))),
        Err(e) => match config.on_init_failure {
            InitFailure::Exit => Err(e),
            InitFailure::ServeUnavailable => {
                error!(error = %e, "backend initialisation failed; serving 503 on staff routes");
                Ok(AppServices::unavailable(e.to_string()))
            }
        },
    }
}
