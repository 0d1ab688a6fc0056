//! In-memory identity provider for tests/dev.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use staffgate_core::{CustomClaims, StaffId};

use super::{AccountUpdate, IdentityAccount, IdentityError, IdentityOp, IdentityProvider, NewIdentity};
use crate::faults::FaultInjector;

/// Shortest password the provider accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// In-memory identity provider.
///
/// Enforces the provider rules callers commonly trip over (unique e-mail,
/// minimum password length). Passwords are checked and then discarded.
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    accounts: RwLock<HashMap<StaffId, IdentityAccount>>,
    faults: FaultInjector<IdentityOp>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fault table for this provider (tests).
    pub fn faults(&self) -> &FaultInjector<IdentityOp> {
        &self.faults
    }

    /// Snapshot of one account.
    pub fn account(&self, id: &StaffId) -> Option<IdentityAccount> {
        self.read().get(id).cloned()
    }

    /// Snapshot of every account.
    pub fn accounts(&self) -> Vec<IdentityAccount> {
        self.read().values().cloned().collect()
    }

    async fn inject(&self, op: IdentityOp) -> Result<(), IdentityError> {
        self.faults.check(op).await.map_err(IdentityError::Provider)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<StaffId, IdentityAccount>> {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<StaffId, IdentityAccount>> {
        self.accounts.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found() -> IdentityError {
    IdentityError::NotFound(
        "There is no user record corresponding to the provided identifier.".to_string(),
    )
}

fn issue_id() -> Result<StaffId, IdentityError> {
    Uuid::now_v7()
        .simple()
        .to_string()
        .parse()
        .map_err(|e: staffgate_core::DomainError| IdentityError::Provider(e.to_string()))
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_account(&self, account: &NewIdentity) -> Result<StaffId, IdentityError> {
        self.inject(IdentityOp::CreateAccount).await?;

        if !account.email.contains('@') {
            return Err(IdentityError::InvalidArgument(
                "The email address is improperly formatted.".to_string(),
            ));
        }
        if account.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(IdentityError::InvalidArgument(format!(
                "The password must be a string with at least {MIN_PASSWORD_LEN} characters."
            )));
        }

        let mut accounts = self.write();
        if accounts
            .values()
            .any(|a| a.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(IdentityError::AlreadyExists(
                "The email address is already in use by another account.".to_string(),
            ));
        }

        let id = issue_id()?;
        accounts.insert(
            id.clone(),
            IdentityAccount {
                id: id.clone(),
                email: account.email.clone(),
                display_name: account.display_name.clone(),
                disabled: false,
                custom_attributes: Default::default(),
            },
        );
        Ok(id)
    }

    async fn set_custom_attributes(
        &self,
        id: &StaffId,
        claims: &CustomClaims,
    ) -> Result<(), IdentityError> {
        self.inject(IdentityOp::SetCustomAttributes).await?;

        let mut accounts = self.write();
        let account = accounts.get_mut(id).ok_or_else(not_found)?;
        account.custom_attributes = claims.to_attributes();
        Ok(())
    }

    async fn update_account(&self, id: &StaffId, update: &AccountUpdate) -> Result<(), IdentityError> {
        self.inject(IdentityOp::UpdateAccount).await?;

        let mut accounts = self.write();
        let account = accounts.get_mut(id).ok_or_else(not_found)?;
        if let Some(disabled) = update.disabled {
            account.disabled = disabled;
        }
        Ok(())
    }

    async fn delete_account(&self, id: &StaffId) -> Result<(), IdentityError> {
        self.inject(IdentityOp::DeleteAccount).await?;

        self.write().remove(id).map(|_| ()).ok_or_else(not_found)
    }

    async fn get_account(&self, id: &StaffId) -> Result<Option<IdentityAccount>, IdentityError> {
        self.inject(IdentityOp::GetAccount).await?;

        Ok(self.read().get(id).cloned())
    }
}
