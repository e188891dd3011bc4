//! Master-table edits. Authentication is a plain shared secret checked by
//! the caller; its outcome is passed in explicitly as a boolean.

use crate::config::ValidatorConfig;
use crate::error::{ValidatorError, ValidatorResult};
use crate::model::{MasterTable, StoreMaster};
use crate::persistence::MasterStore;
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminEdit {
    UpdateDeliverySpec { store_id: i64, delivery_spec: String },
    AddStore(StoreMaster),
}

impl AdminEdit {
    /// Apply to an in-memory table and return the edited row.
    pub fn apply_to(&self, table: &mut MasterTable) -> ValidatorResult<StoreMaster> {
        match self {
            AdminEdit::UpdateDeliverySpec {
                store_id,
                delivery_spec,
            } => table
                .update_delivery_spec(*store_id, delivery_spec.clone())
                .cloned(),
            AdminEdit::AddStore(store) => table.add_store(store.clone()).cloned(),
        }
    }
}

/// Store fields supplied by an operator. Distribution center and format
/// fall back to the configured defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStore {
    pub store_id: i64,
    pub name: String,
    pub zone: String,
    pub delivery_spec: String,
    #[serde(default)]
    pub distribution_center: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

impl NewStore {
    pub fn into_master(self, config: &ValidatorConfig) -> StoreMaster {
        StoreMaster {
            store_id: self.store_id,
            name: self.name,
            zone: self.zone,
            delivery_spec: self.delivery_spec,
            distribution_center: Some(
                self.distribution_center
                    .unwrap_or_else(|| config.default_distribution_center.clone()),
            ),
            format: Some(
                self.format
                    .unwrap_or_else(|| config.default_format.clone()),
            ),
        }
    }
}

/// True iff a secret is configured and the candidate equals it.
pub fn check_secret(candidate: &str, configured: Option<&str>) -> bool {
    match configured {
        Some(secret) if !secret.is_empty() => candidate == secret,
        _ => false,
    }
}

pub fn apply_edit(
    store: &dyn MasterStore,
    authenticated: bool,
    edit: &AdminEdit,
) -> ValidatorResult<StoreMaster> {
    if !authenticated {
        warn!("refused unauthenticated admin edit on {}", store.describe());
        return Err(ValidatorError::Unauthorized);
    }
    match store.apply_edit(edit) {
        Ok(edited) => {
            info!(
                "admin edit applied to store {} (spec '{}')",
                edited.store_id, edited.delivery_spec
            );
            Ok(edited)
        }
        Err(err) => {
            warn!("admin edit refused: {err}");
            Err(err)
        }
    }
}

pub fn update_delivery_spec(
    store: &dyn MasterStore,
    authenticated: bool,
    store_id: i64,
    delivery_spec: impl Into<String>,
) -> ValidatorResult<StoreMaster> {
    let edit = AdminEdit::UpdateDeliverySpec {
        store_id,
        delivery_spec: delivery_spec.into(),
    };
    apply_edit(store, authenticated, &edit)
}

pub fn add_store(
    store: &dyn MasterStore,
    authenticated: bool,
    new_store: StoreMaster,
) -> ValidatorResult<StoreMaster> {
    apply_edit(store, authenticated, &AdminEdit::AddStore(new_store))
}
