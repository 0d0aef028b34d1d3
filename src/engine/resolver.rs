use crate::model::*;

use super::store::{Record, Table, Tables};
use super::EngineError;

/// Resolve a foreign id about to be stored on a dependent record.
pub(crate) fn resolve<T: Record>(table: &Table<T>, id: Id) -> Result<&T, EngineError> {
    table
        .get(id)
        .ok_or(EngineError::ReferenceNotFound { kind: T::KIND, id })
}

/// Load the record an operation targets.
pub(crate) fn require<T: Record>(table: &Table<T>, id: Id) -> Result<&T, EngineError> {
    table.get(id).ok_or(EngineError::NotFound { kind: T::KIND, id })
}

/// Fail if `key` is already taken by a row other than `owner`.
pub(crate) fn ensure_unique<T: Record>(
    table: &Table<T>,
    field: &'static str,
    key: &str,
    owner: Option<Id>,
) -> Result<(), EngineError> {
    match table.find_unique(key) {
        Some(existing) if Some(existing.id()) != owner => Err(EngineError::DuplicateKey {
            kind: T::KIND,
            field,
            value: key.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Deletion policy: houses, clients and services may not be removed while a
/// rental or rental-service link still points at them.
pub(crate) fn ensure_unreferenced(tables: &Tables, kind: EntityKind, id: Id) -> Result<(), EngineError> {
    let referenced_by = match kind {
        EntityKind::House => tables
            .rentals
            .iter()
            .any(|r| r.house_id == id)
            .then_some(EntityKind::Rental),
        EntityKind::Client => tables
            .rentals
            .iter()
            .any(|r| r.client_id == id)
            .then_some(EntityKind::Rental),
        EntityKind::Service => tables
            .rental_services
            .iter()
            .any(|l| l.service_id == id)
            .then_some(EntityKind::RentalService),
        // Rentals cascade to their links; links are leaves.
        EntityKind::Rental | EntityKind::RentalService => None,
    };
    match referenced_by {
        Some(by) => Err(EngineError::StillReferenced { kind, id, by }),
        None => Ok(()),
    }
}

/// Ids of the service links owned by a rental.
pub(crate) fn owned_links(tables: &Tables, rental_id: Id) -> Vec<Id> {
    tables
        .rental_services
        .iter()
        .filter(|l| l.rental_id == rental_id)
        .map(|l| l.id)
        .collect()
}
