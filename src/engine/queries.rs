use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::limits::*;
use crate::model::*;

use super::availability::{booked_periods_by_house, free_spans};
use super::conflict::{find_conflict, validate_date, validate_period};
use super::resolver::require;
use super::{Engine, EngineError};

impl Engine {
    // ── Listings ─────────────────────────────────────────────

    /// All houses, sorted by name.
    pub async fn list_houses(&self) -> Result<Vec<House>, EngineError> {
        let tables = self.read_tables().await?;
        Ok(tables.houses.sorted_by(|h| h.name.clone()))
    }

    /// All clients, sorted by name.
    pub async fn list_clients(&self) -> Result<Vec<Client>, EngineError> {
        let tables = self.read_tables().await?;
        Ok(tables.clients.sorted_by(|c| c.name.clone()))
    }

    /// All services, sorted by name.
    pub async fn list_services(&self) -> Result<Vec<Service>, EngineError> {
        let tables = self.read_tables().await?;
        Ok(tables.services.sorted_by(|s| s.name.clone()))
    }

    /// All rentals, grouped by client.
    pub async fn list_rentals(&self) -> Result<Vec<Rental>, EngineError> {
        let tables = self.read_tables().await?;
        Ok(tables.rentals.sorted_by(|r| r.client_id))
    }

    pub async fn list_rental_services(&self) -> Result<Vec<RentalService>, EngineError> {
        let tables = self.read_tables().await?;
        Ok(tables.rental_services.iter().cloned().collect())
    }

    // ── Point lookups ────────────────────────────────────────

    pub async fn get_house(&self, id: Id) -> Result<House, EngineError> {
        let tables = self.read_tables().await?;
        require(&tables.houses, id).cloned()
    }

    pub async fn get_client(&self, id: Id) -> Result<Client, EngineError> {
        let tables = self.read_tables().await?;
        require(&tables.clients, id).cloned()
    }

    pub async fn get_service(&self, id: Id) -> Result<Service, EngineError> {
        let tables = self.read_tables().await?;
        require(&tables.services, id).cloned()
    }

    pub async fn get_rental(&self, id: Id) -> Result<Rental, EngineError> {
        let tables = self.read_tables().await?;
        require(&tables.rentals, id).cloned()
    }

    pub async fn get_rental_service(&self, id: Id) -> Result<RentalService, EngineError> {
        let tables = self.read_tables().await?;
        require(&tables.rental_services, id).cloned()
    }

    pub async fn find_house_by_name(&self, name: &str) -> Result<Option<House>, EngineError> {
        let tables = self.read_tables().await?;
        Ok(tables.houses.find_unique(name).cloned())
    }

    pub async fn find_client_by_phone(&self, phone: &str) -> Result<Option<Client>, EngineError> {
        let tables = self.read_tables().await?;
        Ok(tables.clients.find_unique(phone).cloned())
    }

    pub async fn find_service_by_name(&self, name: &str) -> Result<Option<Service>, EngineError> {
        let tables = self.read_tables().await?;
        Ok(tables.services.find_unique(name).cloned())
    }

    // ── Calendar ─────────────────────────────────────────────

    /// Every rental's period grouped by house, in rental id order.
    pub async fn booked_periods_by_house(&self) -> Result<BTreeMap<Id, Vec<Period>>, EngineError> {
        let tables = self.read_tables().await?;
        Ok(booked_periods_by_house(tables.rentals.iter()))
    }

    /// The rental a candidate booking would collide with, if any.
    pub async fn find_conflict(&self, candidate: &BookingCandidate) -> Result<Option<Rental>, EngineError> {
        validate_period(&candidate.period)?;
        let tables = self.read_tables().await?;
        Ok(find_conflict(tables.rentals.iter(), candidate, self.config.conflict_mode).cloned())
    }

    /// Bookable nights of a house within `[from, to)`.
    pub async fn free_periods(
        &self,
        house_id: Id,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Span>, EngineError> {
        validate_date(from)?;
        validate_date(to)?;
        if from >= to {
            return Err(EngineError::InvalidInterval { start: from, end: to });
        }
        if (to - from).num_days() > MAX_QUERY_WINDOW_DAYS {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }

        let tables = self.read_tables().await?;
        require(&tables.houses, house_id)?;

        let occupied: Vec<Span> = tables
            .rentals
            .iter()
            .filter(|r| r.house_id == house_id)
            .map(|r| r.period().occupied())
            .collect();
        Ok(free_spans(&Span::new(from, to), &occupied))
    }
}
