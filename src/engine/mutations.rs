use rust_decimal::Decimal;
use tracing::debug;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_date, validate_period};
use super::resolver::{ensure_unique, ensure_unreferenced, owned_links, require, resolve};
use super::store::{Record, Table};
use super::{Engine, EngineError};

fn validate_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::InvalidValue("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<(), EngineError> {
    if phone.trim().is_empty() {
        return Err(EngineError::InvalidValue("phone number must not be empty"));
    }
    if phone.len() > MAX_PHONE_LEN {
        return Err(EngineError::LimitExceeded("phone number too long"));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<(), EngineError> {
    if price < Decimal::ZERO {
        return Err(EngineError::InvalidValue("price must be non-negative"));
    }
    if price > MAX_PRICE {
        return Err(EngineError::LimitExceeded("price too large"));
    }
    Ok(())
}

fn ensure_room<T: Record>(table: &Table<T>) -> Result<(), EngineError> {
    if table.len() >= MAX_ROWS_PER_TABLE {
        return Err(EngineError::LimitExceeded("too many rows in table"));
    }
    Ok(())
}

impl Engine {
    // ── Houses ───────────────────────────────────────────────

    pub async fn create_house(&self, new: NewHouse) -> Result<House, EngineError> {
        validate_name(&new.name)?;
        validate_price(new.price)?;

        let mut tables = self.write_tables().await?;
        ensure_room(&tables.houses)?;
        ensure_unique(&tables.houses, "name", &new.name, None)?;

        let house = House {
            id: tables.houses.next_id(),
            name: new.name,
            price: new.price,
        };
        let event = Event::HouseSaved { house: house.clone() };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id = house.id, "house created");
        Ok(house)
    }

    pub async fn update_house(&self, id: Id, update: HouseUpdate) -> Result<House, EngineError> {
        if let Some(ref name) = update.name {
            validate_name(name)?;
        }
        if let Some(price) = update.price {
            validate_price(price)?;
        }

        let mut tables = self.write_tables().await?;
        let current = require(&tables.houses, id)?.clone();
        let mut next = current.clone();

        if let Some(name) = update.name
            && name != current.name
        {
            ensure_unique(&tables.houses, "name", &name, Some(id))?;
            next.name = name;
        }
        if let Some(price) = update.price
            && price != current.price
        {
            next.price = price;
        }

        if next == current {
            return Ok(current);
        }
        let event = Event::HouseSaved { house: next.clone() };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id, "house updated");
        Ok(next)
    }

    pub async fn delete_house(&self, id: Id) -> Result<(), EngineError> {
        let mut tables = self.write_tables().await?;
        require(&tables.houses, id)?;
        ensure_unreferenced(&tables, EntityKind::House, id)?;

        self.persist_and_apply(&mut tables, &Event::HouseDeleted { id }).await?;
        debug!(id, "house deleted");
        Ok(())
    }

    // ── Clients ──────────────────────────────────────────────

    pub async fn create_client(&self, new: NewClient) -> Result<Client, EngineError> {
        validate_name(&new.name)?;
        validate_phone(&new.phone_number)?;

        let mut tables = self.write_tables().await?;
        ensure_room(&tables.clients)?;
        ensure_unique(&tables.clients, "phone_number", &new.phone_number, None)?;

        let client = Client {
            id: tables.clients.next_id(),
            name: new.name,
            phone_number: new.phone_number,
        };
        let event = Event::ClientSaved { client: client.clone() };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id = client.id, "client created");
        Ok(client)
    }

    pub async fn update_client(&self, id: Id, update: ClientUpdate) -> Result<Client, EngineError> {
        if let Some(ref name) = update.name {
            validate_name(name)?;
        }
        if let Some(ref phone) = update.phone_number {
            validate_phone(phone)?;
        }

        let mut tables = self.write_tables().await?;
        let current = require(&tables.clients, id)?.clone();
        let mut next = current.clone();

        if let Some(phone) = update.phone_number
            && phone != current.phone_number
        {
            ensure_unique(&tables.clients, "phone_number", &phone, Some(id))?;
            next.phone_number = phone;
        }
        if let Some(name) = update.name
            && name != current.name
        {
            next.name = name;
        }

        if next == current {
            return Ok(current);
        }
        let event = Event::ClientSaved { client: next.clone() };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id, "client updated");
        Ok(next)
    }

    pub async fn delete_client(&self, id: Id) -> Result<(), EngineError> {
        let mut tables = self.write_tables().await?;
        require(&tables.clients, id)?;
        ensure_unreferenced(&tables, EntityKind::Client, id)?;

        self.persist_and_apply(&mut tables, &Event::ClientDeleted { id }).await?;
        debug!(id, "client deleted");
        Ok(())
    }

    // ── Services ─────────────────────────────────────────────

    pub async fn create_service(&self, new: NewService) -> Result<Service, EngineError> {
        validate_name(&new.name)?;
        validate_price(new.price)?;

        let mut tables = self.write_tables().await?;
        ensure_room(&tables.services)?;
        ensure_unique(&tables.services, "name", &new.name, None)?;

        let service = Service {
            id: tables.services.next_id(),
            name: new.name,
            price: new.price,
        };
        let event = Event::ServiceSaved { service: service.clone() };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id = service.id, "service created");
        Ok(service)
    }

    pub async fn update_service(&self, id: Id, update: ServiceUpdate) -> Result<Service, EngineError> {
        if let Some(ref name) = update.name {
            validate_name(name)?;
        }
        if let Some(price) = update.price {
            validate_price(price)?;
        }

        let mut tables = self.write_tables().await?;
        let current = require(&tables.services, id)?.clone();
        let mut next = current.clone();

        if let Some(name) = update.name
            && name != current.name
        {
            ensure_unique(&tables.services, "name", &name, Some(id))?;
            next.name = name;
        }
        if let Some(price) = update.price
            && price != current.price
        {
            next.price = price;
        }

        if next == current {
            return Ok(current);
        }
        let event = Event::ServiceSaved { service: next.clone() };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id, "service updated");
        Ok(next)
    }

    pub async fn delete_service(&self, id: Id) -> Result<(), EngineError> {
        let mut tables = self.write_tables().await?;
        require(&tables.services, id)?;
        ensure_unreferenced(&tables, EntityKind::Service, id)?;

        self.persist_and_apply(&mut tables, &Event::ServiceDeleted { id }).await?;
        debug!(id, "service deleted");
        Ok(())
    }

    // ── Rentals ──────────────────────────────────────────────

    pub async fn create_rental(&self, new: NewRental) -> Result<Rental, EngineError> {
        if let Some(price) = new.summary_price {
            validate_price(price)?;
        }

        let mut tables = self.write_tables().await?;
        ensure_room(&tables.rentals)?;
        let nightly = resolve(&tables.houses, new.house_id)?.price;
        resolve(&tables.clients, new.client_id)?;

        let period = Period::new(new.start_date, new.end_date);
        validate_period(&period)?;

        let candidate = BookingCandidate {
            house_id: new.house_id,
            client_id: new.client_id,
            period,
            exclude_id: None,
        };
        check_no_conflict(tables.rentals.iter(), &candidate, self.config.conflict_mode)?;

        let summary_price = match new.summary_price {
            Some(price) => price,
            None => {
                let total = nightly
                    .checked_mul(Decimal::from(period.occupied().nights()))
                    .ok_or(EngineError::LimitExceeded("price too large"))?;
                validate_price(total)?;
                total
            }
        };
        let rental = Rental {
            id: tables.rentals.next_id(),
            house_id: new.house_id,
            client_id: new.client_id,
            start_date: new.start_date,
            end_date: new.end_date,
            summary_price,
        };
        let event = Event::RentalSaved { rental: rental.clone() };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id = rental.id, house_id = rental.house_id, "rental created");
        Ok(rental)
    }

    pub async fn update_rental(&self, id: Id, update: RentalUpdate) -> Result<Rental, EngineError> {
        if let Some(price) = update.summary_price {
            validate_price(price)?;
        }

        let mut tables = self.write_tables().await?;
        let current = require(&tables.rentals, id)?.clone();
        let mut next = current.clone();

        if let Some(house_id) = update.house_id
            && house_id != current.house_id
        {
            resolve(&tables.houses, house_id)?;
            next.house_id = house_id;
        }
        if let Some(client_id) = update.client_id
            && client_id != current.client_id
        {
            resolve(&tables.clients, client_id)?;
            next.client_id = client_id;
        }
        if let Some(start) = update.start_date {
            next.start_date = start;
        }
        if let Some(end) = update.end_date {
            next.end_date = end;
        }
        if let Some(price) = update.summary_price {
            next.summary_price = price;
        }

        if next == current {
            return Ok(current);
        }

        let booking_moved = next.house_id != current.house_id
            || next.client_id != current.client_id
            || next.period() != current.period();
        if booking_moved {
            validate_period(&next.period())?;
            let candidate = BookingCandidate {
                house_id: next.house_id,
                client_id: next.client_id,
                period: next.period(),
                exclude_id: Some(id),
            };
            check_no_conflict(tables.rentals.iter(), &candidate, self.config.conflict_mode)?;
        }

        let event = Event::RentalSaved { rental: next.clone() };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id, "rental updated");
        Ok(next)
    }

    /// Delete a rental together with the service links it owns.
    pub async fn delete_rental(&self, id: Id) -> Result<(), EngineError> {
        let mut tables = self.write_tables().await?;
        require(&tables.rentals, id)?;
        let rental_services = owned_links(&tables, id);
        let cascaded = rental_services.len();

        let event = Event::RentalDeleted { id, rental_services };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id, cascaded, "rental deleted");
        Ok(())
    }

    /// Reduce a rental's summary price by `percent` (0 to 100), rounded to cents.
    pub async fn apply_discount(&self, id: Id, percent: Decimal) -> Result<Rental, EngineError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(EngineError::InvalidValue("discount percent must be between 0 and 100"));
        }

        let mut tables = self.write_tables().await?;
        let mut rental = require(&tables.rentals, id)?.clone();
        let discounted = rental
            .summary_price
            .checked_mul(Decimal::ONE_HUNDRED - percent)
            .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(EngineError::LimitExceeded("price too large"))?
            .round_dp(2);
        if discounted == rental.summary_price {
            return Ok(rental);
        }
        rental.summary_price = discounted;

        let event = Event::RentalSaved { rental: rental.clone() };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id, %percent, "discount applied");
        Ok(rental)
    }

    // ── Rental services ──────────────────────────────────────

    pub async fn create_rental_service(&self, new: NewRentalService) -> Result<RentalService, EngineError> {
        validate_date(new.ex_time.date())?;

        let mut tables = self.write_tables().await?;
        ensure_room(&tables.rental_services)?;
        resolve(&tables.services, new.service_id)?;
        resolve(&tables.rentals, new.rental_id)?;

        let link = RentalService {
            id: tables.rental_services.next_id(),
            service_id: new.service_id,
            rental_id: new.rental_id,
            ex_time: new.ex_time,
        };
        let event = Event::RentalServiceSaved { rental_service: link.clone() };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id = link.id, rental_id = link.rental_id, "rental service created");
        Ok(link)
    }

    pub async fn update_rental_service(
        &self,
        id: Id,
        update: RentalServiceUpdate,
    ) -> Result<RentalService, EngineError> {
        if let Some(ex_time) = update.ex_time {
            validate_date(ex_time.date())?;
        }

        let mut tables = self.write_tables().await?;
        let current = require(&tables.rental_services, id)?.clone();
        let mut next = current.clone();

        if let Some(service_id) = update.service_id
            && service_id != current.service_id
        {
            resolve(&tables.services, service_id)?;
            next.service_id = service_id;
        }
        if let Some(rental_id) = update.rental_id
            && rental_id != current.rental_id
        {
            resolve(&tables.rentals, rental_id)?;
            next.rental_id = rental_id;
        }
        if let Some(ex_time) = update.ex_time {
            next.ex_time = ex_time;
        }

        if next == current {
            return Ok(current);
        }
        let event = Event::RentalServiceSaved { rental_service: next.clone() };
        self.persist_and_apply(&mut tables, &event).await?;
        debug!(id, "rental service updated");
        Ok(next)
    }

    pub async fn delete_rental_service(&self, id: Id) -> Result<(), EngineError> {
        let mut tables = self.write_tables().await?;
        require(&tables.rental_services, id)?;

        self.persist_and_apply(&mut tables, &Event::RentalServiceDeleted { id })
            .await?;
        debug!(id, "rental service deleted");
        Ok(())
    }
}
