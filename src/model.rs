use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Store-assigned row id. Positive, monotonically increasing per table.
pub type Id = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    House,
    Client,
    Service,
    Rental,
    RentalService,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::House => "House",
            EntityKind::Client => "Client",
            EntityKind::Service => "Service",
            EntityKind::Rental => "Rental",
            EntityKind::RentalService => "RentalService",
        };
        f.write_str(name)
    }
}

/// Half-open run of nights `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Span {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Closed booked period as stored on a rental: check-in and check-out dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Period {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self { start_date, end_date }
    }

    /// Nights occupied by this period. A same-day period still blocks its
    /// check-in night.
    pub fn occupied(&self) -> Span {
        let end = if self.end_date > self.start_date {
            self.end_date
        } else {
            self.start_date.succ_opt().unwrap_or(NaiveDate::MAX)
        };
        Span::new(self.start_date, end)
    }
}

// ── Records ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub id: Id,
    pub name: String,
    /// Nightly price.
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: Id,
    pub name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Id,
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rental {
    pub id: Id,
    pub house_id: Id,
    pub client_id: Id,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub summary_price: Decimal,
}

impl Rental {
    pub fn period(&self) -> Period {
        Period::new(self.start_date, self.end_date)
    }
}

/// One service consumed during one rental.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalService {
    pub id: Id,
    pub service_id: Id,
    pub rental_id: Id,
    pub ex_time: NaiveDateTime,
}

// ── Mutation inputs ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHouse {
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HouseUpdate {
    pub name: Option<String>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewService {
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceUpdate {
    pub name: Option<String>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRental {
    pub house_id: Id,
    pub client_id: Id,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Defaults to the house's nightly price times the number of nights.
    pub summary_price: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RentalUpdate {
    pub house_id: Option<Id>,
    pub client_id: Option<Id>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub summary_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRentalService {
    pub service_id: Id,
    pub rental_id: Id,
    pub ex_time: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RentalServiceUpdate {
    pub service_id: Option<Id>,
    pub rental_id: Option<Id>,
    pub ex_time: Option<NaiveDateTime>,
}

/// Candidate booking handed to the conflict checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingCandidate {
    pub house_id: Id,
    pub client_id: Id,
    pub period: Period,
    /// Rental being updated; never reported as its own conflict.
    pub exclude_id: Option<Id>,
}

/// WAL record format: one flat event per committed mutation.
/// `*Saved` carries the full row and covers both insert and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    HouseSaved { house: House },
    HouseDeleted { id: Id },
    ClientSaved { client: Client },
    ClientDeleted { id: Id },
    ServiceSaved { service: Service },
    ServiceDeleted { id: Id },
    RentalSaved { rental: Rental },
    /// Removes the rental together with the service links it owns.
    RentalDeleted { id: Id, rental_services: Vec<Id> },
    RentalServiceSaved { rental_service: RentalService },
    RentalServiceDeleted { id: Id },
    /// Emitted by compaction so ids of deleted tail rows are never reused.
    SequenceAdvanced { kind: EntityKind, next_id: Id },
}
