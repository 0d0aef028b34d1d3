use chrono::{Datelike, NaiveDate};

use crate::model::*;

use super::EngineError;

/// How the booking conflict check decides that two rentals collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictMode {
    /// Any rental of the same house whose occupied nights overlap.
    #[default]
    Overlap,
    /// Same house, same client and identical start and end dates.
    ExactMatch,
}

impl std::str::FromStr for ConflictMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overlap" => Ok(ConflictMode::Overlap),
            "exact" | "exact_match" => Ok(ConflictMode::ExactMatch),
            other => Err(format!("unknown conflict mode '{other}' (expected overlap or exact)")),
        }
    }
}

pub(crate) fn validate_date(date: NaiveDate) -> Result<(), EngineError> {
    use crate::limits::*;
    if date.year() < MIN_VALID_YEAR || date.year() > MAX_VALID_YEAR {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    Ok(())
}

/// A period must not run backwards and must fit the stay limit.
pub(crate) fn validate_period(period: &Period) -> Result<(), EngineError> {
    validate_date(period.start_date)?;
    validate_date(period.end_date)?;
    if period.start_date > period.end_date {
        return Err(EngineError::InvalidInterval {
            start: period.start_date,
            end: period.end_date,
        });
    }
    if period.occupied().nights() > crate::limits::MAX_STAY_DAYS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// Find an existing rental that collides with `candidate`.
pub fn find_conflict<'a>(
    rentals: impl IntoIterator<Item = &'a Rental>,
    candidate: &BookingCandidate,
    mode: ConflictMode,
) -> Option<&'a Rental> {
    let wanted = candidate.period.occupied();
    rentals.into_iter().find(|r| {
        if Some(r.id) == candidate.exclude_id || r.house_id != candidate.house_id {
            return false;
        }
        match mode {
            ConflictMode::Overlap => r.period().occupied().overlaps(&wanted),
            ConflictMode::ExactMatch => {
                r.client_id == candidate.client_id
                    && r.start_date == candidate.period.start_date
                    && r.end_date == candidate.period.end_date
            }
        }
    })
}

/// Reject `candidate` if it collides with anything in `rentals`.
pub(crate) fn check_no_conflict<'a>(
    rentals: impl IntoIterator<Item = &'a Rental>,
    candidate: &BookingCandidate,
    mode: ConflictMode,
) -> Result<(), EngineError> {
    match find_conflict(rentals, candidate, mode) {
        Some(existing) => {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            tracing::debug!(
                house_id = candidate.house_id,
                rental_id = existing.id,
                "booking rejected: conflicts with existing rental"
            );
            Err(EngineError::Conflict { rental_id: existing.id })
        }
        None => Ok(()),
    }
}
