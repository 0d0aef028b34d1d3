use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total statements executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "guesthouse_queries_total";

/// Histogram: statement latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "guesthouse_query_duration_seconds";

/// Counter: bookings refused because they collide with an existing rental.
pub const BOOKING_CONFLICTS_TOTAL: &str = "guesthouse_booking_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

pub const CONNECTIONS_ACTIVE: &str = "guesthouse_connections_active";

pub const CONNECTIONS_TOTAL: &str = "guesthouse_connections_total";

/// Counter: connections turned away at the connection limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "guesthouse_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "guesthouse_wal_flush_duration_seconds";

/// Histogram: events per group-commit flush.
pub const WAL_FLUSH_BATCH_SIZE: &str = "guesthouse_wal_flush_batch_size";

/// Counter: completed WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "guesthouse_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short metrics label for a command.
pub fn command_label(cmd: &Command) -> &'static str {
    use crate::model::EntityKind::*;
    use crate::sql::{NewRecord, RecordUpdate};

    match cmd {
        Command::Insert { record, .. } => match record {
            NewRecord::House(_) => "insert_house",
            NewRecord::Client(_) => "insert_client",
            NewRecord::Service(_) => "insert_service",
            NewRecord::Rental(_) => "insert_rental",
            NewRecord::RentalService(_) => "insert_rental_service",
        },
        Command::Update { update, .. } => match update {
            RecordUpdate::House(_) => "update_house",
            RecordUpdate::Client(_) => "update_client",
            RecordUpdate::Service(_) => "update_service",
            RecordUpdate::Rental(_) => "update_rental",
            RecordUpdate::RentalService(_) => "update_rental_service",
        },
        Command::ApplyDiscount { .. } => "apply_discount",
        Command::Delete { kind, .. } => match kind {
            House => "delete_house",
            Client => "delete_client",
            Service => "delete_service",
            Rental => "delete_rental",
            RentalService => "delete_rental_service",
        },
        Command::Select { kind, .. } => match kind {
            House => "select_houses",
            Client => "select_clients",
            Service => "select_services",
            Rental => "select_rentals",
            RentalService => "select_rental_services",
        },
        Command::SelectBookedPeriods { .. } => "select_booked_periods",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectConflicts { .. } => "select_conflicts",
    }
}
