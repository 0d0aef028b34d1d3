use super::*;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::limits::MAX_PRICE;

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, m, day).unwrap()
}

fn at(m: u32, day: u32, hour: u32) -> NaiveDateTime {
    d(m, day).and_hms_opt(hour, 0, 0).unwrap()
}

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("guesthouse_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    let _ = std::fs::remove_file(path.with_extension("wal.tmp"));
    path
}

fn engine(name: &str) -> Engine {
    Engine::new(test_wal_path(name), EngineConfig::default()).unwrap()
}

fn new_house(name: &str, price: Decimal) -> NewHouse {
    NewHouse { name: name.into(), price }
}

fn new_client(name: &str, phone: &str) -> NewClient {
    NewClient { name: name.into(), phone_number: phone.into() }
}

fn new_rental(house_id: Id, client_id: Id, start: NaiveDate, end: NaiveDate) -> NewRental {
    NewRental { house_id, client_id, start_date: start, end_date: end, summary_price: None }
}

/// One house, one client, no rentals.
async fn seeded(name: &str) -> (Engine, House, Client) {
    let engine = engine(name);
    let house = engine.create_house(new_house("Lake house", dec!(1500.00))).await.unwrap();
    let client = engine.create_client(new_client("Ivan", "79990001122")).await.unwrap();
    (engine, house, client)
}

// ── Entities ─────────────────────────────────────────────

#[tokio::test]
async fn create_assigns_ids_and_get_returns_record() {
    let engine = engine("create_get.wal");
    let a = engine.create_house(new_house("Lake house", dec!(1500))).await.unwrap();
    let b = engine.create_house(new_house("Mountain lodge", dec!(2200))).await.unwrap();
    assert_eq!((a.id, b.id), (1, 2));
    assert_eq!(engine.get_house(2).await.unwrap(), b);
    assert_eq!(engine.find_house_by_name("Lake house").await.unwrap(), Some(a));
    assert_eq!(engine.find_house_by_name("Nowhere").await.unwrap(), None);
}

#[tokio::test]
async fn duplicate_client_phone_rejected() {
    let (engine, _, _) = seeded("dup_phone.wal").await;
    let err = engine
        .create_client(new_client("Petr", "79990001122"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::DuplicateKey { kind: EntityKind::Client, field: "phone_number", .. }
    ));
    assert_eq!(engine.list_clients().await.unwrap().len(), 1);
}

#[tokio::test]
async fn blank_name_and_negative_price_rejected() {
    let engine = engine("field_validation.wal");
    assert!(matches!(
        engine.create_house(new_house("  ", dec!(10))).await,
        Err(EngineError::InvalidValue(_))
    ));
    assert!(matches!(
        engine.create_service(NewService { name: "Sauna".into(), price: dec!(-1) }).await,
        Err(EngineError::InvalidValue(_))
    ));
    let long = "x".repeat(crate::limits::MAX_NAME_LEN + 1);
    assert!(matches!(
        engine.create_house(new_house(&long, dec!(10))).await,
        Err(EngineError::LimitExceeded(_))
    ));
}

#[tokio::test]
async fn rename_to_taken_name_rejected_but_own_name_is_fine() {
    let engine = engine("rename.wal");
    engine.create_house(new_house("Lake house", dec!(1500))).await.unwrap();
    let lodge = engine.create_house(new_house("Mountain lodge", dec!(2200))).await.unwrap();

    let err = engine
        .update_house(lodge.id, HouseUpdate { name: Some("Lake house".into()), price: None })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateKey { field: "name", .. }));

    let same = engine
        .update_house(lodge.id, HouseUpdate { name: Some("Mountain lodge".into()), price: Some(dec!(2500)) })
        .await
        .unwrap();
    assert_eq!(same.price, dec!(2500));
    assert_eq!(same.name, "Mountain lodge");
}

#[tokio::test]
async fn unchanged_update_writes_nothing() {
    let (engine, house, _) = seeded("noop_update.wal").await;
    let before = engine.wal_appends_since_compact().await;

    let same = engine
        .update_house(house.id, HouseUpdate { name: Some("Lake house".into()), price: Some(dec!(1500)) })
        .await
        .unwrap();
    assert_eq!(same, house);
    engine.update_house(house.id, HouseUpdate::default()).await.unwrap();

    assert_eq!(engine.wal_appends_since_compact().await, before);
}

#[tokio::test]
async fn update_and_delete_missing_record_is_not_found() {
    let engine = engine("missing_target.wal");
    assert!(matches!(
        engine.update_client(7, ClientUpdate::default()).await,
        Err(EngineError::NotFound { kind: EntityKind::Client, id: 7 })
    ));
    assert!(matches!(
        engine.delete_service(3).await,
        Err(EngineError::NotFound { kind: EntityKind::Service, id: 3 })
    ));
    assert!(matches!(
        engine.get_rental(1).await,
        Err(EngineError::NotFound { kind: EntityKind::Rental, id: 1 })
    ));
}

#[tokio::test]
async fn lists_are_sorted() {
    let engine = engine("lists_sorted.wal");
    engine.create_client(new_client("Olga", "3")).await.unwrap();
    engine.create_client(new_client("Anna", "1")).await.unwrap();
    engine.create_client(new_client("Boris", "2")).await.unwrap();
    let names: Vec<String> = engine
        .list_clients()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Anna", "Boris", "Olga"]);

    engine.create_house(new_house("Lake house", dec!(100))).await.unwrap();
    engine.create_rental(new_rental(1, 3, d(6, 1), d(6, 3))).await.unwrap();
    engine.create_rental(new_rental(1, 1, d(6, 5), d(6, 7))).await.unwrap();
    engine.create_rental(new_rental(1, 2, d(6, 9), d(6, 11))).await.unwrap();
    let clients: Vec<Id> = engine
        .list_rentals()
        .await
        .unwrap()
        .iter()
        .map(|r| r.client_id)
        .collect();
    assert_eq!(clients, vec![1, 2, 3]);
}

// ── Rentals ──────────────────────────────────────────────

#[tokio::test]
async fn rental_with_unknown_house_is_reference_not_found() {
    let (engine, _, client) = seeded("unknown_house.wal").await;
    let err = engine
        .create_rental(new_rental(99, client.id, d(6, 1), d(6, 10)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::ReferenceNotFound { kind: EntityKind::House, id: 99 }
    ));
    assert!(engine.list_rentals().await.unwrap().is_empty());
}

#[tokio::test]
async fn rental_price_defaults_to_nightly_rate() {
    let (engine, house, client) = seeded("default_price.wal").await;
    let stay = engine
        .create_rental(new_rental(house.id, client.id, d(6, 1), d(6, 10)))
        .await
        .unwrap();
    assert_eq!(stay.summary_price, dec!(13500.00));

    let day_use = engine
        .create_rental(new_rental(house.id, client.id, d(7, 1), d(7, 1)))
        .await
        .unwrap();
    assert_eq!(day_use.summary_price, dec!(1500.00));

    let explicit = engine
        .create_rental(NewRental { summary_price: Some(dec!(99.90)), ..new_rental(house.id, client.id, d(8, 1), d(8, 3)) })
        .await
        .unwrap();
    assert_eq!(explicit.summary_price, dec!(99.90));
}

#[tokio::test]
async fn backwards_interval_rejected() {
    let (engine, house, client) = seeded("backwards.wal").await;
    let err = engine
        .create_rental(new_rental(house.id, client.id, d(6, 10), d(6, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInterval { .. }));
}

#[tokio::test]
async fn overlapping_booking_of_same_house_conflicts() {
    let (engine, house, client) = seeded("overlap.wal").await;
    let other = engine.create_client(new_client("Petr", "79990003344")).await.unwrap();
    let first = engine
        .create_rental(new_rental(house.id, client.id, d(6, 1), d(6, 10)))
        .await
        .unwrap();

    let err = engine
        .create_rental(new_rental(house.id, other.id, d(6, 5), d(6, 15)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict { rental_id } if rental_id == first.id));

    // check-out day is the next check-in day
    engine
        .create_rental(new_rental(house.id, other.id, d(6, 10), d(6, 15)))
        .await
        .unwrap();
    assert_eq!(engine.list_rentals().await.unwrap().len(), 2);
}

#[tokio::test]
async fn exact_mode_only_rejects_identical_booking() {
    let config = EngineConfig { conflict_mode: ConflictMode::ExactMatch, ..EngineConfig::default() };
    let engine = Engine::new(test_wal_path("exact_mode.wal"), config).unwrap();
    let house = engine.create_house(new_house("Lake house", dec!(100))).await.unwrap();
    let ivan = engine.create_client(new_client("Ivan", "1")).await.unwrap();
    let petr = engine.create_client(new_client("Petr", "2")).await.unwrap();

    engine.create_rental(new_rental(house.id, ivan.id, d(6, 1), d(6, 10))).await.unwrap();
    assert!(matches!(
        engine.create_rental(new_rental(house.id, ivan.id, d(6, 1), d(6, 10))).await,
        Err(EngineError::Conflict { .. })
    ));
    engine.create_rental(new_rental(house.id, petr.id, d(6, 1), d(6, 10))).await.unwrap();
    engine.create_rental(new_rental(house.id, ivan.id, d(6, 5), d(6, 12))).await.unwrap();
}

#[tokio::test]
async fn rental_update_excludes_itself_from_conflict_check() {
    let (engine, house, client) = seeded("update_self.wal").await;
    let rental = engine
        .create_rental(new_rental(house.id, client.id, d(6, 1), d(6, 10)))
        .await
        .unwrap();
    let later = engine
        .create_rental(new_rental(house.id, client.id, d(6, 20), d(6, 25)))
        .await
        .unwrap();

    let extended = engine
        .update_rental(rental.id, RentalUpdate { end_date: Some(d(6, 12)), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(extended.end_date, d(6, 12));

    let err = engine
        .update_rental(rental.id, RentalUpdate { end_date: Some(d(6, 21)), ..Default::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict { rental_id } if rental_id == later.id));
    assert_eq!(engine.get_rental(rental.id).await.unwrap().end_date, d(6, 12));
}

#[tokio::test]
async fn rental_update_revalidates_interval_and_references() {
    let (engine, house, client) = seeded("update_revalidate.wal").await;
    let rental = engine
        .create_rental(new_rental(house.id, client.id, d(6, 5), d(6, 10)))
        .await
        .unwrap();

    assert!(matches!(
        engine
            .update_rental(rental.id, RentalUpdate { start_date: Some(d(6, 20)), ..Default::default() })
            .await,
        Err(EngineError::InvalidInterval { .. })
    ));
    assert!(matches!(
        engine
            .update_rental(rental.id, RentalUpdate { client_id: Some(42), ..Default::default() })
            .await,
        Err(EngineError::ReferenceNotFound { kind: EntityKind::Client, id: 42 })
    ));
    assert_eq!(engine.get_rental(rental.id).await.unwrap(), rental);
}

#[tokio::test]
async fn discount_reduces_summary_price() {
    let (engine, house, client) = seeded("discount.wal").await;
    let rental = engine
        .create_rental(new_rental(house.id, client.id, d(6, 1), d(6, 10)))
        .await
        .unwrap();

    let discounted = engine.apply_discount(rental.id, dec!(10)).await.unwrap();
    assert_eq!(discounted.summary_price, dec!(12150.00));

    let odd = engine.apply_discount(rental.id, dec!(33)).await.unwrap();
    assert_eq!(odd.summary_price, dec!(8140.50));

    assert!(matches!(
        engine.apply_discount(rental.id, dec!(150)).await,
        Err(EngineError::InvalidValue(_))
    ));
    assert!(matches!(
        engine.apply_discount(99, dec!(5)).await,
        Err(EngineError::NotFound { kind: EntityKind::Rental, id: 99 })
    ));
}

#[tokio::test]
async fn oversized_prices_are_rejected() {
    let (engine, house, client) = seeded("oversized_prices.wal").await;
    assert!(matches!(
        engine.create_house(new_house("Palace", Decimal::MAX)).await,
        Err(EngineError::LimitExceeded(_))
    ));
    assert!(matches!(
        engine
            .update_house(house.id, HouseUpdate { name: None, price: Some(Decimal::MAX) })
            .await,
        Err(EngineError::LimitExceeded(_))
    ));
    let explicit = NewRental {
        summary_price: Some(Decimal::MAX),
        ..new_rental(house.id, client.id, d(6, 1), d(6, 3))
    };
    assert!(matches!(
        engine.create_rental(explicit).await,
        Err(EngineError::LimitExceeded(_))
    ));

    // At the ceiling a one-night stay fits but two nights would not.
    let castle = engine.create_house(new_house("Castle", MAX_PRICE)).await.unwrap();
    assert!(matches!(
        engine.create_rental(new_rental(castle.id, client.id, d(6, 1), d(6, 3))).await,
        Err(EngineError::LimitExceeded(_))
    ));
    assert!(engine.list_rentals().await.unwrap().is_empty());

    let stay = engine
        .create_rental(new_rental(castle.id, client.id, d(6, 1), d(6, 2)))
        .await
        .unwrap();
    assert_eq!(stay.summary_price, MAX_PRICE);
    let discounted = engine.apply_discount(stay.id, dec!(10)).await.unwrap();
    assert_eq!(discounted.summary_price, dec!(900000000));
}

// ── Deletion policy ──────────────────────────────────────

#[tokio::test]
async fn referenced_rows_cannot_be_deleted_until_rental_goes() {
    let (engine, house, client) = seeded("delete_policy.wal").await;
    let sauna = engine
        .create_service(NewService { name: "Sauna".into(), price: dec!(500) })
        .await
        .unwrap();
    let rental = engine
        .create_rental(new_rental(house.id, client.id, d(6, 1), d(6, 10)))
        .await
        .unwrap();
    let link = engine
        .create_rental_service(NewRentalService { service_id: sauna.id, rental_id: rental.id, ex_time: at(6, 2, 18) })
        .await
        .unwrap();

    assert!(matches!(
        engine.delete_house(house.id).await,
        Err(EngineError::StillReferenced { kind: EntityKind::House, by: EntityKind::Rental, .. })
    ));
    assert!(matches!(
        engine.delete_client(client.id).await,
        Err(EngineError::StillReferenced { kind: EntityKind::Client, .. })
    ));
    assert!(matches!(
        engine.delete_service(sauna.id).await,
        Err(EngineError::StillReferenced { by: EntityKind::RentalService, .. })
    ));

    engine.delete_rental(rental.id).await.unwrap();
    assert!(matches!(
        engine.get_rental_service(link.id).await,
        Err(EngineError::NotFound { .. })
    ));

    engine.delete_house(house.id).await.unwrap();
    engine.delete_client(client.id).await.unwrap();
    engine.delete_service(sauna.id).await.unwrap();
    assert!(matches!(
        engine.get_house(house.id).await,
        Err(EngineError::NotFound { kind: EntityKind::House, .. })
    ));
}

#[tokio::test]
async fn rental_service_references_are_checked() {
    let (engine, house, client) = seeded("link_refs.wal").await;
    let rental = engine
        .create_rental(new_rental(house.id, client.id, d(6, 1), d(6, 10)))
        .await
        .unwrap();
    assert!(matches!(
        engine
            .create_rental_service(NewRentalService { service_id: 5, rental_id: rental.id, ex_time: at(6, 2, 9) })
            .await,
        Err(EngineError::ReferenceNotFound { kind: EntityKind::Service, id: 5 })
    ));
}

// ── Calendar queries ─────────────────────────────────────

#[tokio::test]
async fn booked_periods_grouped_by_house() {
    let (engine, lake, client) = seeded("booked_periods.wal").await;
    let lodge = engine.create_house(new_house("Mountain lodge", dec!(2200))).await.unwrap();
    engine.create_rental(new_rental(lake.id, client.id, d(6, 1), d(6, 10))).await.unwrap();
    engine.create_rental(new_rental(lake.id, client.id, d(7, 1), d(7, 5))).await.unwrap();
    engine.create_rental(new_rental(lodge.id, client.id, d(8, 1), d(8, 15))).await.unwrap();

    let booked = engine.booked_periods_by_house().await.unwrap();
    assert_eq!(
        booked[&lake.id],
        vec![Period::new(d(6, 1), d(6, 10)), Period::new(d(7, 1), d(7, 5))]
    );
    assert_eq!(booked[&lodge.id], vec![Period::new(d(8, 1), d(8, 15))]);
}

#[tokio::test]
async fn find_conflict_reports_without_writing() {
    let (engine, house, client) = seeded("find_conflict.wal").await;
    let rental = engine
        .create_rental(new_rental(house.id, client.id, d(6, 1), d(6, 10)))
        .await
        .unwrap();
    let candidate = BookingCandidate {
        house_id: house.id,
        client_id: client.id,
        period: Period::new(d(6, 9), d(6, 12)),
        exclude_id: None,
    };
    assert_eq!(engine.find_conflict(&candidate).await.unwrap(), Some(rental.clone()));
    let own = BookingCandidate { exclude_id: Some(rental.id), ..candidate };
    assert_eq!(engine.find_conflict(&own).await.unwrap(), None);
}

#[tokio::test]
async fn backwards_conflict_candidate_is_invalid_interval() {
    let (engine, house, client) = seeded("find_conflict_backwards.wal").await;
    engine.create_rental(new_rental(house.id, client.id, d(6, 1), d(6, 10))).await.unwrap();
    let candidate = BookingCandidate {
        house_id: house.id,
        client_id: client.id,
        period: Period::new(d(6, 20), d(6, 5)),
        exclude_id: None,
    };
    assert!(matches!(
        engine.find_conflict(&candidate).await,
        Err(EngineError::InvalidInterval { .. })
    ));
}

#[tokio::test]
async fn free_periods_subtract_bookings() {
    let (engine, house, client) = seeded("free_periods.wal").await;
    engine.create_rental(new_rental(house.id, client.id, d(6, 5), d(6, 10))).await.unwrap();
    engine.create_rental(new_rental(house.id, client.id, d(6, 20), d(6, 25))).await.unwrap();

    let free = engine.free_periods(house.id, d(6, 1), d(7, 1)).await.unwrap();
    assert_eq!(
        free,
        vec![
            Span::new(d(6, 1), d(6, 5)),
            Span::new(d(6, 10), d(6, 20)),
            Span::new(d(6, 25), d(7, 1)),
        ]
    );

    assert!(matches!(
        engine.free_periods(42, d(6, 1), d(7, 1)).await,
        Err(EngineError::NotFound { kind: EntityKind::House, id: 42 })
    ));
    assert!(matches!(
        engine.free_periods(house.id, d(6, 1), d(6, 1)).await,
        Err(EngineError::InvalidInterval { .. })
    ));
}

// ── Durability ───────────────────────────────────────────

#[tokio::test]
async fn state_survives_restart_and_ids_are_not_reused() {
    let path = test_wal_path("restart.wal");
    {
        let engine = Engine::new(path.clone(), EngineConfig::default()).unwrap();
        let house = engine.create_house(new_house("Lake house", dec!(1500))).await.unwrap();
        let client = engine.create_client(new_client("Ivan", "79990001122")).await.unwrap();
        let rental = engine
            .create_rental(new_rental(house.id, client.id, d(6, 1), d(6, 10)))
            .await
            .unwrap();
        engine.apply_discount(rental.id, dec!(10)).await.unwrap();
        let spare = engine.create_house(new_house("Spare", dec!(1))).await.unwrap();
        engine.delete_house(spare.id).await.unwrap();
    }

    let engine = Engine::new(path, EngineConfig::default()).unwrap();
    assert_eq!(engine.get_rental(1).await.unwrap().summary_price, dec!(12150.00));
    assert_eq!(engine.list_houses().await.unwrap().len(), 1);
    let next = engine.create_house(new_house("Mountain lodge", dec!(2200))).await.unwrap();
    assert_eq!(next.id, 3);
}

#[tokio::test]
async fn compaction_keeps_state_and_sequences() {
    let path = test_wal_path("compaction.wal");
    {
        let engine = Engine::new(path.clone(), EngineConfig::default()).unwrap();
        let house = engine.create_house(new_house("Lake house", dec!(1000))).await.unwrap();
        for i in 1..=20 {
            engine
                .update_house(house.id, HouseUpdate { price: Some(Decimal::from(1000 + i)), name: None })
                .await
                .unwrap();
        }
        let gone = engine.create_client(new_client("Ivan", "1")).await.unwrap();
        engine.delete_client(gone.id).await.unwrap();

        assert!(engine.wal_appends_since_compact().await >= 23);
        engine.compact_wal().await.unwrap();
        assert_eq!(engine.wal_appends_since_compact().await, 0);

        engine.create_client(new_client("Petr", "2")).await.unwrap();
    }

    let engine = Engine::new(path, EngineConfig::default()).unwrap();
    assert_eq!(engine.get_house(1).await.unwrap().price, dec!(1020));
    let clients = engine.list_clients().await.unwrap();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].id, 2);
    let next = engine.create_client(new_client("Olga", "3")).await.unwrap();
    assert_eq!(next.id, 3);
}

#[tokio::test]
async fn lock_wait_past_deadline_times_out() {
    let config = EngineConfig { op_timeout: Duration::from_millis(50), ..EngineConfig::default() };
    let engine = Engine::new(test_wal_path("timeout.wal"), config).unwrap();

    let guard = engine.tables.write().await;
    assert!(matches!(engine.list_houses().await, Err(EngineError::Timeout)));
    assert!(matches!(
        engine.create_house(new_house("Lake house", dec!(1))).await,
        Err(EngineError::Timeout)
    ));
    drop(guard);

    engine.create_house(new_house("Lake house", dec!(1))).await.unwrap();
}
