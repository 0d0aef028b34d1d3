use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_postgres::{Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use ulid::Ulid;

use guesthouse::engine::{ConflictMode, Engine, EngineConfig};
use guesthouse::wire;

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> (SocketAddr, Arc<Engine>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("guesthouse_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = EngineConfig {
        op_timeout: Duration::from_secs(5),
        conflict_mode: ConflictMode::Overlap,
    };
    let engine = Arc::new(Engine::new(dir.join("guesthouse.wal"), config).unwrap());

    let engine2 = engine.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let engine = engine2.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, engine, "guesthouse".to_string(), None).await;
            });
        }
    });

    (addr, engine)
}

fn client_config(addr: SocketAddr, password: &str) -> Config {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname("guesthouse")
        .user("manager")
        .password(password);
    config
}

async fn connect(addr: SocketAddr) -> tokio_postgres::Client {
    let (client, connection) = client_config(addr, "guesthouse").connect(NoTls).await.unwrap();
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
}

async fn rows(client: &tokio_postgres::Client, sql: &str) -> Vec<SimpleQueryRow> {
    client
        .simple_query(sql)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|msg| match msg {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

async fn sqlstate(client: &tokio_postgres::Client, sql: &str) -> String {
    let err = client.batch_execute(sql).await.unwrap_err();
    err.as_db_error()
        .map(|db| db.code().code().to_string())
        .unwrap_or_else(|| panic!("expected a database error, got {err}"))
}

/// One house priced 1500.00 per night and one client; returns their ids.
async fn seed(client: &tokio_postgres::Client) -> (String, String) {
    let house = rows(
        client,
        "INSERT INTO houses (name, price) VALUES ('Lake house', 1500.00) RETURNING *",
    )
    .await;
    let guest = rows(
        client,
        "INSERT INTO clients (name, phone_number) VALUES ('Ivan Petrov', '79990001122') RETURNING *",
    )
    .await;
    (
        house[0].get("id").unwrap().to_string(),
        guest[0].get("id").unwrap().to_string(),
    )
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn insert_returning_and_select() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    let (house_id, client_id) = seed(&client).await;
    let rental = rows(
        &client,
        &format!(
            "INSERT INTO rentals (house_id, client_id, start_date, end_date) \
             VALUES ({house_id}, {client_id}, '2023-06-01', '2023-06-10') RETURNING *"
        ),
    )
    .await;
    assert_eq!(rental.len(), 1);
    assert_eq!(rental[0].get("summary_price"), Some("13500.00"));
    assert_eq!(rental[0].get("start_date"), Some("2023-06-01"));

    let houses = rows(&client, "SELECT * FROM houses").await;
    assert_eq!(houses.len(), 1);
    assert_eq!(houses[0].get("name"), Some("Lake house"));

    let by_phone = rows(&client, "SELECT * FROM clients WHERE phone_number = '79990001122'").await;
    assert_eq!(by_phone.len(), 1);
    assert_eq!(by_phone[0].get("name"), Some("Ivan Petrov"));

    assert!(rows(&client, "SELECT * FROM houses WHERE id = 999").await.is_empty());
}

#[tokio::test]
async fn constraint_violations_report_sqlstates() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;
    let (house_id, client_id) = seed(&client).await;

    assert_eq!(
        sqlstate(
            &client,
            "INSERT INTO clients (name, phone_number) VALUES ('Someone else', '79990001122')"
        )
        .await,
        "23505"
    );
    assert_eq!(
        sqlstate(
            &client,
            &format!(
                "INSERT INTO rentals (house_id, client_id, start_date, end_date) \
                 VALUES (99, {client_id}, '2023-06-01', '2023-06-10')"
            )
        )
        .await,
        "23503"
    );
    assert_eq!(
        sqlstate(
            &client,
            &format!(
                "INSERT INTO rentals (house_id, client_id, start_date, end_date) \
                 VALUES ({house_id}, {client_id}, '2023-06-10', '2023-06-01')"
            )
        )
        .await,
        "23514"
    );
    assert_eq!(sqlstate(&client, "SELECT * FROM bookings").await, "42601");
    assert_eq!(sqlstate(&client, "DELETE FROM houses WHERE id = 42").await, "P0002");
}

#[tokio::test]
async fn overlapping_booking_is_rejected() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;
    let (house_id, client_id) = seed(&client).await;

    client
        .batch_execute(&format!(
            "INSERT INTO rentals (house_id, client_id, start_date, end_date) \
             VALUES ({house_id}, {client_id}, '2023-06-01', '2023-06-10')"
        ))
        .await
        .unwrap();

    let overlapping = format!(
        "INSERT INTO rentals (house_id, client_id, start_date, end_date) \
         VALUES ({house_id}, {client_id}, '2023-06-05', '2023-06-12')"
    );
    assert_eq!(sqlstate(&client, &overlapping).await, "23P01");

    // Back-to-back stays share only the changeover day.
    client
        .batch_execute(&format!(
            "INSERT INTO rentals (house_id, client_id, start_date, end_date) \
             VALUES ({house_id}, {client_id}, '2023-06-10', '2023-06-12')"
        ))
        .await
        .unwrap();

    let conflicts = rows(
        &client,
        &format!(
            "SELECT * FROM conflicts WHERE house_id = {house_id} AND client_id = {client_id} \
             AND start_date = '2023-06-08' AND end_date = '2023-06-09'"
        ),
    )
    .await;
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].get("end_date"), Some("2023-06-10"));
}

#[tokio::test]
async fn booked_periods_and_availability() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;
    let (house_id, client_id) = seed(&client).await;

    client
        .batch_execute(&format!(
            "INSERT INTO rentals (house_id, client_id, start_date, end_date) \
             VALUES ({house_id}, {client_id}, '2023-06-05', '2023-06-10')"
        ))
        .await
        .unwrap();

    let booked = rows(&client, "SELECT * FROM booked_periods").await;
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].get("house_id"), Some(house_id.as_str()));
    let periods: serde_json::Value = serde_json::from_str(booked[0].get("periods").unwrap()).unwrap();
    assert_eq!(
        periods,
        serde_json::json!([{ "startDate": "2023-06-05", "endDate": "2023-06-10" }])
    );

    let free = rows(
        &client,
        &format!(
            "SELECT * FROM availability WHERE house_id = {house_id} \
             AND start_date >= '2023-06-01' AND end_date <= '2023-06-30'"
        ),
    )
    .await;
    let spans: Vec<(&str, &str)> = free
        .iter()
        .map(|r| (r.get("start_date").unwrap(), r.get("end_date").unwrap()))
        .collect();
    assert_eq!(
        spans,
        vec![("2023-06-01", "2023-06-05"), ("2023-06-10", "2023-06-30")]
    );
}

#[tokio::test]
async fn discount_and_cascading_delete() {
    let (addr, engine) = start_test_server().await;
    let client = connect(addr).await;
    let (house_id, client_id) = seed(&client).await;

    let rental = rows(
        &client,
        &format!(
            "INSERT INTO rentals (house_id, client_id, start_date, end_date) \
             VALUES ({house_id}, {client_id}, '2023-06-01', '2023-06-10') RETURNING id"
        ),
    )
    .await;
    let rental_id = rental[0].get("id").unwrap().to_string();

    let discounted = rows(
        &client,
        &format!("UPDATE rentals SET discount_percent = 10 WHERE id = {rental_id} RETURNING *"),
    )
    .await;
    assert_eq!(discounted[0].get("summary_price"), Some("12150.00"));

    let service = rows(
        &client,
        "INSERT INTO services (name, price) VALUES ('Sauna', 800.00) RETURNING *",
    )
    .await;
    let service_id = service[0].get("id").unwrap().to_string();
    client
        .batch_execute(&format!(
            "INSERT INTO rental_services (service_id, rental_id, ex_time) \
             VALUES ({service_id}, {rental_id}, '2023-06-03 18:00:00')"
        ))
        .await
        .unwrap();

    assert_eq!(
        sqlstate(&client, &format!("DELETE FROM houses WHERE id = {house_id}")).await,
        "23503"
    );

    client
        .batch_execute(&format!("DELETE FROM rentals WHERE id = {rental_id}"))
        .await
        .unwrap();
    assert!(rows(&client, "SELECT * FROM rental_services").await.is_empty());
    assert!(engine.list_rentals().await.unwrap().is_empty());

    client
        .batch_execute(&format!("DELETE FROM houses WHERE id = {house_id}"))
        .await
        .unwrap();
    assert!(rows(&client, "SELECT * FROM houses").await.is_empty());
}

#[tokio::test]
async fn script_statements_run_in_order() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    client
        .batch_execute(
            "INSERT INTO houses (name, price) VALUES ('Lake house', 1500.00); \
             UPDATE houses SET price = 1750.00 WHERE id = 1; \
             INSERT INTO houses (name, price) VALUES ('Mountain lodge', 2200.00)",
        )
        .await
        .unwrap();

    let houses = rows(&client, "SELECT * FROM houses").await;
    let listed: Vec<(&str, &str)> = houses
        .iter()
        .map(|r| (r.get("name").unwrap(), r.get("price").unwrap()))
        .collect();
    assert_eq!(
        listed,
        vec![("Lake house", "1750.00"), ("Mountain lodge", "2200.00")]
    );
}

#[tokio::test]
async fn writes_are_visible_across_connections() {
    let (addr, _engine) = start_test_server().await;
    let writer = connect(addr).await;
    let reader = connect(addr).await;

    writer
        .batch_execute("INSERT INTO services (name, price) VALUES ('Boat rental', 500.00)")
        .await
        .unwrap();

    let services = rows(&reader, "SELECT * FROM services WHERE name = 'Boat rental'").await;
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].get("price"), Some("500.00"));
}

#[tokio::test]
async fn bound_parameters_are_inlined_once() {
    let (addr, _engine) = start_test_server().await;
    let client = connect(addr).await;

    client
        .execute(
            "INSERT INTO houses (price, name) VALUES ($1, $2)",
            &[&"100", &"Villa $1"],
        )
        .await
        .unwrap();

    let houses = rows(&client, "SELECT * FROM houses").await;
    assert_eq!(houses.len(), 1);
    assert_eq!(houses[0].get("name"), Some("Villa $1"));
    assert_eq!(houses[0].get("price"), Some("100"));
}

#[tokio::test]
async fn wrong_password_is_refused() {
    let (addr, _engine) = start_test_server().await;
    let result = client_config(addr, "not-the-password").connect(NoTls).await;
    assert!(result.is_err());
}
