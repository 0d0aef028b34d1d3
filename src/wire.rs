use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::SharedPasswordAuthSource;
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, Filter, NewRecord, RecordUpdate, RowShape, SqlError};

// ── Row encoding ─────────────────────────────────────────────────

enum Cell {
    Int(i64),
    Text(String),
}

/// A record rendered as one result row, in `sql::columns` order.
trait ToRow {
    fn cells(&self) -> Vec<Cell>;
}

impl ToRow for House {
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.id),
            Cell::Text(self.name.clone()),
            Cell::Text(self.price.to_string()),
        ]
    }
}

impl ToRow for Client {
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.id),
            Cell::Text(self.name.clone()),
            Cell::Text(self.phone_number.clone()),
        ]
    }
}

impl ToRow for Service {
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.id),
            Cell::Text(self.name.clone()),
            Cell::Text(self.price.to_string()),
        ]
    }
}

impl ToRow for Rental {
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.id),
            Cell::Int(self.house_id),
            Cell::Int(self.client_id),
            Cell::Text(self.start_date.to_string()),
            Cell::Text(self.end_date.to_string()),
            Cell::Text(self.summary_price.to_string()),
        ]
    }
}

impl ToRow for RentalService {
    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Int(self.id),
            Cell::Int(self.service_id),
            Cell::Int(self.rental_id),
            Cell::Text(self.ex_time.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]
    }
}

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn schema_for(shape: RowShape) -> Vec<FieldInfo> {
    match shape {
        RowShape::Entity(kind) => sql::columns(kind)
            .iter()
            .map(|col| {
                let ty = if *col == "id" || col.ends_with("_id") {
                    Type::INT8
                } else {
                    Type::VARCHAR
                };
                field(col, ty)
            })
            .collect(),
        RowShape::BookedPeriods => vec![field("house_id", Type::INT8), field("periods", Type::VARCHAR)],
        RowShape::Availability => vec![
            field("house_id", Type::INT8),
            field("start_date", Type::VARCHAR),
            field("end_date", Type::VARCHAR),
        ],
    }
}

fn rows_response(shape: RowShape, rows: Vec<Vec<Cell>>) -> Response {
    let schema = Arc::new(schema_for(shape));
    let encoded: Vec<PgWireResult<_>> = rows
        .into_iter()
        .map(|cells| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            for cell in cells {
                match cell {
                    Cell::Int(v) => encoder.encode_field(&v)?,
                    Cell::Text(s) => encoder.encode_field(&s)?,
                }
            }
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(encoded)))
}

fn records_response<T: ToRow>(kind: EntityKind, records: &[T]) -> Response {
    rows_response(RowShape::Entity(kind), records.iter().map(ToRow::cells).collect())
}

/// Zero rows for a missing record, like a SELECT that matches nothing.
fn found<T>(result: Result<T, EngineError>) -> Result<Vec<T>, EngineError> {
    match result {
        Ok(record) => Ok(vec![record]),
        Err(EngineError::NotFound { .. }) => Ok(vec![]),
        Err(e) => Err(e),
    }
}

// ── Handler ──────────────────────────────────────────────────────

pub struct GuestHouseHandler {
    engine: Arc<Engine>,
    query_parser: Arc<GuestHouseQueryParser>,
}

impl GuestHouseHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(GuestHouseQueryParser),
        }
    }

    /// Execute one command and record its metrics.
    async fn run(&self, cmd: Command) -> PgWireResult<Response> {
        let label = observability::command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        result.map_err(engine_err)
    }

    async fn execute_command(&self, cmd: Command) -> Result<Response, EngineError> {
        let engine = &self.engine;
        match cmd {
            Command::Insert { record, returning } => {
                let kind = record.kind();
                let response = match record {
                    NewRecord::House(new) => {
                        records_response(kind, &[engine.create_house(new).await?])
                    }
                    NewRecord::Client(new) => {
                        records_response(kind, &[engine.create_client(new).await?])
                    }
                    NewRecord::Service(new) => {
                        records_response(kind, &[engine.create_service(new).await?])
                    }
                    NewRecord::Rental(new) => {
                        records_response(kind, &[engine.create_rental(new).await?])
                    }
                    NewRecord::RentalService(new) => {
                        records_response(kind, &[engine.create_rental_service(new).await?])
                    }
                };
                Ok(if returning {
                    response
                } else {
                    Response::Execution(Tag::new("INSERT").with_rows(1))
                })
            }
            Command::Update { id, update, returning } => {
                let kind = update.kind();
                let response = match update {
                    RecordUpdate::House(u) => records_response(kind, &[engine.update_house(id, u).await?]),
                    RecordUpdate::Client(u) => records_response(kind, &[engine.update_client(id, u).await?]),
                    RecordUpdate::Service(u) => {
                        records_response(kind, &[engine.update_service(id, u).await?])
                    }
                    RecordUpdate::Rental(u) => records_response(kind, &[engine.update_rental(id, u).await?]),
                    RecordUpdate::RentalService(u) => {
                        records_response(kind, &[engine.update_rental_service(id, u).await?])
                    }
                };
                Ok(if returning {
                    response
                } else {
                    Response::Execution(Tag::new("UPDATE").with_rows(1))
                })
            }
            Command::ApplyDiscount { id, percent, returning } => {
                let rental = engine.apply_discount(id, percent).await?;
                Ok(if returning {
                    records_response(EntityKind::Rental, &[rental])
                } else {
                    Response::Execution(Tag::new("UPDATE").with_rows(1))
                })
            }
            Command::Delete { kind, id } => {
                match kind {
                    EntityKind::House => engine.delete_house(id).await?,
                    EntityKind::Client => engine.delete_client(id).await?,
                    EntityKind::Service => engine.delete_service(id).await?,
                    EntityKind::Rental => engine.delete_rental(id).await?,
                    EntityKind::RentalService => engine.delete_rental_service(id).await?,
                }
                Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
            }
            Command::Select { kind, filter } => self.select(kind, filter).await,
            Command::SelectBookedPeriods { house_id } => {
                let booked = engine.booked_periods_by_house().await?;
                let mut rows = Vec::with_capacity(booked.len());
                for (house, periods) in booked {
                    if house_id.is_some_and(|h| h != house) {
                        continue;
                    }
                    let json = serde_json::to_string(&periods)
                        .map_err(|e| EngineError::Storage(e.to_string()))?;
                    rows.push(vec![Cell::Int(house), Cell::Text(json)]);
                }
                Ok(rows_response(RowShape::BookedPeriods, rows))
            }
            Command::SelectAvailability { house_id, start, end } => {
                let free = engine.free_periods(house_id, start, end).await?;
                let rows = free
                    .into_iter()
                    .map(|span| {
                        vec![
                            Cell::Int(house_id),
                            Cell::Text(span.start.to_string()),
                            Cell::Text(span.end.to_string()),
                        ]
                    })
                    .collect();
                Ok(rows_response(RowShape::Availability, rows))
            }
            Command::SelectConflicts { candidate } => {
                let conflict = engine.find_conflict(&candidate).await?;
                let rows: Vec<Rental> = conflict.into_iter().collect();
                Ok(records_response(EntityKind::Rental, &rows))
            }
        }
    }

    async fn select(&self, kind: EntityKind, filter: Option<Filter>) -> Result<Response, EngineError> {
        let engine = &self.engine;
        Ok(match (kind, filter) {
            (EntityKind::House, None) => records_response(kind, &engine.list_houses().await?),
            (EntityKind::House, Some(Filter::Id(id))) => {
                records_response(kind, &found(engine.get_house(id).await)?)
            }
            (EntityKind::House, Some(Filter::Unique(name))) => {
                let house = engine.find_house_by_name(&name).await?;
                records_response(kind, &house.into_iter().collect::<Vec<_>>())
            }
            (EntityKind::Client, None) => records_response(kind, &engine.list_clients().await?),
            (EntityKind::Client, Some(Filter::Id(id))) => {
                records_response(kind, &found(engine.get_client(id).await)?)
            }
            (EntityKind::Client, Some(Filter::Unique(phone))) => {
                let client = engine.find_client_by_phone(&phone).await?;
                records_response(kind, &client.into_iter().collect::<Vec<_>>())
            }
            (EntityKind::Service, None) => records_response(kind, &engine.list_services().await?),
            (EntityKind::Service, Some(Filter::Id(id))) => {
                records_response(kind, &found(engine.get_service(id).await)?)
            }
            (EntityKind::Service, Some(Filter::Unique(name))) => {
                let service = engine.find_service_by_name(&name).await?;
                records_response(kind, &service.into_iter().collect::<Vec<_>>())
            }
            (EntityKind::Rental, None) => records_response(kind, &engine.list_rentals().await?),
            (EntityKind::Rental, Some(Filter::Id(id))) => {
                records_response(kind, &found(engine.get_rental(id).await)?)
            }
            (EntityKind::RentalService, None) => {
                records_response(kind, &engine.list_rental_services().await?)
            }
            (EntityKind::RentalService, Some(Filter::Id(id))) => {
                records_response(kind, &found(engine.get_rental_service(id).await)?)
            }
            // The parser only builds unique filters for tables that have a unique column.
            (EntityKind::Rental | EntityKind::RentalService, Some(Filter::Unique(_))) => {
                return Err(EngineError::InvalidValue("table has no unique column"));
            }
        })
    }
}

#[async_trait]
impl SimpleQueryHandler for GuestHouseHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let commands = sql::parse_script(query).map_err(sql_err)?;
        let mut responses = Vec::with_capacity(commands.len());
        for cmd in commands {
            responses.push(self.run(cmd).await?);
        }
        Ok(responses)
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct GuestHouseQueryParser;

#[async_trait]
impl QueryParser for GuestHouseQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(statement_schema(stmt))
    }
}

fn statement_schema(sql: &str) -> Vec<FieldInfo> {
    sql::row_shape(sql).map(schema_for).unwrap_or_default()
}

#[async_trait]
impl ExtendedQueryHandler for GuestHouseHandler {
    type Statement = String;
    type QueryParser = GuestHouseQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = inline_params(&portal.statement.statement, &portal.parameters);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        self.run(cmd).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            statement_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(statement_schema(
            &target.statement.statement,
        )))
    }
}

/// Highest `$N` placeholder in the statement, ignoring quoted literals.
fn count_params(sql: &str) -> usize {
    placeholders(sql).map(|(_, _, n)| n).max().unwrap_or(0)
}

/// `$N` placeholders outside single-quoted literals, as
/// `(byte offset, end offset, N)` in source order.
fn placeholders(sql: &str) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
    let bytes = sql.as_bytes();
    let mut in_literal = false;
    let mut i = 0;
    std::iter::from_fn(move || {
        while i < bytes.len() {
            let at = i;
            i += 1;
            match bytes[at] {
                // A doubled quote toggles twice and stays inside the literal.
                b'\'' => in_literal = !in_literal,
                b'$' if !in_literal => {
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                    if let Ok(n) = sql[at + 1..i].parse::<usize>() {
                        return Some((at, i, n));
                    }
                }
                _ => {}
            }
        }
        None
    })
}

/// Inline bound text parameters as quoted literals in one pass. Inserted
/// values are never rescanned, so a value containing `$2` stays as written.
fn inline_params<B: AsRef<[u8]>>(sql: &str, params: &[Option<B>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut copied = 0;
    for (start, end, n) in placeholders(sql) {
        let Some(param) = n.checked_sub(1).and_then(|i| params.get(i)) else {
            continue;
        };
        out.push_str(&sql[copied..start]);
        match param {
            Some(bytes) => {
                out.push('\'');
                out.push_str(&String::from_utf8_lossy(bytes.as_ref()).replace('\'', "''"));
                out.push('\'');
            }
            None => out.push_str("NULL"),
        }
        copied = end;
    }
    out.push_str(&sql[copied..]);
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct GuestHouseFactory {
    handler: Arc<GuestHouseHandler>,
    auth_handler: Arc<
        CleartextPasswordAuthStartupHandler<SharedPasswordAuthSource, DefaultServerParameterProvider>,
    >,
    noop: Arc<NoopHandler>,
}

impl GuestHouseFactory {
    pub fn new(engine: Arc<Engine>, password: String) -> Self {
        let auth_source = SharedPasswordAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(GuestHouseHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for GuestHouseFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = GuestHouseFactory::new(engine, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

/// SQLSTATE reported for an engine error.
pub fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::NotFound { .. } => "P0002",
        EngineError::ReferenceNotFound { .. } | EngineError::StillReferenced { .. } => "23503",
        EngineError::DuplicateKey { .. } => "23505",
        EngineError::InvalidInterval { .. } => "23514",
        EngineError::Conflict { .. } => "23P01",
        EngineError::InvalidValue(_) => "22023",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::Timeout => "57014",
        EngineError::Storage(_) => "58030",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        sqlstate(&e).into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
