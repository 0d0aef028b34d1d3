use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    Insert {
        record: NewRecord,
        returning: bool,
    },
    Update {
        id: Id,
        update: RecordUpdate,
        returning: bool,
    },
    /// `UPDATE rentals SET discount_percent = P WHERE id = N`
    ApplyDiscount {
        id: Id,
        percent: Decimal,
        returning: bool,
    },
    Delete {
        kind: EntityKind,
        id: Id,
    },
    Select {
        kind: EntityKind,
        filter: Option<Filter>,
    },
    SelectBookedPeriods {
        house_id: Option<Id>,
    },
    SelectAvailability {
        house_id: Id,
        start: NaiveDate,
        end: NaiveDate,
    },
    SelectConflicts {
        candidate: BookingCandidate,
    },
}

#[derive(Debug, PartialEq)]
pub enum NewRecord {
    House(NewHouse),
    Client(NewClient),
    Service(NewService),
    Rental(NewRental),
    RentalService(NewRentalService),
}

#[derive(Debug, PartialEq)]
pub enum RecordUpdate {
    House(HouseUpdate),
    Client(ClientUpdate),
    Service(ServiceUpdate),
    Rental(RentalUpdate),
    RentalService(RentalServiceUpdate),
}

/// Row filter of a plain table SELECT.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Id(Id),
    /// Value of the table's unique column (house/service name, client phone).
    Unique(String),
}

/// Shape of the rows a statement returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    Entity(EntityKind),
    /// `(house_id, periods)` with periods as a JSON array.
    BookedPeriods,
    /// `(house_id, start_date, end_date)`, one row per free span.
    Availability,
}

fn select_shape(table: &str) -> Option<RowShape> {
    match table {
        "booked_periods" => Some(RowShape::BookedPeriods),
        "availability" => Some(RowShape::Availability),
        "conflicts" => Some(RowShape::Entity(EntityKind::Rental)),
        other => entity_table(other).map(RowShape::Entity),
    }
}

impl Command {
    pub fn row_shape(&self) -> Option<RowShape> {
        match self {
            Command::Insert { record, returning: true } => Some(RowShape::Entity(record.kind())),
            Command::Update { update, returning: true, .. } => Some(RowShape::Entity(update.kind())),
            Command::ApplyDiscount { returning: true, .. } => {
                Some(RowShape::Entity(EntityKind::Rental))
            }
            Command::Select { kind, .. } => Some(RowShape::Entity(*kind)),
            Command::SelectBookedPeriods { .. } => Some(RowShape::BookedPeriods),
            Command::SelectAvailability { .. } => Some(RowShape::Availability),
            Command::SelectConflicts { .. } => Some(RowShape::Entity(EntityKind::Rental)),
            _ => None,
        }
    }
}

/// Row shape of a statement from its text alone, before `$n` parameters are
/// bound. `None` for statements that return no rows or do not parse.
pub fn row_shape(sql: &str) -> Option<RowShape> {
    let stmts = parse_statements(sql).ok()?;
    match stmts.first()? {
        Statement::Insert(insert) if insert.returning.is_some() => {
            entity_table(&insert_table_name(insert).ok()?).map(RowShape::Entity)
        }
        Statement::Update {
            table,
            returning: Some(_),
            ..
        } => entity_table(&table_factor_name(&table.relation).ok()?).map(RowShape::Entity),
        Statement::Query(query) => match query.body.as_ref() {
            SetExpr::Select(select) => {
                select_shape(&table_factor_name(&select.from.first()?.relation).ok()?)
            }
            _ => None,
        },
        _ => None,
    }
}

impl NewRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            NewRecord::House(_) => EntityKind::House,
            NewRecord::Client(_) => EntityKind::Client,
            NewRecord::Service(_) => EntityKind::Service,
            NewRecord::Rental(_) => EntityKind::Rental,
            NewRecord::RentalService(_) => EntityKind::RentalService,
        }
    }
}

impl RecordUpdate {
    pub fn kind(&self) -> EntityKind {
        match self {
            RecordUpdate::House(_) => EntityKind::House,
            RecordUpdate::Client(_) => EntityKind::Client,
            RecordUpdate::Service(_) => EntityKind::Service,
            RecordUpdate::Rental(_) => EntityKind::Rental,
            RecordUpdate::RentalService(_) => EntityKind::RentalService,
        }
    }
}

/// SQL table backing an entity kind.
pub fn table_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::House => "houses",
        EntityKind::Client => "clients",
        EntityKind::Service => "services",
        EntityKind::Rental => "rentals",
        EntityKind::RentalService => "rental_services",
    }
}

/// Column order of a table; also the VALUES order when an INSERT names no columns.
pub fn columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::House => &["id", "name", "price"],
        EntityKind::Client => &["id", "name", "phone_number"],
        EntityKind::Service => &["id", "name", "price"],
        EntityKind::Rental => &["id", "house_id", "client_id", "start_date", "end_date", "summary_price"],
        EntityKind::RentalService => &["id", "service_id", "rental_id", "ex_time"],
    }
}

fn entity_table(table: &str) -> Option<EntityKind> {
    match table {
        "houses" => Some(EntityKind::House),
        "clients" => Some(EntityKind::Client),
        "services" => Some(EntityKind::Service),
        "rentals" => Some(EntityKind::Rental),
        "rental_services" => Some(EntityKind::RentalService),
        _ => None,
    }
}

fn unique_column(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::House | EntityKind::Service => Some("name"),
        EntityKind::Client => Some("phone_number"),
        EntityKind::Rental | EntityKind::RentalService => None,
    }
}

fn parse_statements(sql: &str) -> Result<Vec<Statement>, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }
    Ok(stmts)
}

/// Parse a single statement.
pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let stmts = parse_statements(sql)?;
    if stmts.len() > 1 {
        return Err(SqlError::Unsupported("multiple statements".into()));
    }
    parse_statement(&stmts[0])
}

/// Parse a `;`-separated script, as sent through the simple query protocol.
pub fn parse_script(sql: &str) -> Result<Vec<Command>, SqlError> {
    parse_statements(sql)?.iter().map(parse_statement).collect()
}

fn parse_statement(stmt: &Statement) -> Result<Command, SqlError> {
    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            returning,
            ..
        } => parse_update(&table.relation, assignments, selection, returning.is_some()),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── INSERT ────────────────────────────────────────────────────

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let kind = entity_table(&table).ok_or(SqlError::UnknownTable(table))?;
    let values = extract_insert_values(insert)?;

    let names: Vec<String> = if insert.columns.is_empty() {
        // Positional VALUES skip the generated id.
        columns(kind)[1..].iter().map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
    };
    if names.len() != values.len() {
        return Err(SqlError::WrongArity(table_name(kind), names.len(), values.len()));
    }
    let row = Row::new(kind, names.into_iter().zip(values.iter()).collect())?;
    if row.get("id").is_some() {
        return Err(SqlError::Unsupported("ids are assigned by the server".into()));
    }

    let record = match kind {
        EntityKind::House => NewRecord::House(NewHouse {
            name: row.required("name", parse_string)?,
            price: row.required("price", parse_decimal)?,
        }),
        EntityKind::Client => NewRecord::Client(NewClient {
            name: row.required("name", parse_string)?,
            phone_number: row.required("phone_number", parse_string)?,
        }),
        EntityKind::Service => NewRecord::Service(NewService {
            name: row.required("name", parse_string)?,
            price: row.required("price", parse_decimal)?,
        }),
        EntityKind::Rental => NewRecord::Rental(NewRental {
            house_id: row.required("house_id", parse_id)?,
            client_id: row.required("client_id", parse_id)?,
            start_date: row.required("start_date", parse_date)?,
            end_date: row.required("end_date", parse_date)?,
            summary_price: row.optional("summary_price", parse_decimal)?,
        }),
        EntityKind::RentalService => NewRecord::RentalService(NewRentalService {
            service_id: row.required("service_id", parse_id)?,
            rental_id: row.required("rental_id", parse_id)?,
            ex_time: row.required("ex_time", parse_timestamp)?,
        }),
    };

    Ok(Command::Insert {
        record,
        returning: insert.returning.is_some(),
    })
}

// ── UPDATE ────────────────────────────────────────────────────

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
    returning: bool,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    let kind = entity_table(&table).ok_or(SqlError::UnknownTable(table))?;
    let id = extract_where_id(selection)?;

    let mut pairs = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let column = match &assignment.target {
            AssignmentTarget::ColumnName(name) => object_name_last(name)
                .ok_or_else(|| SqlError::Parse("empty column name".into()))?,
            AssignmentTarget::Tuple(_) => {
                return Err(SqlError::Unsupported("tuple assignment".into()));
            }
        };
        pairs.push((column, &assignment.value));
    }

    if kind == EntityKind::Rental && pairs.iter().any(|(c, _)| c == "discount_percent") {
        if pairs.len() != 1 {
            return Err(SqlError::Unsupported(
                "discount_percent must be the only assignment".into(),
            ));
        }
        let percent = parse_decimal(pairs[0].1)?
            .ok_or(SqlError::NullValue("discount_percent"))?;
        return Ok(Command::ApplyDiscount { id, percent, returning });
    }

    let row = Row::new(kind, pairs)?;
    if row.get("id").is_some() {
        return Err(SqlError::Unsupported("id cannot be changed".into()));
    }

    let update = match kind {
        EntityKind::House => RecordUpdate::House(HouseUpdate {
            name: row.optional("name", parse_string)?,
            price: row.optional("price", parse_decimal)?,
        }),
        EntityKind::Client => RecordUpdate::Client(ClientUpdate {
            name: row.optional("name", parse_string)?,
            phone_number: row.optional("phone_number", parse_string)?,
        }),
        EntityKind::Service => RecordUpdate::Service(ServiceUpdate {
            name: row.optional("name", parse_string)?,
            price: row.optional("price", parse_decimal)?,
        }),
        EntityKind::Rental => RecordUpdate::Rental(RentalUpdate {
            house_id: row.optional("house_id", parse_id)?,
            client_id: row.optional("client_id", parse_id)?,
            start_date: row.optional("start_date", parse_date)?,
            end_date: row.optional("end_date", parse_date)?,
            summary_price: row.optional("summary_price", parse_decimal)?,
        }),
        EntityKind::RentalService => RecordUpdate::RentalService(RentalServiceUpdate {
            service_id: row.optional("service_id", parse_id)?,
            rental_id: row.optional("rental_id", parse_id)?,
            ex_time: row.optional("ex_time", parse_timestamp)?,
        }),
    };

    Ok(Command::Update { id, update, returning })
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let kind = entity_table(&table).ok_or(SqlError::UnknownTable(table))?;
    let id = extract_where_id(&delete.selection)?;
    Ok(Command::Delete { kind, id })
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Vec::new();
    if let Some(selection) = &select.selection {
        collect_filters(selection, &mut filters)?;
    }
    let find = |col: &str, op: &ast::BinaryOperator| {
        filters
            .iter()
            .find(|(c, o, _)| c == col && o == op)
            .map(|(_, _, e)| *e)
    };
    use ast::BinaryOperator::{Eq, GtEq, LtEq};

    match table.as_str() {
        "booked_periods" => Ok(Command::SelectBookedPeriods {
            house_id: find("house_id", &Eq).map(parse_id).transpose()?.flatten(),
        }),
        "availability" => Ok(Command::SelectAvailability {
            house_id: required_filter(find("house_id", &Eq), "house_id", parse_id)?,
            start: required_filter(find("start_date", &GtEq), "start_date", parse_date)?,
            end: required_filter(find("end_date", &LtEq), "end_date", parse_date)?,
        }),
        "conflicts" => {
            let start = required_filter(find("start_date", &Eq), "start_date", parse_date)?;
            let end = required_filter(find("end_date", &Eq), "end_date", parse_date)?;
            Ok(Command::SelectConflicts {
                candidate: BookingCandidate {
                    house_id: required_filter(find("house_id", &Eq), "house_id", parse_id)?,
                    client_id: required_filter(find("client_id", &Eq), "client_id", parse_id)?,
                    period: Period::new(start, end),
                    exclude_id: find("exclude_id", &Eq).map(parse_id).transpose()?.flatten(),
                },
            })
        }
        other => {
            let kind = entity_table(other).ok_or_else(|| SqlError::UnknownTable(other.into()))?;
            let filter = if let Some(expr) = find("id", &Eq) {
                Some(Filter::Id(required_filter(Some(expr), "id", parse_id)?))
            } else if let Some(col) = unique_column(kind)
                && let Some(expr) = find(col, &Eq)
            {
                Some(Filter::Unique(required_filter(Some(expr), col, parse_string)?))
            } else if !filters.is_empty() {
                return Err(SqlError::Unsupported(format!(
                    "{other} can only be filtered by id{}",
                    unique_column(kind).map(|c| format!(" or {c}")).unwrap_or_default()
                )));
            } else {
                None
            };
            Ok(Command::Select { kind, filter })
        }
    }
}

/// Flatten an AND-chain of `column <op> value` comparisons.
fn collect_filters<'a>(
    expr: &'a Expr,
    out: &mut Vec<(String, ast::BinaryOperator, &'a Expr)>,
) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => collect_filters(inner, out),
        Expr::BinaryOp { left, op: ast::BinaryOperator::And, right } => {
            collect_filters(left, out)?;
            collect_filters(right, out)
        }
        Expr::BinaryOp { left, op, right } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.push((col, op.clone(), right.as_ref()));
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

fn required_filter<T>(
    expr: Option<&Expr>,
    col: &'static str,
    parse: fn(&Expr) -> Result<Option<T>, SqlError>,
) -> Result<T, SqlError> {
    let expr = expr.ok_or(SqlError::MissingFilter(col))?;
    parse(expr)?.ok_or(SqlError::NullValue(col))
}

// ── Row access ────────────────────────────────────────────────

/// Column/value pairs of one INSERT row or UPDATE assignment list.
struct Row<'a> {
    kind: EntityKind,
    pairs: Vec<(String, &'a Expr)>,
}

impl<'a> Row<'a> {
    fn new(kind: EntityKind, pairs: Vec<(String, &'a Expr)>) -> Result<Self, SqlError> {
        for (i, (col, _)) in pairs.iter().enumerate() {
            if !columns(kind).contains(&col.as_str()) {
                return Err(SqlError::UnknownColumn(table_name(kind), col.clone()));
            }
            if pairs[..i].iter().any(|(c, _)| c == col) {
                return Err(SqlError::Parse(format!("column {col} given twice")));
            }
        }
        Ok(Self { kind, pairs })
    }

    fn get(&self, col: &str) -> Option<&'a Expr> {
        self.pairs.iter().find(|(c, _)| c == col).map(|(_, e)| *e)
    }

    fn required<T>(
        &self,
        col: &'static str,
        parse: fn(&Expr) -> Result<Option<T>, SqlError>,
    ) -> Result<T, SqlError> {
        let expr = self
            .get(col)
            .ok_or(SqlError::MissingColumn(table_name(self.kind), col))?;
        parse(expr)?.ok_or(SqlError::NullValue(col))
    }

    /// Absent and NULL both mean "not supplied".
    fn optional<T>(
        &self,
        col: &'static str,
        parse: fn(&Expr) -> Result<Option<T>, SqlError>,
    ) -> Result<Option<T>, SqlError> {
        match self.get(col) {
            Some(expr) => parse(expr),
            None => Ok(None),
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Id, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } if expr_column_name(left).as_deref() == Some("id") => {
            required_filter(Some(right), "id", parse_id)
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

/// Literal behind an expression; casts like `'2023-06-01'::date` are looked through.
fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        Expr::Cast { expr, .. } | Expr::Nested(expr) => extract_value(expr),
        _ => None,
    }
}

/// Text of a literal, `None` for NULL; a leading minus is folded into the text.
fn literal_text(expr: &Expr) -> Result<Option<String>, SqlError> {
    if let Expr::UnaryOp { op: ast::UnaryOperator::Minus, expr } = expr {
        return match literal_text(expr)? {
            Some(s) => Ok(Some(format!("-{s}"))),
            None => Err(SqlError::Parse("negated NULL".into())),
        };
    }
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::Number(s, _)) | Some(Value::SingleQuotedString(s)) => Ok(Some(s.clone())),
        Some(other) => Err(SqlError::Parse(format!("unsupported literal {other}"))),
        None => Err(SqlError::Parse(format!("expected literal, got {expr}"))),
    }
}

fn parse_id(expr: &Expr) -> Result<Option<Id>, SqlError> {
    literal_text(expr)?
        .map(|s| s.trim().parse::<Id>().map_err(|e| SqlError::Parse(format!("bad id '{s}': {e}"))))
        .transpose()
}

fn parse_string(expr: &Expr) -> Result<Option<String>, SqlError> {
    literal_text(expr)
}

fn parse_decimal(expr: &Expr) -> Result<Option<Decimal>, SqlError> {
    literal_text(expr)?
        .map(|s| {
            Decimal::from_str(s.trim()).map_err(|e| SqlError::Parse(format!("bad decimal '{s}': {e}")))
        })
        .transpose()
}

fn parse_date(expr: &Expr) -> Result<Option<NaiveDate>, SqlError> {
    literal_text(expr)?
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| SqlError::Parse(format!("bad date '{s}': {e}")))
        })
        .transpose()
}

fn parse_timestamp(expr: &Expr) -> Result<Option<NaiveDateTime>, SqlError> {
    literal_text(expr)?
        .map(|s| {
            let s = s.trim();
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(Default::default())))
                .map_err(|e| SqlError::Parse(format!("bad timestamp '{s}': {e}")))
        })
        .transpose()
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(&'static str, String),
    MissingColumn(&'static str, &'static str),
    NullValue(&'static str),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(t, c) => write!(f, "{t} has no column {c}"),
            SqlError::MissingColumn(t, c) => write!(f, "{t}: missing value for {c}"),
            SqlError::NullValue(c) => write!(f, "{c} must not be NULL"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
