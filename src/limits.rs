//! Hard limits enforced by the engine before any write.

use rust_decimal::Decimal;

/// Max bytes in a house, client or service name.
pub const MAX_NAME_LEN: usize = 256;

/// Max bytes in a client phone number.
pub const MAX_PHONE_LEN: usize = 32;

/// Max rows held by a single table.
pub const MAX_ROWS_PER_TABLE: usize = 1_000_000;

/// Largest nightly, service or summary price accepted.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Longest stay a single rental may cover, in days.
pub const MAX_STAY_DAYS: i64 = 366;

/// Widest availability query window, in days.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 3 * 366;

/// Earliest year a booking date may fall in.
pub const MIN_VALID_YEAR: i32 = 1900;

/// Latest year a booking date may fall in.
pub const MAX_VALID_YEAR: i32 = 9999;
