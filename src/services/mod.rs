pub mod admins;
pub mod bills;
pub mod bookings;
pub mod customers;
pub mod dashboard;
pub mod plans;
pub mod products;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer};

use crate::errors::ServiceError;

/// One-based page request, already clamped by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Zero-based page index as expected by sea-orm paginators
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// Rounds a money amount to cents and fixes the scale at two places.
pub fn money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Largest amount a `DECIMAL(12,2)` money column holds
pub const MAX_MONEY: Decimal = dec!(9999999999.99);

/// Money inputs must be zero or positive and fit the money columns
pub(crate) fn ensure_amount(field: &str, value: Decimal) -> Result<(), ServiceError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ServiceError::ValidationError(format!(
            "{} must be zero or positive",
            field
        )));
    }
    if value > MAX_MONEY {
        return Err(ServiceError::ValidationError(format!(
            "{} must not exceed {}",
            field, MAX_MONEY
        )));
    }
    Ok(())
}

/// Keeps an explicit `null` apart from an absent field: absent is `None`, `null` is `Some(None)`.
/// Pair with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trims a free-text field and maps blank values to `None`
pub(crate) fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}
