use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const EXPIRING_SOON_DAYS: i64 = 30;
pub const MIN_RENEWAL_MONTHS: u32 = 1;
pub const MAX_RENEWAL_MONTHS: u32 = 120;
const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
    #[default]
    Active,
    Pending,
    Expired,
    Revoked,
}

/// A purchased license as supplied by the caller; storage lives elsewhere.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub status: LicenseStatus,
    /// `None` is a perpetual license.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatusReport {
    pub id: String,
    pub status: LicenseStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub days_remaining: Option<i64>,
    pub is_expired: bool,
    pub expiring_soon: bool,
    pub can_renew: bool,
    pub can_use: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub renewal_price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalQuote {
    pub license_id: String,
    pub duration_months: u32,
    pub new_expires_at: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub renewal_price: Decimal,
}

/// Whole days left, rounded up. `None` for perpetual licenses; negative once expired.
pub fn days_remaining(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    expires_at.map(|expires_at| {
        let millis = (expires_at - now).num_milliseconds();
        millis.div_euclid(MILLIS_PER_DAY) + i64::from(millis.rem_euclid(MILLIS_PER_DAY) != 0)
    })
}

pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|expires_at| now > expires_at)
}

pub fn is_expiring_soon(
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_days: i64,
) -> bool {
    days_remaining(expires_at, now).is_some_and(|days| days > 0 && days <= threshold_days)
}

pub fn validate_renewal_months(months: u32) -> Result<u32, DomainError> {
    if (MIN_RENEWAL_MONTHS..=MAX_RENEWAL_MONTHS).contains(&months) {
        Ok(months)
    } else {
        Err(DomainError::InvalidRenewalDuration(months))
    }
}

/// Extends from the current expiry while it is still in the future, otherwise from `now`.
pub fn renewal_expiration(
    current: Option<DateTime<Utc>>,
    months: u32,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, DomainError> {
    let months = validate_renewal_months(months)?;
    let start = current.filter(|expires_at| *expires_at > now).unwrap_or(now);
    start.checked_add_months(Months::new(months)).ok_or_else(|| {
        DomainError::InvariantViolation(format!(
            "renewal of {months} months overflows the calendar"
        ))
    })
}

/// Renewals are discounted 20% against the original price.
pub fn renewal_price(price: Decimal) -> Decimal {
    (price * Decimal::new(8, 1)).round_dp(2)
}

/// Expiry for a newly minted license; `None` duration or zero months is perpetual.
pub fn expires_at_for(start: DateTime<Utc>, duration_months: Option<u32>) -> Option<DateTime<Utc>> {
    duration_months
        .filter(|months| *months > 0)
        .and_then(|months| start.checked_add_months(Months::new(months)))
}

/// Whether the holder may still use the license, with the reason when not.
pub fn usage_check(record: &LicenseRecord, now: DateTime<Utc>) -> Result<(), String> {
    match record.status {
        LicenseStatus::Revoked => Err("License has been revoked".to_string()),
        LicenseStatus::Expired => Err("License has expired".to_string()),
        LicenseStatus::Pending => Err("Payment pending".to_string()),
        LicenseStatus::Active if is_expired(record.expires_at, now) => {
            Err("License has expired".to_string())
        }
        LicenseStatus::Active => Ok(()),
    }
}

pub fn license_status(record: &LicenseRecord, now: DateTime<Utc>) -> LicenseStatusReport {
    let expired = is_expired(record.expires_at, now) || record.status == LicenseStatus::Expired;
    let expiring_soon = is_expiring_soon(record.expires_at, now, EXPIRING_SOON_DAYS);
    let usage = usage_check(record, now);
    let status = if expired && record.status == LicenseStatus::Active {
        LicenseStatus::Expired
    } else {
        record.status
    };

    LicenseStatusReport {
        id: record.id.clone(),
        status,
        expires_at: record.expires_at,
        days_remaining: days_remaining(record.expires_at, now),
        is_expired: expired,
        expiring_soon,
        can_renew: expired || expiring_soon,
        can_use: usage.is_ok(),
        reason: usage.err(),
        renewal_price: renewal_price(record.price),
    }
}

/// Only active or expired licenses can be renewed; revoked and unpaid ones cannot.
pub fn renewal_quote(
    record: &LicenseRecord,
    months: u32,
    now: DateTime<Utc>,
) -> Result<RenewalQuote, DomainError> {
    if let Err(reason) = usage_check(record, now) {
        if reason != "License has expired" {
            return Err(DomainError::NotRenewable(reason));
        }
    }

    Ok(RenewalQuote {
        license_id: record.id.clone(),
        duration_months: months,
        new_expires_at: renewal_expiration(record.expires_at, months, now)?,
        renewal_price: renewal_price(record.price),
    })
}
