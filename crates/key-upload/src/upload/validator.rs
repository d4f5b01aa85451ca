//! Field-level and batch-level validation of diagnosis keys.
//!
//! Per-key checks run in a fixed order and the first failing check decides
//! the failure. The batch spread check only runs once every key is
//! individually well-formed, so a single bad field is never masked by a
//! spread violation.

use common::protocol::TemporaryExposureKey;
use common::UploadFailure;

/// Exact byte length of `key_data`.
pub const KEY_DATA_LEN: usize = 16;

/// Inclusive bounds of `rolling_period`, in 10-minute intervals.
pub const ROLLING_PERIOD_RANGE: std::ops::RangeInclusive<i32> = 1..=144;

/// Inclusive bounds of `transmission_risk_level`.
pub const TRANSMISSION_RISK_LEVEL_RANGE: std::ops::RangeInclusive<i32> = 0..=8;

/// Largest allowed spread of rolling start interval numbers in one batch
/// (15 days of 10-minute intervals).
pub const MAX_ROLLING_START_SPREAD: i64 = 144 * 15;

type KeyCheck = (fn(&TemporaryExposureKey) -> bool, UploadFailure);

/// Per-key checks, in evaluation order.
const KEY_CHECKS: [KeyCheck; 4] = [
    (rolling_period_in_range, UploadFailure::InvalidRollingPeriod),
    (key_data_has_expected_length, UploadFailure::InvalidKeyData),
    (rolling_start_is_positive, UploadFailure::InvalidRollingStartIntervalNumber),
    (risk_level_in_range, UploadFailure::InvalidTransmissionRiskLevel),
];

fn rolling_period_in_range(key: &TemporaryExposureKey) -> bool {
    ROLLING_PERIOD_RANGE.contains(&key.rolling_period())
}

fn key_data_has_expected_length(key: &TemporaryExposureKey) -> bool {
    key.key_data().len() == KEY_DATA_LEN
}

fn rolling_start_is_positive(key: &TemporaryExposureKey) -> bool {
    key.rolling_start_interval_number() > 0
}

fn risk_level_in_range(key: &TemporaryExposureKey) -> bool {
    TRANSMISSION_RISK_LEVEL_RANGE.contains(&key.transmission_risk_level())
}

/// Validate a single key's fields.
///
/// # Errors
///
/// Returns the failure of the first check the key does not pass.
pub fn validate_key(key: &TemporaryExposureKey) -> Result<(), UploadFailure> {
    match KEY_CHECKS.iter().find(|(passes, _)| !passes(key)) {
        Some((_, failure)) => Err(*failure),
        None => Ok(()),
    }
}

/// Validate every key, then the spread of their rolling start intervals.
///
/// # Errors
///
/// Returns the first key's field failure, or
/// [`UploadFailure::RollingStartSpreadExceeded`] if the batch spans more than
/// [`MAX_ROLLING_START_SPREAD`] intervals.
pub fn validate_keys(keys: &[TemporaryExposureKey]) -> Result<(), UploadFailure> {
    keys.iter().try_for_each(validate_key)?;

    let starts = keys.iter().map(|k| i64::from(k.rolling_start_interval_number()));
    if let (Some(min), Some(max)) = (starts.clone().min(), starts.max()) {
        if max - min > MAX_ROLLING_START_SPREAD {
            return Err(UploadFailure::RollingStartSpreadExceeded);
        }
    }
    Ok(())
}
