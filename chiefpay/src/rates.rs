//! Exchange-rate tables, fixed-point scaling and the rate cache.
//!
//! The latest API pushes and returns rates as a list of `{name, rate}`
//! pairs. The merchant SSE API pushes a flat token to rate map. The original
//! SSE API returns a table nested by chain and token whose values are
//! 18-decimal fixed-point integers; those are scaled into two-decimal strings
//! by [`scale_fixed_point`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::error::DecodeError;
use crate::profile::RateScaling;

/// Divisor applied to a raw fixed-point rate before it is read as thousandths.
///
/// The quotient is truncated: precision below `10^-3` is discarded before the
/// final two-decimal rounding, so `999_999_999_999_999` scales to `"0.00"`.
/// The rounding then follows binary floating point, so a quotient of `1005`
/// (`1.005`, stored as `1.00499...`) yields `"1.00"`.
pub const FIXED_POINT_DIVISOR: u128 = 1_000_000_000_000_000;

/// A single named rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// Asset name (e.g. `"USDT"`).
    pub name: String,
    /// Rate as a decimal string.
    pub rate: String,
}

/// The current exchange-rate table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rates {
    /// Flat list, as sent by the socket.io API.
    List(Vec<Rate>),
    /// Nested by chain then token, as sent by the SSE API.
    ByChain(BTreeMap<String, BTreeMap<String, String>>),
    /// Flat token to rate map, as pushed by the merchant SSE API.
    ByToken(BTreeMap<String, String>),
}

impl Rates {
    /// Number of rates in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::List(list) => list.len(),
            Self::ByChain(chains) => chains.values().map(BTreeMap::len).sum(),
            Self::ByToken(tokens) => tokens.len(),
        }
    }

    /// Returns `true` if the table holds no rates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(list) => list.is_empty(),
            Self::ByChain(chains) => chains.values().all(BTreeMap::is_empty),
            Self::ByToken(tokens) => tokens.is_empty(),
        }
    }

    /// Looks up a rate by asset name, or by `chain/token` for nested tables.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            Self::List(list) => list
                .iter()
                .find(|r| r.name == key)
                .map(|r| r.rate.as_str()),
            Self::ByChain(chains) => {
                let (chain, token) = key.split_once('/')?;
                chains.get(chain)?.get(token).map(String::as_str)
            }
            Self::ByToken(tokens) => tokens.get(key).map(String::as_str),
        }
    }
}

impl Default for Rates {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// Converts one raw fixed-point rate into a two-decimal string.
///
/// The raw value is integer-divided by [`FIXED_POINT_DIVISOR`] and the
/// quotient is read as thousandths. That amount is taken through `f64` and
/// rounded half away from zero to two decimals, which reproduces the
/// `Number#toFixed(2)` output the API's own clients display.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidRate`] if `raw` is not a non-negative
/// integer (as a JSON number or string).
pub fn scale_fixed_point(key: &str, raw: &Value) -> Result<String, DecodeError> {
    let invalid = || DecodeError::InvalidRate {
        key: key.to_owned(),
        value: raw.to_string(),
    };
    let int = match raw {
        Value::String(s) => s.trim().parse::<u128>().map_err(|_| invalid())?,
        Value::Number(n) => n.as_u64().map(u128::from).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };
    #[allow(clippy::cast_precision_loss)]
    let units = (int / FIXED_POINT_DIVISOR) as f64 / 1000.0;
    let mut value = Decimal::from_f64_retain(units)
        .ok_or_else(invalid)?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    value.rescale(2);
    Ok(value.to_string())
}

/// Parses a pulled or pushed rate payload according to `scaling`.
///
/// # Errors
///
/// Returns [`DecodeError`] if the payload does not have the expected shape
/// or a fixed-point value cannot be scaled.
pub fn parse_rates(raw: Value, scaling: RateScaling) -> Result<Rates, DecodeError> {
    match scaling {
        RateScaling::None => Ok(serde_json::from_value(raw)?),
        RateScaling::FixedPoint => {
            let Value::Object(chains) = raw else {
                return Err(DecodeError::RateShape);
            };
            let mut table = BTreeMap::new();
            for (chain, tokens) in chains {
                let Value::Object(tokens) = tokens else {
                    return Err(DecodeError::RateShape);
                };
                let mut scaled = BTreeMap::new();
                for (token, value) in tokens {
                    let key = format!("{chain}/{token}");
                    scaled.insert(token, scale_fixed_point(&key, &value)?);
                }
                table.insert(chain, scaled);
            }
            Ok(Rates::ByChain(table))
        }
    }
}

#[derive(Debug, Default)]
struct RateState {
    rates: Rates,
    updated_at: Option<Instant>,
}

/// Holds the most recent rate table.
///
/// Every update replaces the whole table; the last writer wins. A separate
/// guard throttles pulls so that at most one network fetch starts per
/// configured interval.
#[derive(Debug)]
pub struct RateCache {
    scaling: RateScaling,
    state: RwLock<RateState>,
    last_pull: Mutex<Option<Instant>>,
}

impl RateCache {
    /// Creates an empty cache for the given scaling mode.
    #[must_use]
    pub fn new(scaling: RateScaling) -> Self {
        Self {
            scaling,
            state: RwLock::new(RateState::default()),
            last_pull: Mutex::new(None),
        }
    }

    /// Replaces the table with `raw` and returns the new table.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if `raw` cannot be parsed; the cached table is
    /// left untouched in that case.
    pub async fn handle_rates(&self, raw: Value) -> Result<Rates, DecodeError> {
        let rates = parse_rates(raw, self.scaling)?;
        let mut guard = self.state.write().await;
        guard.rates = rates.clone();
        guard.updated_at = Some(Instant::now());
        #[cfg(feature = "telemetry")]
        tracing::debug!(empty = rates.is_empty(), "rate table replaced");
        Ok(rates)
    }

    /// Snapshot of the current table; empty until the first update.
    pub async fn rates(&self) -> Rates {
        self.state.read().await.rates.clone()
    }

    /// When the table was last replaced.
    pub async fn last_update(&self) -> Option<Instant> {
        self.state.read().await.updated_at
    }

    /// Claims the right to start a pull.
    ///
    /// The claim is recorded before the caller goes to the network, so a
    /// failed fetch still counts against the interval.
    ///
    /// # Errors
    ///
    /// Returns the remaining wait if the previous pull started less than
    /// `min_interval` ago.
    pub async fn try_begin_pull(&self, min_interval: Duration) -> Result<(), Duration> {
        let mut last = self.last_pull.lock().await;
        let now = Instant::now();
        if let Some(prev) = *last {
            let elapsed = now.saturating_duration_since(prev);
            if elapsed < min_interval {
                return Err(min_interval - elapsed);
            }
        }
        *last = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scale_truncates_below_thousandths() {
        assert_eq!(
            scale_fixed_point("k", &json!("999999999999999")).unwrap(),
            "0.00"
        );
        assert_eq!(
            scale_fixed_point("k", &json!(999_999_999_999_999_u64)).unwrap(),
            "0.00"
        );
    }

    #[test]
    fn test_scale_rounds_half_away_from_zero() {
        // 1234.567 -> 1234.57
        assert_eq!(
            scale_fixed_point("k", &json!("1234567000000000000000")).unwrap(),
            "1234.57"
        );
        // 0.005 -> 0.01
        assert_eq!(
            scale_fixed_point("k", &json!("5000000000000000")).unwrap(),
            "0.01"
        );
        assert_eq!(
            scale_fixed_point("k", &json!("1000000000000000000")).unwrap(),
            "1.00"
        );
    }

    #[test]
    fn test_scale_follows_float_midpoints() {
        // 1.005 is 1.00499... as a double
        assert_eq!(
            scale_fixed_point("k", &json!("1005000000000000000")).unwrap(),
            "1.00"
        );
        // 0.125 is exact and rounds up
        assert_eq!(
            scale_fixed_point("k", &json!("125000000000000000")).unwrap(),
            "0.13"
        );
        assert_eq!(
            scale_fixed_point("k", &json!("2675000000000000000")).unwrap(),
            "2.67"
        );
    }

    #[test]
    fn test_scale_rejects_non_integers() {
        assert!(matches!(
            scale_fixed_point("TRON/USDT", &json!("1.5")),
            Err(DecodeError::InvalidRate { key, .. }) if key == "TRON/USDT"
        ));
        assert!(scale_fixed_point("k", &json!(-1)).is_err());
        assert!(scale_fixed_point("k", &json!(null)).is_err());
    }

    #[test]
    fn test_parse_fixed_point_table() {
        let rates = parse_rates(
            json!({"BSC": {"BNB": "600125000000000000000", "USDT": "1000000000000000000"}}),
            RateScaling::FixedPoint,
        )
        .unwrap();
        assert_eq!(rates.get("BSC/BNB"), Some("600.13"));
        assert_eq!(rates.get("BSC/USDT"), Some("1.00"));
        assert!(parse_rates(json!([1, 2]), RateScaling::FixedPoint).is_err());
    }

    #[test]
    fn test_parse_list() {
        let rates = parse_rates(
            json!([{"name": "BTC", "rate": "65000.1"}]),
            RateScaling::None,
        )
        .unwrap();
        assert_eq!(rates.get("BTC"), Some("65000.1"));
        assert_eq!(rates.get("ETH"), None);
    }

    #[test]
    fn test_parse_flat_token_map() {
        let rates = parse_rates(json!({"BTC": "65000.1", "USDT": "1"}), RateScaling::None).unwrap();
        assert!(matches!(rates, Rates::ByToken(_)));
        assert_eq!(rates.len(), 2);
        assert!(!rates.is_empty());
        assert_eq!(rates.get("BTC"), Some("65000.1"));
        assert_eq!(rates.get("USDT"), Some("1"));
        assert_eq!(rates.get("BSC/USDT"), None);

        let nested = parse_rates(json!({"BSC": {"USDT": "1"}}), RateScaling::None).unwrap();
        assert_eq!(nested.get("BSC/USDT"), Some("1"));
        assert!(parse_rates(json!({}), RateScaling::None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let cache = RateCache::new(RateScaling::None);
        assert!(cache.rates().await.is_empty());
        assert!(cache.last_update().await.is_none());

        cache
            .handle_rates(json!([{"name": "BTC", "rate": "1"}]))
            .await
            .unwrap();
        cache
            .handle_rates(json!([{"name": "BTC", "rate": "2"}]))
            .await
            .unwrap();
        assert_eq!(cache.rates().await.get("BTC"), Some("2"));
        assert!(cache.last_update().await.is_some());
    }

    #[tokio::test]
    async fn test_bad_payload_keeps_previous_table() {
        let cache = RateCache::new(RateScaling::None);
        cache
            .handle_rates(json!([{"name": "BTC", "rate": "1"}]))
            .await
            .unwrap();
        assert!(cache.handle_rates(json!("nope")).await.is_err());
        assert_eq!(cache.rates().await.get("BTC"), Some("1"));
    }

    #[tokio::test]
    async fn test_pull_guard() {
        let cache = RateCache::new(RateScaling::None);
        let interval = Duration::from_secs(10);
        assert!(cache.try_begin_pull(interval).await.is_ok());
        let wait = cache.try_begin_pull(interval).await.unwrap_err();
        assert!(wait <= interval && wait > Duration::from_secs(9));
        assert!(cache.try_begin_pull(Duration::ZERO).await.is_ok());
    }
}
