//! Trade message parser.
//!
//! Accepts a UTF-8 JSON payload. Rejects (returns `None`, never an error —
//! malformed messages must not tear down the connection) when the event
//! type isn't `"trade"` or the symbol fails validation. Numeric fields
//! substitute zero on parse failure; missing `t`/`T` default to zero and
//! "now" respectively.

use crate::trade::{Trade, is_valid_symbol};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

const INGRESS_MIN_LEN: usize = 4;
const INGRESS_MAX_LEN: usize = 20;

/// Parses one trade event payload, or `None` if it should be silently
/// discarded.
pub fn parse_trade_message(payload: &str) -> Option<Trade> {
    let v: Value = serde_json::from_str(payload).ok()?;

    let event = v.get("e")?.as_str()?;
    if event != "trade" {
        return None;
    }

    let symbol = v.get("s")?.as_str()?;
    if symbol.is_empty() || !is_valid_symbol(symbol, INGRESS_MIN_LEN, INGRESS_MAX_LEN) {
        return None;
    }

    let price = decimal_field(&v, "p");
    let quantity = decimal_field(&v, "q");

    let trade_id = v.get("t").and_then(Value::as_u64).unwrap_or(0) as i64;

    let trade_time = v
        .get("T")
        .and_then(Value::as_i64)
        .and_then(chrono::DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);

    Some(Trade::new(
        symbol.to_string(),
        price,
        quantity,
        trade_id,
        trade_time,
    ))
}

fn decimal_field(v: &Value, field: &str) -> Decimal {
    v.get(field)
        .and_then(Value::as_str)
        .and_then(|s| Decimal::from_str(s).ok())
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_trade() {
        let payload = r#"{"e":"trade","s":"BTCUSDT","p":"100.5","q":"0.1","t":1,"T":1700000000000}"#;
        let trade = parse_trade_message(payload).unwrap();
        assert_eq!(trade.symbol, "BTCUSDT");
        assert_eq!(trade.price, Decimal::from_str("100.5").unwrap());
        assert_eq!(trade.quantity, Decimal::from_str("0.1").unwrap());
        assert_eq!(trade.trade_id, 1);
        assert_eq!(trade.id, 0);
    }

    #[test]
    fn rejects_non_trade_event() {
        let payload = r#"{"e":"depthUpdate","s":"BTCUSDT"}"#;
        assert!(parse_trade_message(payload).is_none());
    }

    #[test]
    fn rejects_missing_event_field() {
        assert!(parse_trade_message(r#"{"s":"BTCUSDT"}"#).is_none());
    }

    #[test]
    fn rejects_empty_symbol() {
        let payload = r#"{"e":"trade","s":"","p":"1","q":"1","t":1,"T":1}"#;
        assert!(parse_trade_message(payload).is_none());
    }

    #[test]
    fn rejects_symbol_too_short() {
        // 3 chars: rejected at ingress.
        let payload = r#"{"e":"trade","s":"BTC","p":"1","q":"1","t":1,"T":1}"#;
        assert!(parse_trade_message(payload).is_none());
    }

    #[test]
    fn accepts_symbol_at_twenty_chars_rejects_twentyone() {
        let sym20 = "A".repeat(20);
        let ok = format!(r#"{{"e":"trade","s":"{sym20}","p":"1","q":"1","t":1,"T":1}}"#);
        assert!(parse_trade_message(&ok).is_some());

        let sym21 = "A".repeat(21);
        let bad = format!(r#"{{"e":"trade","s":"{sym21}","p":"1","q":"1","t":1,"T":1}}"#);
        assert!(parse_trade_message(&bad).is_none());
    }

    #[test]
    fn substitutes_zero_on_unparseable_numeric_fields() {
        let payload = r#"{"e":"trade","s":"BTCUSDT","p":"not-a-number","q":"?","t":1,"T":1}"#;
        let trade = parse_trade_message(payload).unwrap();
        assert_eq!(trade.price, Decimal::ZERO);
        assert_eq!(trade.quantity, Decimal::ZERO);
    }

    #[test]
    fn negative_trade_id_defaults_to_zero_instead_of_going_negative() {
        let payload = r#"{"e":"trade","s":"BTCUSDT","p":"1","q":"1","t":-5,"T":1}"#;
        let trade = parse_trade_message(payload).unwrap();
        assert_eq!(trade.trade_id, 0);
    }

    #[test]
    fn defaults_missing_trade_id_and_time() {
        let payload = r#"{"e":"trade","s":"BTCUSDT","p":"1","q":"1"}"#;
        let trade = parse_trade_message(payload).unwrap();
        assert_eq!(trade.trade_id, 0);
        // trade_time defaults to "now"; just assert it's recent.
        assert!((Utc::now() - trade.trade_time).num_seconds() < 5);
    }

    #[test]
    fn ignores_unknown_fields() {
        let payload = r#"{"e":"trade","s":"BTCUSDT","p":"1","q":"1","t":1,"T":1,"M":true,"extra":{"x":1}}"#;
        assert!(parse_trade_message(payload).is_some());
    }

    #[test]
    fn round_trips_logical_values_case_insensitively() {
        let payload = r#"{"e":"trade","s":"BTCUSDT","p":"100.50","q":"0.1000","t":42,"T":1700000000500}"#;
        let trade = parse_trade_message(payload).unwrap();
        assert_eq!(trade.symbol.to_uppercase(), trade.symbol);
        assert_eq!(trade.price, Decimal::from_str("100.50").unwrap());
        assert_eq!(trade.quantity, Decimal::from_str("0.1000").unwrap());
        assert_eq!(trade.trade_time.timestamp_millis(), 1700000000500);
    }
}
