use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// One executed market trade.
///
/// Immutable once constructed: no setters, equality by fields. `id` is a
/// reserved surrogate key, always `0` in flight and never persisted — it
/// exists so a future surrogate-key migration doesn't change this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub id: u64,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub trade_id: i64,
    pub trade_time: DateTime<Utc>,
}

impl Trade {
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        quantity: Decimal,
        trade_id: i64,
        trade_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            symbol: symbol.into(),
            price,
            quantity,
            trade_id,
            trade_time,
        }
    }
}

/// Symbol well-formedness: uppercase ASCII alphanumeric, `min..=max` chars.
///
/// Used both at config-resolution time (4..=12) and at upstream-message
/// ingress time (4..=20) — the two length boundaries used for the same
/// underlying rule.
pub fn is_valid_symbol(symbol: &str, min_len: usize, max_len: usize) -> bool {
    let len = symbol.len();
    if len < min_len || len > max_len {
        return false;
    }
    symbol.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_length_boundaries_ingress() {
        assert!(!is_valid_symbol("BTC", 4, 20)); // 3 chars: rejected
        assert!(is_valid_symbol("BTCU", 4, 20)); // 4 chars: accepted
        assert!(is_valid_symbol(&"A".repeat(20), 4, 20)); // 20 chars: accepted
        assert!(!is_valid_symbol(&"A".repeat(21), 4, 20)); // 21 chars: rejected
    }

    #[test]
    fn symbol_length_boundaries_config_resolution() {
        assert!(is_valid_symbol(&"A".repeat(12), 4, 12));
        assert!(!is_valid_symbol(&"A".repeat(13), 4, 12));
    }

    #[test]
    fn symbol_rejects_non_alphanumeric() {
        assert!(!is_valid_symbol("XYZ!", 4, 20));
    }

    #[test]
    fn trade_equality_is_by_field() {
        let t0 = chrono::Utc::now();
        let a = Trade::new("BTCUSDT", Decimal::new(1005, 1), Decimal::new(1, 1), 1, t0);
        let b = Trade::new("BTCUSDT", Decimal::new(1005, 1), Decimal::new(1, 1), 1, t0);
        assert_eq!(a, b);
        assert_eq!(a.id, 0);
    }
}
