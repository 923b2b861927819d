//! Canonical market events and the wire-frame adapter boundary.
//!
//! The upstream feed delivers loosely-typed JSON frames whose shapes
//! vary by event kind and by feed revision: best-ask updates may carry
//! the price as a scalar or a one-element list, book snapshots encode
//! levels as `[price, size]` pairs or `{"price": .., "size": ..}`
//! objects, and prices arrive as numbers or strings (`".48"`).
//!
//! [`normalize`] maps every shape the core understands into one
//! [`MarketEvent`]; everything else maps to `None` and is dropped by
//! the caller. Nothing past this boundary inspects raw payloads.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// One ask level of a book snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price in dollars (0.01-0.99).
    pub price: Decimal,
    /// Level size in shares.
    pub size: Decimal,
}

/// Payload of a canonical market event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEventKind {
    /// Top-of-book ask update. `size` is the quantity at the best ask
    /// when the feed provides it.
    BestAsk {
        /// Best ask price.
        price: Decimal,
        /// Size at the best ask, if present in the frame.
        size: Option<Decimal>,
    },

    /// Full ask ladder, best level first.
    BookSnapshot {
        /// Ask levels sorted ascending by price.
        asks: Vec<PriceLevel>,
    },
}

/// A decoded stream event for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketEvent {
    /// Token id the event applies to.
    pub token_id: String,
    /// Event payload.
    pub kind: MarketEventKind,
}

/// Parses a decimal from a JSON number or string field.
fn decimal_field(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Extracts a best-ask price that may arrive as a scalar or as a
/// (possibly empty) list whose head is the best level.
fn ask_price_field(value: &Value) -> Option<Decimal> {
    match value {
        Value::Array(items) => items.first().and_then(decimal_field),
        other => decimal_field(other),
    }
}

/// Parses one ask ladder level, accepting both `[price, size]` arrays
/// and `{"price": .., "size": ..}` objects.
fn ladder_level(value: &Value) -> Option<PriceLevel> {
    match value {
        Value::Array(pair) if pair.len() >= 2 => Some(PriceLevel {
            price: decimal_field(&pair[0])?,
            size: decimal_field(&pair[1])?,
        }),
        Value::Object(map) => Some(PriceLevel {
            price: decimal_field(map.get("price")?)?,
            size: decimal_field(map.get("size")?)?,
        }),
        _ => None,
    }
}

/// Normalizes a decoded wire frame into a canonical [`MarketEvent`].
///
/// Returns `None` for frames the core does not consume: missing or
/// unknown event kinds, missing asset ids, and malformed payloads.
/// Dropping a frame is not an error; processing continues with the
/// next one.
#[must_use]
pub fn normalize(frame: &Value) -> Option<MarketEvent> {
    let event_type = frame
        .get("event_type")
        .or_else(|| frame.get("type"))
        .and_then(Value::as_str)?;

    let token_id = frame
        .get("asset_id")
        .or_else(|| frame.get("token_id"))
        .and_then(Value::as_str)?
        .to_string();

    match event_type {
        "best_bid_ask" => {
            let price = frame
                .get("ask_price")
                .or_else(|| frame.get("best_ask"))
                .and_then(ask_price_field)?;
            let size = frame
                .get("ask_size")
                .or_else(|| frame.get("best_ask_size"))
                .and_then(decimal_field);
            Some(MarketEvent {
                token_id,
                kind: MarketEventKind::BestAsk { price, size },
            })
        }
        "book" => {
            let raw = frame
                .get("asks")
                .or_else(|| frame.get("ask"))
                .and_then(Value::as_array)?;
            let mut asks: Vec<PriceLevel> =
                raw.iter().filter_map(ladder_level).collect();
            if asks.is_empty() {
                return None;
            }
            asks.sort_by(|a, b| a.price.cmp(&b.price));
            Some(MarketEvent {
                token_id,
                kind: MarketEventKind::BookSnapshot { asks },
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn normalizes_best_bid_ask_scalar() {
        let frame = json!({
            "event_type": "best_bid_ask",
            "asset_id": "tok-1",
            "ask_price": 0.46,
            "ask_size": 120,
        });

        let event = normalize(&frame).unwrap();
        assert_eq!(event.token_id, "tok-1");
        assert_eq!(
            event.kind,
            MarketEventKind::BestAsk {
                price: dec!(0.46),
                size: Some(dec!(120)),
            }
        );
    }

    #[test]
    fn normalizes_best_bid_ask_list_and_string_prices() {
        let frame = json!({
            "type": "best_bid_ask",
            "token_id": "tok-2",
            "best_ask": [".50"],
        });

        let event = normalize(&frame).unwrap();
        assert_eq!(
            event.kind,
            MarketEventKind::BestAsk {
                price: dec!(0.50),
                size: None,
            }
        );
    }

    #[test]
    fn normalizes_book_with_tuple_levels() {
        let frame = json!({
            "event_type": "book",
            "asset_id": "tok-3",
            "asks": [["0.47", "100"], ["0.46", "50"]],
        });

        let event = normalize(&frame).unwrap();
        match event.kind {
            MarketEventKind::BookSnapshot { asks } => {
                // Sorted ascending, best first.
                assert_eq!(asks[0].price, dec!(0.46));
                assert_eq!(asks[1].price, dec!(0.47));
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn normalizes_book_with_object_levels() {
        let frame = json!({
            "event_type": "book",
            "asset_id": "tok-4",
            "asks": [{"price": ".52", "size": "25"}],
        });

        let event = normalize(&frame).unwrap();
        assert_eq!(
            event.kind,
            MarketEventKind::BookSnapshot {
                asks: vec![PriceLevel {
                    price: dec!(0.52),
                    size: dec!(25),
                }],
            }
        );
    }

    #[test]
    fn drops_unknown_event_kind() {
        let frame = json!({
            "event_type": "last_trade_price",
            "asset_id": "tok-5",
            "price": "0.50",
        });
        assert!(normalize(&frame).is_none());
    }

    #[test]
    fn drops_frame_without_asset_id() {
        let frame = json!({"event_type": "book", "asks": [["0.5", "1"]]});
        assert!(normalize(&frame).is_none());
    }

    #[test]
    fn drops_book_with_no_parseable_levels() {
        let frame = json!({
            "event_type": "book",
            "asset_id": "tok-6",
            "asks": ["garbage", 42],
        });
        assert!(normalize(&frame).is_none());
    }

    #[test]
    fn skips_malformed_levels_but_keeps_valid_ones() {
        let frame = json!({
            "event_type": "book",
            "asset_id": "tok-7",
            "asks": [["0.48", "10"], "noise", {"price": "0.49"}],
        });

        let event = normalize(&frame).unwrap();
        match event.kind {
            MarketEventKind::BookSnapshot { asks } => assert_eq!(asks.len(), 1),
            other => panic!("expected snapshot, got {other:?}"),
        }
    }
}
