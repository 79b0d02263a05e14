//! JSON wire format of matches, signals, configuration and bars.

use rust_decimal_macros::dec;
use serde_json::{json, Value};
use stockta::indicators;
use stockta::prelude::*;

#[test]
fn test_enum_wire_names() {
    assert_eq!(serde_json::to_value(Signal::Buy).unwrap(), json!("BUY"));
    assert_eq!(
        serde_json::to_value(Signal::HighVolatility).unwrap(),
        json!("HIGH_VOLATILITY")
    );
    assert_eq!(serde_json::to_value(Strength::Strong).unwrap(), json!("STRONG"));
    assert_eq!(serde_json::to_value(RiskLevel::Medium).unwrap(), json!("MEDIUM"));
    assert_eq!(
        serde_json::to_value(PatternKind::ThreeBlackCrows).unwrap(),
        json!("THREE_BLACK_CROWS")
    );
    assert_eq!(
        serde_json::from_value::<PatternKind>(json!("VOLUME_PRICE_DIVERGENCE")).unwrap(),
        PatternKind::VolumePriceDivergence
    );
}

#[test]
fn test_pattern_match_json() {
    let bars = vec![Bar::new(
        "000001.SZ",
        "20240102",
        dec!(10),
        dec!(10.5),
        dec!(9.5),
        dec!(10),
        dec!(1000),
    )];
    let engine = EngineBuilder::new()
        .add(BuiltinDetector::Doji(DojiDetector::default()))
        .build()
        .unwrap();
    let matches = engine.scan(&bars).unwrap();
    let value = serde_json::to_value(&matches[0]).unwrap();

    assert_eq!(value["ts_code"], json!("000001.SZ"));
    assert_eq!(value["trade_date"], json!("20240102"));
    assert_eq!(value["pattern"], json!("DOJI"));
    assert_eq!(value["signal"], json!("HOLD"));
    assert_eq!(value["strength"], json!("STRONG"));
    assert_eq!(value["confidence"].as_f64(), Some(90.0));
    assert!(value.get("volume_ratio").is_none());
    assert!(value.get("start_index").is_none());
    assert!(value["description"].is_string());
}

#[test]
fn test_indicator_point_json() {
    let bars: Vec<Bar> = (0..3)
        .map(|i| {
            let c = dec!(10) + rust_decimal::Decimal::from(i);
            Bar::new("000001.SZ", "20240102", c, c, c, c, dec!(100))
        })
        .collect();
    let point = indicators::vwap(&bars)[2];
    let value = serde_json::to_value(point).unwrap();
    assert_eq!(value["index"], json!(2));
    assert_eq!(value["value"].as_f64(), Some(11.0));
    assert_eq!(value["signal"], json!("BUY"));
}

#[test]
fn test_bar_from_wire() {
    let bar: Bar = serde_json::from_value(json!({
        "ts_code": "600000.SH",
        "trade_date": "20240103",
        "open": 10.0,
        "high": 10.5,
        "low": 9.8,
        "close": 10.2,
        "vol": 1500.0
    }))
    .unwrap();
    assert_eq!(bar.close, dec!(10.2));
    assert_eq!(bar.amount, dec!(0));
    assert!(bar.validate().is_ok());
}

#[test]
fn test_engine_config_from_json() {
    let config: EngineConfig = serde_json::from_value(json!({
        "min_confidence": 60.0,
        "pattern_filter": ["HAMMER", "ENGULFING"]
    }))
    .unwrap();
    assert_eq!(config.min_confidence, Some(dec!(60)));
    assert!(!config.validate_data);
    assert_eq!(
        config.pattern_filter,
        Some(vec![PatternKind::Hammer, PatternKind::Engulfing])
    );
    assert!(config.validate().is_ok());

    let engine = EngineBuilder::new()
        .with_all_defaults()
        .config(config)
        .build()
        .unwrap();
    assert_eq!(engine.config().min_confidence, Some(dec!(60)));
}

#[test]
fn test_indicator_config_defaults_and_rejects_zero_period() {
    let config: IndicatorConfig = serde_json::from_value(json!({ "rsi_period": 6 })).unwrap();
    assert_eq!(config.rsi_period.get(), 6);
    assert_eq!(config.kdj_period.get(), 9);
    assert_eq!(config.bollinger_multiplier.get(), dec!(2));

    let err = serde_json::from_value::<IndicatorConfig>(json!({ "atr_period": 0 }));
    assert!(err.is_err());
    let err = serde_json::from_value::<IndicatorConfig>(json!({ "bollinger_multiplier": -1.0 }));
    assert!(err.is_err());
}

#[test]
fn test_snapshot_skips_missing_indicators() {
    let bars: Vec<Bar> = (0..15)
        .map(|i| {
            let c = dec!(10) + rust_decimal::Decimal::from(i % 3);
            Bar::new("000001.SZ", "20240102", c, c + dec!(1), c - dec!(1), c, dec!(100))
        })
        .collect();
    let snap = indicators::snapshot(&bars, &IndicatorConfig::default());
    let value: Value = serde_json::to_value(&snap).unwrap();
    assert!(value.get("williams_r").is_some());
    assert!(value.get("macd").is_none());
    assert_eq!(value["moving_averages"].as_object().unwrap().len(), 2);
}
