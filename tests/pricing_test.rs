use genai_streamtrace::error::Error;
use genai_streamtrace::pricing::{ChatPrice, CostLookup, PricingTable};

const PRICING_JSON: &str = r#"{
    "chat": {
        "gpt-4o": { "promptPrice": 0.0025, "completionPrice": 0.01 },
        "mistral-small-latest": { "promptPrice": 0.001, "completionPrice": 0.003 }
    },
    "embeddings": { "text-embedding-3-small": 0.00002 }
}"#;

#[test]
fn cost_follows_per_thousand_token_prices() {
    let table = PricingTable::from_json_str(PRICING_JSON).unwrap();
    let cost = table.cost("gpt-4o", 10, 25).unwrap();
    let expected = (10.0 / 1000.0) * 0.0025 + (25.0 / 1000.0) * 0.01;
    assert!((cost - expected).abs() < 1e-12);

    assert_eq!(
        table.chat_price("mistral-small-latest"),
        Some(ChatPrice {
            prompt_price: 0.001,
            completion_price: 0.003
        })
    );
}

#[test]
fn unknown_model_costs_zero() {
    let table = PricingTable::from_json_str(PRICING_JSON).unwrap();
    assert_eq!(table.cost("no-such-model", 1_000, 1_000).unwrap(), 0.0);
    assert_eq!(PricingTable::empty().cost("gpt-4o", 5, 5).unwrap(), 0.0);
}

#[test]
fn zero_tokens_cost_zero() {
    let table = PricingTable::from_json_str(PRICING_JSON).unwrap();
    assert_eq!(table.cost("gpt-4o", 0, 0).unwrap(), 0.0);
}

#[test]
fn rejects_malformed_or_negative_prices() {
    assert!(matches!(
        PricingTable::from_json_str("not json"),
        Err(Error::Pricing(_))
    ));
    assert!(matches!(
        PricingTable::from_json_str(r#"{"chat": {"m": {"promptPrice": -1.0, "completionPrice": 0.0}}}"#),
        Err(Error::Pricing(_))
    ));
}

#[test]
fn loads_from_file() {
    let path = std::env::temp_dir().join(format!("pricing-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, PRICING_JSON).unwrap();

    let table = PricingTable::from_path(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert!(table.chat_price("gpt-4o").is_some());
}

#[test]
fn remote_sources_are_rejected_up_front() {
    let path = std::path::Path::new("https://example.com/pricing.json");
    let err = PricingTable::from_path(path).unwrap_err();
    assert!(matches!(err, Error::Pricing(ref msg) if msg.contains("not supported")));
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::env::temp_dir().join(format!("missing-{}.json", uuid::Uuid::new_v4()));
    assert!(matches!(PricingTable::from_path(&path), Err(Error::Io(_))));
}
