//! Snapshot tests for `textgen-sampling`.
//!
//! Pins the wire and text forms of decoding strategies and the wording of
//! construction errors.

use textgen_sampling::{DecodingStrategy, StrategyError};

fn all_strategies() -> Vec<DecodingStrategy> {
    vec![
        DecodingStrategy::Greedy,
        DecodingStrategy::top_k(40).unwrap(),
        DecodingStrategy::top_p(0.8).unwrap(),
        DecodingStrategy::top_p_random(0.25).unwrap(),
    ]
}

#[test]
fn strategy_display_forms() {
    let shown: Vec<String> = all_strategies().iter().map(ToString::to_string).collect();
    insta::assert_snapshot!(shown.join("\n"), @r"
    greedy
    top_k:40
    top_p:0.8
    top_p_random:0.25
    ");
}

#[test]
fn strategy_json_forms() {
    let json: Vec<String> =
        all_strategies().iter().map(|s| serde_json::to_string(s).unwrap()).collect();
    insta::assert_snapshot!(json.join("\n"), @r#"
    {"type":"greedy"}
    {"type":"top_k","k":40}
    {"type":"top_p","p":0.8}
    {"type":"top_p_random","p":0.25}
    "#);
}

#[test]
fn strategy_error_messages() {
    let errors = [
        StrategyError::InvalidTopK { k: -2 },
        StrategyError::InvalidTopP { p: 1.5 },
        StrategyError::UnknownStrategy("beam".to_string()),
        StrategyError::MissingParameter { name: "top_k", example: "40" },
        StrategyError::InvalidParameter { name: "top_p", value: "lots".to_string() },
    ];
    let shown: Vec<String> = errors.iter().map(ToString::to_string).collect();
    insta::assert_snapshot!(shown.join("\n"), @r"
    top-k requires k > 0, got -2
    top-p requires 0 < p <= 1, got 1.5
    unknown decoding strategy: beam
    strategy `top_k` expects a parameter, e.g. `top_k:40`
    cannot parse parameter `lots` for strategy `top_p`
    ");
}

#[test]
fn greedy_debug() {
    insta::assert_debug_snapshot!(DecodingStrategy::Greedy, @"Greedy");
}
