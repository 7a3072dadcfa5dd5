//! Property-based tests for the generation loop.
//!
//! Key invariants tested:
//! - without a stop condition exactly `max_tokens` tokens are produced, one scorer call each
//! - the prompt is always a prefix of the output sequence
//! - every window handed to the scorer has length `W`
//! - a callback stop at token `k` yields exactly `k` tokens
//! - greedy decoding over a fixed row always emits that row's argmax
//! - an explicit seed reproduces the same run

use proptest::prelude::*;
use rand::SeedableRng;
use textgen_engine::mock::{ByteTokenizer, FixedScorer};
use textgen_engine::{DecodingStrategy, GenerationConfig, GenerationState, Generator};
use textgen_sampling::ChaCha8Rng;

const VOCAB: usize = 256;

// ── helpers ───────────────────────────────────────────────────────────────

fn arb_row() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-8.0f64..8.0, VOCAB)
}

fn arb_prompt() -> impl Strategy<Value = String> {
    "[a-z ]{1,12}"
}

fn arb_strategy() -> impl Strategy<Value = DecodingStrategy> {
    prop_oneof![
        Just(DecodingStrategy::Greedy),
        (1usize..32).prop_map(|k| DecodingStrategy::top_k(k).unwrap()),
        (0.05f64..=1.0).prop_map(|p| DecodingStrategy::top_p(p).unwrap()),
        (0.05f64..=1.0).prop_map(|p| DecodingStrategy::top_p_random(p).unwrap()),
    ]
}

fn generator(scorer: &FixedScorer, window_len: usize) -> Generator<&FixedScorer, ByteTokenizer> {
    let config = GenerationConfig { window_len, ..Default::default() };
    Generator::new(scorer, ByteTokenizer::new(), config).unwrap()
}

// ── budget and windows ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn budget_is_exact_without_stop_condition(
        row in arb_row(),
        prompt in arb_prompt(),
        max_tokens in 0usize..24,
        window_len in 1usize..10,
        strategy in arb_strategy(),
        seed in any::<u64>(),
    ) {
        let scorer = FixedScorer::new(row);
        let generator = generator(&scorer, window_len);

        let out = generator
            .generate_with_rng(&prompt, max_tokens, strategy, ChaCha8Rng::seed_from_u64(seed), |_| true)
            .unwrap();

        prop_assert_eq!(out.generated().len(), max_tokens);
        prop_assert_eq!(out.state, GenerationState::StoppedByMaxTokens);
        prop_assert_eq!(scorer.calls(), max_tokens);
        let prompt_ids: Vec<u32> = prompt.bytes().map(u32::from).collect();
        prop_assert_eq!(&out.tokens[..out.prompt_len], prompt_ids.as_slice());
        prop_assert!(out.text.starts_with(&prompt));
        prop_assert!(scorer.inputs().iter().all(|w| w.len() == window_len));
    }

    #[test]
    fn callback_stop_keeps_exactly_k_tokens(
        row in arb_row(),
        max_tokens in 1usize..24,
        stop_at in 1usize..24,
    ) {
        let scorer = FixedScorer::new(row);
        let generator = generator(&scorer, 6);

        let mut seen = 0;
        let out = generator
            .generate("seed", max_tokens, DecodingStrategy::Greedy, |_| {
                seen += 1;
                seen < stop_at
            })
            .unwrap();

        let expected = stop_at.min(max_tokens);
        prop_assert_eq!(out.generated().len(), expected);
        prop_assert_eq!(scorer.calls(), expected);
        if stop_at <= max_tokens {
            prop_assert_eq!(out.state, GenerationState::StoppedByCallback);
        } else {
            prop_assert_eq!(out.state, GenerationState::StoppedByMaxTokens);
        }
    }

    #[test]
    fn greedy_emits_argmax_of_fixed_row(row in arb_row(), max_tokens in 1usize..8) {
        let best = u32::try_from(textgen_logits::argmax(&row).unwrap()).unwrap();
        let scorer = FixedScorer::new(row);
        let generator = generator(&scorer, 4);

        let out = generator.generate("g", max_tokens, DecodingStrategy::Greedy, |_| true).unwrap();

        prop_assert!(out.generated().iter().all(|&id| id == best));
    }

    #[test]
    fn explicit_seed_reproduces_run(
        row in arb_row(),
        strategy in arb_strategy(),
        seed in any::<u64>(),
    ) {
        let scorer = FixedScorer::new(row);
        let generator = generator(&scorer, 5);

        let run = |s| {
            generator
                .generate_with_rng("r", 10, strategy, ChaCha8Rng::seed_from_u64(s), |_| true)
                .unwrap()
                .tokens
        };

        prop_assert_eq!(run(seed), run(seed));
    }
}
