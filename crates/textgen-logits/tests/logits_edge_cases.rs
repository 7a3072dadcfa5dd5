//! Edge-case tests for the numeric primitives.
//!
//! Covers: single-element and masked inputs, the `[1, 3, 2, 0, -1]` reference
//! vector, and the multinomial fallback when rounding leaves no winner.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use textgen_logits::{
    argmax, first_cumulative_exceeding, max_value, multinomial_sample, softmax, softmax_in_place,
    sort_descending,
};

fn assert_approx(a: f64, b: f64, eps: f64) {
    assert!((a - b).abs() < eps, "expected {a} ≈ {b} (eps={eps})");
}

// ============================================================================
// 1. Degenerate inputs
// ============================================================================

#[test]
fn single_element_softmax_is_certain() {
    assert_eq!(softmax(&[-123.0]), vec![1.0]);
}

#[test]
fn masked_entries_get_zero_probability() {
    let probs = softmax(&[f64::NEG_INFINITY, 0.0, f64::NEG_INFINITY, 0.0]);
    assert_eq!(probs, vec![0.0, 0.5, 0.0, 0.5]);
}

#[test]
fn in_place_matches_allocating_form() {
    let scores = [0.3, -2.0, 7.5, 7.5, 1.0];
    let mut in_place = scores;
    softmax_in_place(&mut in_place);
    assert_eq!(in_place.to_vec(), softmax(&scores));
}

#[test]
fn max_value_of_empty_is_negative_infinity() {
    assert_eq!(max_value(&[]), f64::NEG_INFINITY);
}

// ============================================================================
// 2. Reference vector [1, 3, 2, 0, -1]
// ============================================================================

#[test]
fn reference_vector_ranking() {
    let scores = [1.0, 3.0, 2.0, 0.0, -1.0];
    assert_eq!(argmax(&scores), Some(1));

    let order: Vec<usize> = sort_descending(&scores).into_iter().map(|(i, _)| i).collect();
    assert_eq!(order, vec![1, 2, 0, 3, 4]);
}

#[test]
fn reference_vector_probabilities() {
    let probs = softmax(&[1.0, 3.0, 2.0, 0.0, -1.0]);
    let z: f64 = [1.0f64, 3.0, 2.0, 0.0, -1.0].iter().map(|s| s.exp()).sum();
    assert_approx(probs[1], 3.0f64.exp() / z, 1e-12);
    assert_approx(probs.iter().sum(), 1.0, 1e-12);
}

// ============================================================================
// 3. Cumulative walk and multinomial fallback
// ============================================================================

#[test]
fn cumulative_walk_never_crossing_is_none() {
    assert_eq!(first_cumulative_exceeding([0.2, 0.3], 0.5), None);
    assert_eq!(first_cumulative_exceeding([0.2, 0.3], 0.49), Some(1));
}

#[test]
fn multinomial_ignores_zero_weight_entries() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for _ in 0..200 {
        let idx = multinomial_sample(&[0.0, 1.0, 0.0, 3.0, 0.0], &mut rng).unwrap();
        assert!(idx == 1 || idx == 3, "drew zero-weight index {idx}");
    }
}

#[test]
fn multinomial_single_weight_always_wins() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    assert_eq!(multinomial_sample(&[0.7], &mut rng), Some(0));
}
