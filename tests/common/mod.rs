//! Shared helpers for the integration suites.

#![allow(dead_code)]

use deferred::{ActivationGauge, Context};
use proptest::test_runner::{Config as ProptestConfig, RngSeed};

pub use deferred::test_utils::{CallLog, init_test_logging};

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "DEFERRED_PROPTEST_SEED";

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    // Honor existing PROPTEST_RNG_SEED, otherwise apply our own.
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }
    None
}

/// A fresh context with an activation gauge installed.
pub fn counted_context(name: &str) -> (Context, ActivationGauge) {
    let ctx = Context::new();
    let gauge = ActivationGauge::installed(name, &ctx);
    (ctx, gauge)
}
