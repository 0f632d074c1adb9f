//! Configuration for the orchestration core.
//!
//! Provides the [`TrioConfig`] struct. Users construct it manually or from
//! environment variables; no file parsing dependencies are required.
//!
//! # Example
//!
//! ```rust
//! use trio::TrioConfig;
//!
//! let config = TrioConfig {
//!     max_reflection_rounds: 3,
//!     rng_seed: Some(42),
//!     ..TrioConfig::default()
//! };
//! assert_eq!(config.max_context_tokens, 4000);
//! ```

use crate::trio::clients::gemini::{DEFAULT_DELIBERATE_MODEL, DEFAULT_FAST_MODEL};
use crate::trio::history::{TruncationPolicy, MAX_CONTEXT_TOKENS};
use log::warn;
use std::str::FromStr;

/// Default cap on reflection rounds.
pub const DEFAULT_MAX_REFLECTION_ROUNDS: usize = 8;

/// Global configuration for one [`ChatService`](crate::service::ChatService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrioConfig {
    /// Context budget handed to the history loader, in approximate tokens.
    pub max_context_tokens: usize,
    /// How the history is fitted into `max_context_tokens`.
    pub truncation: TruncationPolicy,
    /// Rounds a reflection session may run before it is aborted.
    pub max_reflection_rounds: usize,
    /// Model identifier for [`ModelClass::Fast`](crate::completion::ModelClass::Fast).
    pub fast_model: String,
    /// Model identifier for [`ModelClass::Deliberate`](crate::completion::ModelClass::Deliberate).
    pub deliberate_model: String,
    /// Seed for the turn-order random source. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    /// Persist every reflection turn as it is emitted.
    pub write_ahead: bool,
}

impl Default for TrioConfig {
    /// ```rust
    /// use trio::TrioConfig;
    /// use trio::history::TruncationPolicy;
    ///
    /// let config = TrioConfig::default();
    /// assert_eq!(config.max_reflection_rounds, 8);
    /// assert_eq!(config.truncation, TruncationPolicy::Unbounded);
    /// assert!(!config.write_ahead);
    /// ```
    fn default() -> Self {
        Self {
            max_context_tokens: MAX_CONTEXT_TOKENS,
            truncation: TruncationPolicy::Unbounded,
            max_reflection_rounds: DEFAULT_MAX_REFLECTION_ROUNDS,
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            deliberate_model: DEFAULT_DELIBERATE_MODEL.to_string(),
            rng_seed: None,
            write_ahead: false,
        }
    }
}

impl TrioConfig {
    /// Defaults overridden by `TRIO_*` environment variables:
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `TRIO_MAX_CONTEXT_TOKENS` | `max_context_tokens` |
    /// | `TRIO_TRUNCATE_HISTORY` | `truncation` (`true` → `KeepLatest`) |
    /// | `TRIO_MAX_REFLECTION_ROUNDS` | `max_reflection_rounds` |
    /// | `TRIO_FAST_MODEL` | `fast_model` |
    /// | `TRIO_DELIBERATE_MODEL` | `deliberate_model` |
    /// | `TRIO_RNG_SEED` | `rng_seed` |
    /// | `TRIO_WRITE_AHEAD` | `write_ahead` |
    ///
    /// Unparsable values keep the default and log a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`TrioConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "TRIO_MAX_CONTEXT_TOKENS") {
            config.max_context_tokens = v;
        }
        if let Some(true) = parse_var::<bool, _>(&lookup, "TRIO_TRUNCATE_HISTORY") {
            config.truncation = TruncationPolicy::KeepLatest;
        }
        match parse_var::<usize, _>(&lookup, "TRIO_MAX_REFLECTION_ROUNDS") {
            Some(0) => warn!("Ignoring TRIO_MAX_REFLECTION_ROUNDS=0: at least one round is required"),
            Some(v) => config.max_reflection_rounds = v,
            None => {}
        }
        if let Some(v) = lookup("TRIO_FAST_MODEL") {
            config.fast_model = v;
        }
        if let Some(v) = lookup("TRIO_DELIBERATE_MODEL") {
            config.deliberate_model = v;
        }
        config.rng_seed = parse_var(&lookup, "TRIO_RNG_SEED");
        if let Some(v) = parse_var(&lookup, "TRIO_WRITE_AHEAD") {
            config.write_ahead = v;
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}
