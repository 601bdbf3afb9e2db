//! Barcode acceptance filter
//!
//! A live decoder emits the same correct code many times per second and the
//! occasional wrong read in between. This filter turns that stream of raw
//! candidates into one [`ConfirmedScan`] per physical scan:
//!
//! 1. **Format/checksum gate**: the trimmed text must be a valid GTIN,
//!    otherwise it is dropped and the state is left untouched.
//! 2. **Stability**: the same code must be read `min_repeats` times in a row,
//!    each read within `stability_window_ms` of the previous one. Any other
//!    valid code restarts the streak at 1, including a code in cooldown.
//! 3. **Cooldown**: a code accepted less than `cooldown_ms` ago is not
//!    accepted again even when its streak is complete, so the camera decoding
//!    the same label again does not re-trigger a lookup.
//!
//! ```text
//! IDLE ──valid──▶ SEEING(code, 1) ──same code, in window──▶ SEEING(code, n)
//!                      ▲                                        │ n >= min_repeats
//!   other code / gap ──┘                                        ▼
//! IDLE ◀──cooldown elapsed── COOLDOWN(code) ◀──────────── CONFIRMED (emitted once)
//! ```
//!
//! Everything here is synchronous and allocation-light: it runs inside the
//! decoder's per-frame callback.

use crate::gtin::{is_valid_gtin, Gtin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default stability window between two identical reads (ms)
pub const DEFAULT_STABILITY_WINDOW_MS: u64 = 900;

/// Default re-acceptance cooldown for the same code (ms)
pub const DEFAULT_COOLDOWN_MS: u64 = 3000;

/// Minimum number of identical consecutive reads before acceptance
pub const MIN_REPEATS_FLOOR: u32 = 2;

/// Raw decoder output for one video frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCandidate {
    pub text: String,
    pub observed_at: DateTime<Utc>,
}

impl ScanCandidate {
    pub fn new(text: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            observed_at,
        }
    }
}

/// A barcode accepted as genuine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedScan {
    pub code: Gtin,
    pub confirmed_at: DateTime<Utc>,
}

/// Filter thresholds, loaded from the `[scan]` TOML table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanFilterConfig {
    /// Maximum gap between two identical reads counted in the same streak
    pub stability_window_ms: u64,
    /// How long an accepted code is ignored afterwards
    pub cooldown_ms: u64,
    /// Identical consecutive reads required (never below 2)
    pub min_repeats: u32,
}

impl Default for ScanFilterConfig {
    fn default() -> Self {
        Self {
            stability_window_ms: DEFAULT_STABILITY_WINDOW_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            min_repeats: MIN_REPEATS_FLOOR,
        }
    }
}

impl ScanFilterConfig {
    /// `min_repeats` with the anti-flicker floor applied
    pub fn effective_min_repeats(&self) -> u32 {
        self.min_repeats.max(MIN_REPEATS_FLOOR)
    }
}

/// State carried between calls to [`accept_candidate`]
///
/// Owned by exactly one scan session; a new session starts from `Default`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub last_seen_code: String,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub consecutive_matches: u32,
    pub last_accepted_code: String,
    pub last_accepted_at: Option<DateTime<Utc>>,
}

/// Config milliseconds as a signed bound, saturating at `i64::MAX`
fn bound_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

impl FilterState {
    /// Signed milliseconds from `at` to `now`
    fn elapsed_ms(at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        (now - at).num_milliseconds()
    }

    /// True while `code` is inside its post-acceptance cooldown
    ///
    /// A timestamp earlier than the acceptance (clock stepped back) still
    /// counts as cooldown.
    pub fn in_cooldown(&self, code: &str, now: DateTime<Utc>, config: &ScanFilterConfig) -> bool {
        if self.last_accepted_code != code {
            return false;
        }
        match self.last_accepted_at {
            Some(at) => Self::elapsed_ms(at, now) < bound_ms(config.cooldown_ms),
            None => false,
        }
    }

    /// True when a read of `code` at `now` continues the current streak
    ///
    /// A timestamp earlier than the previous read is treated as outside the window.
    fn continues_streak(&self, code: &str, now: DateTime<Utc>, config: &ScanFilterConfig) -> bool {
        if self.consecutive_matches == 0 || self.last_seen_code != code {
            return false;
        }
        match self.last_seen_at {
            Some(at) => {
                let elapsed = Self::elapsed_ms(at, now);
                elapsed >= 0 && elapsed < bound_ms(config.stability_window_ms)
            }
            None => false,
        }
    }
}

/// Decide whether `candidate` completes a confirmed scan
///
/// Pure function: returns the decision together with the next state. Invalid
/// candidates return the input state unchanged; every valid candidate updates
/// the streak, even when its code is in cooldown. Never panics, never blocks.
pub fn accept_candidate(
    candidate: &ScanCandidate,
    state: FilterState,
    config: &ScanFilterConfig,
) -> (bool, FilterState) {
    let code = candidate.text.trim();
    let now = candidate.observed_at;

    if !is_valid_gtin(code) {
        return (false, state);
    }

    let mut next = state;
    if next.continues_streak(code, now, config) {
        next.consecutive_matches = next.consecutive_matches.saturating_add(1);
    } else {
        next.last_seen_code = code.to_string();
        next.consecutive_matches = 1;
    }
    next.last_seen_at = Some(now);

    if next.consecutive_matches < config.effective_min_repeats() {
        return (false, next);
    }

    if next.in_cooldown(code, now, config) {
        debug!(code, "Repeat of a recently accepted code suppressed");
        return (false, next);
    }

    // Confirmed: enter cooldown and start any later streak from scratch
    next.last_accepted_code = code.to_string();
    next.last_accepted_at = Some(now);
    next.last_seen_code.clear();
    next.last_seen_at = None;
    next.consecutive_matches = 0;

    (true, next)
}

/// Observable phase of a [`ScanFilter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Seeing { code: String, count: u32 },
    Cooldown { code: String, remaining_ms: u64 },
}

/// Stateful filter owned by a single scan session
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    config: ScanFilterConfig,
    state: FilterState,
}

impl ScanFilter {
    pub fn new(config: ScanFilterConfig) -> Self {
        Self {
            config,
            state: FilterState::default(),
        }
    }

    pub fn config(&self) -> &ScanFilterConfig {
        &self.config
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Feed one decoder candidate; returns the scan when it is confirmed
    pub fn offer(&mut self, candidate: &ScanCandidate) -> Option<ConfirmedScan> {
        let state = std::mem::take(&mut self.state);
        let (accepted, next) = accept_candidate(candidate, state, &self.config);
        self.state = next;

        if !accepted {
            return None;
        }

        let code: Gtin = candidate.text.parse().ok()?;
        debug!(code = %code, at = %candidate.observed_at, "Scan confirmed");
        Some(ConfirmedScan {
            code,
            confirmed_at: candidate.observed_at,
        })
    }

    /// Phase at `now`, for status display
    pub fn phase(&self, now: DateTime<Utc>) -> ScanPhase {
        let state = &self.state;

        if state.continues_streak(&state.last_seen_code, now, &self.config)
            && !state.in_cooldown(&state.last_seen_code, now, &self.config)
        {
            return ScanPhase::Seeing {
                code: state.last_seen_code.clone(),
                count: state.consecutive_matches,
            };
        }

        if let Some(at) = state.last_accepted_at {
            if state.in_cooldown(&state.last_accepted_code, now, &self.config) {
                let elapsed = (now - at).num_milliseconds().max(0) as u64;
                return ScanPhase::Cooldown {
                    code: state.last_accepted_code.clone(),
                    remaining_ms: self.config.cooldown_ms.saturating_sub(elapsed),
                };
            }
        }

        ScanPhase::Idle
    }

    /// Forget every streak and cooldown
    pub fn reset(&mut self) {
        self.state = FilterState::default();
    }
}
