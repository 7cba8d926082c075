//! Output signal patterns.
//!
//! Every pattern is a pure function `(base, duration, elapsed) -> strength`
//! over ticks. All of them return 0 once `elapsed >= duration`.
//!
//! | Pattern    | Shape                                               |
//! |------------|-----------------------------------------------------|
//! | `constant` | `base` for the whole duration                       |
//! | `fade`     | linear decay from `base` to 0                       |
//! | `pulse_3x` | three on/off cycles, on for the first half of each  |
//! | `sos`      | fixed bit sequence, 4 ticks per bit, looping        |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest signal strength a position can carry.
pub const MAX_STRENGTH: u8 = 15;

/// Ticks each bit of the coded sequence is held.
pub const TICKS_PER_BIT: u64 = 4;

/// Morse `... --- ...` as on/off bits.
pub const SOS_BITS: [bool; 24] = [
    true, false, true, false, true, false, false, // S
    true, true, false, true, true, false, true, true, false, false, // O
    true, false, true, false, true, false, false, // S
];

/// A named strength-over-time shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Steady output.
    #[default]
    Constant,
    /// Linear decay.
    Fade,
    /// Three pulses over the duration.
    Pulsed,
    /// Coded bit sequence.
    Coded,
}

impl Pattern {
    /// Resolve a pattern name; unknown names behave as [`Pattern::Constant`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "fade" => Self::Fade,
            "pulse_3x" | "pulsed" | "pulse" => Self::Pulsed,
            "sos" | "coded" => Self::Coded,
            _ => Self::Constant,
        }
    }

    /// Canonical name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Fade => "fade",
            Self::Pulsed => "pulse_3x",
            Self::Coded => "sos",
        }
    }

    /// Strength after `elapsed` ticks of an emission lasting `duration` ticks.
    #[must_use]
    pub fn strength(self, base: u8, duration: u64, elapsed: u64) -> u8 {
        match self {
            Self::Constant => constant(base, duration, elapsed),
            Self::Fade => fade(base, duration, elapsed),
            Self::Pulsed => pulsed(base, duration, elapsed),
            Self::Coded => coded(base, duration, elapsed),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `base` until the duration elapses.
#[must_use]
pub fn constant(base: u8, duration: u64, elapsed: u64) -> u8 {
    if elapsed >= duration { 0 } else { base }
}

/// Linear decay: `base` at 0, 0 at `duration`, truncated toward zero.
#[must_use]
pub fn fade(base: u8, duration: u64, elapsed: u64) -> u8 {
    if elapsed >= duration {
        return 0;
    }
    let remaining = duration - elapsed;
    // remaining < duration, so the quotient is < base.
    u8::try_from(u64::from(base) * remaining / duration).unwrap_or(base)
}

/// Period `duration / 3`; on for the first half of each period.
///
/// Periods shorter than two ticks cannot be split and fall back to constant.
#[must_use]
pub fn pulsed(base: u8, duration: u64, elapsed: u64) -> u8 {
    if elapsed >= duration {
        return 0;
    }
    let cycle = duration / 3;
    if cycle < 2 {
        return base;
    }
    if elapsed % cycle < cycle / 2 { base } else { 0 }
}

/// One bit of [`SOS_BITS`] per [`TICKS_PER_BIT`] ticks, looping.
#[must_use]
pub fn coded(base: u8, duration: u64, elapsed: u64) -> u8 {
    if elapsed >= duration {
        return 0;
    }
    let len = SOS_BITS.len() as u64;
    let index = usize::try_from((elapsed / TICKS_PER_BIT) % len).unwrap_or(0);
    if SOS_BITS[index] { base } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_are_constant() {
        assert_eq!(Pattern::from_name("strobe"), Pattern::Constant);
        assert_eq!(Pattern::from_name(""), Pattern::Constant);
        assert_eq!(Pattern::from_name("PULSE_3X"), Pattern::Pulsed);
        assert_eq!(Pattern::from_name("sos"), Pattern::Coded);
    }

    #[test]
    fn constant_holds_then_stops() {
        assert_eq!(constant(12, 40, 0), 12);
        assert_eq!(constant(12, 40, 39), 12);
        assert_eq!(constant(12, 40, 40), 0);
    }

    #[test]
    fn fade_endpoints() {
        assert_eq!(fade(15, 40, 0), 15);
        assert_eq!(fade(15, 40, 20), 7);
        assert_eq!(fade(15, 40, 39), 0);
        assert_eq!(fade(15, 40, 40), 0);
    }

    #[test]
    fn pulsed_alternates_with_third_of_duration() {
        // duration 60 → cycle 20: on 0..10, off 10..20
        let on: Vec<u64> = (0..60).filter(|&t| pulsed(9, 60, t) == 9).collect();
        let expected: Vec<u64> = (0..60).filter(|t| t % 20 < 10).collect();
        assert_eq!(on, expected);
        assert_eq!(pulsed(9, 60, 60), 0);
    }

    #[test]
    fn tiny_pulse_period_is_constant() {
        assert_eq!(pulsed(7, 3, 0), 7);
        assert_eq!(pulsed(7, 5, 4), 7);
    }

    #[test]
    fn coded_holds_each_bit_for_four_ticks() {
        let signal: Vec<u8> = (0..12).map(|t| coded(15, 200, t)).collect();
        assert_eq!(signal, [15, 15, 15, 15, 0, 0, 0, 0, 15, 15, 15, 15]);
        // Loops after 24 bits.
        assert_eq!(coded(15, 200, 96), coded(15, 200, 0));
        assert_eq!(coded(15, 200, 28), 15); // bit 7, first dash
    }
}
