//! Input gates - per-pass rules that decorate the player's next input.
//!
//! `#user_success`, `#user_fail`, `#user_trusted` and `#user_suspicious` each
//! configure one gate. A gate fires either by chance or when its pattern matches
//! the input, and firing appends its text to the input.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four configurable gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateKind {
    Success,
    Fail,
    Trusted,
    Suspicious,
}

impl GateKind {
    /// Text appended when a gate has no explicit text.
    pub fn default_text(&self) -> &'static str {
        match self {
            GateKind::Success => "[The attempt succeeds.]",
            GateKind::Fail => "[The attempt fails.]",
            GateKind::Trusted => "[They believe what is said.]",
            GateKind::Suspicious => "[They are suspicious of what is said.]",
        }
    }
}

impl FromStr for GateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(GateKind::Success),
            "fail" => Ok(GateKind::Fail),
            "trusted" => Ok(GateKind::Trusted),
            "suspicious" => Ok(GateKind::Suspicious),
            other => Err(format!("unknown gate '{}'", other)),
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GateKind::Success => "success",
            GateKind::Fail => "fail",
            GateKind::Trusted => "trusted",
            GateKind::Suspicious => "suspicious",
        };
        write!(f, "{}", name)
    }
}

/// What makes a gate fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GateRate {
    /// Chance in `0.0..=1.0`.
    Probability(f64),
    /// `/pattern/flags` literal matched against the input.
    Pattern(String),
}

impl FromStr for GateRate {
    type Err = String;

    /// Accepts `15%`, `0.15` or `/pattern/flags`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() >= 2 && s.starts_with('/') && s[1..].contains('/') {
            return Ok(GateRate::Pattern(s.to_string()));
        }
        if let Some(pct) = s.strip_suffix('%') {
            return pct
                .trim()
                .parse::<f64>()
                .map(|p| GateRate::Probability((p / 100.0).clamp(0.0, 1.0)))
                .map_err(|_| format!("invalid percentage '{}'", s));
        }
        s.parse::<f64>()
            .map(|p| GateRate::Probability(p.clamp(0.0, 1.0)))
            .map_err(|_| format!("invalid gate rate '{}'", s))
    }
}

/// A configured gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputGate {
    pub rate: GateRate,
    pub text: String,
}

/// Gates configured during the last context pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputGates {
    pub success: Option<InputGate>,
    pub fail: Option<InputGate>,
    pub trusted: Option<InputGate>,
    pub suspicious: Option<InputGate>,
}

impl InputGates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure a gate, replacing any earlier one of the same kind.
    pub fn set(&mut self, kind: GateKind, gate: InputGate) {
        *self.slot_mut(kind) = Some(gate);
    }

    pub fn get(&self, kind: GateKind) -> Option<&InputGate> {
        match kind {
            GateKind::Success => self.success.as_ref(),
            GateKind::Fail => self.fail.as_ref(),
            GateKind::Trusted => self.trusted.as_ref(),
            GateKind::Suspicious => self.suspicious.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: GateKind) -> &mut Option<InputGate> {
        match kind {
            GateKind::Success => &mut self.success,
            GateKind::Fail => &mut self.fail,
            GateKind::Trusted => &mut self.trusted,
            GateKind::Suspicious => &mut self.suspicious,
        }
    }

    /// Check whether any gate is configured.
    pub fn is_empty(&self) -> bool {
        self.success.is_none()
            && self.fail.is_none()
            && self.trusted.is_none()
            && self.suspicious.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_parsing() {
        assert_eq!("25%".parse::<GateRate>(), Ok(GateRate::Probability(0.25)));
        assert_eq!("0.5".parse::<GateRate>(), Ok(GateRate::Probability(0.5)));
        assert_eq!("150%".parse::<GateRate>(), Ok(GateRate::Probability(1.0)));
        assert_eq!(
            "/sword/i".parse::<GateRate>(),
            Ok(GateRate::Pattern("/sword/i".to_string()))
        );
        assert!("often".parse::<GateRate>().is_err());
    }

    #[test]
    fn test_set_and_clear() {
        let mut gates = InputGates::new();
        assert!(gates.is_empty());

        gates.set(
            GateKind::Fail,
            InputGate {
                rate: GateRate::Probability(1.0),
                text: "You trip.".to_string(),
            },
        );
        assert_eq!(gates.get(GateKind::Fail).map(|g| g.text.as_str()), Some("You trip."));
        assert!(gates.get(GateKind::Success).is_none());

        gates.clear();
        assert!(gates.is_empty());
    }
}
