use std::fmt;

use anyhow::{Result, bail};
use clap::ValueEnum;
use serde::Serialize;

/// Deepest chain we are willing to emit. Keeps `d * d * 2` inside `uint32_t`.
pub const MAX_SUPPORTED_DEPTH: u32 = 10_000;

/// Only the first bytes of the payload carry meaning; the rest is padding.
pub const PAYLOAD_LEN: usize = 4;

/// How a failure travels from the frame that detects it to `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    /// `throw` at the origin, a single `catch` in `main`.
    Unwinding,
    /// `tl::expected` returned and checked at every call site.
    Result,
}

/// Which measurement the generated program is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Code size / correctness: grouped chains, `main` returns a payload byte.
    Depth,
    /// Latency: the termination frame timestamps, `main` returns elapsed ticks.
    Performance,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Unwinding => write!(f, "unwinding"),
            Discipline::Result => write!(f, "result"),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Depth => write!(f, "depth"),
            Profile::Performance => write!(f, "performance"),
        }
    }
}

/// Everything the generator needs besides the discipline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationParameters {
    pub profile: Profile,
    pub max_depth: u32,
    pub max_groups: u32,
    /// When false the guard destructor is compiled out and releases vanish.
    pub non_trivial_destructor: bool,
    /// Channels at or above this value fail to acquire / trigger.
    /// `None` compiles the bounds checks out entirely.
    pub failure_threshold: Option<u32>,
    /// Validate the channel when the guard is acquired.
    pub check_acquire: bool,
    /// Validate the channel again on every `trigger()`.
    pub check_trigger: bool,
    pub error_size: usize,
}

impl GenerationParameters {
    pub fn default_max_depth(profile: Profile, discipline: Discipline) -> u32 {
        match (profile, discipline) {
            (Profile::Performance, Discipline::Result) => 10,
            _ => 50,
        }
    }

    pub fn default_max_groups(profile: Profile) -> u32 {
        match profile {
            Profile::Depth => 10,
            Profile::Performance => 1,
        }
    }

    /// Defaults for a profile/discipline pair, before any overrides.
    pub fn defaults(profile: Profile, discipline: Discipline) -> Self {
        Self {
            profile,
            max_depth: Self::default_max_depth(profile, discipline),
            max_groups: Self::default_max_groups(profile),
            non_trivial_destructor: true,
            failure_threshold: None,
            check_acquire: true,
            check_trigger: true,
            error_size: 128,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            bail!("max_depth must be at least 1");
        }
        if self.max_depth > MAX_SUPPORTED_DEPTH {
            bail!(
                "max_depth {} exceeds the supported maximum of {}",
                self.max_depth,
                MAX_SUPPORTED_DEPTH
            );
        }
        if self.max_groups == 0 {
            bail!("max_groups must be at least 1");
        }
        let widest = (self.max_groups as u64 - 1) * self.max_depth as u64 * 2;
        if widest > i32::MAX as u64 {
            bail!(
                "max_groups {} x max_depth {} yields channel {} which overflows `int`",
                self.max_groups,
                self.max_depth,
                widest
            );
        }
        if let Some(threshold) = self.failure_threshold {
            if threshold > self.max_depth {
                bail!(
                    "failure_threshold {} is larger than max_depth {}",
                    threshold,
                    self.max_depth
                );
            }
        }
        if self.error_size < PAYLOAD_LEN {
            bail!(
                "error_size {} cannot hold the {}-byte payload",
                self.error_size,
                PAYLOAD_LEN
            );
        }
        Ok(())
    }
}

/// The three ways a generated chain can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Acquisition,
    Trigger,
    Termination,
}

impl FailureKind {
    pub fn payload(self) -> [u8; PAYLOAD_LEN] {
        match self {
            FailureKind::Acquisition => [0x55, 0xAA, 0x33, 0x44],
            FailureKind::Trigger => [0xAA, 0xBB, 0x33, 0x44],
            FailureKind::Termination => [0x33, 0x44, 0xAA, 0xBB],
        }
    }

    /// What `main` returns in the depth profile: the first payload byte.
    pub fn exit_code(self) -> i32 {
        self.payload()[0] as i32
    }
}

// ─────────────────────────────────────────────────────
// Intermediate representation
// ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FrameId {
    pub group: u32,
    pub depth: u32,
}

impl FrameId {
    pub fn new(group: u32, depth: u32) -> Self {
        Self { group, depth }
    }

    /// Symbol of the generated function, e.g. `fallible_function3_group0`.
    pub fn function_name(&self) -> String {
        format!("fallible_function{}_group{}", self.depth, self.group)
    }
}

/// A channel number kept as the product that produced it, so the emitted
/// source shows `3 * 3 * 2` rather than `18`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub factors: Vec<u32>,
}

impl Channel {
    pub fn product(factors: &[u32]) -> Self {
        Self {
            factors: factors.to_vec(),
        }
    }

    pub fn value(&self) -> u64 {
        self.factors.iter().map(|&f| f as u64).product()
    }

    /// Bit this channel occupies in a 64-bit register.
    pub fn bit(&self) -> u64 {
        1u64 << (self.value() % 64)
    }

    pub fn expression(&self) -> String {
        self.factors
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(" * ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardSpec {
    /// Local variable name in the generated frame.
    pub binding: &'static str,
    pub channel: Channel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    Regular { next: FrameId },
    Termination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub id: FrameId,
    pub kind: FrameKind,
    pub guards: Vec<GuardSpec>,
}

impl Frame {
    pub fn is_termination(&self) -> bool {
        matches!(self.kind, FrameKind::Termination)
    }
}

/// One group: `max_depth` regular frames then the termination frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chain {
    pub group: u32,
    pub frames: Vec<Frame>,
}

impl Chain {
    pub fn entry(&self) -> FrameId {
        FrameId::new(self.group, 0)
    }

    pub fn termination(&self) -> Option<&Frame> {
        self.frames.last().filter(|f| f.is_termination())
    }

    pub fn side_effect(&self) -> String {
        format!("side_effect{}", self.group)
    }
}

/// The whole program before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Program {
    pub discipline: Discipline,
    pub params: GenerationParameters,
    pub chains: Vec<Chain>,
}

impl Program {
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.chains.iter().flat_map(|c| c.frames.iter())
    }

    pub fn entry_points(&self) -> Vec<FrameId> {
        self.chains.iter().map(Chain::entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenerationParameters {
        GenerationParameters::defaults(Profile::Depth, Discipline::Unwinding)
    }

    #[test]
    fn defaults_follow_profile_and_discipline() {
        let depth = GenerationParameters::defaults(Profile::Depth, Discipline::Result);
        assert_eq!((depth.max_depth, depth.max_groups), (50, 10));

        let perf = GenerationParameters::defaults(Profile::Performance, Discipline::Result);
        assert_eq!((perf.max_depth, perf.max_groups), (10, 1));

        let perf = GenerationParameters::defaults(Profile::Performance, Discipline::Unwinding);
        assert_eq!(perf.max_depth, 50);
        assert!(perf.non_trivial_destructor);
    }

    #[test]
    fn zero_depth_and_groups_are_rejected() {
        let mut p = params();
        p.max_depth = 0;
        assert!(p.validate().unwrap_err().to_string().contains("max_depth"));

        let mut p = params();
        p.max_groups = 0;
        assert!(p.validate().unwrap_err().to_string().contains("max_groups"));
    }

    #[test]
    fn threshold_above_depth_is_rejected() {
        let mut p = params();
        p.failure_threshold = Some(p.max_depth + 1);
        assert!(p.validate().is_err());

        p.failure_threshold = Some(p.max_depth);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn termination_channel_must_fit_int() {
        let mut p = params();
        p.max_depth = 10_000;
        p.max_groups = 107_375;
        // (107_374 * 10_000 * 2) = 2_147_480_000 still fits
        assert!(p.validate().is_ok());

        p.max_groups = 107_376;
        let err = p.validate().unwrap_err().to_string();
        assert!(err.contains("overflows"), "{err}");
    }

    #[test]
    fn bounds_checks_are_on_by_default() {
        let p = params();
        assert!(p.check_acquire && p.check_trigger);
    }

    #[test]
    fn error_size_must_fit_payload() {
        let mut p = params();
        p.error_size = 3;
        assert!(p.validate().is_err());
    }

    #[test]
    fn channel_wraps_modulo_64() {
        let c = Channel::product(&[9, 9, 2]);
        assert_eq!(c.value(), 162);
        assert_eq!(c.bit(), 1 << (162 % 64));
        assert_eq!(c.expression(), "9 * 9 * 2");
    }

    #[test]
    fn payload_bytes_are_distinct_per_kind() {
        assert_eq!(FailureKind::Acquisition.exit_code(), 0x55);
        assert_eq!(FailureKind::Trigger.exit_code(), 0xAA);
        assert_eq!(FailureKind::Termination.exit_code(), 0x33);
    }
}
