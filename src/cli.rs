use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::model::{Discipline, GenerationParameters, Profile};

/// Generate call-chain benchmarks comparing exception unwinding with
/// explicit result propagation.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Failure propagation discipline to render
    #[arg(short = 's', long, value_enum, default_value_t = Discipline::Unwinding)]
    pub discipline: Discipline,

    /// Measurement the program is built for
    #[arg(short = 'p', long, value_enum, default_value_t = Profile::Depth)]
    pub profile: Profile,

    /// Max depth of functions [default: 50, or 10 for performance/result]
    #[arg(short = 'd', long = "max_depth")]
    pub max_depth: Option<u32>,

    /// Number of groups [default: 10, or 1 for performance]
    #[arg(short = 'g', long = "max_groups")]
    pub max_groups: Option<u32>,

    /// Use non-trivial destructor
    #[arg(
        short = 't',
        long = "non_trivial_destructor",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub non_trivial_destructor: bool,

    /// Channels at or above this value fail to acquire (bounds checks off when omitted)
    #[arg(short = 'f', long = "failure_threshold")]
    pub failure_threshold: Option<u32>,

    /// Check the threshold when a guard is acquired
    #[arg(long = "check_acquire", default_value_t = true, action = ArgAction::Set)]
    pub check_acquire: bool,

    /// Check the threshold on every trigger
    #[arg(long = "check_trigger", default_value_t = true, action = ArgAction::Set)]
    pub check_trigger: bool,

    /// Size of the error payload in bytes
    #[arg(long = "error_size", default_value_t = 128)]
    pub error_size: usize,

    /// Write the program here instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Also write a JSON manifest of frames and channels
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

impl Cli {
    pub fn parameters(&self) -> GenerationParameters {
        let defaults = GenerationParameters::defaults(self.profile, self.discipline);
        GenerationParameters {
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            max_groups: self.max_groups.unwrap_or(defaults.max_groups),
            non_trivial_destructor: self.non_trivial_destructor,
            failure_threshold: self.failure_threshold,
            check_acquire: self.check_acquire,
            check_trigger: self.check_trigger,
            error_size: self.error_size,
            ..defaults
        }
    }
}
