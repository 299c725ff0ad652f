//! Reference interpreter for a `Program`.
//!
//! Walks the IR the way the generated C++ executes: guards are acquired and
//! triggered frame by frame, the first failure stops the descent and every
//! held guard is released innermost-first on the way back to the dispatcher.
//! Register state lives in an explicit `RegisterFile` so several machines can
//! run side by side.

use std::collections::BTreeMap;

use crate::model::{Chain, FailureKind, FrameId, GuardSpec, Profile, Program};

/// The simulated hardware registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterFile {
    pub enable: u64,
    pub trigger: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardCounts {
    pub acquires: u32,
    pub releases: u32,
    pub triggers: u32,
}

impl GuardCounts {
    pub fn balanced(&self) -> bool {
        self.acquires == self.releases
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub origin: FrameId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed { sum: i64 },
    Failed(Failure),
}

pub struct Machine<'p> {
    program: &'p Program,
    pub registers: RegisterFile,
    side_effects: Vec<i64>,
    counts: BTreeMap<FrameId, GuardCounts>,
    visited: Vec<FrameId>,
}

impl<'p> Machine<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            registers: RegisterFile::default(),
            side_effects: vec![0; program.chains.len()],
            counts: BTreeMap::new(),
            visited: Vec::new(),
        }
    }

    /// Runs the dispatcher: groups in order, stopping at the first failure.
    pub fn run(&mut self) -> Outcome {
        let program = self.program;
        for chain in &program.chains {
            if let Err(failure) = self.run_chain(chain) {
                return Outcome::Failed(failure);
            }
        }
        Outcome::Completed {
            sum: self.side_effects.iter().sum(),
        }
    }

    /// What `main` would return. Performance programs return a clock delta,
    /// which the machine cannot know.
    pub fn exit_code(&self, outcome: &Outcome) -> Option<i32> {
        match self.program.params.profile {
            Profile::Performance => None,
            Profile::Depth => Some(match outcome {
                Outcome::Failed(failure) => failure.kind.exit_code(),
                Outcome::Completed { sum } => *sum as i32,
            }),
        }
    }

    pub fn counts(&self, frame: FrameId) -> GuardCounts {
        self.counts.get(&frame).copied().unwrap_or_default()
    }

    pub fn all_counts(&self) -> &BTreeMap<FrameId, GuardCounts> {
        &self.counts
    }

    pub fn totals(&self) -> GuardCounts {
        self.counts
            .values()
            .fold(GuardCounts::default(), |acc, c| GuardCounts {
                acquires: acc.acquires + c.acquires,
                releases: acc.releases + c.releases,
                triggers: acc.triggers + c.triggers,
            })
    }

    /// Frames entered, in call order.
    pub fn visited(&self) -> &[FrameId] {
        &self.visited
    }

    pub fn side_effect(&self, group: u32) -> i64 {
        self.side_effects[group as usize]
    }

    fn run_chain(&mut self, chain: &'p Chain) -> Result<i64, Failure> {
        let mut held: Vec<(FrameId, &GuardSpec)> = Vec::new();
        let mut failure = None;

        'frames: for frame in &chain.frames {
            self.visited.push(frame.id);
            for guard in &frame.guards {
                if let Err(kind) = self.acquire(frame.id, guard) {
                    failure = Some(Failure {
                        kind,
                        origin: frame.id,
                    });
                    break 'frames;
                }
                held.push((frame.id, guard));
                if let Err(kind) = self.trigger(frame.id, guard) {
                    failure = Some(Failure {
                        kind,
                        origin: frame.id,
                    });
                    break 'frames;
                }
            }

            self.side_effects[chain.group as usize] += 1;

            if frame.is_termination() {
                failure = Some(Failure {
                    kind: FailureKind::Termination,
                    origin: frame.id,
                });
                break;
            }
        }

        while let Some((frame, guard)) = held.pop() {
            self.release(frame, guard);
        }

        match failure {
            Some(failure) => Err(failure),
            None => Ok(self.side_effects[chain.group as usize]),
        }
    }

    fn over_threshold(&self, guard: &GuardSpec) -> bool {
        matches!(
            self.program.params.failure_threshold,
            Some(threshold) if guard.channel.value() >= threshold as u64
        )
    }

    fn acquire(&mut self, frame: FrameId, guard: &GuardSpec) -> Result<(), FailureKind> {
        if self.program.params.check_acquire && self.over_threshold(guard) {
            return Err(FailureKind::Acquisition);
        }
        self.registers.enable |= guard.channel.bit();
        self.counts.entry(frame).or_default().acquires += 1;
        Ok(())
    }

    fn trigger(&mut self, frame: FrameId, guard: &GuardSpec) -> Result<(), FailureKind> {
        if self.program.params.check_trigger && self.over_threshold(guard) {
            return Err(FailureKind::Trigger);
        }
        self.registers.trigger |= guard.channel.bit();
        self.counts.entry(frame).or_default().triggers += 1;
        Ok(())
    }

    fn release(&mut self, frame: FrameId, guard: &GuardSpec) {
        if !self.program.params.non_trivial_destructor {
            return;
        }
        self.registers.enable &= !guard.channel.bit();
        self.counts.entry(frame).or_default().releases += 1;
    }
}
