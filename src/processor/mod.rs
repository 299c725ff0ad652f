//! Component 3 – the functional core.
//!
//! Turns parameters into the call-chain IR. Rendering lives in `writer`.
pub mod chain;
pub mod program;
pub mod sim;

use crate::model::{Discipline, GenerationParameters, Program};
use anyhow::Result;

/// Runs every processing pass and returns a read-only structure for writers.
pub fn run(params: &GenerationParameters, discipline: Discipline) -> Result<Program> {
    program::assemble(params, discipline)
}
