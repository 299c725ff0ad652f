//! Assembles validated parameters into a complete `Program`.

use anyhow::Result;
use log::debug;

use super::chain::build_chain;
use crate::model::{Discipline, GenerationParameters, Program};

pub fn assemble(params: &GenerationParameters, discipline: Discipline) -> Result<Program> {
    params.validate()?;

    let chains = (0..params.max_groups)
        .map(|group| {
            let chain = build_chain(group, params.max_depth, params.profile);
            debug!("group {} built with {} frames", group, chain.frames.len());
            chain
        })
        .collect();

    Ok(Program {
        discipline,
        params: params.clone(),
        chains,
    })
}
