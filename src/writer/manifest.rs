//! JSON description of a generated program: which frames exist and which
//! channels each of them touches.

use std::io::{self, Write};

use serde::Serialize;

use crate::model::{Discipline, FrameKind, GenerationParameters, Program};

#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub discipline: Discipline,
    pub parameters: &'a GenerationParameters,
    pub entry_points: Vec<String>,
    pub frames: Vec<FrameRecord>,
}

#[derive(Debug, Serialize)]
pub struct FrameRecord {
    pub name: String,
    pub group: u32,
    pub depth: u32,
    pub kind: &'static str,
    pub channels: Vec<u64>,
}

impl<'a> Manifest<'a> {
    pub fn from_program(program: &'a Program) -> Self {
        let frames = program
            .frames()
            .map(|frame| FrameRecord {
                name: frame.id.function_name(),
                group: frame.id.group,
                depth: frame.id.depth,
                kind: match frame.kind {
                    FrameKind::Regular { .. } => "regular",
                    FrameKind::Termination => "termination",
                },
                channels: frame.guards.iter().map(|g| g.channel.value()).collect(),
            })
            .collect();

        Self {
            discipline: program.discipline,
            parameters: &program.params,
            entry_points: program
                .entry_points()
                .iter()
                .map(|id| id.function_name())
                .collect(),
            frames,
        }
    }
}

pub fn emit(program: &Program, out: &mut dyn Write) -> io::Result<()> {
    let manifest = Manifest::from_program(program);
    serde_json::to_writer_pretty(&mut *out, &manifest)?;
    writeln!(out)?;
    Ok(())
}
