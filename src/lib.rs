pub mod cli;
pub mod model;
pub mod processor;
pub mod writer;

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::Context;
use clap::Parser;
use log::info;

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    let params = args.parameters();

    // 1. ── Process ────────────────────────────────────────────────────
    let program =
        processor::run(&params, args.discipline).with_context(|| "Invalid generation parameters")?;
    info!(
        "generating {} program: {} group(s) x depth {} ({} frames)",
        args.discipline,
        params.max_groups,
        params.max_depth,
        program.frames().count()
    );

    // 2. ── Write outputs ──────────────────────────────────────────────
    let backend = writer::backend_for(args.discipline);
    match &args.output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("Creating {}", path.display()))?;
            let mut out = BufWriter::new(file);
            writer::cpp::emit(&program, backend, &mut out)
                .and_then(|_| out.flush())
                .with_context(|| format!("Writing {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            writer::cpp::emit(&program, backend, &mut out)
                .and_then(|_| out.flush())
                .with_context(|| "Writing program to stdout")?;
        }
    }

    if let Some(path) = &args.manifest {
        let file = File::create(path).with_context(|| format!("Creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        writer::manifest::emit(&program, &mut out)
            .and_then(|_| out.flush())
            .with_context(|| format!("Writing manifest {}", path.display()))?;
    }

    Ok(())
}
