//! Emit the C++ translation unit shared by both disciplines.

use std::io::{self, Write};

use super::Backend;
use crate::model::{Chain, FailureKind, Frame, FrameId, FrameKind, Profile, Program};

pub fn emit(program: &Program, backend: &dyn Backend, out: &mut dyn Write) -> io::Result<()> {
    preamble(program, backend, out)?;
    backend.guard_class(out)?;
    if program.params.profile == Profile::Performance {
        clock_globals(out)?;
    }
    backend.entry_point(out, program)?;
    backend.runtime_support(out)?;

    writeln!(
        out,
        "// ============================================================================="
    )?;
    writeln!(out, "// Generated call chains")?;
    writeln!(
        out,
        "// ============================================================================="
    )?;
    forward_declarations(program, backend, out)?;
    dispatcher(program, backend, out)?;

    for chain in &program.chains {
        for frame in &chain.frames {
            match frame.kind {
                FrameKind::Regular { next } => regular_frame(chain, frame, next, backend, out)?,
                FrameKind::Termination => termination_frame(program, chain, frame, backend, out)?,
            }
        }
    }
    Ok(())
}

/// `error_t{ .data = { 0x55, 0xAA, 0x33, 0x44 } }`
pub fn payload_literal(kind: FailureKind) -> String {
    let bytes = kind
        .payload()
        .iter()
        .map(|b| format!("0x{b:02X}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("error_t{{ .data = {{ {bytes} }} }}")
}

fn preamble(program: &Program, backend: &dyn Backend, out: &mut dyn Write) -> io::Result<()> {
    let p = &program.params;

    writeln!(out, "// Auto-generated – DO NOT EDIT")?;
    writeln!(
        out,
        "// discipline: {}, profile: {}, max_depth: {}, max_groups: {}",
        program.discipline, p.profile, p.max_depth, p.max_groups
    )?;
    writeln!(out)?;

    if p.non_trivial_destructor {
        writeln!(out, "#define NON_TRIVIAL_DTOR 1")?;
        writeln!(out)?;
    }

    for header in ["<array>", "<cstddef>", "<cstdint>", "<utility>"] {
        writeln!(out, "#include {header}")?;
    }
    for header in backend.includes() {
        writeln!(out, "#include {header}")?;
    }
    if p.profile == Profile::Performance {
        writeln!(out)?;
        writeln!(out, "#include <libhal-armcortex/dwt_counter.hpp>")?;
    }
    writeln!(out)?;

    writeln!(out, "constexpr std::size_t error_size = {};", p.error_size)?;
    let bounded = p.failure_threshold.is_some();
    writeln!(
        out,
        "constexpr bool check_bounds_in_acquire = {};",
        bounded && p.check_acquire
    )?;
    writeln!(
        out,
        "constexpr bool check_bounds_in_trigger = {};",
        bounded && p.check_trigger
    )?;
    writeln!(
        out,
        "constexpr std::uint32_t failure_threshold = {};",
        p.failure_threshold.unwrap_or(u32::MAX)
    )?;
    writeln!(out)?;

    writeln!(out, "struct error_t")?;
    writeln!(out, "{{")?;
    writeln!(out, "  std::array<std::uint8_t, error_size> data;")?;
    writeln!(out, "}};")?;
    writeln!(out)?;

    writeln!(out, "struct simulated_registers")?;
    writeln!(out, "{{")?;
    writeln!(out, "  volatile std::uint64_t enable = 0;")?;
    writeln!(out, "  volatile std::uint64_t trigger = 0;")?;
    writeln!(out, "}};")?;
    writeln!(out)?;
    writeln!(out, "simulated_registers registers;")?;
    writeln!(out)?;

    writeln!(
        out,
        "constexpr std::uint64_t channel_bit(std::uint32_t p_channel)"
    )?;
    writeln!(out, "{{")?;
    writeln!(out, "  return std::uint64_t{{ 1 }} << (p_channel % 64);")?;
    writeln!(out, "}}")?;
    writeln!(out)?;

    Ok(())
}

fn clock_globals(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "std::uint64_t start = 0;")?;
    writeln!(out, "std::uint64_t end = 0;")?;
    writeln!(out, "hal::steady_clock* my_clock = nullptr;")?;
    writeln!(out)?;
    Ok(())
}

fn forward_declarations(
    program: &Program,
    backend: &dyn Backend,
    out: &mut dyn Write,
) -> io::Result<()> {
    writeln!(out)?;
    for chain in &program.chains {
        writeln!(out, "volatile int {} = 0;", chain.side_effect())?;
        for frame in &chain.frames {
            writeln!(
                out,
                "{} {}();",
                backend.return_type(),
                frame.id.function_name()
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// `return_error`: calls every group entry in order and sums the side effects.
fn dispatcher(program: &Program, backend: &dyn Backend, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{} return_error()", backend.return_type())?;
    writeln!(out, "{{")?;
    for entry in program.entry_points() {
        backend.dispatch(out, entry)?;
    }
    let sum = program
        .chains
        .iter()
        .map(Chain::side_effect)
        .collect::<Vec<_>>()
        .join(" + ");
    writeln!(out, "  return {sum};")?;
    writeln!(out, "}}")?;
    Ok(())
}

fn frame_header(backend: &dyn Backend, frame: &Frame, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "{} {}()",
        backend.return_type(),
        frame.id.function_name()
    )?;
    writeln!(out, "{{")?;
    for guard in &frame.guards {
        backend.acquire_guard(out, guard)?;
    }
    Ok(())
}

fn regular_frame(
    chain: &Chain,
    frame: &Frame,
    next: FrameId,
    backend: &dyn Backend,
    out: &mut dyn Write,
) -> io::Result<()> {
    let side_effect = chain.side_effect();

    frame_header(backend, frame, out)?;
    writeln!(out, "  {side_effect} = {side_effect} + 1;")?;
    backend.call_next(out, next, &side_effect)?;
    writeln!(out, "  return {side_effect};")?;
    writeln!(out, "}}")?;
    Ok(())
}

/// The volatile read keeps the failure unconditional at runtime without the
/// compiler proving the function never returns.
fn termination_frame(
    program: &Program,
    chain: &Chain,
    frame: &Frame,
    backend: &dyn Backend,
    out: &mut dyn Write,
) -> io::Result<()> {
    let side_effect = chain.side_effect();

    frame_header(backend, frame, out)?;
    writeln!(out, "  {side_effect} = {side_effect} + 1;")?;
    writeln!(out, "  if ({side_effect} >= 1) {{")?;
    if program.params.profile == Profile::Performance {
        writeln!(out, "    start = my_clock->uptime().ticks;")?;
    }
    writeln!(
        out,
        "    {}",
        backend.signal_failure(FailureKind::Termination)
    )?;
    writeln!(out, "  }}")?;
    writeln!(out, "  return {side_effect};")?;
    writeln!(out, "}}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_literal_is_hex() {
        assert_eq!(
            payload_literal(FailureKind::Acquisition),
            "error_t{ .data = { 0x55, 0xAA, 0x33, 0x44 } }"
        );
    }
}
