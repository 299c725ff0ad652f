//! Component 4 – rendering.
//!
//! `cpp` owns the layout of the generated translation unit; a `Backend`
//! supplies the pieces that differ between propagation disciplines: how a
//! failure is signalled, how a guard is acquired and how a callee's result
//! is checked.
pub mod cpp;
pub mod expected;
pub mod manifest;
pub mod unwinding;

use std::io::{self, Write};

use crate::model::{Discipline, FailureKind, FrameId, GuardSpec, Program};

pub trait Backend {
    /// Extra headers after the common ones.
    fn includes(&self) -> &'static [&'static str];

    /// Return type of every frame, the dispatcher and `top_call`.
    fn return_type(&self) -> &'static str;

    /// Statement that leaves the current function with `kind`'s payload.
    fn signal_failure(&self, kind: FailureKind) -> String;

    /// `resource_guard` class definition.
    fn guard_class(&self, out: &mut dyn Write) -> io::Result<()>;

    /// Acquire and trigger one guard inside a frame body.
    fn acquire_guard(&self, out: &mut dyn Write, guard: &GuardSpec) -> io::Result<()>;

    /// Call the next frame and fold its value into `side_effect`.
    fn call_next(&self, out: &mut dyn Write, next: FrameId, side_effect: &str) -> io::Result<()>;

    /// One group entry call inside the `return_error` dispatcher.
    fn dispatch(&self, out: &mut dyn Write, entry: FrameId) -> io::Result<()>;

    /// `top_call` and `main`, which form the only failure boundary.
    fn entry_point(&self, out: &mut dyn Write, program: &Program) -> io::Result<()>;

    /// Anything the target runtime needs after `main`.
    fn runtime_support(&self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

pub fn backend_for(discipline: Discipline) -> &'static dyn Backend {
    match discipline {
        Discipline::Unwinding => &unwinding::Unwinding,
        Discipline::Result => &expected::Expected,
    }
}

/// Renders `program` with the backend matching its discipline.
pub fn render(program: &Program) -> io::Result<String> {
    let mut buf = Vec::new();
    cpp::emit(program, backend_for(program.discipline), &mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
