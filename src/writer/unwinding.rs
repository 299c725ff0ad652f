//! Stack-unwinding rendering: `throw` at the origin, `catch` only in `main`.

use std::io::{self, Write};

use super::Backend;
use super::cpp::payload_literal;
use crate::model::{FailureKind, FrameId, GuardSpec, Profile, Program};

pub struct Unwinding;

impl Backend for Unwinding {
    fn includes(&self) -> &'static [&'static str] {
        &["<exception>"]
    }

    fn return_type(&self) -> &'static str {
        "int"
    }

    fn signal_failure(&self, kind: FailureKind) -> String {
        format!("throw {};", payload_literal(kind))
    }

    fn guard_class(&self, out: &mut dyn Write) -> io::Result<()> {
        let acquire_fail = self.signal_failure(FailureKind::Acquisition);
        let trigger_fail = self.signal_failure(FailureKind::Trigger);

        write!(
            out,
            r#"class resource_guard
{{
public:
  explicit resource_guard(std::uint32_t p_channel)
    : m_channel(p_channel)
  {{
    if constexpr (check_bounds_in_acquire) {{
      if (p_channel >= failure_threshold) {{
        {acquire_fail}
      }}
    }}
    registers.enable = registers.enable | channel_bit(p_channel);
  }}

  resource_guard(resource_guard&) = delete;
  resource_guard& operator=(resource_guard&) = delete;
  resource_guard(resource_guard&& p_other) noexcept
    : m_channel(p_other.m_channel)
    , m_owned(std::exchange(p_other.m_owned, false))
  {{
  }}
  resource_guard& operator=(resource_guard&&) = delete;

#if defined(NON_TRIVIAL_DTOR)
  ~resource_guard()
  {{
    if (m_owned) {{
      registers.enable = registers.enable & ~channel_bit(m_channel);
    }}
  }}
#endif

  void trigger()
  {{
    if constexpr (check_bounds_in_trigger) {{
      if (m_channel >= failure_threshold) {{
        {trigger_fail}
      }}
    }}
    registers.trigger = registers.trigger | channel_bit(m_channel);
  }}

private:
  std::uint32_t m_channel = 0;
  bool m_owned = true;
}};

"#
        )
    }

    fn acquire_guard(&self, out: &mut dyn Write, guard: &GuardSpec) -> io::Result<()> {
        writeln!(
            out,
            "  auto {} = resource_guard({});",
            guard.binding,
            guard.channel.expression()
        )?;
        writeln!(out, "  {}.trigger();", guard.binding)
    }

    fn call_next(&self, out: &mut dyn Write, next: FrameId, side_effect: &str) -> io::Result<()> {
        writeln!(
            out,
            "  {side_effect} = {side_effect} + {}();",
            next.function_name()
        )
    }

    fn dispatch(&self, out: &mut dyn Write, entry: FrameId) -> io::Result<()> {
        writeln!(out, "  {}();", entry.function_name())
    }

    fn entry_point(&self, out: &mut dyn Write, program: &Program) -> io::Result<()> {
        writeln!(out, "int return_error();")?;
        writeln!(out, "int top_call()")?;
        writeln!(out, "{{")?;
        writeln!(out, "  return return_error();")?;
        writeln!(out, "}}")?;
        writeln!(out)?;

        writeln!(out, "int main()")?;
        writeln!(out, "{{")?;
        match program.params.profile {
            Profile::Depth => {
                writeln!(out, "  volatile int return_code = 0;")?;
                writeln!(out, "  try {{")?;
                writeln!(out, "    return_code = top_call();")?;
                writeln!(out, "  }} catch (const error_t& p_error) {{")?;
                writeln!(out, "    return p_error.data[0];")?;
                writeln!(out, "  }} catch (...) {{")?;
                writeln!(out, "    return 15;")?;
                writeln!(out, "  }}")?;
            }
            Profile::Performance => {
                writeln!(out, "  using namespace hal::literals;")?;
                writeln!(
                    out,
                    "  static hal::cortex_m::dwt_counter counter(12.0_MHz);"
                )?;
                writeln!(out, "  my_clock = &counter;")?;
                writeln!(out)?;
                writeln!(out, "  volatile int return_code = 0;")?;
                writeln!(out, "  try {{")?;
                writeln!(out, "    return_code = top_call();")?;
                writeln!(
                    out,
                    "  }} catch ([[maybe_unused]] const error_t& p_error) {{"
                )?;
                writeln!(out, "    end = counter.uptime().ticks;")?;
                writeln!(out, "    return_code = end - start;")?;
                writeln!(out, "  }} catch (...) {{")?;
                writeln!(out, "    return_code = -1;")?;
                writeln!(out, "  }}")?;
            }
        }
        writeln!(out, "  return return_code;")?;
        writeln!(out, "}}")?;
        writeln!(out)?;
        Ok(())
    }

    /// Bare-metal newlib hooks the unwinder links against.
    fn runtime_support(&self, out: &mut dyn Write) -> io::Result<()> {
        write!(
            out,
            r#"extern "C"
{{
  void _exit([[maybe_unused]] int rc)
  {{
    while (true) {{
      continue;
    }}
  }}

  int kill(int, int)
  {{
    return -1;
  }}

  struct _reent* _impure_ptr = nullptr;

  int getpid()
  {{
    return 1;
  }}
}}

[[noreturn]] void halt_on_terminate() noexcept
{{
  while (true) {{
    continue;
  }}
}}

namespace __cxxabiv1 {{
std::terminate_handler __terminate_handler = halt_on_terminate;
}}

"#
        )
    }
}
