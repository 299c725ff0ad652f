//! Explicit-result rendering on `tl::expected`.
//!
//! Every fallible step is followed by a check that returns the error
//! unchanged. Guards are released by their destructors at each early return.

use std::io::{self, Write};

use super::Backend;
use super::cpp::payload_literal;
use crate::model::{FailureKind, FrameId, GuardSpec, Profile, Program};

pub struct Expected;

const RESULT_TYPE: &str = "tl::expected<int, error_t>";

impl Backend for Expected {
    fn includes(&self) -> &'static [&'static str] {
        &["<tl/expected.hpp>"]
    }

    fn return_type(&self) -> &'static str {
        RESULT_TYPE
    }

    fn signal_failure(&self, kind: FailureKind) -> String {
        format!("return tl::unexpected({});", payload_literal(kind))
    }

    fn guard_class(&self, out: &mut dyn Write) -> io::Result<()> {
        let acquire_fail = self.signal_failure(FailureKind::Acquisition);
        let trigger_fail = self.signal_failure(FailureKind::Trigger);

        write!(
            out,
            r#"class resource_guard
{{
public:
  static tl::expected<resource_guard, error_t> acquire(std::uint32_t p_channel)
  {{
    if constexpr (check_bounds_in_acquire) {{
      if (p_channel >= failure_threshold) {{
        {acquire_fail}
      }}
    }}
    registers.enable = registers.enable | channel_bit(p_channel);
    return resource_guard{{ p_channel }};
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

  tl::expected<void, error_t> trigger()
  {{
    if constexpr (check_bounds_in_trigger) {{
      if (m_channel >= failure_threshold) {{
        {trigger_fail}
      }}
    }}
    registers.trigger = registers.trigger | channel_bit(m_channel);
    return {{}};
  }}

private:
  explicit resource_guard(std::uint32_t p_channel)
    : m_channel(p_channel)
  {{
  }}

  std::uint32_t m_channel = 0;
  bool m_owned = true;
}};

"#
        )
    }

    fn acquire_guard(&self, out: &mut dyn Write, guard: &GuardSpec) -> io::Result<()> {
        let g = guard.binding;
        writeln!(
            out,
            "  auto {g} = resource_guard::acquire({});",
            guard.channel.expression()
        )?;
        writeln!(out, "  if (!{g}) {{")?;
        writeln!(out, "    return tl::unexpected({g}.error());")?;
        writeln!(out, "  }}")?;
        writeln!(
            out,
            "  if (auto status = {g}.value().trigger(); !status) {{"
        )?;
        writeln!(out, "    return tl::unexpected(status.error());")?;
        writeln!(out, "  }}")
    }

    fn call_next(&self, out: &mut dyn Write, next: FrameId, side_effect: &str) -> io::Result<()> {
        writeln!(out, "  auto next = {}();", next.function_name())?;
        writeln!(out, "  if (!next) {{")?;
        writeln!(out, "    return tl::unexpected(next.error());")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  {side_effect} = {side_effect} + next.value();")
    }

    /// Short-circuits on the first failing group.
    fn dispatch(&self, out: &mut dyn Write, entry: FrameId) -> io::Result<()> {
        writeln!(
            out,
            "  if (auto result = {}(); !result) {{",
            entry.function_name()
        )?;
        writeln!(out, "    return tl::unexpected(result.error());")?;
        writeln!(out, "  }}")
    }

    fn entry_point(&self, out: &mut dyn Write, program: &Program) -> io::Result<()> {
        writeln!(out, "{RESULT_TYPE} return_error();")?;
        writeln!(out, "{RESULT_TYPE} top_call()")?;
        writeln!(out, "{{")?;
        writeln!(out, "  auto result = return_error();")?;
        writeln!(out, "  if (!result) {{")?;
        writeln!(out, "    return tl::unexpected(result.error());")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  return result.value();")?;
        writeln!(out, "}}")?;
        writeln!(out)?;

        writeln!(out, "int main()")?;
        writeln!(out, "{{")?;
        match program.params.profile {
            Profile::Depth => {
                writeln!(out, "  auto result = top_call();")?;
                writeln!(out, "  if (!result) {{")?;
                writeln!(
                    out,
                    "    return static_cast<int>(result.error().data[0]);"
                )?;
                writeln!(out, "  }}")?;
                writeln!(out, "  return result.value();")?;
            }
            Profile::Performance => {
                writeln!(out, "  using namespace hal::literals;")?;
                writeln!(out, "  volatile int return_code = 0;")?;
                writeln!(out)?;
                writeln!(
                    out,
                    "  static hal::cortex_m::dwt_counter counter(12.0_MHz);"
                )?;
                writeln!(out, "  my_clock = &counter;")?;
                writeln!(out)?;
                writeln!(out, "  auto result = top_call();")?;
                writeln!(out, "  end = counter.uptime().ticks;")?;
                writeln!(out, "  if (!result) {{")?;
                writeln!(out, "    return_code = end - start;")?;
                writeln!(out, "  }}")?;
                writeln!(out, "  return return_code;")?;
            }
        }
        writeln!(out, "}}")?;
        writeln!(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Channel;

    fn text(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).expect("write to vec");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn acquire_and_trigger_failures_both_return() {
        let guard = GuardSpec {
            binding: "guard_b",
            channel: Channel::product(&[2, 2, 2]),
        };
        let out = text(|b| Expected.acquire_guard(b, &guard));

        assert!(out.starts_with("  auto guard_b = resource_guard::acquire(2 * 2 * 2);\n"));
        assert_eq!(out.matches("return tl::unexpected(").count(), 2);
        assert!(out.contains("return tl::unexpected(status.error());"));
    }

    #[test]
    fn trigger_failure_is_never_dropped() {
        let out = text(|b| Expected.guard_class(b));
        let trigger_fail = Expected.signal_failure(FailureKind::Trigger);
        assert_eq!(
            trigger_fail,
            "return tl::unexpected(error_t{ .data = { 0xAA, 0xBB, 0x33, 0x44 } });"
        );
        assert!(out.contains(&trigger_fail));
        assert!(out.contains("if constexpr (check_bounds_in_trigger) {"));
        assert!(!out.contains("\n        tl::unexpected("));
    }

    #[test]
    fn callee_failure_is_forwarded_unchanged() {
        let out = text(|b| Expected.call_next(b, FrameId::new(0, 2), "side_effect0"));
        let expected = [
            "  auto next = fallible_function2_group0();",
            "  if (!next) {",
            "    return tl::unexpected(next.error());",
            "  }",
            "  side_effect0 = side_effect0 + next.value();",
        ];
        assert_eq!(out.lines().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn dispatcher_checks_each_group() {
        let out = text(|b| Expected.dispatch(b, FrameId::new(7, 0)));
        assert!(out.starts_with("  if (auto result = fallible_function0_group7(); !result) {"));
    }
}
