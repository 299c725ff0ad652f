//! Builds one group's call chain as IR frames.

use crate::model::{Chain, Channel, Frame, FrameId, FrameKind, GuardSpec, Profile};

const GUARD_BINDINGS: [&str; 2] = ["guard_a", "guard_b"];

/// Channels for a regular frame. The depth profile squares the depth so deep
/// chains spread across the register; the performance profile keeps them
/// linear.
fn regular_channels(profile: Profile, depth: u32) -> [Channel; 2] {
    match profile {
        Profile::Depth => [
            Channel::product(&[depth, depth]),
            Channel::product(&[depth, depth, 2]),
        ],
        Profile::Performance => [Channel::product(&[depth]), Channel::product(&[depth, 2])],
    }
}

fn termination_channels(group: u32, max_depth: u32) -> [Channel; 2] {
    [
        Channel::product(&[group, max_depth]),
        Channel::product(&[group, max_depth, 2]),
    ]
}

fn guards(channels: [Channel; 2]) -> Vec<GuardSpec> {
    GUARD_BINDINGS
        .iter()
        .zip(channels)
        .map(|(&binding, channel)| GuardSpec { binding, channel })
        .collect()
}

/// `max_depth` regular frames followed by the termination frame at
/// `depth == max_depth`.
pub fn build_chain(group: u32, max_depth: u32, profile: Profile) -> Chain {
    let mut frames = Vec::with_capacity(max_depth as usize + 1);

    for depth in 0..max_depth {
        frames.push(Frame {
            id: FrameId::new(group, depth),
            kind: FrameKind::Regular {
                next: FrameId::new(group, depth + 1),
            },
            guards: guards(regular_channels(profile, depth)),
        });
    }

    frames.push(Frame {
        id: FrameId::new(group, max_depth),
        kind: FrameKind::Termination,
        guards: guards(termination_channels(group, max_depth)),
    });

    Chain { group, frames }
}
