use propagation_gen::model::{Discipline, GenerationParameters, Profile};
use propagation_gen::processor::{self, sim::Machine};
use propagation_gen::writer;
use proptest::prelude::*;

fn params(
    profile: Profile,
    depth: u32,
    groups: u32,
    threshold: Option<u32>,
) -> GenerationParameters {
    let mut p = GenerationParameters::defaults(profile, Discipline::Unwinding);
    p.max_depth = depth;
    p.max_groups = groups;
    p.failure_threshold = threshold.map(|t| t.min(depth));
    p
}

fn profile() -> impl Strategy<Value = Profile> {
    prop_oneof![Just(Profile::Depth), Just(Profile::Performance)]
}

proptest! {
    #[test]
    fn frame_and_entry_counts_match_parameters(
        profile in profile(),
        depth in 1u32..40,
        groups in 1u32..8,
    ) {
        let p = params(profile, depth, groups, None);
        let program = processor::run(&p, Discipline::Result).unwrap();

        prop_assert_eq!(program.chains.len(), groups as usize);
        prop_assert_eq!(program.entry_points().len(), groups as usize);
        for chain in &program.chains {
            prop_assert_eq!(chain.frames.len(), depth as usize + 1);
            prop_assert_eq!(chain.termination().map(|f| f.id.depth), Some(depth));
        }
    }

    #[test]
    fn guards_balance_on_every_path(
        profile in profile(),
        depth in 1u32..60,
        groups in 1u32..4,
        threshold in proptest::option::of(0u32..60),
    ) {
        let p = params(profile, depth, groups, threshold);
        let program = processor::run(&p, Discipline::Unwinding).unwrap();
        let mut machine = Machine::new(&program);
        machine.run();

        prop_assert_eq!(machine.registers.enable, 0);
        for counts in machine.all_counts().values() {
            prop_assert!(counts.balanced());
            prop_assert!(counts.triggers <= counts.acquires);
        }
    }

    #[test]
    fn rendering_is_deterministic(
        profile in profile(),
        depth in 1u32..20,
        groups in 1u32..4,
        result in any::<bool>(),
    ) {
        let discipline = if result { Discipline::Result } else { Discipline::Unwinding };
        let p = params(profile, depth, groups, None);
        let a = writer::render(&processor::run(&p, discipline).unwrap()).unwrap();
        let b = writer::render(&processor::run(&p, discipline).unwrap()).unwrap();
        prop_assert_eq!(a, b);
    }
}
