//! Unit tests for node models, FIFO flow movement, and the signal machine.

use dnl_core::{LinkId, NodeId, PathSet};
use dnl_link::{Link, LinkKind, LinkParams, PathFlows};
use rustc_hash::FxHashMap;

use crate::node::{FlowMap, Node};
use crate::signal::{Barrier, Phase, Ring, SignalController, SignalParams};

fn short_link(id: u32) -> Link {
    // 88 ft at 60 mi/hr: one free-flow timestep; high capacity (10 veh/step).
    Link::new(
        LinkId(id),
        format!("L{id}"),
        LinkKind::PointQueue,
        1.0,
        &LinkParams {
            free_flow_mph: 60.0,
            backward_wave_mph: 30.0,
            jam_density_vpm: 200.0,
            length_ft: 88.0,
            capacity_vph: 36_000.0,
            upstream_capacity_vph: None,
        },
    )
}

fn fm(entries: &[(u32, f64)]) -> FlowMap {
    entries.iter().map(|&(l, v)| (LinkId(l), v)).collect()
}

fn pf(entries: &[(u32, f64)]) -> PathFlows {
    entries.iter().map(|&(p, v)| (dnl_core::PathId(p), v)).collect()
}

fn transition_of(flows: &crate::node::TransitionFlows, from: u32, to: u32) -> f64 {
    flows
        .get(&LinkId(from))
        .and_then(|row| row.get(&LinkId(to)))
        .copied()
        .unwrap_or(0.0)
}

#[cfg(test)]
mod topology {
    use super::*;
    use crate::error::NodeError;

    #[test]
    fn series_requires_one_in_one_out() {
        let bad = Node::series(NodeId(0), vec![LinkId(0)], vec![LinkId(1), LinkId(2)]);
        assert!(matches!(bad, Err(NodeError::Topology { .. })));
        assert!(Node::series(NodeId(0), vec![LinkId(0)], vec![LinkId(1)]).is_ok());
    }

    #[test]
    fn diverge_requires_single_upstream() {
        let bad = Node::diverge(NodeId(0), vec![LinkId(0), LinkId(1)], vec![LinkId(2)]);
        assert!(matches!(bad, Err(NodeError::Topology { .. })));
    }

    #[test]
    fn merge_rejects_nonpositive_priority() {
        let mut priorities = FxHashMap::default();
        priorities.insert(LinkId(0), 3.0);
        priorities.insert(LinkId(1), 0.0);
        let bad = Node::merge(NodeId(0), vec![LinkId(0), LinkId(1)], vec![LinkId(2)], priorities);
        assert!(matches!(bad, Err(NodeError::NonPositivePriority { .. })));
    }

    #[test]
    fn merge_rejects_missing_priority() {
        let mut priorities = FxHashMap::default();
        priorities.insert(LinkId(0), 3.0);
        let bad = Node::merge(NodeId(0), vec![LinkId(0), LinkId(1)], vec![LinkId(2)], priorities);
        assert!(matches!(bad, Err(NodeError::MissingPriority { .. })));
    }
}

#[cfg(test)]
mod series {
    use super::*;

    #[test]
    fn transition_is_min_of_s_and_r() {
        let mut node = Node::series(NodeId(0), vec![LinkId(0)], vec![LinkId(1)]).unwrap();
        let flows = node.transition_flows(
            0,
            fm(&[(0, 3.0)]),
            fm(&[(1, 2.0)]),
            &Default::default(),
        );
        assert_eq!(transition_of(&flows, 0, 1), 2.0);
    }
}

#[cfg(test)]
mod ramp_meter {
    use super::*;

    #[test]
    fn passes_through_until_a_rate_is_commanded() {
        let mut node = Node::ramp_meter(NodeId(0), vec![LinkId(0)], vec![LinkId(1)]).unwrap();
        let flows = node.transition_flows(
            0,
            fm(&[(0, 5.0)]),
            fm(&[(1, 9.0)]),
            &Default::default(),
        );
        assert_eq!(transition_of(&flows, 0, 1), 5.0);
    }

    #[test]
    fn commanded_rate_caps_the_flow_and_history_records_it() {
        let mut node = Node::ramp_meter(NodeId(0), vec![LinkId(0)], vec![LinkId(1)]).unwrap();
        node.set_meter_rate(0.1);
        for t in 0..5 {
            let flows = node.transition_flows(
                t,
                fm(&[(0, 5.0)]),
                fm(&[(1, 9.0)]),
                &Default::default(),
            );
            assert!(transition_of(&flows, 0, 1) <= 0.1 + 1e-12);
        }
        let history = node.meter_flows().unwrap();
        assert_eq!(history.len(), 5);
        assert!(history.iter().all(|&f| (f - 0.1).abs() < 1e-12));
    }

    #[test]
    fn reset_clears_history() {
        let mut node = Node::ramp_meter(NodeId(0), vec![LinkId(0)], vec![LinkId(1)]).unwrap();
        node.set_meter_rate(0.5);
        node.transition_flows(0, fm(&[(0, 1.0)]), fm(&[(1, 1.0)]), &Default::default());
        node.reset_state();
        assert!(node.meter_flows().unwrap().is_empty());
    }
}

#[cfg(test)]
mod diverge {
    use super::*;
    use crate::node::Proportions;

    fn proportions(entries: &[(u32, f64)]) -> Proportions {
        let mut row = FxHashMap::default();
        for &(out, p) in entries {
            row.insert(LinkId(out), p);
        }
        let mut prop = Proportions::default();
        prop.insert(LinkId(0), row);
        prop
    }

    #[test]
    fn unconstrained_split_follows_proportions() {
        let mut node =
            Node::diverge(NodeId(0), vec![LinkId(0)], vec![LinkId(1), LinkId(2)]).unwrap();
        let flows = node.transition_flows(
            0,
            fm(&[(0, 4.0)]),
            fm(&[(1, 10.0), (2, 10.0)]),
            &proportions(&[(1, 0.75), (2, 0.25)]),
        );
        assert!((transition_of(&flows, 0, 1) - 3.0).abs() < 1e-12);
        assert!((transition_of(&flows, 0, 2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tightest_out_link_throttles_all_movements() {
        let mut node =
            Node::diverge(NodeId(0), vec![LinkId(0)], vec![LinkId(1), LinkId(2)]).unwrap();
        let flows = node.transition_flows(
            0,
            fm(&[(0, 4.0)]),
            fm(&[(1, 1.5), (2, 10.0)]),
            &proportions(&[(1, 0.75), (2, 0.25)]),
        );
        // f = R_1 / (S · p_1) = 1.5 / 3 = 0.5 binds both movements.
        assert!((transition_of(&flows, 0, 1) - 1.5).abs() < 1e-12);
        assert!((transition_of(&flows, 0, 2) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_proportion_out_link_does_not_constrain() {
        let mut node =
            Node::diverge(NodeId(0), vec![LinkId(0)], vec![LinkId(1), LinkId(2)]).unwrap();
        let flows = node.transition_flows(
            0,
            fm(&[(0, 4.0)]),
            fm(&[(1, 10.0), (2, 0.0)]),
            &proportions(&[(1, 1.0), (2, 0.0)]),
        );
        assert!((transition_of(&flows, 0, 1) - 4.0).abs() < 1e-12);
        assert_eq!(transition_of(&flows, 0, 2), 0.0);
    }
}

#[cfg(test)]
mod merge {
    use super::*;

    fn merge_node() -> Node {
        let mut priorities = FxHashMap::default();
        priorities.insert(LinkId(0), 3.0); // mainline
        priorities.insert(LinkId(1), 1.0); // ramp
        Node::merge(NodeId(0), vec![LinkId(0), LinkId(1)], vec![LinkId(2)], priorities).unwrap()
    }

    #[test]
    fn supply_constrained_split_follows_priorities() {
        let mut node = merge_node();
        let flows = node.transition_flows(
            0,
            fm(&[(0, 10.0), (1, 10.0)]),
            fm(&[(2, 4.0)]),
            &Default::default(),
        );
        assert!((transition_of(&flows, 0, 2) - 3.0).abs() < 1e-12);
        assert!((transition_of(&flows, 1, 2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn leftover_capacity_is_reallocated() {
        let mut node = merge_node();
        let flows = node.transition_flows(
            0,
            fm(&[(0, 2.0), (1, 10.0)]),
            fm(&[(2, 8.0)]),
            &Default::default(),
        );
        // Round 1: mainline exhausts its 2 veh, ramp gets 2; round 2 hands
        // the remaining 4 veh of capacity to the ramp alone.
        assert!((transition_of(&flows, 0, 2) - 2.0).abs() < 1e-12);
        assert!((transition_of(&flows, 1, 2) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn allocation_never_exceeds_s_or_r() {
        let mut node = merge_node();
        for &(s0, s1, r) in &[(5.0, 0.5, 3.0), (0.0, 4.0, 2.0), (7.0, 7.0, 20.0)] {
            let flows = node.transition_flows(
                0,
                fm(&[(0, s0), (1, s1)]),
                fm(&[(2, r)]),
                &Default::default(),
            );
            let f0 = transition_of(&flows, 0, 2);
            let f1 = transition_of(&flows, 1, 2);
            assert!(f0 <= s0 + 1e-9 && f1 <= s1 + 1e-9);
            assert!(f0 + f1 <= r + 1e-9);
        }
    }
}

#[cfg(test)]
mod signal_machine {
    use super::*;

    fn ring(a: (u32, u32), b: (u32, u32), split: f64) -> Ring {
        Ring::new(
            [
                Phase::new(LinkId(a.0), LinkId(a.1)),
                Phase::new(LinkId(b.0), LinkId(b.1)),
            ],
            split,
        )
    }

    /// Two barriers of length 60 with four distinct phases each.
    fn controller(split: f64) -> SignalController {
        let barrier0 = Barrier::new([ring((0, 10), (1, 11), split), ring((2, 12), (3, 13), split)], 60.0);
        let barrier1 = Barrier::new([ring((4, 14), (5, 15), split), ring((6, 16), (7, 17), split)], 60.0);
        SignalController::new([barrier0, barrier1], Vec::new())
    }

    #[test]
    fn phase_counts_over_one_activation() {
        let mut ctl = controller(0.5);
        let mut first = 0;
        let mut second = 0;
        // Barrier 0 stays active while t − start ≤ 60, i.e. 61 steps.
        for t in 0..=60 {
            let [ring0, _ring1] = ctl.active_phases(t);
            match ring0.in_link.0 {
                0 => first += 1,
                1 => second += 1,
                other => panic!("barrier 1 phase {other} active too early"),
            }
        }
        // Hand-over instant 30: phases[0] while t ≤ 30 (31 steps), then phases[1].
        assert_eq!(first, 31);
        assert_eq!(second, 30);
    }

    #[test]
    fn barriers_alternate_cyclically() {
        let mut ctl = controller(0.5);
        for t in 0..=60 {
            assert!(ctl.active_phases(t)[0].in_link.0 < 4);
        }
        for t in 61..=121 {
            assert!(ctl.active_phases(t)[0].in_link.0 >= 4, "t={t}");
        }
        // Wraps back to barrier 0.
        assert!(ctl.active_phases(122)[0].in_link.0 < 4);
    }

    #[test]
    fn split_of_one_pins_first_phase() {
        let mut ctl = controller(1.0);
        for t in 0..=60 {
            assert_eq!(ctl.active_phases(t)[0].in_link, LinkId(0));
        }
    }

    #[test]
    fn split_of_zero_yields_second_phase_after_activation() {
        let mut ctl = controller(0.0);
        assert_eq!(ctl.active_phases(0)[0].in_link, LinkId(0));
        for t in 1..=60 {
            assert_eq!(ctl.active_phases(t)[0].in_link, LinkId(1));
        }
    }

    #[test]
    fn zero_length_barrier_freezes_first_phases() {
        let barrier0 = Barrier::new([ring((0, 10), (1, 11), 0.5), ring((2, 12), (3, 13), 0.5)], 0.0);
        let barrier1 = Barrier::new([ring((4, 14), (5, 15), 0.5), ring((6, 16), (7, 17), 0.5)], 0.0);
        let mut ctl = SignalController::new([barrier0, barrier1], Vec::new());
        for t in 0..20 {
            let [ring0, _] = ctl.active_phases(t);
            assert!(ring0.in_link == LinkId(0) || ring0.in_link == LinkId(4));
        }
    }

    #[test]
    fn timing_updates_take_effect_at_next_activation() {
        let mut ctl = controller(0.5);
        ctl.active_phases(0); // activates barrier 0 with split 0.5
        ctl.set_params(&SignalParams { split_00: Some(0.0), ..Default::default() });
        // Mid-activation: still the snapshotted 0.5 split.
        assert_eq!(ctl.active_phases(40)[0].in_link, LinkId(1));
        assert_eq!(ctl.active_phases(20)[0].in_link, LinkId(0));
        // After the cycle returns to barrier 0 the new split applies.
        for t in 61..=121 {
            ctl.active_phases(t);
        }
        assert_eq!(ctl.active_phases(122)[0].in_link, LinkId(0)); // activation instant
        assert_eq!(ctl.active_phases(123)[0].in_link, LinkId(1));
    }

    #[test]
    fn barrier_length_clamped_at_zero() {
        let mut ctl = controller(0.5);
        ctl.set_params(&SignalParams { barrier_0: Some(-15.0), ..Default::default() });
        assert_eq!(ctl.barriers[0].length, 0.0);
    }
}

#[cfg(test)]
mod signal_flows {
    use super::*;

    /// Intersection with both rings pinned: (L0 → L10) and (L1 → L11),
    /// plus a permissive (L0 → L11).
    fn signal_node(permissive: Vec<Phase>) -> Node {
        let ring0 = Ring::new(
            [Phase::new(LinkId(0), LinkId(10)), Phase::new(LinkId(0), LinkId(10))],
            1.0,
        );
        let ring1 = Ring::new(
            [Phase::new(LinkId(1), LinkId(11)), Phase::new(LinkId(1), LinkId(11))],
            1.0,
        );
        let barrier0 = Barrier::new([ring0.clone(), ring1.clone()], 60.0);
        let barrier1 = Barrier::new([ring0, ring1], 60.0);
        Node::signal(
            NodeId(0),
            vec![LinkId(0), LinkId(1)],
            vec![LinkId(10), LinkId(11)],
            [barrier0, barrier1],
            permissive,
        )
        .unwrap()
    }

    #[test]
    fn protected_phases_get_min_of_s_and_r() {
        let mut node = signal_node(Vec::new());
        let flows = node.transition_flows(
            0,
            fm(&[(0, 5.0), (1, 2.0)]),
            fm(&[(10, 3.0), (11, 4.0)]),
            &Default::default(),
        );
        assert_eq!(transition_of(&flows, 0, 10), 3.0);
        assert_eq!(transition_of(&flows, 1, 11), 2.0);
        assert_eq!(transition_of(&flows, 0, 11), 0.0);
    }

    #[test]
    fn permissive_phases_use_residual_receiving_capacity() {
        let mut node = signal_node(vec![Phase::new(LinkId(0), LinkId(11))]);
        let flows = node.transition_flows(
            0,
            fm(&[(0, 5.0), (1, 2.0)]),
            fm(&[(10, 3.0), (11, 4.0)]),
            &Default::default(),
        );
        // Protected (L1 → L11) consumed 2 of R = 4; the permissive left turn
        // takes the remaining 2.
        assert_eq!(transition_of(&flows, 1, 11), 2.0);
        assert_eq!(transition_of(&flows, 0, 11), 2.0);
    }

    #[test]
    fn conflicting_out_links_in_one_subphase_are_rejected() {
        let ring0 = Ring::new(
            [Phase::new(LinkId(0), LinkId(10)), Phase::new(LinkId(0), LinkId(11))],
            0.5,
        );
        let ring1 = Ring::new(
            [Phase::new(LinkId(1), LinkId(10)), Phase::new(LinkId(1), LinkId(12))],
            0.5,
        );
        let barrier0 = Barrier::new([ring0.clone(), ring1.clone()], 60.0);
        let barrier1 = Barrier::new([ring0, ring1], 60.0);
        let bad = Node::signal(
            NodeId(0),
            vec![LinkId(0), LinkId(1)],
            vec![LinkId(10), LinkId(11), LinkId(12)],
            [barrier0, barrier1],
            Vec::new(),
        );
        assert!(matches!(bad, Err(crate::error::NodeError::ConflictingPhases { .. })));
    }
}

#[cfg(test)]
mod fifo_movement {
    use super::*;

    #[test]
    fn disaggregation_rescales_to_the_sending_flow() {
        let mut paths = PathSet::new();
        let p0 = paths.intern(&[LinkId(0), LinkId(1)]);
        let p1 = paths.intern(&[LinkId(0), LinkId(2)]);

        let mut link = short_link(0);
        link.flow_in(&pf(&[(p0.0, 3.0), (p1.0, 1.0)]));
        let links = vec![link, short_link(1), short_link(2)];

        let node =
            Node::diverge(NodeId(0), vec![LinkId(0)], vec![LinkId(1), LinkId(2)]).unwrap();
        let sending = fm(&[(0, 4.0)]);
        let disagg = node.disaggregate_sending_flows(1, &sending, &links);

        let by_path = &disagg[&LinkId(0)];
        assert!((by_path[&p0] - 3.0).abs() < 1e-9);
        assert!((by_path[&p1] - 1.0).abs() < 1e-9);

        let prop = node.proportions(&disagg, &paths);
        assert!((prop[&LinkId(0)][&LinkId(1)] - 0.75).abs() < 1e-9);
        assert!((prop[&LinkId(0)][&LinkId(2)] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn silent_approach_turns_uniformly() {
        let paths = PathSet::new();
        let node =
            Node::diverge(NodeId(0), vec![LinkId(0)], vec![LinkId(1), LinkId(2)]).unwrap();
        let disagg = node.disaggregate_sending_flows(0, &fm(&[(0, 0.0)]), &[short_link(0)]);
        let prop = node.proportions(&disagg, &paths);
        assert!((prop[&LinkId(0)][&LinkId(1)] - 0.5).abs() < 1e-12);
        assert!((prop[&LinkId(0)][&LinkId(2)] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn moved_flow_lands_on_the_path_links() {
        let mut paths = PathSet::new();
        let p0 = paths.intern(&[LinkId(0), LinkId(1)]);
        let p1 = paths.intern(&[LinkId(0), LinkId(2)]);

        let mut entry = short_link(0);
        entry.flow_in(&pf(&[(p0.0, 3.0), (p1.0, 1.0)]));
        let mut links = vec![entry, short_link(1), short_link(2)];

        let mut node =
            Node::diverge(NodeId(0), vec![LinkId(0)], vec![LinkId(1), LinkId(2)]).unwrap();
        let sending = fm(&[(0, 4.0)]);
        let receiving = fm(&[(1, 1.5), (2, 10.0)]);

        let disagg = node.disaggregate_sending_flows(1, &sending, &links);
        let prop = node.proportions(&disagg, &paths);
        let trans = node.transition_flows(1, sending.clone(), receiving, &prop);
        // f = 1.5 / (4 · 0.75) = 0.5 throttles both turns.
        assert!((transition_of(&trans, 0, 1) - 1.5).abs() < 1e-9);
        assert!((transition_of(&trans, 0, 2) - 0.5).abs() < 1e-9);

        node.move_flow(&trans, &sending, &prop, &disagg, &mut links, &paths);

        assert!((links[1].upstream_path_count(1, p0) - 1.5).abs() < 1e-9);
        assert_eq!(links[1].upstream_path_count(1, p1), 0.0);
        assert!((links[2].upstream_path_count(1, p1) - 0.5).abs() < 1e-9);
        assert!((links[0].downstream_path_count(1, p0) - 1.5).abs() < 1e-9);
        assert!((links[0].downstream_count(1) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn update_node_moves_flow_through_a_series_node() {
        let mut paths = PathSet::new();
        let p0 = paths.intern(&[LinkId(0), LinkId(1)]);

        let mut entry = short_link(0);
        entry.flow_in(&pf(&[(p0.0, 2.0)]));
        let mut links = vec![entry, short_link(1)];

        let mut node = Node::series(NodeId(0), vec![LinkId(0)], vec![LinkId(1)]).unwrap();
        node.update_node(1, &mut links, &paths);

        assert!((links[0].downstream_count(1) - 2.0).abs() < 1e-9);
        assert!((links[1].upstream_path_count(1, p0) - 2.0).abs() < 1e-9);
    }
}
