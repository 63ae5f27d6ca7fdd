//! Hand-sized models with known answers.

use clap::ValueEnum;

use crate::mdps::mdp::{StateAction, TabularMdp};

fn build(name: &str, states: Vec<Vec<StateAction>>) -> TabularMdp {
    TabularMdp::new_unchecked(name, states)
}

/// Single action per state; P = [[0.9, 0.1], [0.2, 0.8]], r = (1, 0).
/// Stationary distribution (2/3, 1/3), gain 2/3.
pub fn two_state_chain() -> TabularMdp {
    build(
        "two-state chain",
        vec![
            vec![StateAction::new(1., &[(0, 0.9), (1, 0.1)])],
            vec![StateAction::new(0., &[(0, 0.2), (1, 0.8)])],
        ],
    )
}

/// Two actions per state. Action 0 mostly stays, action 1 mostly switches.
/// Staying in state 1 pays 2, switching out of state 0 costs 1.
/// Optimal policy (1, 0), gain 1.7.
pub fn two_state_choice() -> TabularMdp {
    build(
        "two-state choice",
        vec![
            vec![
                StateAction::new(0., &[(0, 0.9), (1, 0.1)]),
                StateAction::new(-1., &[(0, 0.1), (1, 0.9)]),
            ],
            vec![
                StateAction::new(2., &[(0, 0.1), (1, 0.9)]),
                StateAction::new(0., &[(0, 0.9), (1, 0.1)]),
            ],
        ],
    )
}

/// 0 -> 1 -> 0 with rewards (1, 0): unichain but periodic, gain 1/2.
pub fn deterministic_cycle() -> TabularMdp {
    build(
        "deterministic cycle",
        vec![
            vec![StateAction::new(1., &[(1, 1.)])],
            vec![StateAction::new(0., &[(0, 1.)])],
        ],
    )
}

/// Each state loops on itself, rewards (1, 0): two recurrent classes.
pub fn self_loops() -> TabularMdp {
    build(
        "self loops",
        vec![
            vec![StateAction::new(1., &[(0, 1.)])],
            vec![StateAction::new(0., &[(1, 1.)])],
        ],
    )
}

/// Three states on a lazy ring, reward `scale` in state 0 only. Gain `scale / 3`.
pub fn three_state_ring(scale: f64) -> TabularMdp {
    build(
        "three-state ring",
        vec![
            vec![StateAction::new(scale, &[(0, 0.5), (1, 0.5)])],
            vec![StateAction::new(0., &[(1, 0.5), (2, 0.5)])],
            vec![StateAction::new(0., &[(2, 0.5), (0, 0.5)])],
        ],
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MicroProblem {
    Chain,
    Choice,
    Cycle,
    SelfLoops,
    Ring,
}

impl MicroProblem {
    pub fn create(&self) -> TabularMdp {
        match self {
            MicroProblem::Chain => two_state_chain(),
            MicroProblem::Choice => two_state_choice(),
            MicroProblem::Cycle => deterministic_cycle(),
            MicroProblem::SelfLoops => self_loops(),
            MicroProblem::Ring => three_state_ring(1.),
        }
    }
}
