//! One-step lookahead of the undiscounted Bellman optimality operator.

use serde::{Deserialize, Serialize};

use super::mdp::Mdp;

/// Best action-value of a state and the action achieving it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Greedy {
    pub value: f64,
    pub action: usize,
}

/// Q(s, a) = r(s, a) + sum_s' P(s'|s, a) v(s')
pub fn q_value<M: Mdp + ?Sized>(mdp: &M, v: &[f64], s: usize, a: usize) -> f64 {
    mdp.reward(s, a)
        + mdp
            .successors(s, a)
            .iter()
            .map(|t| t.probability * v[t.next_state])
            .sum::<f64>()
}

/// max_a Q(s, a). Ties go to the lowest action index.
pub fn lookahead<M: Mdp + ?Sized>(mdp: &M, v: &[f64], s: usize) -> Greedy {
    let mut best = Greedy {
        value: q_value(mdp, v, s, 0),
        action: 0,
    };
    for a in 1..mdp.n_a(s) {
        let q = q_value(mdp, v, s, a);
        if q > best.value {
            best = Greedy { value: q, action: a };
        }
    }

    best
}

/// Bracket on the optimal gain implied by a value vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainBounds {
    pub lower: f64,
    pub upper: f64,
}

impl GainBounds {
    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, g: f64) -> bool {
        self.lower <= g && g <= self.upper
    }
}

/// Odoni bounds: min_s (Tv - v)(s) <= g* <= max_s (Tv - v)(s).
pub fn gain_bounds<M: Mdp + ?Sized>(mdp: &M, v: &[f64]) -> GainBounds {
    (0..mdp.n_s())
        .map(|s| lookahead(mdp, v, s).value - v[s])
        .fold(
            GainBounds {
                lower: f64::INFINITY,
                upper: f64::NEG_INFINITY,
            },
            |b, d| GainBounds {
                lower: b.lower.min(d),
                upper: b.upper.max(d),
            },
        )
}
