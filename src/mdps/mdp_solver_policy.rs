use serde::{Deserialize, Serialize};

use super::bellman::lookahead;
use super::mdp::Mdp;

/// Deterministic stationary policy: one action per state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    actions: Vec<usize>,
}

impl Policy {
    pub fn new(actions: Vec<usize>) -> Self {
        Self { actions }
    }

    pub fn action(&self, s: usize) -> usize {
        self.actions[s]
    }

    pub fn actions(&self) -> &[usize] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Greedy policy with respect to `v`: the maximizing action of every state.
pub fn extract_policy<M: Mdp + ?Sized>(mdp: &M, v: &[f64]) -> Policy {
    Policy::new((0..mdp.n_s()).map(|s| lookahead(mdp, v, s).action).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::micro;

    #[test]
    fn greedy_policy_of_exact_values() {
        let mdp = micro::two_state_choice();
        let policy = extract_policy(&mdp, &[0., 3.]);

        insta::assert_debug_snapshot!(policy, @r###"
        Policy {
            actions: [
                1,
                0,
            ],
        }
        "###);
    }

    #[test]
    fn extraction_is_idempotent() {
        let mdp = micro::two_state_choice();
        let v = [0.25, -1.5];

        assert_eq!(extract_policy(&mdp, &v), extract_policy(&mdp, &v));
    }

    #[test]
    fn single_action_models_give_trivial_policy() {
        let mdp = micro::two_state_chain();
        let policy = extract_policy(&mdp, &[3., -7.]);

        assert_eq!(policy.actions(), &[0, 0]);
        assert_eq!(policy.len(), 2);
        assert!(!policy.is_empty());
    }
}
