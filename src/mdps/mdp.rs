use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::mdp_solver_policy::Policy;
use crate::error::{Error, ModelError, Result};

/// Largest allowed deviation of a successor distribution's sum from 1.
pub const TRANSITION_SUM_TOLERANCE: f64 = 1e-6;

/// Average-reward Markov Decision Process - Puterman 1994, ch. 8.
///
/// States are `0..n_s()`; the actions of state `s` are `0..n_a(s)`.
pub trait Mdp: Send + Sync {
    fn name(&self) -> &str;

    fn n_s(&self) -> usize;

    fn n_a(&self, s: usize) -> usize;

    fn successors(&self, s: usize, a: usize) -> &[Successor];

    /// Expected immediate reward of taking `a` in `s`.
    fn reward(&self, s: usize, a: usize) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Successor {
    pub next_state: usize,
    pub probability: f64,
}

/// A single outcome carrying its own reward, as produced by environment
/// descriptions that reward the transition rather than the (state, action).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next_state: usize,
    pub probability: f64,
    pub reward: f64,
}

pub type Transitions = BTreeMap<(usize, usize), Vec<Transition>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateAction {
    pub reward: f64,
    pub successors: Vec<Successor>,
}

impl StateAction {
    pub fn new(reward: f64, successors: &[(usize, f64)]) -> Self {
        Self {
            reward,
            successors: successors
                .iter()
                .map(|&(next_state, probability)| Successor {
                    next_state,
                    probability,
                })
                .collect(),
        }
    }
}

/// Owned, validated tabular model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MdpDocument", into = "MdpDocument")]
pub struct TabularMdp {
    name: String,
    states: Vec<Vec<StateAction>>,
}

/// Serialized form of a [`TabularMdp`], unchecked.
#[derive(Debug, Serialize, Deserialize)]
pub struct MdpDocument {
    pub name: String,
    pub states: Vec<Vec<StateAction>>,
}

impl TryFrom<MdpDocument> for TabularMdp {
    type Error = Error;

    fn try_from(doc: MdpDocument) -> Result<Self> {
        Self::new(doc.name, doc.states)
    }
}

impl From<TabularMdp> for MdpDocument {
    fn from(mdp: TabularMdp) -> Self {
        Self {
            name: mdp.name,
            states: mdp.states,
        }
    }
}

impl TabularMdp {
    pub fn new(name: impl Into<String>, states: Vec<Vec<StateAction>>) -> Result<Self> {
        let mdp = Self {
            name: name.into(),
            states,
        };
        validate(&mdp)?;

        Ok(mdp)
    }

    /// Skips validation; for fixtures whose rows are known to be well formed.
    pub(crate) fn new_unchecked(name: impl Into<String>, states: Vec<Vec<StateAction>>) -> Self {
        Self {
            name: name.into(),
            states,
        }
    }

    /// Builds a model from the action-major dense layout: `transitions[a][s][s']`
    /// and `rewards[a][s]`. Every state gets every action.
    pub fn from_dense(
        name: impl Into<String>,
        transitions: &[Vec<Vec<f64>>],
        rewards: &[Vec<f64>],
    ) -> Result<Self> {
        let n_a = transitions.len();
        let n_s = transitions.first().map_or(0, |t| t.len());
        if n_a == 0 || n_s == 0 {
            return Err(ModelError::Empty.into());
        }

        let shape_err = |what, got: Vec<usize>, expected: Vec<usize>| ModelError::DenseShape {
            what,
            expected,
            got,
        };
        if rewards.len() != n_a {
            return Err(shape_err("rewards", vec![rewards.len()], vec![n_a]).into());
        }
        for (a, (t, r)) in transitions.iter().zip(rewards).enumerate() {
            if t.len() != n_s || r.len() != n_s {
                return Err(shape_err("action block", vec![a, t.len(), r.len()], vec![a, n_s, n_s]).into());
            }
            if let Some(row) = t.iter().find(|row| row.len() != n_s) {
                return Err(shape_err("transition row", vec![a, row.len()], vec![a, n_s]).into());
            }
        }

        let states = (0..n_s)
            .map(|s| {
                (0..n_a)
                    .map(|a| StateAction {
                        reward: rewards[a][s],
                        successors: transitions[a][s]
                            .iter()
                            .enumerate()
                            .filter(|(_, p)| **p != 0.)
                            .map(|(next_state, &probability)| Successor {
                                next_state,
                                probability,
                            })
                            .collect(),
                    })
                    .collect()
            })
            .collect();

        Self::new(name, states)
    }

    /// Builds a model from per-transition rewards, marginalizing them into the
    /// expected reward of each (state, action).
    pub fn from_transitions(name: impl Into<String>, n_s: usize, transitions: &Transitions) -> Result<Self> {
        let mut states: Vec<Vec<StateAction>> = vec![vec![]; n_s];
        for (&(s, a), ts) in transitions {
            if s >= n_s {
                return Err(ModelError::StateOutOfRange { state: s, n_s }.into());
            }
            // BTreeMap iterates actions of a state in ascending order.
            if a != states[s].len() {
                return Err(ModelError::MissingAction {
                    state: s,
                    action: states[s].len(),
                }
                .into());
            }
            states[s].push(StateAction {
                reward: ts.iter().map(|t| t.probability * t.reward).sum(),
                successors: ts
                    .iter()
                    .map(|t| Successor {
                        next_state: t.next_state,
                        probability: t.probability,
                    })
                    .collect(),
            });
        }

        Self::new(name, states)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        // Going through the document keeps the typed `ModelError`.
        let doc: MdpDocument = serde_json::from_str(json)?;
        Self::try_from(doc)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::Io {
            operation: format!("read model '{}'", path.display()),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Mdp for TabularMdp {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_s(&self) -> usize {
        self.states.len()
    }

    fn n_a(&self, s: usize) -> usize {
        self.states[s].len()
    }

    fn successors(&self, s: usize, a: usize) -> &[Successor] {
        &self.states[s][a].successors
    }

    fn reward(&self, s: usize, a: usize) -> f64 {
        self.states[s][a].reward
    }
}

/// The Markov reward process a fixed policy induces on a model: one action per
/// state, the one the policy picks.
pub struct PolicyInducedMdp<'a, M: Mdp + ?Sized> {
    mdp: &'a M,
    policy: &'a Policy,
    name: String,
}

impl<'a, M: Mdp + ?Sized> PolicyInducedMdp<'a, M> {
    pub fn new(mdp: &'a M, policy: &'a Policy) -> Result<Self> {
        if policy.len() != mdp.n_s() {
            return Err(Error::invalid_configuration(format!(
                "policy covers {} states, model has {}",
                policy.len(),
                mdp.n_s()
            )));
        }
        if let Some((s, &a)) = policy
            .actions()
            .iter()
            .enumerate()
            .find(|&(s, &a)| a >= mdp.n_a(s))
        {
            return Err(Error::invalid_configuration(format!(
                "policy picks action {a} in state {s}, which has {} actions",
                mdp.n_a(s)
            )));
        }

        Ok(Self {
            mdp,
            policy,
            name: format!("{} under fixed policy", mdp.name()),
        })
    }
}

impl<'a, M: Mdp + ?Sized> Mdp for PolicyInducedMdp<'a, M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_s(&self) -> usize {
        self.mdp.n_s()
    }

    fn n_a(&self, _s: usize) -> usize {
        1
    }

    fn successors(&self, s: usize, _a: usize) -> &[Successor] {
        self.mdp.successors(s, self.policy.action(s))
    }

    fn reward(&self, s: usize, _a: usize) -> f64 {
        self.mdp.reward(s, self.policy.action(s))
    }
}

/// Checks every structural invariant of a model.
pub fn validate<M: Mdp + ?Sized>(mdp: &M) -> std::result::Result<(), ModelError> {
    let n_s = mdp.n_s();
    if n_s == 0 {
        return Err(ModelError::Empty);
    }

    for state in 0..n_s {
        if mdp.n_a(state) == 0 {
            return Err(ModelError::NoActions { state });
        }

        for action in 0..mdp.n_a(state) {
            let reward = mdp.reward(state, action);
            if !reward.is_finite() {
                return Err(ModelError::NonFiniteReward { state, action, reward });
            }

            let mut sum = 0.;
            for &Successor {
                next_state,
                probability,
            } in mdp.successors(state, action)
            {
                if next_state >= n_s {
                    return Err(ModelError::SuccessorOutOfRange {
                        state,
                        action,
                        next_state,
                        n_s,
                    });
                }
                if !probability.is_finite() || probability < 0. {
                    return Err(ModelError::InvalidProbability {
                        state,
                        action,
                        next_state,
                        probability,
                    });
                }
                sum += probability;
            }

            if (sum - 1.).abs() > TRANSITION_SUM_TOLERANCE {
                return Err(ModelError::ProbabilitySum { state, action, sum });
            }
        }
    }

    Ok(())
}
