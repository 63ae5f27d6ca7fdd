//! Differential value iteration for average-reward Markov Decision Processes.

pub mod config;
pub mod envs;
pub mod error;
pub mod mdps;

pub use config::{Centering, DviConfig, ReferenceSelection, UpdateRule};
pub use error::{Error, ModelError, Result};
pub use mdps::mdp::{Mdp, StateAction, Successor, TabularMdp};
pub use mdps::mdp_solver::MdpSolver;
pub use mdps::mdp_solver_policy::{extract_policy, Policy};
pub use mdps::solvers::dvi::{evaluate_policy, solve, DifferentialValueIteration, DriverState, SolveResult};
