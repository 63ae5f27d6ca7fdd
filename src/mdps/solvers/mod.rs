pub mod centering;
pub mod convergence;
pub mod dvi;
pub mod update_rules;
