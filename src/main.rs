use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dvi::envs::garet::{self, GaretParams};
use dvi::envs::micro::MicroProblem;
use dvi::{solve, Centering, DviConfig, Mdp, ReferenceSelection, SolveResult, TabularMdp, UpdateRule};
use itertools::Itertools;
use rayon::prelude::*;
use tracing::Level;

#[derive(Parser)]
#[command(name = "dvi")]
#[command(version, about = "Differential value iteration for average-reward MDPs", long_about = None)]
struct Cli {
    /// Log every run at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one model and print the result as JSON
    Solve {
        #[command(flatten)]
        problem: ProblemArgs,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Run every update rule and centering scheme on one model
    Compare {
        #[command(flatten)]
        problem: ProblemArgs,

        #[command(flatten)]
        config: ConfigArgs,

        /// Step sizes to try for every combination
        #[arg(long, value_delimiter = ',', default_values_t = [1.0, 0.5])]
        step_sizes: Vec<f64>,
    },

    /// Print a GARET model as JSON
    Garet {
        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 10)]
        states: usize,

        #[arg(long, default_value_t = 2)]
        actions: usize,

        #[arg(long, default_value_t = 3)]
        branching: usize,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct ProblemArgs {
    /// JSON model file
    #[arg(long)]
    model: Option<PathBuf>,

    /// GARET instance as SEED:STATES:ACTIONS:BRANCHING
    #[arg(long)]
    garet: Option<GaretParams>,

    /// Built-in hand-sized model
    #[arg(long, value_enum)]
    micro: Option<MicroProblem>,
}

impl ProblemArgs {
    fn load(&self) -> Result<TabularMdp> {
        if let Some(path) = &self.model {
            return TabularMdp::from_json_file(path).with_context(|| format!("loading model {}", path.display()));
        }
        if let Some(params) = self.garet {
            return garet::create(params).with_context(|| format!("generating GARET {params}"));
        }
        if let Some(micro) = self.micro {
            return Ok(micro.create());
        }
        anyhow::bail!("one of --model, --garet or --micro is required")
    }
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    update_rule: Option<UpdateRule>,

    #[arg(long, value_enum)]
    centering: Option<Centering>,

    #[arg(long)]
    reference_state: Option<usize>,

    #[arg(long, value_enum)]
    reference_selection: Option<ReferenceSelection>,

    #[arg(long)]
    tolerance: Option<f64>,

    #[arg(long)]
    max_sweeps: Option<usize>,

    #[arg(long)]
    step_size: Option<f64>,

    #[arg(long)]
    gain_step_size: Option<f64>,

    #[arg(long)]
    divergence_threshold: Option<f64>,

    /// Gauss-Seidel visiting order, comma separated
    #[arg(long, value_delimiter = ',')]
    sweep_order: Option<Vec<usize>>,

    /// Compute Jacobi sweeps in parallel
    #[arg(long)]
    parallel: bool,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<DviConfig> {
        let mut c = match &self.config {
            Some(path) => DviConfig::from_json_file(path).with_context(|| format!("loading config {}", path.display()))?,
            None => DviConfig::default(),
        };

        if let Some(v) = self.update_rule {
            c.update_rule = v;
        }
        if let Some(v) = self.centering {
            c.centering = v;
        }
        if let Some(v) = self.reference_state {
            c.reference_state = v;
        }
        if let Some(v) = self.reference_selection {
            c.reference_selection = v;
        }
        if let Some(v) = self.tolerance {
            c.tolerance = v;
        }
        if let Some(v) = self.max_sweeps {
            c.max_sweeps = v;
        }
        if let Some(v) = self.step_size {
            c.step_size = v;
        }
        if let Some(v) = self.gain_step_size {
            c.gain_step_size = v;
        }
        if let Some(v) = self.divergence_threshold {
            c.divergence_threshold = v;
        }
        if let Some(v) = &self.sweep_order {
            c.sweep_order = Some(v.clone());
        }
        c.parallel |= self.parallel;

        c.validate()?;
        Ok(c)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Solve { problem, config } => {
            let mdp = problem.load()?;
            let result = solve(&mdp, &config.resolve()?).with_context(|| format!("solving {}", mdp.name()))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Compare {
            problem,
            config,
            step_sizes,
        } => {
            let mdp = problem.load()?;
            compare(&mdp, &config.resolve()?, &step_sizes)?;
        }
        Commands::Garet {
            seed,
            states,
            actions,
            branching,
        } => {
            let mdp = garet::create(GaretParams::new(seed, states, actions, branching))?;
            println!("{}", mdp.to_json_string()?);
        }
    }

    Ok(())
}

fn compare(mdp: &TabularMdp, base: &DviConfig, step_sizes: &[f64]) -> Result<()> {
    let configs = UpdateRule::value_variants()
        .iter()
        .cartesian_product(Centering::value_variants())
        .cartesian_product(step_sizes)
        .map(|((&update_rule, &centering), &step_size)| DviConfig {
            update_rule,
            centering,
            step_size,
            ..base.clone()
        })
        .collect::<Vec<_>>();
    for c in &configs {
        c.validate()?;
    }

    // Runs share the model read-only; each gets its own driver.
    let runs: Vec<(DviConfig, dvi::Result<SolveResult>)> = configs
        .into_par_iter()
        .map(|c| {
            let r = solve(mdp, &c);
            (c, r)
        })
        .collect();

    println!("{} (states: {})", mdp.name(), mdp.n_s());
    for (c, r) in runs {
        let label = format!("{:?}/{:?}/alpha={}", c.update_rule, c.centering, c.step_size);
        match r {
            Ok(r) => println!(
                "{label:<40} {}{:?} sweeps={} gain={:.9} residual={:.3e} policy=[{}]",
                if r.converged() { "" } else { "! " },
                r.status,
                r.sweeps,
                r.gain,
                r.residual,
                r.policy.actions().iter().join(",")
            ),
            Err(e) => println!("{label:<40} {e}"),
        }
    }

    Ok(())
}
