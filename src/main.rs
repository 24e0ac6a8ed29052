use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use helium_vmc::{read_config, OptimizationResult, SearchStrategy, VmcConfig, VmcError};

/// Variational Monte Carlo estimate of the helium ground-state energy
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// YAML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<String>,

    /// Master random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Independent chains per q value
    #[arg(long)]
    chains: Option<usize>,

    /// Samples retained per chain
    #[arg(long)]
    samples: Option<usize>,

    /// Minimum burn-in steps per chain
    #[arg(long)]
    burn_in: Option<usize>,

    /// Initial Metropolis step size (bohr)
    #[arg(long)]
    step_size: Option<f64>,

    /// Explicit q values, comma separated
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    q: Option<Vec<f64>>,

    /// Golden-section search between LOWER and UPPER
    #[arg(long, num_args = 2, value_names = ["LOWER", "UPPER"], conflicts_with = "q")]
    golden: Option<Vec<f64>>,

    /// Iteration budget for the golden-section search
    #[arg(long, default_value_t = 30)]
    max_iterations: usize,

    /// Print the full result as YAML
    #[arg(long)]
    yaml: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Hartree to eV conversion factor
const HA_TO_EV: f64 = 27.21138602;

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), VmcError> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => VmcConfig::default(),
    };
    apply_overrides(&mut config, args);

    let result = config.optimizer()?.optimize()?;
    if args.yaml {
        println!("{}", serde_yaml::to_string(&result)?);
    } else {
        print_results(&result);
    }
    Ok(())
}

fn apply_overrides(config: &mut VmcConfig, args: &Args) {
    if let Some(seed) = args.seed {
        config.optimizer.seed = Some(seed);
    }
    if let Some(chains) = args.chains {
        config.optimizer.n_chains = chains;
    }
    if let Some(samples) = args.samples {
        config.sampler.n_samples = samples;
    }
    if let Some(burn_in) = args.burn_in {
        config.sampler.n_burn_in = burn_in;
        config.sampler.max_burn_in = config.sampler.max_burn_in.max(burn_in);
    }
    if let Some(step_size) = args.step_size {
        config.sampler.step_size = step_size;
    }
    if let Some(values) = &args.q {
        config.optimizer.strategy = SearchStrategy::List { values: values.clone() };
    }
    if let Some(bounds) = &args.golden {
        config.optimizer.strategy = SearchStrategy::GoldenSection {
            lower: bounds[0],
            upper: bounds[1],
            max_iterations: args.max_iterations,
        };
    }
}

fn print_results(result: &OptimizationResult) {
    println!("VMC Results for the Helium Atom");
    println!("-------------------------------");
    println!("{:>8}  {:>12}  {:>10}  {:>8}", "q", "E (Ha)", "error", "tau");
    for candidate in &result.candidates {
        println!(
            "{:>8.4}  {:>12.6}  {:>10.6}  {:>8.2}",
            candidate.q,
            candidate.energy(),
            candidate.error(),
            candidate.stats.autocorrelation_time
        );
    }
    println!();

    let best = result.best();
    println!("Minimum energy:    {:.5} ± {:.5} Ha", best.energy(), best.error());
    println!("                   {:.5} ± {:.5} eV", best.energy() * HA_TO_EV, best.error() * HA_TO_EV);
    println!("Effective charge:  {:.3} e", best.q);
    if let Some((q_min, e_min)) = result.fit.and_then(|fit| fit.minimum()) {
        println!("Quadratic fit:     E = {:.5} Ha at q = {:.3}", e_min, q_min);
    }
    println!("Termination:       {:?}", result.termination);
    if !result.converged() {
        println!("Warnings:");
        for warning in &result.warnings {
            println!("  {warning}");
        }
    }
}
