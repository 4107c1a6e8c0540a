use crate::config::Config;
use crate::config::Heuristic;
use crate::mpp::generator::Generator;
use crate::mpp::instance::Instance;
use crate::search;
use clap::Parser;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "solve", about = "Conditional-return solver for multi-agent planning instances")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Solve an instance file and print its expected value and statistics.
    Solve {
        /// Path to the instance file.
        instance: PathBuf,
        /// Disable branch-and-bound pruning.
        #[arg(long)]
        no_pruning: bool,
        /// Disable inner-loop bound tightening.
        #[arg(long)]
        no_tightening: bool,
        /// Disable single-agent completion of locally independent states.
        #[arg(long)]
        no_local_cri: bool,
        /// Disable coordination-graph decoupling.
        #[arg(long)]
        no_decoupling: bool,
        /// Show a progress bar over the top-level joint actions.
        #[arg(long)]
        progress: bool,
        /// Reward assignment: balanced | lowest-degree | highest-degree | random:<seed>.
        #[arg(long, default_value = "balanced")]
        heuristic: String,
        /// Timeout budget in milliseconds; -1 means unbounded.
        #[arg(long, default_value_t = -1)]
        timeout_ms: i64,
        /// Write one human-readable dump per CRG plus the final policy here.
        #[arg(long)]
        debug_dir: Option<PathBuf>,
        /// Print the reconstructed policy, one block per time step.
        #[arg(long)]
        policy: bool,
    },
    /// Generate a random instance file.
    Generate {
        /// Where to write the instance.
        out: PathBuf,
        #[arg(long, default_value_t = 3)]
        agents: usize,
        #[arg(long, default_value_t = 2)]
        tasks: usize,
        /// Zero sizes the horizon to the worst-case workload.
        #[arg(long, default_value_t = 0)]
        horizon: usize,
        /// Probability of a shared rule per cross-agent task pair.
        #[arg(long, default_value_t = 0.3)]
        interaction: f64,
        #[arg(long)]
        must_complete: bool,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

pub fn run() -> anyhow::Result<()> {
    match Args::parse().command {
        Command::Solve {
            instance,
            no_pruning,
            no_tightening,
            no_local_cri,
            no_decoupling,
            progress,
            heuristic,
            timeout_ms,
            debug_dir,
            policy,
        } => {
            let config = Config {
                bb_pruning: !no_pruning,
                bb_tightening: !no_pruning && !no_tightening,
                local_cri: !no_local_cri,
                decouple_cri: !no_decoupling,
                show_progress: progress,
                assignment: Heuristic::try_from(heuristic.as_str())?,
                max_runtime_ms: timeout_ms,
                debug_dir,
            };
            let instance = Instance::read(&instance)?;
            let domain = instance.domain()?;
            let solution = search::solve(&domain, &config)?;
            let value = solution.policy.expected_value().to_string();
            println!(
                "{} {}",
                "expected value".bold(),
                value.as_str().green().bold()
            );
            println!("{}", solution.stats);
            if policy {
                solution.policy.dump(std::io::stdout().lock())?;
            }
            Ok(())
        }
        Command::Generate {
            out,
            agents,
            tasks,
            horizon,
            interaction,
            must_complete,
            seed,
        } => {
            let instance = Generator {
                crews: agents,
                tasks,
                horizon,
                interaction,
                must_complete,
                seed,
            }
            .generate();
            instance.write(&out)?;
            log::info!("wrote {} agents to {}", agents, out.display());
            Ok(())
        }
    }
}
