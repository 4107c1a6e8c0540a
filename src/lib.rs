pub mod cli;
pub mod config;
pub mod crg;
pub mod domain;
pub mod error;
pub mod model;
pub mod mpp;
pub mod search;

#[cfg(test)]
pub mod testing;

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Expected values, rewards, and bound components.
pub type Utility = f64;
/// Transition likelihoods and sampling weights.
pub type Probability = f64;
/// Discrete decision epochs, `0..=horizon`.
pub type Time = usize;
/// Dense agent identifier, usable as an array index.
pub type AgentId = usize;

// ============================================================================
// NUMERICS
// ============================================================================
/// Tolerance for probability closure and scalarized value comparison.
pub const EPSILON: f64 = 1e-8;

// ============================================================================
// TRAITS
// ============================================================================
/// Random instance generation for testing.
pub trait Arbitrary {
    /// Generate a uniformly random instance.
    fn random() -> Self;
}

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================

/// Cooperative wall-clock budget. The solver polls `check()` at the entry of
/// every graph-construction and search recursion; exceeding the budget
/// surfaces as a dedicated timeout failure and unwinds the solve.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    limit: Option<std::time::Instant>,
}

impl Deadline {
    /// A budget of `ms` milliseconds from now; zero or negative means unbounded.
    pub fn after(ms: i64) -> Self {
        Self {
            limit: (ms > 0).then(|| {
                std::time::Instant::now() + std::time::Duration::from_millis(ms as u64)
            }),
        }
    }
    pub fn unbounded() -> Self {
        Self { limit: None }
    }
    pub fn check(&self) -> Result<(), crate::error::SolveError> {
        match self.limit {
            Some(limit) if std::time::Instant::now() >= limit => {
                Err(crate::error::SolveError::Timeout)
            }
            _ => Ok(()),
        }
    }
}

/// Progress over the root joint-action sweep. A solve spends its wall
/// clock inside a handful of deep recursions, so the bar advances rarely;
/// the steady tick keeps the elapsed readout honest in between.
pub fn progress(n: usize) -> indicatif::ProgressBar {
    let template = "{pos:>3}/{len:3} joint actions {bar:40.green} {elapsed_precise}";
    let bar = indicatif::ProgressBar::new(n as u64);
    bar.set_style(indicatif::ProgressStyle::with_template(template).expect("static template"));
    bar.enable_steady_tick(std::time::Duration::from_millis(250));
    bar
}

/// Route `info` to stderr so solver output on stdout stays pipeable. The
/// full `debug` trace (per-CRG construction summaries) is only written when
/// `SOLVE_LOG` names a file; a batch solver has no business littering the
/// working directory with log files nobody asked for.
pub fn log() {
    let config = simplelog::ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();
    let mut sinks: Vec<Box<dyn simplelog::SharedLogger>> = vec![simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )];
    if let Ok(path) = std::env::var("SOLVE_LOG") {
        match std::fs::File::create(&path) {
            Ok(file) => sinks.push(simplelog::WriteLogger::new(
                log::LevelFilter::Debug,
                config,
                file,
            )),
            Err(error) => eprintln!("cannot open {}: {}", path, error),
        }
    }
    simplelog::CombinedLogger::init(sinks).expect("logger initialized once");
}
