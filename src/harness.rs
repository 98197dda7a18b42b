use rand::seq::SliceRandom;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::aggregate::{Aggregated, Aggregator};
use crate::error::{HarnessError, Result};
use crate::parser::{parse_output, PayloadLocator};
use crate::runner::Benchmark;

#[derive(Clone, Copy, Debug)]
pub enum Profile {
    Quick,
    Full,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Quick => "quick",
            Profile::Full => "full",
        }
    }

    pub fn repeats(&self) -> u32 {
        match self {
            Profile::Quick => 3,
            Profile::Full => 5,
        }
    }

    pub fn test_sizes(&self) -> Vec<u64> {
        match self {
            Profile::Quick => one_three_ten(1_000_000),
            Profile::Full => one_three_ten(10_000_000),
        }
    }
}

/// 1, 3, 10, 33, 100, 333, ... up to and including `max`.
pub fn one_three_ten(max: u64) -> Vec<u64> {
    let mut sizes = Vec::new();
    let mut decade = 1u64;
    while decade <= max {
        sizes.push(decade);
        let third = decade.saturating_mul(10) / 3;
        if third > decade && third <= max {
            sizes.push(third);
        }
        decade = match decade.checked_mul(10) {
            Some(next) => next,
            None => break,
        };
    }
    sizes
}

#[derive(Clone, Debug)]
pub struct SweepConfig {
    pub profile: Profile,
    pub seed: u64,
    pub repeats: u32,
    pub test_sizes: Vec<u64>,
}

impl SweepConfig {
    pub fn from_profile(profile: Profile, seed: u64) -> Self {
        Self {
            profile,
            seed,
            repeats: profile.repeats(),
            test_sizes: profile.test_sizes(),
        }
    }

    /// The profile name, or `custom` once repeats or sizes differ from it.
    pub fn profile_label(&self) -> &'static str {
        let mut defaults = self.profile.test_sizes();
        defaults.sort_unstable();
        let mut sizes = self.test_sizes.clone();
        sizes.sort_unstable();
        sizes.dedup();
        if self.repeats == self.profile.repeats() && sizes == defaults {
            self.profile.as_str()
        } else {
            "custom"
        }
    }

    pub fn rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed)
    }

    /// Sorts and dedups the sizes, then checks the sweep is non-empty.
    pub fn validate(&mut self) -> Result<()> {
        if self.repeats == 0 {
            return Err(HarnessError::InvalidConfig(
                "repeats must be at least 1".to_string(),
            ));
        }
        if self.test_sizes.is_empty() {
            return Err(HarnessError::InvalidConfig(
                "at least one test size is required".to_string(),
            ));
        }
        if self.test_sizes.contains(&0) {
            return Err(HarnessError::InvalidConfig(
                "test sizes must be positive".to_string(),
            ));
        }
        self.test_sizes.sort_unstable();
        self.test_sizes.dedup();
        Ok(())
    }

    /// Every (repeat, size) pair exactly once, in seeded random order.
    pub fn plan(&self) -> Vec<Trial> {
        let mut trials: Vec<Trial> = (0..self.repeats)
            .flat_map(|repeat| {
                self.test_sizes
                    .iter()
                    .map(move |&test_size| Trial { repeat, test_size })
            })
            .collect();
        trials.shuffle(&mut self.rng());
        trials
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Trial {
    pub repeat: u32,
    pub test_size: u64,
}

/// Observer for sweep progress; the CLI drives a progress bar from it.
pub trait Progress {
    fn trial_done(&mut self, trial: &Trial);
}

impl Progress for () {
    fn trial_done(&mut self, _trial: &Trial) {}
}

impl Progress for indicatif::ProgressBar {
    fn trial_done(&mut self, trial: &Trial) {
        self.set_message(format!("size {}", trial.test_size));
        self.inc(1);
    }
}

/// Run every planned trial in order and aggregate as results arrive.
///
/// The first failing trial aborts the sweep; the error names the repeat and
/// size that produced it.
pub fn run_sweep<B, P>(
    bench: &mut B,
    plan: &[Trial],
    locator: &PayloadLocator,
    progress: &mut P,
) -> Result<Aggregated>
where
    B: Benchmark + ?Sized,
    P: Progress + ?Sized,
{
    info!(trials = plan.len(), format = %locator.format(), "starting sweep");

    let mut aggregator = Aggregator::new();
    for trial in plan {
        run_one(bench, trial, locator, &mut aggregator).map_err(|source| HarnessError::Trial {
            repeat: trial.repeat,
            test_size: trial.test_size,
            source: Box::new(source),
        })?;
        progress.trial_done(trial);
    }

    let aggregated = aggregator.finish();
    info!(
        sizes = aggregated.rows.len(),
        measurements = aggregated.names.len(),
        "sweep finished"
    );
    Ok(aggregated)
}

fn run_one<B>(
    bench: &mut B,
    trial: &Trial,
    locator: &PayloadLocator,
    aggregator: &mut Aggregator,
) -> Result<()>
where
    B: Benchmark + ?Sized,
{
    let output = bench.run_trial(trial.test_size)?;
    let parsed = parse_output(&output.stdout, locator)?;

    if let Some(reported) = parsed.item_count {
        if reported != trial.test_size {
            warn!(
                requested = trial.test_size,
                reported, "benchmark reported a different item count"
            );
        }
    }

    aggregator.record(trial.test_size, &parsed.measurements)
}
