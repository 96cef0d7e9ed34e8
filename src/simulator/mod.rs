// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/defectfit

//! Synthetic batch generator for demo runs and tests

use anyhow::{bail, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Binomial, Distribution, Gamma, Poisson};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::BatchRecord;
use crate::config::SimulatorConfig;

/// Process generating the defect count of each batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimulationProfile {
    /// Defects ~ Poisson(mean)
    Poisson { mean: f64 },
    /// Each item independently defective with probability `p`
    Binomial { p: f64 },
    /// Gamma-mixed Poisson; smaller `dispersion` means heavier tails
    Overdispersed { mean: f64, dispersion: f64 },
}

impl SimulationProfile {
    fn validate(&self) -> Result<()> {
        match *self {
            SimulationProfile::Poisson { mean } if !(mean.is_finite() && mean >= 0.0) => {
                bail!("Poisson mean must be finite and non-negative, got {}", mean)
            }
            SimulationProfile::Binomial { p } if !(0.0..=1.0).contains(&p) => {
                bail!("Binomial p must lie in [0, 1], got {}", p)
            }
            SimulationProfile::Overdispersed { mean, dispersion }
                if !(mean.is_finite()
                    && mean > 0.0
                    && dispersion.is_finite()
                    && dispersion > 0.0) =>
            {
                bail!(
                    "Overdispersed profile needs positive mean and dispersion, \
                     got mean={} dispersion={}",
                    mean,
                    dispersion
                )
            }
            _ => Ok(()),
        }
    }
}

/// Seeded, reproducible batch generator
pub struct BatchSimulator {
    config: SimulatorConfig,
    rng: ChaCha8Rng,
}

impl BatchSimulator {
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        config.profile.validate()?;
        if config.batch_size == 0 {
            bail!("batch size must be at least 1");
        }

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
        })
    }

    /// Generate `config.batches` records
    pub fn generate(&mut self) -> Result<Vec<BatchRecord>> {
        let records = (0..self.config.batches)
            .map(|_| self.next_record())
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Simulated {} batches of {} items ({:?})",
            records.len(),
            self.config.batch_size,
            self.config.profile
        );
        Ok(records)
    }

    fn next_record(&mut self) -> Result<BatchRecord> {
        let size = self.config.batch_size;
        let defects = match self.config.profile {
            SimulationProfile::Poisson { mean } => self.poisson(mean)?,
            SimulationProfile::Binomial { p } => Binomial::new(size, p)?.sample(&mut self.rng),
            SimulationProfile::Overdispersed { mean, dispersion } => {
                // λ ~ Gamma(r, mean / r) gives a negative binomial count
                let rate = Gamma::new(dispersion, mean / dispersion)?.sample(&mut self.rng);
                self.poisson(rate)?
            }
        };

        Ok(BatchRecord::new(size, defects.min(size)))
    }

    fn poisson(&mut self, mean: f64) -> Result<u64> {
        if mean <= 0.0 {
            return Ok(0);
        }
        let draw: f64 = Poisson::new(mean)?.sample(&mut self.rng);
        Ok(draw as u64)
    }
}
