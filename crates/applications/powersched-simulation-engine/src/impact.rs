//! Battery impact model
//!
//! Keeps a comparative battery-impact score for every scheduling discipline and
//! highlights the one currently playing. While a run is active the scores wander
//! with a bounded random walk so the dashboard reflects a live estimate.
//!
//! ## Baselines
//!
//! Scores are demo estimates, not measurements. Which table is loaded depends on
//! the discipline being played: each entry is the impact of discipline X as seen
//! while Y runs. All tables are configurable through [`ImpactBaselines`].
//!
//! ## Drift
//!
//! Every score moves by an independent step of ±[2, 8] and is clamped to [10, 90].
//! The RNG is injected so tests can pin the seed.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::types::AlgorithmKind;

/// Lowest score a discipline can have
pub const SCORE_MIN: u32 = 10;

/// Highest score a discipline can have
pub const SCORE_MAX: u32 = 90;

/// Smallest drift step magnitude
pub const DRIFT_STEP_MIN: u32 = 2;

/// Largest drift step magnitude
pub const DRIFT_STEP_MAX: u32 = 8;

/// Default period between drift updates
pub const DEFAULT_DRIFT_PERIOD: Duration = Duration::from_millis(2000);

/// Per-discipline scores
pub type ImpactScores = BTreeMap<AlgorithmKind, u32>;

fn clamp_score(score: i64) -> u32 {
    score.clamp(SCORE_MIN as i64, SCORE_MAX as i64) as u32
}

/// Scores for every discipline plus the highlighted one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactTable {
    scores: ImpactScores,
    active: Option<AlgorithmKind>,
}

impl ImpactTable {
    /// Table with every discipline at `scores` (missing ones at [`SCORE_MIN`]), nothing active
    pub fn new(scores: &ImpactScores) -> Self {
        let scores = AlgorithmKind::ALL
            .iter()
            .map(|kind| {
                let score = scores.get(kind).copied().unwrap_or(SCORE_MIN);
                (*kind, clamp_score(score as i64))
            })
            .collect();

        ImpactTable {
            scores,
            active: None,
        }
    }

    pub fn score(&self, algorithm: AlgorithmKind) -> u32 {
        self.scores.get(&algorithm).copied().unwrap_or(SCORE_MIN)
    }

    pub fn scores(&self) -> &ImpactScores {
        &self.scores
    }

    /// Highlighted discipline, if a run is playing
    pub fn active(&self) -> Option<AlgorithmKind> {
        self.active
    }

    pub fn is_active(&self, algorithm: AlgorithmKind) -> bool {
        self.active == Some(algorithm)
    }
}

/// Baseline score tables, keyed by the discipline being played
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactBaselines {
    /// Scores shown when nothing is playing
    pub idle: ImpactScores,
    /// Scores loaded when a given discipline starts playing
    pub running: BTreeMap<AlgorithmKind, ImpactScores>,
}

fn scores(fcfs: u32, round_robin: u32, sjf: u32, srtf: u32, priority: u32) -> ImpactScores {
    BTreeMap::from([
        (AlgorithmKind::Fcfs, fcfs),
        (AlgorithmKind::RoundRobin, round_robin),
        (AlgorithmKind::Sjf, sjf),
        (AlgorithmKind::Srtf, srtf),
        (AlgorithmKind::Priority, priority),
    ])
}

impl Default for ImpactBaselines {
    fn default() -> Self {
        Self {
            idle: scores(25, 30, 20, 35, 40),
            running: BTreeMap::from([
                (AlgorithmKind::Fcfs, scores(45, 60, 35, 70, 80)),
                (AlgorithmKind::RoundRobin, scores(35, 75, 30, 55, 65)),
                (AlgorithmKind::Priority, scores(30, 50, 25, 60, 85)),
                (AlgorithmKind::Sjf, scores(40, 55, 30, 65, 70)),
                (AlgorithmKind::Srtf, scores(35, 60, 30, 75, 70)),
            ]),
        }
    }
}

impl ImpactBaselines {
    /// Table to load when `algorithm` starts playing (idle table if none is configured)
    pub fn for_algorithm(&self, algorithm: AlgorithmKind) -> &ImpactScores {
        self.running.get(&algorithm).unwrap_or(&self.idle)
    }
}

/// Battery impact model with an injectable random source
pub struct BatteryImpactModel<R = StdRng> {
    table: ImpactTable,
    baselines: ImpactBaselines,
    rng: R,
}

impl BatteryImpactModel<StdRng> {
    /// Create a model seeded from OS entropy
    pub fn new(baselines: ImpactBaselines) -> Self {
        Self::with_rng(baselines, StdRng::from_entropy())
    }

    /// Create a model with a fixed seed (reproducible drift)
    pub fn seeded(baselines: ImpactBaselines, seed: u64) -> Self {
        Self::with_rng(baselines, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> BatteryImpactModel<R> {
    /// Create a model using `rng` for drift
    pub fn with_rng(baselines: ImpactBaselines, rng: R) -> Self {
        BatteryImpactModel {
            table: ImpactTable::new(&baselines.idle),
            baselines,
            rng,
        }
    }

    pub fn table(&self) -> &ImpactTable {
        &self.table
    }

    /// Replace the supplied scores (clamped) and highlight `active`
    ///
    /// Disciplines absent from `scores` keep their current value.
    pub fn set_impacts(&mut self, scores: &ImpactScores, active: Option<AlgorithmKind>) {
        for (algorithm, score) in scores {
            self.table.scores.insert(*algorithm, clamp_score(*score as i64));
        }
        self.table.active = active;

        debug!(active = ?active, "Battery impact table replaced");
    }

    /// Load the baseline table for `algorithm` and highlight it
    pub fn apply_baseline(&mut self, algorithm: AlgorithmKind) {
        let baseline = self.baselines.for_algorithm(algorithm).clone();
        self.set_impacts(&baseline, Some(algorithm));
    }

    /// Perturb every score by ±[2, 8], clamped to [10, 90]
    ///
    /// Returns `false` without touching the table when nothing is active.
    pub fn drift(&mut self) -> bool {
        if self.table.active.is_none() {
            return false;
        }

        for score in self.table.scores.values_mut() {
            let step = self.rng.gen_range(DRIFT_STEP_MIN..=DRIFT_STEP_MAX) as i64;
            let delta = if self.rng.gen_bool(0.5) { step } else { -step };
            *score = clamp_score(*score as i64 + delta);
        }

        trace!(scores = ?self.table.scores, "Battery impact drift applied");
        true
    }

    /// Remove the highlight, keeping the current scores
    pub fn clear_active(&mut self) {
        self.table.active = None;
    }

    /// Back to the idle table with nothing highlighted
    pub fn reset(&mut self) {
        self.table = ImpactTable::new(&self.baselines.idle);
    }
}
