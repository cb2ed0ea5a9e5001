//! Stage table and pure stage lookups.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One step of the cumulative-word-count progression, in growth order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PlantStage {
    #[default]
    Seed,
    Sprout,
    Pot,
    Tree,
    Flower,
    Fruit,
}

impl PlantStage {
    pub const ALL: [PlantStage; 6] = [
        PlantStage::Seed,
        PlantStage::Sprout,
        PlantStage::Pot,
        PlantStage::Tree,
        PlantStage::Flower,
        PlantStage::Fruit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Sprout => "sprout",
            Self::Pot => "pot",
            Self::Tree => "tree",
            Self::Flower => "flower",
            Self::Fruit => "fruit",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl Display for PlantStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display data and word interval of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageConfig {
    pub stage: PlantStage,
    pub name: &'static str,
    pub emoji: &'static str,
    pub color: &'static str,
    pub description: &'static str,
    /// Inclusive lower bound.
    pub min_words: u64,
    /// Inclusive upper bound; `None` for the last stage.
    pub max_words: Option<u64>,
}

impl StageConfig {
    pub fn contains(&self, words: u64) -> bool {
        words >= self.min_words && self.max_words.map_or(true, |max| words <= max)
    }
}

/// Ordered, gap-free cover of `0..` by closed word intervals.
pub const STAGES: [StageConfig; 6] = [
    StageConfig {
        stage: PlantStage::Seed,
        name: "Seed",
        emoji: "🌱",
        color: "#86efac",
        description: "A hopeful seed waiting to sprout",
        min_words: 0,
        max_words: Some(999),
    },
    StageConfig {
        stage: PlantStage::Sprout,
        name: "Sprout",
        emoji: "🌿",
        color: "#4ade80",
        description: "A tender sprout breaking through the soil",
        min_words: 1_000,
        max_words: Some(4_999),
    },
    StageConfig {
        stage: PlantStage::Pot,
        name: "Potted Plant",
        emoji: "🪴",
        color: "#22c55e",
        description: "A thriving little potted plant",
        min_words: 5_000,
        max_words: Some(14_999),
    },
    StageConfig {
        stage: PlantStage::Tree,
        name: "Young Tree",
        emoji: "🌳",
        color: "#16a34a",
        description: "A sturdy young tree with spreading branches",
        min_words: 15_000,
        max_words: Some(29_999),
    },
    StageConfig {
        stage: PlantStage::Flower,
        name: "Blossom",
        emoji: "🌸",
        color: "#ec4899",
        description: "Flowers in full bloom",
        min_words: 30_000,
        max_words: Some(49_999),
    },
    StageConfig {
        stage: PlantStage::Fruit,
        name: "Harvest",
        emoji: "🍎",
        color: "#dc2626",
        description: "Branches heavy with fruit",
        min_words: 50_000,
        max_words: None,
    },
];

/// Stage whose interval contains `words`.
pub fn stage_for(words: u64) -> PlantStage {
    let index = STAGES.partition_point(|config| config.min_words <= words);
    STAGES[index.saturating_sub(1)].stage
}

pub fn stage_config(stage: PlantStage) -> &'static StageConfig {
    &STAGES[stage.index()]
}

/// `None` at the last stage.
pub fn next_stage_config(stage: PlantStage) -> Option<&'static StageConfig> {
    STAGES.get(stage.index() + 1)
}

/// Percentage in `0.0..=100.0` from the start of `stage` to the next
/// threshold; `100.0` at the last stage.
pub fn progress_to_next_stage(words: u64, stage: PlantStage) -> f64 {
    let Some(next) = next_stage_config(stage) else {
        return 100.0;
    };
    let current = stage_config(stage);
    let span = next.min_words.saturating_sub(current.min_words);
    if span == 0 {
        return 100.0;
    }
    let done = words.saturating_sub(current.min_words) as f64;
    (done / span as f64 * 100.0).clamp(0.0, 100.0)
}
