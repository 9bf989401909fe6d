use serde::{Deserialize, Serialize};

/// Pipeline stage
///
/// Stages run strictly in order; a work item never skips one:
/// MD preparation -> MD -> FEP preparation -> FEP -> Result processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    MdPreparation,
    Md,
    FepPreparation,
    FepProduction,
    ResultProcessing,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::MdPreparation,
        Stage::Md,
        Stage::FepPreparation,
        Stage::FepProduction,
        Stage::ResultProcessing,
    ];

    /// Persisted integer code (1..=5)
    pub fn as_i64(&self) -> i64 {
        match self {
            Stage::MdPreparation => 1,
            Stage::Md => 2,
            Stage::FepPreparation => 3,
            Stage::FepProduction => 4,
            Stage::ResultProcessing => 5,
        }
    }

    pub fn from_i64(code: i64) -> Option<Self> {
        match code {
            1 => Some(Stage::MdPreparation),
            2 => Some(Stage::Md),
            3 => Some(Stage::FepPreparation),
            4 => Some(Stage::FepProduction),
            5 => Some(Stage::ResultProcessing),
            _ => None,
        }
    }

    /// Human-readable name used in dumps
    pub fn name(&self) -> &'static str {
        match self {
            Stage::MdPreparation => "MD preparation",
            Stage::Md => "MD",
            Stage::FepPreparation => "FEP preparation",
            Stage::FepProduction => "FEP",
            Stage::ResultProcessing => "Result processing",
        }
    }

    /// The stage that follows this one, if any
    pub fn next(&self) -> Option<Self> {
        Self::from_i64(self.as_i64() + 1)
    }

    pub fn is_final(&self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
