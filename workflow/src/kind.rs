use std::fmt;
use std::str::FromStr;

use crate::Error;

/// One category of pipeline work. Kinds form a fixed total order:
/// a kind may only reference tasks of kinds that come before it.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageKind {
    DataPrep,
    Sim,
    LcFit,
    Classify,
    Aggregate,
    Merge,
    BiasCor,
    CreateCov,
    CosmoFit,
    Analyse,
}

impl StageKind {
    /// Every kind, in build order.
    pub const ALL: [StageKind; 10] = [
        StageKind::DataPrep,
        StageKind::Sim,
        StageKind::LcFit,
        StageKind::Classify,
        StageKind::Aggregate,
        StageKind::Merge,
        StageKind::BiasCor,
        StageKind::CreateCov,
        StageKind::CosmoFit,
        StageKind::Analyse,
    ];

    /// Section key used in pipeline config files.
    pub fn key(self) -> &'static str {
        match self {
            StageKind::DataPrep => "DATAPREP",
            StageKind::Sim => "SIM",
            StageKind::LcFit => "LCFIT",
            StageKind::Classify => "CLASSIFICATION",
            StageKind::Aggregate => "AGGREGATION",
            StageKind::Merge => "MERGE",
            StageKind::BiasCor => "BIASCOR",
            StageKind::CreateCov => "CREATE_COV",
            StageKind::CosmoFit => "COSMOFIT",
            StageKind::Analyse => "ANALYSE",
        }
    }

    /// Position in the build order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name of this kind's directory under the pipeline output dir, e.g. `2_LCFIT`.
    pub fn dir_name(self) -> String {
        format!("{}_{}", self.index(), self.key())
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for StageKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        StageKind::ALL
            .into_iter()
            .find(|k| k.key() == upper)
            .ok_or_else(|| Error::UnknownSection(s.to_owned()))
    }
}
