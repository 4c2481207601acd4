//! Risk assessment heuristic
//!
//! Coarse and approximate: a pure function of trigger severity and working
//! tree cleanliness, not a measured outcome.

use crate::snapshot::StateSnapshot;
use crate::trigger::Severity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLoss {
    None,
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkLoss {
    Minimal,
    Moderate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStability {
    Stable,
    Unstable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub data_loss: DataLoss,
    pub work_loss: WorkLoss,
    pub system_stability: SystemStability,
}

impl RiskAssessment {
    pub fn from_snapshot(severity: Severity, snapshot: &StateSnapshot) -> Self {
        assess_risk(severity, snapshot.is_workspace_clean())
    }
}

pub fn assess_risk(severity: Severity, workspace_clean: bool) -> RiskAssessment {
    let critical = severity == Severity::Critical;

    RiskAssessment {
        data_loss: if workspace_clean {
            DataLoss::None
        } else {
            DataLoss::Minimal
        },
        work_loss: if critical {
            WorkLoss::Moderate
        } else {
            WorkLoss::Minimal
        },
        system_stability: if critical {
            SystemStability::Unstable
        } else {
            SystemStability::Stable
        },
    }
}
