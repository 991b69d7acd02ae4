//! Action consistency across repeated assessments of one transaction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Action, Assessment};

/// How often repeated runs agreed on the recommended action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Share of runs whose action equals the first run's action.
    pub consistency: f64,
    pub all_actions_same: bool,
    pub actions: Vec<Action>,
    pub action_distribution: BTreeMap<Action, usize>,
}

/// Compare the final actions of several assessments of the same transaction.
///
/// An empty slice is trivially consistent.
pub fn check_consistency(assessments: &[Assessment]) -> ConsistencyReport {
    let actions: Vec<Action> = assessments.iter().map(|a| a.recommended_action).collect();

    let mut action_distribution = BTreeMap::new();
    for action in &actions {
        *action_distribution.entry(*action).or_insert(0) += 1;
    }

    let consistency = match actions.first() {
        Some(first) => {
            actions.iter().filter(|a| *a == first).count() as f64 / actions.len() as f64
        }
        None => 1.0,
    };

    ConsistencyReport {
        consistency,
        all_actions_same: action_distribution.len() <= 1,
        actions,
        action_distribution,
    }
}
