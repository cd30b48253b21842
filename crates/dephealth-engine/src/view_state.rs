use serde::{Deserialize, Serialize};

use crate::filter::FilterSelections;
use crate::grouping::GroupingPrefs;

/// Everything a restart needs to replay the same derived view. Each table is
/// independent, so a partial file keeps defaults for the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewState {
    pub grouping: GroupingPrefs,
    pub filters: FilterSelections,
}
