//! Most recent contribution counted in a match.

use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Latest qualifying contribution of one contributor to one project.
///
/// A contribution made after `most_recent_included_tip_timestamp` is not yet
/// part of the match the contributor is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MostRecentTip {
    pub project_id: String,
    /// Block timestamp in seconds
    pub most_recent_included_tip_timestamp: u64,
    pub round_id: String,
    pub user_id: Address,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let tip = MostRecentTip {
            project_id: "p1".to_string(),
            most_recent_included_tip_timestamp: 1_700_000_000,
            round_id: "0xround".to_string(),
            user_id: Address::from_bytes([1; 20]),
        };
        let json = serde_json::to_value(&tip).unwrap();
        assert_eq!(json["mostRecentIncludedTipTimestamp"], 1_700_000_000u64);
        assert_eq!(json["userId"], "0x0101010101010101010101010101010101010101");
        assert_eq!(serde_json::from_value::<MostRecentTip>(json).unwrap(), tip);
    }
}
