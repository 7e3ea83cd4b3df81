use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// V1 redirect rules: a unique `source_model -> target_model` mapping.
pub type RedirectRuleSetV1 = HashMap<String, String>;

/// V2 redirect rules: `source_model -> { targets, fallback }`. Fully
/// supersedes V1 at the group level once non-empty (spec §3 "Redirect
/// rules").
pub type RedirectRuleSetV2 = HashMap<String, RedirectRuleV2Entry>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedirectRuleV2Entry {
    pub targets: Vec<RedirectTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectTarget {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl RedirectTarget {
    /// A stored weight `<= 0` (or unset) counts as the default weight of
    /// 100 (spec §3 invariant: "V2 `GetWeight()` returns 100 for any target
    /// whose stored weight is <= 0").
    pub fn get_weight(&self) -> i64 {
        match self.weight {
            Some(w) if w > 0 => w,
            _ => 100,
        }
    }

    /// Defaults to `true` when unset (spec §3 invariant).
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_weight_defaults_to_100() {
        let t = RedirectTarget {
            model: "m".to_string(),
            weight: None,
            enabled: None,
        };
        assert_eq!(t.get_weight(), 100);
        assert!(t.is_enabled());
    }

    #[test]
    fn non_positive_weight_falls_back_to_100() {
        let t = RedirectTarget {
            model: "m".to_string(),
            weight: Some(0),
            enabled: Some(false),
        };
        assert_eq!(t.get_weight(), 100);
        assert!(!t.is_enabled());
    }
}
