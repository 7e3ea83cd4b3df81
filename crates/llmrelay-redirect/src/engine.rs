use std::sync::Arc;

use llmrelay_common::RedirectError;
use llmrelay_protocol::{RedirectRuleSetV1, RedirectRuleSetV2};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;

/// Injected weighted-selection function: given the positive weights of the
/// surviving targets, returns an index into that slice.
///
/// Kept as an injection point rather than a hard dependency on any one
/// random-selection utility, per the design note on cyclic references —
/// a caller sharing a weighted-pick helper with the upstream selector can
/// wire it straight through here.
pub type WeightedSelectFn = Arc<dyn Fn(&[i64]) -> usize + Send + Sync>;

/// The default weighted-selection function: a single weighted-random draw
/// over the candidate weights.
pub fn default_weighted_select() -> WeightedSelectFn {
    Arc::new(|weights: &[i64]| -> usize {
        let dist = match WeightedIndex::new(weights.iter().map(|w| (*w).max(0) as u64)) {
            Ok(dist) => dist,
            Err(_) => return 0,
        };
        dist.sample(&mut rand::rng())
    })
}

/// Outcome of resolving a model name against a group's redirect rules
/// (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The model the request should be forwarded as. `None` means no rule
    /// matched (non-strict groups pass the original model through
    /// unchanged).
    pub target: Option<String>,
    pub original_model: String,
}

pub struct RedirectEngine {
    select: WeightedSelectFn,
}

impl Default for RedirectEngine {
    fn default() -> Self {
        Self::new(default_weighted_select())
    }
}

impl RedirectEngine {
    pub fn new(select: WeightedSelectFn) -> Self {
        Self { select }
    }

    /// Resolves `model` against a group's V1/V2 rules (spec §4.3
    /// "Resolution steps").
    ///
    /// V2 is consulted first; V1 is a fallback only when the source is
    /// absent from V2 (spec §3 "Redirect rules").
    pub fn resolve(
        &self,
        model: &str,
        v1: &RedirectRuleSetV1,
        v2: &RedirectRuleSetV2,
        strict: bool,
    ) -> Result<Resolution, RedirectError> {
        if let Some(entry) = v2.get(model) {
            let candidates: Vec<_> = entry
                .targets
                .iter()
                .filter(|t| t.is_enabled() && t.get_weight() > 0)
                .collect();

            let target = match candidates.as_slice() {
                [] => None,
                [only] => Some(only.model.clone()),
                many => {
                    let weights: Vec<i64> = many.iter().map(|t| t.get_weight()).collect();
                    let index = (self.select)(&weights);
                    if index >= many.len() {
                        return Err(RedirectError::SelectionFailed {
                            index,
                            len: many.len(),
                        });
                    }
                    Some(many[index].model.clone())
                }
            };

            if let Some(target) = target {
                return Ok(Resolution {
                    target: Some(target),
                    original_model: model.to_string(),
                });
            }
            // Every V2 target for this source was disabled/zero-weight:
            // fall through to V1, then strict-mode rejection, same as an
            // absent V2 entry.
        }

        if let Some(target) = v1.get(model) {
            return Ok(Resolution {
                target: Some(target.clone()),
                original_model: model.to_string(),
            });
        }

        if strict {
            return Err(RedirectError::StrictModeReject(model.to_string()));
        }

        Ok(Resolution {
            target: None,
            original_model: model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmrelay_protocol::{RedirectRuleV2Entry, RedirectTarget};
    use std::collections::HashMap;

    fn target(model: &str, weight: Option<i64>, enabled: Option<bool>) -> RedirectTarget {
        RedirectTarget {
            model: model.to_string(),
            weight,
            enabled,
        }
    }

    #[test]
    fn no_rules_is_a_no_op_outside_strict_mode() {
        let engine = RedirectEngine::default();
        let resolution = engine
            .resolve("gpt-4", &HashMap::new(), &HashMap::new(), false)
            .unwrap();
        assert_eq!(resolution.target, None);
        assert_eq!(resolution.original_model, "gpt-4");
    }

    #[test]
    fn strict_mode_rejects_unknown_model() {
        let engine = RedirectEngine::default();
        let err = engine
            .resolve("unknown", &HashMap::new(), &HashMap::new(), true)
            .unwrap_err();
        assert_eq!(err, RedirectError::StrictModeReject("unknown".to_string()));
    }

    #[test]
    fn v1_rule_applies_without_invoking_selection() {
        let engine = RedirectEngine::new(Arc::new(|_| panic!("should not be called")));
        let mut v1 = HashMap::new();
        v1.insert("gemini-pro".to_string(), "gemini-1.5-pro".to_string());
        let resolution = engine.resolve("gemini-pro", &v1, &HashMap::new(), false).unwrap();
        assert_eq!(resolution.target.as_deref(), Some("gemini-1.5-pro"));
    }

    #[test]
    fn single_enabled_v2_target_is_equivalent_to_v1() {
        let engine = RedirectEngine::new(Arc::new(|_| panic!("should not be called")));
        let mut v2 = HashMap::new();
        v2.insert(
            "gpt-4".to_string(),
            RedirectRuleV2Entry {
                targets: vec![target("gpt-4-turbo", None, None)],
                fallback: None,
            },
        );
        let resolution = engine
            .resolve("gpt-4", &HashMap::new(), &v2, false)
            .unwrap();
        assert_eq!(resolution.target.as_deref(), Some("gpt-4-turbo"));
    }

    #[test]
    fn v2_filters_disabled_and_zero_weight_targets() {
        let engine = RedirectEngine::new(Arc::new(|_| panic!("should not be called")));
        let mut v2 = HashMap::new();
        v2.insert(
            "m".to_string(),
            RedirectRuleV2Entry {
                targets: vec![
                    target("disabled", None, Some(false)),
                    target("zero-weight", Some(0), None),
                    target("the-one", Some(50), None),
                ],
                fallback: None,
            },
        );
        let resolution = engine.resolve("m", &HashMap::new(), &v2, false).unwrap();
        assert_eq!(resolution.target.as_deref(), Some("the-one"));
    }

    #[test]
    fn v2_multi_target_uses_injected_selection_with_bounds_check() {
        let engine = RedirectEngine::new(Arc::new(|weights| weights.len()));
        let mut v2 = HashMap::new();
        v2.insert(
            "m".to_string(),
            RedirectRuleV2Entry {
                targets: vec![target("a", Some(50), None), target("b", Some(50), None)],
                fallback: None,
            },
        );
        let err = engine.resolve("m", &HashMap::new(), &v2, false).unwrap_err();
        assert_eq!(err, RedirectError::SelectionFailed { index: 2, len: 2 });
    }

    #[test]
    fn v2_present_but_fully_disabled_falls_back_to_v1() {
        let engine = RedirectEngine::new(Arc::new(|_| panic!("should not be called")));
        let mut v1 = HashMap::new();
        v1.insert("m".to_string(), "v1-target".to_string());
        let mut v2 = HashMap::new();
        v2.insert(
            "m".to_string(),
            RedirectRuleV2Entry {
                targets: vec![target("dead", None, Some(false))],
                fallback: None,
            },
        );
        let resolution = engine.resolve("m", &v1, &v2, false).unwrap();
        assert_eq!(resolution.target.as_deref(), Some("v1-target"));
    }
}
