//! Recommendation Decoder
//!
//! Normalizes an arbitrarily-shaped engine recommendation into a ranked
//! option list plus a provenance tag naming the parsing strategy that
//! succeeded.
//!
//! Shape detection is an explicit, priority-ordered pipeline: the
//! payload is classified into candidate [`PayloadShape`]s at the
//! boundary, each candidate decodes to `Result<_, DecodeDiagnostic>`,
//! and the first success wins. A failed candidate contributes its
//! diagnostic to the provenance string and the pipeline moves on, so
//! `decode` is total: no input shape makes it panic or error out.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::action::{ActionDescriptor, SeatVariant};

/// How many ranked entries are converted to display text, regardless of
/// how many the composer later asks for. This cap and the composer's
/// `top_k` are two independent truncation points.
pub const RENDERED_OPTION_CAP: usize = 2;

/// A probability-or-score attached to one ranked option.
///
/// The decoder does not normalize scale; fraction vs percentage is
/// resolved at rendering time. Non-numeric values are kept verbatim so
/// formatting can fall back to textual display.
#[derive(Debug, Clone, PartialEq)]
pub enum Probability {
    Value(f64),
    Raw(String),
}

impl Probability {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => n.as_f64().map(Probability::Value),
            Value::String(s) => Some(Probability::Raw(s.clone())),
            other => Some(Probability::Raw(other.to_string())),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Probability::Value(v) => Some(*v),
            Probability::Raw(_) => None,
        }
    }
}

/// One decoded (action, probability) pair.
#[derive(Debug, Clone)]
pub struct RankedOption {
    pub action: ActionDescriptor,
    pub probability: Option<Probability>,
}

/// Decoder output: the full ranked list, the display-rendered head of
/// that list, and a provenance tag.
#[derive(Debug, Clone)]
pub struct RankedRecommendation {
    /// All decoded options in rank order
    pub options: Vec<RankedOption>,
    /// At most [`RENDERED_OPTION_CAP`] entries converted to text
    pub rendered: Vec<(String, Option<Probability>)>,
    /// Which parsing strategy produced the result, or why none did
    pub provenance: String,
}

impl RankedRecommendation {
    fn empty(provenance: impl Into<String>) -> Self {
        Self {
            options: Vec::new(),
            rendered: Vec::new(),
            provenance: provenance.into(),
        }
    }
}

/// Why one decoding branch gave up.
#[derive(Debug, Error)]
pub enum DecodeDiagnostic {
    #[error("解析 meta 出错: q_values 非数值序列")]
    BadQValues,
    #[error("解析 meta 出错: mask_bits 形状不支持")]
    BadMaskBits,
    #[error("从字典 (action->score) 解析失败: 无数值评分")]
    BadScoreMap,
}

/// One recognized payload shape, in detection priority order.
#[derive(Debug)]
enum PayloadShape<'a> {
    /// Nested meta record carrying `q_values` + `mask_bits`
    NestedMeta(&'a Map<String, Value>),
    /// `q_values` + `mask_bits` at top level
    FlatMeta(&'a Map<String, Value>),
    /// Explicit pre-ranked `options` sequence
    Options(&'a [Value]),
    /// Single `action`/`selected` field with optional `prob`
    Single {
        field: &'static str,
        action: &'a Value,
        prob: Option<&'a Value>,
    },
    /// Generic action → score mapping
    ScoreMap(&'a Map<String, Value>),
}

impl<'a> PayloadShape<'a> {
    /// Collect every shape the payload structurally matches, highest
    /// priority first.
    fn candidates(payload: &'a Value) -> Vec<Self> {
        let Some(map) = payload.as_object() else {
            return Vec::new();
        };

        let mut shapes = Vec::new();
        if let Some(meta) = map.get("meta").and_then(Value::as_object) {
            if meta.contains_key("q_values") && meta.contains_key("mask_bits") {
                shapes.push(PayloadShape::NestedMeta(meta));
            }
        }
        if map.contains_key("q_values") && map.contains_key("mask_bits") {
            shapes.push(PayloadShape::FlatMeta(map));
        }
        if let Some(options) = map.get("options").and_then(Value::as_array) {
            shapes.push(PayloadShape::Options(options));
        }
        for field in ["action", "selected"] {
            if let Some(action) = map.get(field) {
                shapes.push(PayloadShape::Single {
                    field,
                    action,
                    prob: map.get("prob"),
                });
            }
        }
        // A generic mapping is only plausible when no recognized key is
        // present; a failed meta payload must not be re-read as scores,
        // and a `type`-carrying record belongs to the composer's
        // single-move fallback.
        let reserved = [
            "meta", "q_values", "mask_bits", "options", "action", "selected", "type",
        ];
        if shapes.is_empty() && !map.is_empty() && !reserved.iter().any(|k| map.contains_key(*k)) {
            shapes.push(PayloadShape::ScoreMap(map));
        }
        shapes
    }

    fn provenance(&self) -> String {
        match self {
            PayloadShape::NestedMeta(_) => "来自 meta (q_values + mask_bits)".to_string(),
            PayloadShape::FlatMeta(_) => "来自顶层 q_values + mask_bits".to_string(),
            PayloadShape::Options(_) => "来自 options 字段".to_string(),
            PayloadShape::Single { field, .. } => format!("来自 {field} 字段"),
            PayloadShape::ScoreMap(_) => "从字典 (action->score) 解析".to_string(),
        }
    }

    fn rank(&self, variant: SeatVariant) -> Result<Vec<RankedOption>, DecodeDiagnostic> {
        match self {
            PayloadShape::NestedMeta(meta) => rank_from_meta(meta, variant),
            PayloadShape::FlatMeta(map) => rank_from_meta(map, variant),
            PayloadShape::Options(options) => Ok(rank_from_options(options)),
            PayloadShape::Single { action, prob, .. } => Ok(vec![RankedOption {
                action: ActionDescriptor::from_value(action),
                probability: prob.and_then(|p| Probability::from_value(p)),
            }]),
            PayloadShape::ScoreMap(map) => rank_from_score_map(map),
        }
    }
}

/// Decode one recommendation payload into a ranked option list.
///
/// Never fails; an empty or unrecognizable payload yields an empty list
/// with a diagnostic provenance string.
pub fn decode(payload: &Value, variant: SeatVariant) -> RankedRecommendation {
    if is_empty_payload(payload) {
        return RankedRecommendation::empty("无");
    }

    let mut info: Vec<String> = Vec::new();
    for shape in PayloadShape::candidates(payload) {
        match shape.rank(variant) {
            Ok(options) => {
                info.push(shape.provenance());
                let rendered = options
                    .iter()
                    .take(RENDERED_OPTION_CAP)
                    .map(|o| (o.action.to_natural(), o.probability.clone()))
                    .collect();
                return RankedRecommendation {
                    options,
                    rendered,
                    provenance: info.join("；"),
                };
            }
            Err(diag) => info.push(diag.to_string()),
        }
    }

    info.push("无法解析推荐".to_string());
    RankedRecommendation::empty(info.join("；"))
}

fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}

/// Numerically stable softmax.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Decode an integer or boolean-array `mask_bits` field into a legality
/// vector. Bit `i` governs vocabulary index `i`.
fn mask_bits_to_bools(mask_bits: &Value) -> Result<Vec<bool>, DecodeDiagnostic> {
    match mask_bits {
        Value::Number(n) => {
            let bits = n.as_u64().ok_or(DecodeDiagnostic::BadMaskBits)?;
            Ok((0..64).map(|i| bits >> i & 1 == 1).collect())
        }
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Bool(b) => Ok(*b),
                Value::Number(n) => Ok(n.as_u64() == Some(1)),
                _ => Err(DecodeDiagnostic::BadMaskBits),
            })
            .collect(),
        _ => Err(DecodeDiagnostic::BadMaskBits),
    }
}

/// The q_values + mask_bits path: softmax over the scores, pair each
/// legal vocabulary slot with the next unconsumed weight, sort by
/// weight descending.
fn rank_from_meta(
    meta: &Map<String, Value>,
    variant: SeatVariant,
) -> Result<Vec<RankedOption>, DecodeDiagnostic> {
    let q_values: Vec<f64> = meta
        .get("q_values")
        .and_then(Value::as_array)
        .ok_or(DecodeDiagnostic::BadQValues)?
        .iter()
        .map(|v| v.as_f64().ok_or(DecodeDiagnostic::BadQValues))
        .collect::<Result<_, _>>()?;
    let mask = mask_bits_to_bools(meta.get("mask_bits").unwrap_or(&Value::Null))?;

    let vocabulary = variant.vocabulary();
    let weights = softmax(&q_values);

    let mut options = Vec::new();
    let mut weight_idx = 0usize;
    for (i, legal) in mask.iter().enumerate() {
        if !legal {
            continue;
        }
        let name = vocabulary
            .get(i)
            .map(|s| (*s).to_string())
            .unwrap_or_else(|| format!("idx_{i}"));
        // More legal slots than weights: degrade by zero-filling rather
        // than failing the branch.
        let weight = weights.get(weight_idx).copied().unwrap_or(0.0);
        weight_idx += 1;
        options.push(RankedOption {
            action: ActionDescriptor::Tag(name),
            probability: Some(Probability::Value(weight)),
        });
    }

    options.sort_by(|a, b| {
        let pa = a.probability.as_ref().and_then(Probability::as_f64).unwrap_or(0.0);
        let pb = b.probability.as_ref().and_then(Probability::as_f64).unwrap_or(0.0);
        pb.partial_cmp(&pa).unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(options)
}

/// The explicit `options` path: order preserved verbatim, assumed
/// already ranked.
fn rank_from_options(options: &[Value]) -> Vec<RankedOption> {
    options
        .iter()
        .map(|entry| match entry {
            Value::Array(pair) if pair.len() == 2 => RankedOption {
                action: ActionDescriptor::from_value(&pair[0]),
                probability: Probability::from_value(&pair[1]),
            },
            Value::Object(map) => RankedOption {
                action: ActionDescriptor::from_value(entry),
                probability: map.get("prob").and_then(Probability::from_value),
            },
            other => RankedOption {
                action: ActionDescriptor::from_value(other),
                probability: None,
            },
        })
        .collect()
}

/// The generic mapping path: treat keys as actions, values as scores,
/// sort descending. Non-numeric scores rank below every numeric one.
fn rank_from_score_map(map: &Map<String, Value>) -> Result<Vec<RankedOption>, DecodeDiagnostic> {
    if !map.values().any(Value::is_number) {
        return Err(DecodeDiagnostic::BadScoreMap);
    }
    let mut options: Vec<RankedOption> = map
        .iter()
        .map(|(key, score)| RankedOption {
            action: ActionDescriptor::Tag(key.clone()),
            probability: Probability::from_value(score),
        })
        .collect();
    options.sort_by(|a, b| {
        let pa = a.probability.as_ref().and_then(Probability::as_f64);
        let pb = b.probability.as_ref().and_then(Probability::as_f64);
        match (pa, pb) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mask_with_bits(indices: &[usize]) -> u64 {
        indices.iter().fold(0u64, |acc, i| acc | 1 << i)
    }

    #[test]
    fn test_empty_payload() {
        let result = decode(&Value::Null, SeatVariant::FourPlayer);
        assert!(result.options.is_empty());
        assert_eq!(result.provenance, "无");

        let result = decode(&json!({}), SeatVariant::FourPlayer);
        assert!(result.options.is_empty());
        assert_eq!(result.provenance, "无");

        // zero is as absent as null
        let result = decode(&json!(0), SeatVariant::FourPlayer);
        assert!(result.options.is_empty());
        assert_eq!(result.provenance, "无");
    }

    #[test]
    fn test_type_record_is_not_a_score_map() {
        // a single-move record with a numeric prob must not be re-read
        // as action→score; the composer owns the single-move fallback
        let payload = json!({"type": "dahai", "pai": "8p", "prob": 0.66});
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert!(result.options.is_empty());
        assert_eq!(result.provenance, "无法解析推荐");
    }

    #[test]
    fn test_nested_meta_ranks_descending() {
        // legal slots: 4m (index 3), 9s (index 26), reach (index 37)
        let payload = json!({
            "type": "dahai",
            "meta": {
                "q_values": [0.5, 3.0, 1.0],
                "mask_bits": mask_with_bits(&[3, 26, 37]),
            }
        });
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.provenance, "来自 meta (q_values + mask_bits)");
        assert_eq!(result.options.len(), 3);

        // highest softmax weight first: q=3.0 belongs to slot 9s
        assert_eq!(result.options[0].action, ActionDescriptor::Tag("9s".into()));
        let probs: Vec<f64> = result
            .options
            .iter()
            .map(|o| o.probability.as_ref().unwrap().as_f64().unwrap())
            .collect();
        assert!(probs.windows(2).all(|w| w[0] >= w[1]));
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        // only two entries are rendered
        assert_eq!(result.rendered.len(), 2);
        assert_eq!(result.rendered[0].0, "九条");
    }

    #[test]
    fn test_flat_meta() {
        let payload = json!({
            "q_values": [1.0, 2.0],
            "mask_bits": mask_with_bits(&[0, 41]),
        });
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.provenance, "来自顶层 q_values + mask_bits");
        // pon (index 41) got the higher q-value
        assert_eq!(result.options[0].action, ActionDescriptor::Tag("pon".into()));
        assert_eq!(result.options[1].action, ActionDescriptor::Tag("1m".into()));
    }

    #[test]
    fn test_meta_length_le_mask_popcount() {
        let payload = json!({
            "meta": {
                "q_values": [0.1, 0.2, 0.3, 0.4],
                "mask_bits": mask_with_bits(&[1, 2]),
            }
        });
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.options.len(), 2);
    }

    #[test]
    fn test_meta_zero_fills_missing_weights() {
        let payload = json!({
            "meta": {
                "q_values": [2.0],
                "mask_bits": mask_with_bits(&[0, 1, 2]),
            }
        });
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.options.len(), 3);
        let probs: Vec<f64> = result
            .options
            .iter()
            .map(|o| o.probability.as_ref().unwrap().as_f64().unwrap())
            .collect();
        assert_eq!(probs, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_meta_overflow_slot_gets_index_name() {
        let payload = json!({
            "meta": {
                "q_values": [1.0],
                "mask_bits": mask_with_bits(&[50]),
            }
        });
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.options[0].action, ActionDescriptor::Tag("idx_50".into()));
    }

    #[test]
    fn test_three_player_vocabulary() {
        // index 38 is pon in the 3p vocabulary, chi_low in 4p
        let payload = json!({
            "meta": { "q_values": [1.0], "mask_bits": mask_with_bits(&[38]) }
        });
        let result = decode(&payload, SeatVariant::ThreePlayer);
        assert_eq!(result.options[0].action, ActionDescriptor::Tag("pon".into()));
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.options[0].action, ActionDescriptor::Tag("chi_low".into()));
    }

    #[test]
    fn test_malformed_meta_degrades_with_diagnostic() {
        let payload = json!({
            "meta": { "q_values": "not a list", "mask_bits": 3 }
        });
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert!(result.options.is_empty());
        assert!(result.provenance.contains("q_values"));
        assert!(result.provenance.contains("无法解析推荐"));
    }

    #[test]
    fn test_malformed_meta_falls_through_to_options() {
        let payload = json!({
            "meta": { "q_values": [1.0], "mask_bits": "bogus" },
            "options": [["dahai", 0.9]]
        });
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.options.len(), 1);
        assert!(result.provenance.contains("mask_bits"));
        assert!(result.provenance.contains("来自 options 字段"));
    }

    #[test]
    fn test_options_order_preserved() {
        let payload = json!({
            "options": [["pon", 0.2], ["dahai", 0.8], ["none", null]]
        });
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.provenance, "来自 options 字段");
        // verbatim order, even though probabilities are not sorted
        assert_eq!(result.options[0].action, ActionDescriptor::Tag("pon".into()));
        assert!(result.options[2].probability.is_none());
        assert_eq!(result.rendered.len(), 2);
    }

    #[test]
    fn test_single_action_field() {
        let payload = json!({"action": "reach", "prob": 0.7});
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.provenance, "来自 action 字段");
        assert_eq!(result.options.len(), 1);
        assert_eq!(
            result.options[0].probability,
            Some(Probability::Value(0.7))
        );

        let payload = json!({"selected": ["dahai", "1m"]});
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.provenance, "来自 selected 字段");
        assert!(result.options[0].probability.is_none());
        assert_eq!(result.rendered[0].0, "打一万");
    }

    #[test]
    fn test_score_map_sorted_descending() {
        let payload = json!({"dahai": 1.5, "pon": 3.0, "none": 0.2});
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.provenance, "从字典 (action->score) 解析");
        assert_eq!(result.options[0].action, ActionDescriptor::Tag("pon".into()));
        assert_eq!(result.options[2].action, ActionDescriptor::Tag("none".into()));
    }

    #[test]
    fn test_score_map_non_numeric_ranks_last() {
        let payload = json!({"hora": "yes", "pon": 2.0});
        let result = decode(&payload, SeatVariant::FourPlayer);
        assert_eq!(result.options[0].action, ActionDescriptor::Tag("pon".into()));
        assert_eq!(
            result.options[1].probability,
            Some(Probability::Raw("yes".into()))
        );
    }

    #[test]
    fn test_unrecognized_never_panics() {
        for payload in [
            json!([1, 2, 3]),
            json!("just a string"),
            json!(3.14),
            json!({"weird": {"nested": []}}),
        ] {
            let result = decode(&payload, SeatVariant::FourPlayer);
            assert!(result.options.is_empty());
            assert!(!result.provenance.is_empty());
        }
    }

    #[test]
    fn test_softmax_stability() {
        let weights = softmax(&[1000.0, 1001.0]);
        assert!(weights.iter().all(|w| w.is_finite()));
        assert!(weights[1] > weights[0]);
        assert!(softmax(&[]).is_empty());
    }
}
