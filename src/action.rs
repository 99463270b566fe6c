//! Action Descriptors
//!
//! Tagged-union representation of one discrete player move, the fixed
//! per-table-size action vocabularies used by the engine's legality
//! mask, and natural-language rendering for both.
//!
//! Rendering never fails: a descriptor with no resolvable tag renders
//! as its own string form, exactly like an unknown tile code.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

use crate::tile::tile_to_natural;

/// Action tag → Chinese natural language
static ACTION_NL: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("reach", "立直"),
        ("pon", "碰"),
        ("chi", "吃"),
        ("chi_low", "吃(低)"),
        ("chi_mid", "吃(中)"),
        ("chi_high", "吃(高)"),
        ("kan_select", "选择杠"),
        ("dahai", "打牌"),
        ("kakan", "加杠"),
        ("daiminkan", "大明杠"),
        ("ankan", "暗杠"),
        ("zimo", "自摸"),
        ("hora", "和了"),
        ("ryukyoku", "流局"),
        ("nukidora", "抜きドラ"),
        ("none", "过"),
    ])
});

/// Fixed action vocabulary for 4-player tables.
///
/// Index order matches the engine's mask bit layout: the 37 discardable
/// tile codes first, then the non-discard actions.
pub static MASK_VOCABULARY_4P: &[&str] = &[
    "1m", "2m", "3m", "4m", "5m", "6m", "7m", "8m", "9m",
    "1p", "2p", "3p", "4p", "5p", "6p", "7p", "8p", "9p",
    "1s", "2s", "3s", "4s", "5s", "6s", "7s", "8s", "9s",
    "E", "S", "W", "N", "P", "F", "C",
    "5mr", "5pr", "5sr",
    "reach", "chi_low", "chi_mid", "chi_high", "pon", "kan_select",
    "hora", "ryukyoku", "none",
];

/// Fixed action vocabulary for 3-player tables.
///
/// Sanma has no chi and adds the north-tile extraction action.
pub static MASK_VOCABULARY_3P: &[&str] = &[
    "1m", "2m", "3m", "4m", "5m", "6m", "7m", "8m", "9m",
    "1p", "2p", "3p", "4p", "5p", "6p", "7p", "8p", "9p",
    "1s", "2s", "3s", "4s", "5s", "6s", "7s", "8s", "9s",
    "E", "S", "W", "N", "P", "F", "C",
    "5mr", "5pr", "5sr",
    "reach", "pon", "kan_select", "nukidora",
    "hora", "ryukyoku", "none",
];

/// Table-size selector for vocabulary and seat arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeatVariant {
    /// Standard 4-player table
    #[default]
    FourPlayer,
    /// 3-player (sanma) table
    ThreePlayer,
}

impl SeatVariant {
    pub fn from_three_player_flag(is_3p: bool) -> Self {
        if is_3p {
            SeatVariant::ThreePlayer
        } else {
            SeatVariant::FourPlayer
        }
    }

    /// The mask vocabulary for this table size
    pub fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            SeatVariant::FourPlayer => MASK_VOCABULARY_4P,
            SeatVariant::ThreePlayer => MASK_VOCABULARY_3P,
        }
    }

    pub fn seat_count(&self) -> usize {
        match self {
            SeatVariant::FourPlayer => 4,
            SeatVariant::ThreePlayer => 3,
        }
    }
}

/// One discrete player move, normalized to a display tag plus an
/// optional tile argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionDescriptor {
    /// Bare tag: an action name or a lone tile code
    Tag(String),
    /// Tag with a tile argument, e.g. `("dahai", "5mr")`
    TagTile { tag: String, tile: String },
    /// Unrecognized shape kept verbatim; renders as its string form
    Raw(Value),
}

impl ActionDescriptor {
    /// Classify an arbitrary JSON value into a descriptor.
    ///
    /// Recognizes strings, `[tag, tile]` arrays, `[tile, prob]` pairs
    /// from some engine revisions, and records carrying `type`/`action`
    /// and `pai`/`tile` fields. Anything else is kept raw.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => ActionDescriptor::Tag(s.clone()),
            Value::Array(items) => Self::from_array(items),
            Value::Object(map) => {
                let tag = map
                    .get("type")
                    .or_else(|| map.get("action"))
                    .and_then(Value::as_str);
                let tile = map
                    .get("pai")
                    .or_else(|| map.get("tile"))
                    .and_then(Value::as_str);
                match (tag, tile) {
                    (Some(tag), Some(tile)) => ActionDescriptor::TagTile {
                        tag: tag.to_string(),
                        tile: tile.to_string(),
                    },
                    (Some(tag), None) => ActionDescriptor::Tag(tag.to_string()),
                    (None, Some(tile)) => ActionDescriptor::Tag(tile.to_string()),
                    (None, None) => ActionDescriptor::Raw(value.clone()),
                }
            }
            other => ActionDescriptor::Raw(other.clone()),
        }
    }

    fn from_array(items: &[Value]) -> Self {
        if let [Value::String(first), rest @ ..] = items {
            if ACTION_NL.contains_key(first.as_str()) {
                return match rest.first().and_then(Value::as_str) {
                    Some(tile) => ActionDescriptor::TagTile {
                        tag: first.clone(),
                        tile: tile.to_string(),
                    },
                    None => ActionDescriptor::Tag(first.clone()),
                };
            }
            // (tile, prob) pairs from some APIs: render the tile
            if items.len() == 2 && items[1].is_number() {
                return ActionDescriptor::Tag(first.clone());
            }
        }
        ActionDescriptor::Raw(Value::Array(items.to_vec()))
    }

    /// The descriptor's own string form, without localization.
    ///
    /// Used for ranked entries past the decoder's rich-rendering cap.
    pub fn raw_form(&self) -> String {
        match self {
            ActionDescriptor::Tag(tag) => tag.clone(),
            ActionDescriptor::TagTile { tag, tile } => format!("{tag} {tile}"),
            ActionDescriptor::Raw(value) => value_display(value),
        }
    }

    /// Render to Chinese natural language.
    ///
    /// Discard is special-cased everywhere: `打<tile>` with no space,
    /// against the long `打牌` entry in the table. Other calls render
    /// `<verb> <tile>` when a tile argument is present.
    pub fn to_natural(&self) -> String {
        match self {
            ActionDescriptor::Tag(tag) => match ACTION_NL.get(tag.as_str()) {
                Some(_) if tag == "dahai" => "打".to_string(),
                Some(nl) => (*nl).to_string(),
                // not an action name: treat as a tile code
                None => tile_to_natural(tag),
            },
            ActionDescriptor::TagTile { tag, tile } => {
                if tag == "dahai" {
                    return format!("打{}", tile_to_natural(tile));
                }
                let verb = ACTION_NL
                    .get(tag.as_str())
                    .map(|s| (*s).to_string())
                    .unwrap_or_else(|| tag.clone());
                format!("{} {}", verb, tile_to_natural(tile))
            }
            ActionDescriptor::Raw(value) => match value {
                Value::String(s) => s.clone(),
                Value::Array(items) => items
                    .iter()
                    .map(value_display)
                    .collect::<Vec<_>>()
                    .join(" "),
                other => other.to_string(),
            },
        }
    }
}

/// Render a bare action tag (used for meld call-type annotations).
/// Identity fallback like everything else in this module.
pub fn action_tag_to_natural(tag: &str) -> String {
    ACTION_NL
        .get(tag)
        .map(|s| (*s).to_string())
        .unwrap_or_else(|| tag.to_string())
}

fn value_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map a relative seat offset to its Chinese label.
///
/// Offsets wrap modulo the table size; anything outside -3..=3 has no
/// label. On a 4-player table 0/1/2/3 map to self, right, across, left.
pub fn relative_seat_label(offset: i32, variant: SeatVariant) -> Option<&'static str> {
    if !(-3..=3).contains(&offset) {
        return None;
    }
    let seats = variant.seat_count() as i32;
    let index = offset.rem_euclid(seats) as usize;
    let labels: &[&str] = match variant {
        SeatVariant::FourPlayer => &["自家", "下家", "对面", "上家"],
        SeatVariant::ThreePlayer => &["自家", "下家", "上家"],
    };
    labels.get(index).copied()
}
