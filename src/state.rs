//! Table State
//!
//! Input structures for the composer. Callers hand these over as
//! already-decoded in-memory values; every field the engine might omit
//! is optional and renders as a fixed placeholder downstream.

use serde::{Deserialize, Deserializer, Serialize};

/// Accept either a single tile code or a list of them.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(tile) => vec![tile],
        OneOrMany::Many(tiles) => tiles,
    })
}

/// Game-level snapshot: round header fields, scores, and the viewer's
/// own hand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameContext {
    /// Round wind tile code ("E", "S", ...)
    pub bakaze: Option<String>,
    /// Round number within the wind (1-indexed)
    pub kyoku: Option<u32>,
    /// Repeat counter
    pub honba: u32,
    /// Riichi stake counter
    pub kyotaku: u32,
    /// Dealer seat index (0-based)
    pub oya: Option<usize>,
    /// Revealed dora indicator tiles
    #[serde(
        alias = "dora_marker",
        alias = "dora",
        deserialize_with = "one_or_many"
    )]
    pub dora_indicators: Vec<String>,
    /// Per-seat scores
    pub scores: Option<Vec<i64>>,
    /// Viewer's hand
    #[serde(alias = "tehai")]
    pub my_tehai: Option<Vec<String>>,
    /// Viewer's just-drawn tile
    #[serde(alias = "tsumohai")]
    pub my_tsumohai: Option<String>,
    /// Per-seat declared-ready flags
    #[serde(alias = "player_reach")]
    pub player_reached: Option<Vec<bool>>,
    /// Viewer's seat index (0-based)
    #[serde(alias = "my_seat")]
    pub self_seat: Option<usize>,
}

/// Round-level detail: per-seat discard piles and meld lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KyokuContext {
    /// Per-seat ordered discard piles
    pub discarded: Option<Vec<Vec<DiscardEntry>>>,
    /// Per-seat meld lists
    pub melded: Option<Vec<Vec<Meld>>>,
    /// Per-seat scores, used when the game snapshot carries none
    pub scores: Option<Vec<i64>>,
}

/// One discarded tile, tagged with how it left the hand.
///
/// Older engine revisions send bare tile codes; newer ones annotate
/// whether the tile was discarded from the draw (tsumogiri) or from
/// the hand (tedashi).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiscardEntry {
    Tagged {
        #[serde(alias = "pai")]
        tile: String,
        #[serde(default)]
        tsumogiri: bool,
    },
    Bare(String),
}

impl DiscardEntry {
    pub fn tile(&self) -> &str {
        match self {
            DiscardEntry::Tagged { tile, .. } => tile,
            DiscardEntry::Bare(tile) => tile,
        }
    }

    /// True when the tile was discarded straight from the draw
    pub fn is_tsumogiri(&self) -> bool {
        match self {
            DiscardEntry::Tagged { tsumogiri, .. } => *tsumogiri,
            DiscardEntry::Bare(_) => false,
        }
    }
}

impl From<&str> for DiscardEntry {
    fn from(tile: &str) -> Self {
        DiscardEntry::Bare(tile.to_string())
    }
}

/// One meld, with the call variant and who fed it when known.
///
/// Engines that predate the annotated format send a bare tile list or
/// even an opaque string; both still render.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Meld {
    Detailed {
        #[serde(alias = "pais")]
        tiles: Vec<String>,
        /// Call variant tag ("pon", "chi", "ankan", ...)
        #[serde(rename = "type", alias = "call_type")]
        call_type: Option<String>,
        /// Relative offset of the seat that fed the call
        #[serde(default, alias = "from_seat")]
        from: Option<i32>,
    },
    Tiles(Vec<String>),
    Raw(String),
}
