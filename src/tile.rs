//! Tile Localization
//!
//! Natural-language rendering for MJAI tile codes plus the dora
//! indicator → dora successor mapping. All lookups fall back to the
//! original code so an unknown token never breaks a report.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// MJAI tile code → Chinese natural language
static TILE_NL: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Man (万)
        ("1m", "一万"),
        ("2m", "二万"),
        ("3m", "三万"),
        ("4m", "四万"),
        ("5mr", "红五万"),
        ("5m", "五万"),
        ("6m", "六万"),
        ("7m", "七万"),
        ("8m", "八万"),
        ("9m", "九万"),
        // Pin (筒)
        ("1p", "一筒"),
        ("2p", "二筒"),
        ("3p", "三筒"),
        ("4p", "四筒"),
        ("5pr", "红五筒"),
        ("5p", "五筒"),
        ("6p", "六筒"),
        ("7p", "七筒"),
        ("8p", "八筒"),
        ("9p", "九筒"),
        // Sou (条)
        ("1s", "一条"),
        ("2s", "二条"),
        ("3s", "三条"),
        ("4s", "四条"),
        ("5sr", "红五条"),
        ("5s", "五条"),
        ("6s", "六条"),
        ("7s", "七条"),
        ("8s", "八条"),
        ("9s", "九条"),
        // Winds and dragons
        ("E", "东"),
        ("S", "南"),
        ("W", "西"),
        ("N", "北"),
        ("P", "白"),
        ("F", "发"),
        ("C", "中"),
        // Unknown-tile sentinel
        ("?", "未知"),
    ])
});

/// Convert a single MJAI tile code to Chinese natural language.
///
/// Falls back to the original string if the code is unknown.
pub fn tile_to_natural(code: &str) -> String {
    TILE_NL.get(code).map(|s| (*s).to_string()).unwrap_or_else(|| code.to_string())
}

/// Render a tile list as `、`-joined natural language, or `无` when empty.
pub fn tile_list_to_natural(tiles: &[String]) -> String {
    if tiles.is_empty() {
        return "无".to_string();
    }
    tiles
        .iter()
        .map(|t| tile_to_natural(t))
        .collect::<Vec<_>>()
        .join("、")
}

/// Map a dora indicator tile to the tile that actually scores as dora.
///
/// Number ranks advance by one and wrap 9→1 within their suit (a red
/// five indicator counts as rank 5). Winds cycle E→S→W→N→E and dragons
/// cycle P→F→C→P; the two honor groups never cross. Unknown codes are
/// returned unchanged.
pub fn dora_from_indicator(indicator: &str) -> String {
    let bytes = indicator.as_bytes();

    // Number tiles: "<rank><suit>" with optional red-five "r" suffix.
    if (indicator.len() == 2 || (indicator.len() == 3 && bytes[2] == b'r'))
        && bytes[0].is_ascii_digit()
        && matches!(bytes[1], b'm' | b'p' | b's')
    {
        let rank = (bytes[0] - b'0') as u8;
        if (1..=9).contains(&rank) {
            let next = if rank == 9 { 1 } else { rank + 1 };
            return format!("{}{}", next, bytes[1] as char);
        }
    }

    match indicator {
        "E" => "S".to_string(),
        "S" => "W".to_string(),
        "W" => "N".to_string(),
        "N" => "E".to_string(),
        "P" => "F".to_string(),
        "F" => "C".to_string(),
        "C" => "P".to_string(),
        other => other.to_string(),
    }
}

/// Resolve a set of indicator tiles to their dora tiles, rendered in
/// natural language. Empty input renders as `未知`.
pub fn dora_list_to_natural(indicators: &[String]) -> String {
    if indicators.is_empty() {
        return "未知".to_string();
    }
    indicators
        .iter()
        .map(|i| tile_to_natural(&dora_from_indicator(i)))
        .collect::<Vec<_>>()
        .join("、")
}
