//! State-to-Text Composer
//!
//! Renders the full table state plus the decoded recommendation into a
//! deterministic Chinese text document for the generative engine. The
//! composer is total: every missing optional field renders as a fixed
//! placeholder, never an error.
//!
//! Emission order is fixed: preamble, round header, scores, per-seat
//! discard/meld ledger, own hand, ranked recommendation section, engine
//! meta summary, instructional appendix.

use serde_json::Value;

use crate::action::{action_tag_to_natural, relative_seat_label, SeatVariant};
use crate::decode::{decode, Probability, RankedRecommendation};
use crate::state::{GameContext, KyokuContext, Meld};
use crate::tile::{dora_list_to_natural, tile_list_to_natural, tile_to_natural};

/// Versioned instructional appendix for the generative engine.
///
/// The guidance text went through several revisions; it is selectable
/// data, not logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstructionTemplate {
    /// Two-line legacy block: hand posture plus per-option reasoning
    Concise,
    /// Current block: efficiency, safety, value, standing, and call
    /// tradeoffs, with a fixed per-line output format
    #[default]
    Strategic,
}

impl InstructionTemplate {
    fn lines(&self) -> &'static [&'static str] {
        match self {
            InstructionTemplate::Concise => &[
                "请用简洁的中文输出:",
                "牌姿和方向：结合我的手排和当前场上的信息，简述当前我的牌姿和方向（1-2句）",
                "选项解释：针对 AI 提供的选项，解释其背后的原因，每项 1-2 句。解释其主要考虑原因，如：进张/改良/期待值/安全等。",
            ],
            InstructionTemplate::Strategic => &[
                "请用简洁的中文输出，逐条覆盖以下维度:",
                "牌姿和方向：结合我的手牌和当前场上的信息，简述当前的牌姿和进攻方向（1-2句）。",
                "选项解释：针对 AI 提供的每个选项，各用 1-2 句说明其主要考虑，如进张效率、改良、役种与打点。",
                "安全与风险：指出当前局面的主要危险家与危险牌，评估推荐打法的放铳风险（1-2句）。",
                "局势判断：结合分数差与局数，说明当前领先或落后时应采取的攻守取舍（1句）。",
                "鸣牌取舍：若选项涉及吃/碰/杠或过，说明鸣牌与不鸣的利弊（1句，无则省略）。",
                "每条必须按「维度名：内容」的格式单独成行，不要添加编号或其他前缀。",
            ],
        }
    }
}

/// Per-request composition parameters.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// How many ranked lines the report may show. Independent of the
    /// decoder's 2-entry rich-rendering cap.
    pub top_k: usize,
    /// 3-player table flag; selects the mask vocabulary and the default
    /// seat count
    pub three_player: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            three_player: false,
        }
    }
}

/// The composer. Holds the selected instruction template; everything
/// else comes in per call.
#[derive(Debug, Clone, Default)]
pub struct PromptComposer {
    template: InstructionTemplate,
}

impl PromptComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(template: InstructionTemplate) -> Self {
        Self { template }
    }

    /// Compose the full report. Total over all structurally-plausible
    /// inputs.
    pub fn compose(
        &self,
        game: &GameContext,
        kyoku: &KyokuContext,
        recommendation: &Value,
        opts: &ComposeOptions,
    ) -> String {
        let variant = SeatVariant::from_three_player_flag(opts.three_player);
        let ranked = decode(recommendation, variant);

        let scores = game.scores.as_ref().or(kyoku.scores.as_ref());
        let seat_count = scores
            .map(Vec::len)
            .or_else(|| kyoku.discarded.as_ref().map(Vec::len))
            .or_else(|| kyoku.melded.as_ref().map(Vec::len))
            .unwrap_or_else(|| variant.seat_count());
        let seat_names = seat_names(seat_count, game.oya);

        let mut lines: Vec<String> = Vec::new();
        lines.push("你是一个专业的日本麻将高手，擅长分析和解读麻将游戏中的策略和技巧。".to_string());
        lines.push("请基于下列牌局快照和AI推荐，简明扼要地解释AI给出概率的原因。".to_string());
        lines.push(String::new());
        lines.push(self.header_line(game));

        match scores {
            Some(scores) => {
                let score_text = scores
                    .iter()
                    .enumerate()
                    .map(|(i, s)| format!("{} {}分", seat_name(&seat_names, i), s))
                    .collect::<Vec<_>>()
                    .join("；");
                lines.push(format!("分数: {score_text}"));
            }
            None => lines.push("分数: 无".to_string()),
        }

        lines.push(String::new());
        lines.push("场上弃牌（按位）:".to_string());
        for i in 0..seat_count {
            lines.push(self.ledger_line(game, kyoku, i, &seat_names, variant));
        }

        lines.push(String::new());
        let hand = game
            .my_tehai
            .as_ref()
            .map(|t| tile_list_to_natural(t))
            .unwrap_or_else(|| "未知".to_string());
        lines.push(format!("我的手牌: {hand}"));
        let drawn = game
            .my_tsumohai
            .as_deref()
            .map(tile_to_natural)
            .unwrap_or_else(|| "无".to_string());
        lines.push(format!("我摸到: {drawn}"));

        lines.push(String::new());
        self.recommendation_section(&mut lines, &ranked, recommendation, opts.top_k);
        self.meta_section(&mut lines, recommendation);

        lines.push(String::new());
        for line in self.template.lines() {
            lines.push((*line).to_string());
        }

        lines.join("\n")
    }

    fn header_line(&self, game: &GameContext) -> String {
        let bakaze = match game.bakaze.as_deref() {
            Some("E") => "东".to_string(),
            Some("S") => "南".to_string(),
            Some("W") => "西".to_string(),
            Some("N") => "北".to_string(),
            Some(other) => other.to_string(),
            None => "?".to_string(),
        };
        let kyoku = game
            .kyoku
            .map(|k| k.to_string())
            .unwrap_or_else(|| "?".to_string());
        let oya = game
            .oya
            .map(|o| (o + 1).to_string())
            .unwrap_or_else(|| "未知".to_string());
        format!(
            "场风: {bakaze}{kyoku}局；本场: {honba}本；供托: {kyotaku}；庄家: {oya}位；宝牌: {dora}。",
            honba = game.honba,
            kyotaku = game.kyotaku,
            dora = dora_list_to_natural(&game.dora_indicators),
        )
    }

    fn ledger_line(
        &self,
        game: &GameContext,
        kyoku: &KyokuContext,
        seat: usize,
        seat_names: &[String],
        variant: SeatVariant,
    ) -> String {
        let name = seat_name(seat_names, seat);

        let reach = game
            .player_reached
            .as_ref()
            .and_then(|flags| flags.get(seat))
            .copied()
            .unwrap_or(false);
        let reach_flag = if reach { "（立直）" } else { "" };

        let river = kyoku
            .discarded
            .as_ref()
            .and_then(|piles| piles.get(seat))
            .map(|pile| {
                if pile.is_empty() {
                    "无".to_string()
                } else {
                    pile.iter()
                        .map(|entry| {
                            let qualifier = if entry.is_tsumogiri() { "摸切" } else { "手切" };
                            format!("{qualifier}{}", tile_to_natural(entry.tile()))
                        })
                        .collect::<Vec<_>>()
                        .join("、")
                }
            })
            .unwrap_or_else(|| "无".to_string());

        let melds = kyoku
            .melded
            .as_ref()
            .and_then(|melds| melds.get(seat))
            .map(|melds| melds_to_natural(melds, variant))
            .unwrap_or_else(|| "无".to_string());

        format!("{name}{reach_flag} 牌河: {river}；副露: {melds}")
    }

    fn recommendation_section(
        &self,
        lines: &mut Vec<String>,
        ranked: &RankedRecommendation,
        recommendation: &Value,
        top_k: usize,
    ) {
        let shown = ranked.options.len().min(top_k);
        lines.push(format!(
            "AI 推荐（前{shown}项，解析来源: {}）:",
            ranked.provenance
        ));

        if ranked.options.is_empty() {
            // Last resort: the payload itself may still describe one move.
            if recommendation.get("type").is_some() {
                let descriptor = crate::action::ActionDescriptor::from_value(recommendation);
                let prob = recommendation
                    .get("prob")
                    .map(|p| format_probability(Probability::from_value(p).as_ref()))
                    .unwrap_or_default();
                lines.push(format!("1. {}{prob}", descriptor.to_natural()));
            } else {
                lines.push("无可解析的推荐".to_string());
            }
            return;
        }

        for (idx, option) in ranked.options.iter().take(top_k).enumerate() {
            // Entries past the decoder's cap fall back to their raw form.
            let text = ranked
                .rendered
                .get(idx)
                .map(|(text, _)| text.clone())
                .unwrap_or_else(|| option.action.raw_form());
            let prob = format_probability(option.probability.as_ref());
            lines.push(format!("{}. {text}{prob}", idx + 1));
        }
    }

    /// Engine meta summary: shanten, furiten and friends, plus the top
    /// raw q-values. Helpful signal for the generative engine.
    fn meta_section(&self, lines: &mut Vec<String>, recommendation: &Value) {
        let meta = match recommendation.get("meta") {
            Some(Value::Object(meta)) => Some(meta),
            _ => recommendation.as_object().filter(|map| {
                map.contains_key("q_values") || map.contains_key("mask_bits")
            }),
        };
        let Some(meta) = meta else {
            return;
        };

        let mut meta_lines: Vec<String> = Vec::new();
        for key in ["shanten", "at_furiten", "is_greedy", "eval_time_ns", "batch_size"] {
            if let Some(value) = meta.get(key) {
                meta_lines.push(format!("{key}: {}", scalar_display(value)));
            }
        }

        if let Some(q_values) = meta.get("q_values").and_then(Value::as_array) {
            let mut indexed: Vec<(usize, f64)> = q_values
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.as_f64().map(|f| (i, f)))
                .collect();
            if !indexed.is_empty() {
                indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                let top = indexed
                    .iter()
                    .take(3)
                    .map(|(i, v)| format!("{i}->{v:.4}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                meta_lines.push(format!("q_values(top3 indices->value): {top}"));
            }
        }

        if !meta_lines.is_empty() {
            lines.push(String::new());
            lines.push(format!("AI meta: {}", meta_lines.join("；")));
        }
    }
}

/// Wind-relative seat names, 1-indexed, with a plain positional
/// fallback when the dealer is unknown.
fn seat_names(seat_count: usize, oya: Option<usize>) -> Vec<String> {
    const WINDS: [&str; 4] = ["东", "南", "西", "北"];
    (0..seat_count)
        .map(|idx| match oya {
            None => format!("第{}位", idx + 1),
            Some(oya) => {
                let offset =
                    (idx as i64 - oya as i64).rem_euclid(seat_count.max(1) as i64) as usize;
                match WINDS.get(offset) {
                    Some(wind) => format!("第{}位({}家)", idx + 1, wind),
                    None => format!("第{}位", idx + 1),
                }
            }
        })
        .collect()
}

fn seat_name(names: &[String], idx: usize) -> String {
    names
        .get(idx)
        .cloned()
        .unwrap_or_else(|| format!("第{}位", idx + 1))
}

fn melds_to_natural(melds: &[Meld], variant: SeatVariant) -> String {
    if melds.is_empty() {
        return "无".to_string();
    }
    melds
        .iter()
        .map(|meld| match meld {
            Meld::Detailed {
                tiles,
                call_type,
                from,
            } => {
                let tiles_text = tiles
                    .iter()
                    .map(|t| tile_to_natural(t))
                    .collect::<Vec<_>>()
                    .join("、");
                let mut annotation = call_type
                    .as_deref()
                    .map(action_tag_to_natural)
                    .unwrap_or_default();
                if let Some(label) = from.and_then(|o| relative_seat_label(o, variant)) {
                    if !annotation.is_empty() {
                        annotation.push(' ');
                    }
                    annotation.push_str("来自");
                    annotation.push_str(label);
                }
                if annotation.is_empty() {
                    format!("[{tiles_text}]")
                } else {
                    format!("[{tiles_text}]({annotation})")
                }
            }
            Meld::Tiles(tiles) => {
                let tiles_text = tiles
                    .iter()
                    .map(|t| tile_to_natural(t))
                    .collect::<Vec<_>>()
                    .join("、");
                format!("[{tiles_text}]")
            }
            Meld::Raw(text) => text.clone(),
        })
        .collect::<Vec<_>>()
        .join("，")
}

fn scalar_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Format a probability as a parenthetical suffix.
///
/// Values in `[0,1]` are fractions shown as percentages, values in
/// `(1,100]` are already percentages, anything else numeric is shown
/// verbatim, and a non-numeric value is displayed as its raw text.
/// Absent probability renders nothing at all.
pub fn format_probability(prob: Option<&Probability>) -> String {
    match prob {
        None => String::new(),
        Some(Probability::Raw(raw)) => format!(" ({raw})"),
        Some(Probability::Value(v)) => {
            if (0.0..=1.0).contains(v) {
                format!(" ({:.1}%)", v * 100.0)
            } else if (1.0..=100.0).contains(v) {
                format!(" ({v:.1}%)")
            } else {
                format!(" ({v})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_probability_formatting() {
        assert_eq!(
            format_probability(Some(&Probability::Value(0.873))),
            " (87.3%)"
        );
        assert_eq!(
            format_probability(Some(&Probability::Value(42.0))),
            " (42.0%)"
        );
        assert_eq!(format_probability(None), "");
        assert_eq!(
            format_probability(Some(&Probability::Raw("n/a".into()))),
            " (n/a)"
        );
        // 1.0 counts as a fraction
        assert_eq!(
            format_probability(Some(&Probability::Value(1.0))),
            " (100.0%)"
        );
        // out of both ranges: verbatim
        assert_eq!(
            format_probability(Some(&Probability::Value(250.0))),
            " (250)"
        );
    }

    #[test]
    fn test_seat_names_relative_to_dealer() {
        let names = seat_names(4, Some(0));
        assert_eq!(names[0], "第1位(东家)");
        assert_eq!(names[2], "第3位(西家)");

        let names = seat_names(4, Some(2));
        assert_eq!(names[2], "第3位(东家)");
        assert_eq!(names[0], "第1位(西家)");

        // unknown dealer: positional fallback
        let names = seat_names(4, None);
        assert_eq!(names[1], "第2位");
    }

    #[test]
    fn test_compose_never_fails_on_empty_input() {
        let composer = PromptComposer::new();
        let text = composer.compose(
            &GameContext::default(),
            &KyokuContext::default(),
            &Value::Null,
            &ComposeOptions::default(),
        );
        assert!(text.contains("场风: ??局"));
        assert!(text.contains("庄家: 未知位"));
        assert!(text.contains("宝牌: 未知"));
        assert!(text.contains("分数: 无"));
        assert!(text.contains("我的手牌: 未知"));
        assert!(text.contains("我摸到: 无"));
        assert!(text.contains("无可解析的推荐"));
    }

    #[test]
    fn test_compose_header_and_dora_resolution() {
        let game = GameContext {
            bakaze: Some("E".into()),
            kyoku: Some(2),
            honba: 1,
            kyotaku: 2,
            oya: Some(1),
            dora_indicators: vec!["9m".into(), "N".into()],
            ..Default::default()
        };
        let composer = PromptComposer::new();
        let text = composer.compose(
            &game,
            &KyokuContext::default(),
            &Value::Null,
            &ComposeOptions::default(),
        );
        // indicators resolve through the successor mapping
        assert!(text.contains("场风: 东2局；本场: 1本；供托: 2；庄家: 2位；宝牌: 一万、东。"));
    }

    #[test]
    fn test_compose_ledger() {
        let game = GameContext {
            oya: Some(0),
            scores: Some(vec![25000, 25000, 25000, 25000]),
            player_reached: Some(vec![false, true, false, false]),
            ..Default::default()
        };
        let kyoku: KyokuContext = serde_json::from_value(json!({
            "discarded": [
                [{"tile": "1m", "tsumogiri": true}, "9p"],
                [], [], []
            ],
            "melded": [
                [],
                [{"tiles": ["2m", "3m", "4m"], "type": "chi", "from": 3}],
                [["E", "E", "E"]],
                []
            ]
        }))
        .unwrap();
        let composer = PromptComposer::new();
        let text = composer.compose(&game, &kyoku, &Value::Null, &ComposeOptions::default());

        assert!(text.contains("第1位(东家) 牌河: 摸切一万、手切九筒；副露: 无"));
        assert!(text.contains("第2位(南家)（立直） 牌河: 无；副露: [二万、三万、四万](吃 来自上家)"));
        assert!(text.contains("第3位(西家) 牌河: 无；副露: [东、东、东]"));
    }

    #[test]
    fn test_compose_recommendation_lines() {
        let payload = json!({
            "options": [["dahai", 0.8], ["pon", 0.15], ["none", 0.05]]
        });
        let composer = PromptComposer::new();
        let text = composer.compose(
            &GameContext::default(),
            &KyokuContext::default(),
            &payload,
            &ComposeOptions {
                top_k: 3,
                three_player: false,
            },
        );
        assert!(text.contains("AI 推荐（前3项，解析来源: 来自 options 字段）:"));
        assert!(text.contains("1. 打 (80.0%)"));
        assert!(text.contains("2. 碰 (15.0%)"));
        // third line exceeds the rich-rendering cap: raw form
        assert!(text.contains("3. none (5.0%)"));
    }

    #[test]
    fn test_compose_type_field_fallback() {
        let payload = json!({"type": "dahai", "pai": "8p", "prob": 0.66});
        let composer = PromptComposer::new();
        let text = composer.compose(
            &GameContext::default(),
            &KyokuContext::default(),
            &payload,
            &ComposeOptions::default(),
        );
        assert!(text.contains("1. 打八筒 (66.0%)"));
    }

    #[test]
    fn test_compose_meta_summary() {
        let payload = json!({
            "meta": {
                "q_values": [0.1, 0.9, 0.5],
                "mask_bits": 0b111,
                "shanten": 1,
                "at_furiten": false,
            }
        });
        let composer = PromptComposer::new();
        let text = composer.compose(
            &GameContext::default(),
            &KyokuContext::default(),
            &payload,
            &ComposeOptions::default(),
        );
        assert!(text.contains("AI meta: shanten: 1；at_furiten: false；"));
        assert!(text.contains("q_values(top3 indices->value): 1->0.9000, 2->0.5000, 0->0.1000"));
    }

    #[test]
    fn test_template_selection() {
        let game = GameContext::default();
        let kyoku = KyokuContext::default();
        let opts = ComposeOptions::default();

        let strategic = PromptComposer::new().compose(&game, &kyoku, &Value::Null, &opts);
        assert!(strategic.contains("安全与风险"));
        assert!(strategic.contains("鸣牌取舍"));

        let concise = PromptComposer::with_template(InstructionTemplate::Concise)
            .compose(&game, &kyoku, &Value::Null, &opts);
        assert!(concise.contains("选项解释"));
        assert!(!concise.contains("安全与风险"));
    }

    #[test]
    fn test_seat_count_priority() {
        // melds alone fix the seat count
        let kyoku: KyokuContext =
            serde_json::from_value(json!({"melded": [[], [], []]})).unwrap();
        let composer = PromptComposer::new();
        let text = composer.compose(
            &GameContext::default(),
            &kyoku,
            &Value::Null,
            &ComposeOptions::default(),
        );
        assert!(text.contains("第3位"));
        assert!(!text.contains("第4位"));

        // default without any sequence: 3 when the flag is set
        let text = composer.compose(
            &GameContext::default(),
            &KyokuContext::default(),
            &Value::Null,
            &ComposeOptions {
                top_k: 3,
                three_player: true,
            },
        );
        assert!(text.contains("第3位"));
        assert!(!text.contains("第4位"));
    }
}
