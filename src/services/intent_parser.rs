//! Rule-based question parser
//!
//! Maps free text (Spanish first, English accepted) to an [`Intent`], a
//! [`WindowDescriptor`] and a confidence score. Matching is static: ordered
//! tables, no learning. Table order is significant in both passes: the
//! first lexicon entry wins a confidence tie and the first literal window
//! phrase found wins outright.

use crate::constants::{
    BASE_CONFIDENCE, CLARIFICATION_THRESHOLD, DAYS_PER_MONTH, DAYS_PER_WEEK, DAYS_PER_YEAR,
    DEFAULT_WINDOW_DAYS, FALLBACK_CONFIDENCE, KEYWORD_BONUS,
};
use crate::models::{Intent, ParsedQuery, WindowDescriptor};
use regex::Regex;
use tracing::debug;

/// How an entry's keywords are located in the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchRule {
    /// Anywhere, including inside longer words ("volatil" in "volatilidad")
    Substring,
    /// Only between word boundaries ("ema" must not fire on "sistema")
    WholeWord,
}

struct LexiconEntry {
    intent: Intent,
    keywords: &'static [&'static str],
    rule: MatchRule,
}

/// Intent lexicon in precedence order
const INTENT_LEXICON: &[LexiconEntry] = &[
    LexiconEntry {
        intent: Intent::Price,
        keywords: &["precio", "price", "cotiza", "vale", "cuesta", "valor", "cierre"],
        rule: MatchRule::Substring,
    },
    LexiconEntry {
        intent: Intent::Volume,
        keywords: &["volumen", "volume", "negociad", "operaciones", "trades", "liquidez"],
        rule: MatchRule::Substring,
    },
    LexiconEntry {
        intent: Intent::Rsi,
        keywords: &[
            "rsi",
            "fuerza relativa",
            "sobrecompra",
            "sobrecomprado",
            "sobreventa",
            "sobrevendido",
            "overbought",
            "oversold",
        ],
        rule: MatchRule::WholeWord,
    },
    LexiconEntry {
        intent: Intent::Sma,
        keywords: &[
            "sma",
            "media móvil",
            "media movil",
            "media simple",
            "promedio móvil",
            "promedio movil",
            "moving average",
        ],
        rule: MatchRule::WholeWord,
    },
    LexiconEntry {
        intent: Intent::Ema,
        keywords: &["ema", "exponencial", "exponential"],
        rule: MatchRule::WholeWord,
    },
    LexiconEntry {
        intent: Intent::Volatility,
        keywords: &["volatil", "volátil", "volatility", "riesgo", "desviación", "desviacion", "fluctua"],
        rule: MatchRule::Substring,
    },
    LexiconEntry {
        intent: Intent::Macd,
        keywords: &["macd", "convergencia", "divergencia", "histograma"],
        rule: MatchRule::WholeWord,
    },
    LexiconEntry {
        intent: Intent::Bollinger,
        keywords: &["bollinger", "bandas", "bands"],
        rule: MatchRule::Substring,
    },
    LexiconEntry {
        intent: Intent::Comparison,
        keywords: &[
            "compara",
            "comparar",
            "comparado",
            "comparación",
            "comparacion",
            "versus",
            "vs",
            "frente a",
            "contra",
        ],
        rule: MatchRule::WholeWord,
    },
    LexiconEntry {
        intent: Intent::Correlation,
        keywords: &["correlaci", "correlation", "relación", "relacion"],
        rule: MatchRule::Substring,
    },
];

/// Literal day-count phrases, checked before calendar years
const DAY_PHRASES: &[(&str, usize)] = &[
    ("últimas dos semanas", 14),
    ("ultimas dos semanas", 14),
    ("última semana", 7),
    ("ultima semana", 7),
    ("semana pasada", 7),
    ("esta semana", 7),
    ("last week", 7),
    ("past week", 7),
    ("último mes", 30),
    ("ultimo mes", 30),
    ("mes pasado", 30),
    ("este mes", 30),
    ("last month", 30),
    ("past month", 30),
    ("último trimestre", 90),
    ("ultimo trimestre", 90),
    ("last quarter", 90),
    ("último semestre", 180),
    ("ultimo semestre", 180),
    ("último año", 365),
    ("ultimo año", 365),
    ("ultimo ano", 365),
    ("last year", 365),
    ("past year", 365),
    ("hoy", 1),
    ("today", 1),
];

/// Calendar years that appear as literal phrases (dataset coverage)
const FIRST_LITERAL_YEAR: i32 = 2020;
const LAST_LITERAL_YEAR: i32 = 2025;

/// `<integer> <unit>` with Spanish and English unit spellings, longest first.
/// Single-letter units must touch the number (`10d`, `2y`), so the
/// conjunction in "20 y 50 días" is not read as years.
const PERIOD_PATTERN: &str = r"(\d+)(?:\s*(días|dias|día|dia|days|day|semanas|semana|weeks|week|sem|wks|wk|meses|mes|months|month|mths|mth|mo|años|año|anos|ano|years|year|yrs|yr)|(d|w|y))\b";

fn unit_to_days(unit: &str) -> usize {
    match unit {
        "semanas" | "semana" | "weeks" | "week" | "sem" | "wks" | "wk" | "w" => DAYS_PER_WEEK,
        "meses" | "mes" | "months" | "month" | "mths" | "mth" | "mo" => DAYS_PER_MONTH,
        "años" | "año" | "anos" | "ano" | "years" | "year" | "yrs" | "yr" | "y" => DAYS_PER_YEAR,
        _ => 1,
    }
}

/// True when `phrase` occurs in `text` with no letter or digit on either side
fn contains_word(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(start, matched)| {
        let before = text[..start].chars().next_back();
        let after = text[start + matched.len()..].chars().next();
        !before.map_or(false, char::is_alphanumeric) && !after.map_or(false, char::is_alphanumeric)
    })
}

impl LexiconEntry {
    fn keyword_hits(&self, text: &str) -> usize {
        self.keywords
            .iter()
            .filter(|keyword| match self.rule {
                MatchRule::Substring => text.contains(*keyword),
                MatchRule::WholeWord => contains_word(text, keyword),
            })
            .count()
    }
}

/// Free text → [`ParsedQuery`]
pub struct IntentParser {
    window_phrases: Vec<(String, WindowDescriptor)>,
    period_pattern: Regex,
}

impl IntentParser {
    pub fn new() -> Self {
        let mut window_phrases: Vec<(String, WindowDescriptor)> = DAY_PHRASES
            .iter()
            .map(|(phrase, days)| (phrase.to_string(), WindowDescriptor::Days(*days)))
            .collect();
        window_phrases.extend(
            (FIRST_LITERAL_YEAR..=LAST_LITERAL_YEAR)
                .map(|year| (year.to_string(), WindowDescriptor::CalendarYear(year))),
        );

        Self {
            window_phrases,
            // Static pattern, covered by tests
            period_pattern: Regex::new(PERIOD_PATTERN).expect("period pattern is valid"),
        }
    }

    /// Parse a question
    pub fn parse(&self, text: &str) -> ParsedQuery {
        let normalized = text.trim().to_lowercase();
        let (intent, confidence, metric) = match self.resolve_intent(&normalized) {
            Some((intent, confidence)) => (intent, confidence, Some(intent)),
            None => (Intent::Explore, FALLBACK_CONFIDENCE, None),
        };
        let window = self.resolve_window(&normalized);

        debug!(%intent, %window, confidence, "Parsed query");

        ParsedQuery {
            intent,
            metric,
            window,
            confidence,
            raw_text: text.to_string(),
        }
    }

    /// Highest-scoring lexicon entry; ties keep the earliest entry
    fn resolve_intent(&self, normalized: &str) -> Option<(Intent, f64)> {
        let mut best: Option<(Intent, f64)> = None;
        for entry in INTENT_LEXICON {
            let hits = entry.keyword_hits(normalized);
            if hits == 0 {
                continue;
            }
            let score = (BASE_CONFIDENCE + KEYWORD_BONUS * hits as f64).min(1.0);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((entry.intent, score));
            }
        }
        best
    }

    fn resolve_window(&self, normalized: &str) -> WindowDescriptor {
        if let Some((_, window)) = self
            .window_phrases
            .iter()
            .find(|(phrase, _)| normalized.contains(phrase.as_str()))
        {
            return *window;
        }

        self.period_pattern
            .captures_iter(normalized)
            .find_map(|caps| {
                let count: usize = caps.get(1)?.as_str().parse().ok().filter(|n| *n > 0)?;
                let unit = caps.get(2).or_else(|| caps.get(3))?.as_str();
                let days = count.checked_mul(unit_to_days(unit))?;
                Some(WindowDescriptor::Days(days))
            })
            .unwrap_or(WindowDescriptor::Days(DEFAULT_WINDOW_DAYS))
    }

    /// Whether a parse is confident enough to act on
    pub fn is_valid(&self, parsed: &ParsedQuery, threshold: f64) -> bool {
        parsed.confidence >= threshold
    }

    /// Whether the user should be asked to rephrase
    pub fn needs_clarification(&self, parsed: &ParsedQuery) -> bool {
        parsed.confidence < CLARIFICATION_THRESHOLD
    }

    /// One-line restatement of what was understood
    pub fn explain(&self, parsed: &ParsedQuery) -> String {
        format!(
            "Entendí que preguntas por {} en {} (confianza {:.0}%).",
            parsed.intent.display_name(),
            parsed.window.describe(),
            parsed.confidence * 100.0
        )
    }

    pub fn ask_for_clarification(&self, parsed: &ParsedQuery) -> String {
        if parsed.raw_text.trim().is_empty() {
            return "¿Qué te gustaría saber sobre SOL? Puedes preguntar por precio, volumen, RSI, medias móviles, volatilidad, MACD o bandas de Bollinger.".to_string();
        }
        format!(
            "No estoy seguro de haber entendido \"{}\". ¿Te interesa el precio, el volumen, el RSI, la volatilidad o alguna media móvil? Indica también el periodo, por ejemplo \"últimos 30 días\" o \"en 2023\".",
            parsed.raw_text.trim()
        )
    }

    /// Follow-up questions keyed by the resolved intent
    pub fn suggest_follow_up(&self, parsed: &ParsedQuery) -> Vec<String> {
        let suggestions: &[&str] = match parsed.intent {
            Intent::Price => &[
                "¿Cuál ha sido la volatilidad en el mismo periodo?",
                "¿Cómo está el RSI de los últimos 14 días?",
            ],
            Intent::Rsi => &[
                "¿Está SOL en sobrecompra (RSI > 70) o en sobreventa (RSI < 30)?",
                "¿Cómo se compara el precio con su media móvil de 20 días?",
            ],
            Intent::Volume => &[
                "¿Existe correlación entre el volumen y el precio?",
                "¿Cómo ha evolucionado el precio en el mismo periodo?",
            ],
            Intent::Volatility => &[
                "¿Qué dicen las bandas de Bollinger?",
                "¿Cuál es el ATR actual?",
            ],
            Intent::Sma | Intent::Ema | Intent::Comparison => &[
                "¿Qué indica el MACD?",
                "¿Cómo está el RSI?",
            ],
            Intent::Macd | Intent::Bollinger => &[
                "¿Cuál es la volatilidad actual?",
                "¿Cómo está el RSI?",
            ],
            Intent::Correlation => &[
                "¿Cuál fue el volumen total del periodo?",
                "¿Cómo ha evolucionado el precio?",
            ],
            Intent::Explore => &[
                "¿Cuál es el precio de los últimos 30 días?",
                "¿Cómo está el RSI?",
            ],
        };
        suggestions.iter().map(|s| s.to_string()).collect()
    }
}

impl Default for IntentParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> IntentParser {
        IntentParser::new()
    }

    #[test]
    fn test_rsi_last_fourteen_days() {
        let parsed = parser().parse("RSI últimos 14 días");
        assert_eq!(parsed.intent, Intent::Rsi);
        assert_eq!(parsed.metric, Some(Intent::Rsi));
        assert_eq!(parsed.window, WindowDescriptor::Days(14));
        assert!(parsed.confidence >= 0.5);
        assert_eq!(parsed.raw_text, "RSI últimos 14 días");
    }

    #[test]
    fn test_empty_text_falls_back_to_explore() {
        let p = parser();
        for text in ["", "   ", "\t\n"] {
            let parsed = p.parse(text);
            assert_eq!(parsed.intent, Intent::Explore);
            assert_eq!(parsed.metric, None);
            assert_eq!(parsed.confidence, 0.2);
            assert_eq!(parsed.window, WindowDescriptor::Days(30));
            assert!(!p.is_valid(&parsed, 0.3));
            assert!(p.is_valid(&parsed, 0.2));
            assert!(p.needs_clarification(&parsed));
        }
    }

    #[test]
    fn test_volume_in_calendar_year() {
        let parsed = parser().parse("volumen en 2023");
        assert_eq!(parsed.intent, Intent::Volume);
        assert_eq!(parsed.window, WindowDescriptor::CalendarYear(2023));
    }

    #[test]
    fn test_confidence_counts_distinct_keywords() {
        let parsed = parser().parse("rsi: ¿sobrecompra o sobreventa?");
        assert_eq!(parsed.intent, Intent::Rsi);
        assert!((parsed.confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_is_capped() {
        let parsed = parser().parse("precio price cotiza vale cuesta valor cierre");
        assert_eq!(parsed.intent, Intent::Price);
        assert_eq!(parsed.confidence, 1.0);
    }

    #[test]
    fn test_ties_go_to_earliest_entry() {
        // price and volume both score 0.6; price comes first
        let parsed = parser().parse("precio y volumen");
        assert_eq!(parsed.intent, Intent::Price);

        // a strictly higher score still wins regardless of order
        let parsed = parser().parse("precio del volumen negociado");
        assert_eq!(parsed.intent, Intent::Volume);
    }

    #[test]
    fn test_whole_word_rule_avoids_false_positives() {
        let parsed = parser().parse("explícame el sistema");
        assert_eq!(parsed.intent, Intent::Explore);

        let parsed = parser().parse("la EMA de 12");
        assert_eq!(parsed.intent, Intent::Ema);
    }

    #[test]
    fn test_case_folding() {
        let parsed = parser().parse("  PRECIO de SOL  ");
        assert_eq!(parsed.intent, Intent::Price);
    }

    #[test]
    fn test_literal_phrases() {
        let p = parser();
        assert_eq!(p.parse("precio de la última semana").window, WindowDescriptor::Days(7));
        assert_eq!(p.parse("precio del último mes").window, WindowDescriptor::Days(30));
        assert_eq!(p.parse("volumen último trimestre").window, WindowDescriptor::Days(90));
        assert_eq!(p.parse("precio del último año").window, WindowDescriptor::Days(365));
        assert_eq!(p.parse("precio hoy").window, WindowDescriptor::Days(1));
        assert_eq!(p.parse("rsi 2021").window, WindowDescriptor::CalendarYear(2021));
    }

    #[test]
    fn test_first_literal_phrase_wins() {
        // day phrases precede year literals in the table
        let parsed = parser().parse("precio de la última semana de 2023");
        assert_eq!(parsed.window, WindowDescriptor::Days(7));
    }

    #[test]
    fn test_literal_phrase_beats_numeric_rule() {
        let parsed = parser().parse("rsi de 14 días en 2022");
        assert_eq!(parsed.window, WindowDescriptor::CalendarYear(2022));
    }

    #[test]
    fn test_numeric_units() {
        let p = parser();
        assert_eq!(p.parse("precio 3 semanas").window, WindowDescriptor::Days(21));
        assert_eq!(p.parse("precio 1 semana").window, WindowDescriptor::Days(7));
        assert_eq!(p.parse("precio 2 meses").window, WindowDescriptor::Days(60));
        assert_eq!(p.parse("precio 1 mes").window, WindowDescriptor::Days(30));
        assert_eq!(p.parse("precio 2 años").window, WindowDescriptor::Days(730));
        assert_eq!(p.parse("price 5 weeks").window, WindowDescriptor::Days(35));
        assert_eq!(p.parse("price 10d").window, WindowDescriptor::Days(10));
        assert_eq!(p.parse("price 1 year").window, WindowDescriptor::Days(365));
        assert_eq!(p.parse("precio 45 dias").window, WindowDescriptor::Days(45));
    }

    #[test]
    fn test_single_letter_units_must_touch_the_number() {
        let p = parser();
        assert_eq!(p.parse("compara sma 20 y 50 días").window, WindowDescriptor::Days(50));
        assert_eq!(p.parse("precio 2y").window, WindowDescriptor::Days(730));
        assert_eq!(p.parse("precio 3w").window, WindowDescriptor::Days(21));
        assert_eq!(p.parse("precio 5 d").window, WindowDescriptor::Days(30));
        assert_eq!(p.parse("precio 2 w").window, WindowDescriptor::Days(30));
    }

    #[test]
    fn test_numbers_without_units_use_default_window() {
        let p = parser();
        assert_eq!(p.parse("sma 50").window, WindowDescriptor::Days(30));
        assert_eq!(p.parse("precio 0 días").window, WindowDescriptor::Days(30));
        assert_eq!(p.parse("precio 7 dinosaurios").window, WindowDescriptor::Days(30));
    }

    #[test]
    fn test_window_is_independent_of_intent() {
        let parsed = parser().parse("qué pasó en 2024");
        assert_eq!(parsed.intent, Intent::Explore);
        assert_eq!(parsed.window, WindowDescriptor::CalendarYear(2024));
    }

    #[test]
    fn test_each_lexicon_entry_is_reachable() {
        let p = parser();
        let cases = [
            ("cuánto vale sol", Intent::Price),
            ("volumen", Intent::Volume),
            ("rsi", Intent::Rsi),
            ("media móvil", Intent::Sma),
            ("ema", Intent::Ema),
            ("volatilidad", Intent::Volatility),
            ("macd", Intent::Macd),
            ("bollinger", Intent::Bollinger),
            ("versus", Intent::Comparison),
            ("correlation", Intent::Correlation),
        ];
        for (text, expected) in cases {
            assert_eq!(p.parse(text).intent, expected, "text: {}", text);
        }
    }

    #[test]
    fn test_helpers() {
        let p = parser();
        let parsed = p.parse("precio últimos 7 días");
        assert!(p.explain(&parsed).contains("precio"));
        assert!(p.explain(&parsed).contains("los últimos 7 días"));
        assert!(!p.needs_clarification(&parsed));

        let follow_up = p.suggest_follow_up(&parsed);
        assert!(follow_up.iter().any(|s| s.contains("volatilidad")));
        assert!(follow_up.iter().any(|s| s.contains("RSI")));

        let rsi = p.parse("rsi");
        assert!(p.suggest_follow_up(&rsi).iter().any(|s| s.contains("sobrecompra")));

        let volume = p.parse("volumen");
        assert!(p.suggest_follow_up(&volume).iter().any(|s| s.contains("correlación")));

        let vague = p.parse("hola");
        assert!(p.ask_for_clarification(&vague).contains("hola"));
    }
}
