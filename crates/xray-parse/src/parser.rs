use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::title::ParsedTitle;

// ── Regex patterns (compiled once) ──────────────────────────────
// Digits are ASCII only; `\d` would also take other scripts' digits.

/// `<series>E<digits><episode title>`, split at the first `E<digits>`.
static RE_BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)^(.*?)E([0-9]+)(.*)$").unwrap());

/// `<series>S<digits>E<digits><episode title>`.
static RE_SEASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^(.*?)S([0-9]+)E([0-9]+)(.*)$").unwrap());

/// `<series>: E<digits><episode title>` or `<series> - E<digits>...`.
static RE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)^(.*?)[:\-]\s*E([0-9]+)(.*)$").unwrap());

/// Order in which the episode patterns are tried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternPriority {
    /// Bare marker, then season-qualified, then separator-qualified.
    ///
    /// The bare marker matches whenever the other two would, so series
    /// titles keep any `S<digits>` or separator that precedes the marker.
    #[default]
    Compatible,
    /// Season-qualified, then separator-qualified, then bare marker.
    MostSpecific,
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    Bare,
    Season,
    Separator,
}

impl PatternPriority {
    fn order(self) -> &'static [Pattern] {
        match self {
            Self::Compatible => &[Pattern::Bare, Pattern::Season, Pattern::Separator],
            Self::MostSpecific => &[Pattern::Season, Pattern::Separator, Pattern::Bare],
        }
    }
}

/// Classify a raw displayed title using the default pattern order.
pub fn parse(raw: &str) -> ParsedTitle {
    parse_with(raw, PatternPriority::default())
}

/// Classify a raw displayed title.
///
/// Never fails: anything that does not yield a valid episode degrades to
/// [`ParsedTitle::Movie`] with the trimmed input as its title.
pub fn parse_with(raw: &str, priority: PatternPriority) -> ParsedTitle {
    let text = trim_title(raw);

    for pattern in priority.order() {
        let parsed = match pattern {
            Pattern::Bare => try_bare(text),
            Pattern::Season => try_season(text),
            Pattern::Separator => try_separator(text),
        };
        if let Some(parsed) = parsed {
            trace!(?pattern, raw = text, "episode pattern matched");
            return parsed;
        }
    }

    ParsedTitle::Movie {
        title: text.to_string(),
    }
}

fn try_bare(text: &str) -> Option<ParsedTitle> {
    let caps = RE_BARE.captures(text)?;
    let digits = caps.get(2)?;
    let season = season_at(text, digits.start());
    build_episode(&caps[1], digits.as_str(), &caps[3], season)
}

fn try_season(text: &str) -> Option<ParsedTitle> {
    let caps = RE_SEASON.captures(text)?;
    let season = parse_positive(&caps[2]);
    build_episode(&caps[1], &caps[3], &caps[4], season)
}

fn try_separator(text: &str) -> Option<ParsedTitle> {
    let caps = RE_SEPARATOR.captures(text)?;
    let digits = caps.get(2)?;
    let season = season_at(text, digits.start());
    build_episode(&caps[1], digits.as_str(), &caps[3], season)
}

/// Season digits from the season-qualified pattern, when its episode digits
/// start at `episode_start`.
fn season_at(text: &str, episode_start: usize) -> Option<u32> {
    let caps = RE_SEASON.captures(text)?;
    if caps.get(3)?.start() != episode_start {
        return None;
    }
    parse_positive(&caps[2])
}

/// Whitespace plus a stray byte order mark, which player markup sometimes
/// carries at the start of the title text.
fn trim_title(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
}

fn parse_positive(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok().filter(|n| *n >= 1)
}

/// Rejects matches with an empty series title or an episode number that is
/// zero or out of range.
fn build_episode(
    series: &str,
    digits: &str,
    episode_title: &str,
    season_number: Option<u32>,
) -> Option<ParsedTitle> {
    let series = trim_title(series);
    if series.is_empty() {
        return None;
    }
    let episode_number = parse_positive(digits)?;
    Some(ParsedTitle::Episode {
        series_title: series.to_string(),
        episode_number,
        episode_title: trim_title(episode_title).to_string(),
        season_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(series: &str, number: u32, title: &str, season: Option<u32>) -> ParsedTitle {
        ParsedTitle::Episode {
            series_title: series.into(),
            episode_number: number,
            episode_title: title.into(),
            season_number: season,
        }
    }

    fn movie(title: &str) -> ParsedTitle {
        ParsedTitle::Movie {
            title: title.into(),
        }
    }

    #[test]
    fn test_marker_without_delimiters() {
        assert_eq!(
            parse("Band of BrothersE7The Breaking Point"),
            episode("Band of Brothers", 7, "The Breaking Point", None)
        );
    }

    #[test]
    fn test_plain_movie() {
        assert_eq!(parse("Margin Call"), movie("Margin Call"));
    }

    #[test]
    fn test_movie_is_trimmed() {
        assert_eq!(parse("  Stranger Things  "), movie("Stranger Things"));
    }

    #[test]
    fn test_internal_whitespace_kept() {
        assert_eq!(parse("\tThe  Big   Short \n"), movie("The  Big   Short"));
        assert_eq!(
            parse(" Mad  Men E2  Ladies  Room "),
            episode("Mad  Men", 2, "Ladies  Room", None)
        );
    }

    #[test]
    fn test_lowercase_marker() {
        assert_eq!(
            parse("Chernobyl e3 Open Wide, O Earth"),
            episode("Chernobyl", 3, "Open Wide, O Earth", None)
        );
    }

    #[test]
    fn test_multi_digit_episode() {
        assert_eq!(
            parse("The SimpsonsE112Homer's Enemy"),
            episode("The Simpsons", 112, "Homer's Enemy", None)
        );
    }

    #[test]
    fn test_leading_zero_digits() {
        assert_eq!(parse("Fargo E09 Aporia"), episode("Fargo", 9, "Aporia", None));
    }

    #[test]
    fn test_first_marker_wins() {
        assert_eq!(
            parse("Westworld E4 Dissonance Theory E5"),
            episode("Westworld", 4, "Dissonance Theory E5", None)
        );
    }

    #[test]
    fn test_empty_episode_title() {
        assert_eq!(parse("Ozark E10"), episode("Ozark", 10, "", None));
    }

    #[test]
    fn test_letter_e_without_digits_is_movie() {
        assert_eq!(parse("The Departed"), movie("The Departed"));
        assert_eq!(parse("Eternal Sunshine"), movie("Eternal Sunshine"));
    }

    #[test]
    fn test_series_name_with_marker_is_split() {
        // Accepted misclassification: "e7" inside the name is a marker.
        assert_eq!(parse("Se7en"), episode("S", 7, "n", None));
    }

    #[test]
    fn test_empty_series_degrades_to_movie() {
        assert_eq!(parse("E1 Pilot"), movie("E1 Pilot"));
    }

    #[test]
    fn test_episode_zero_degrades_to_movie() {
        assert_eq!(parse("Specials E0 Making Of"), movie("Specials E0 Making Of"));
    }

    #[test]
    fn test_overflowing_digits_degrade_to_movie() {
        let raw = "Long Show E99999999999 Finale";
        assert_eq!(parse(raw), movie(raw));
    }

    #[test]
    fn test_season_marker_is_auxiliary() {
        // The bare marker decides the series title; the season fills in.
        assert_eq!(
            parse("Dark S1E3 Past and Present"),
            episode("Dark S1", 3, "Past and Present", Some(1))
        );
    }

    #[test]
    fn test_season_only_when_adjacent_to_first_marker() {
        assert_eq!(
            parse("Dark E3 Past S2E1"),
            episode("Dark", 3, "Past S2E1", None)
        );
    }

    #[test]
    fn test_separator_kept_in_series_by_default() {
        assert_eq!(
            parse("Succession: E5 Tern Haven"),
            episode("Succession:", 5, "Tern Haven", None)
        );
    }

    #[test]
    fn test_most_specific_season() {
        assert_eq!(
            parse_with("Dark S1E3 Past and Present", PatternPriority::MostSpecific),
            episode("Dark", 3, "Past and Present", Some(1))
        );
    }

    #[test]
    fn test_most_specific_separator() {
        assert_eq!(
            parse_with("Succession: E5 Tern Haven", PatternPriority::MostSpecific),
            episode("Succession", 5, "Tern Haven", None)
        );
        assert_eq!(
            parse_with("Succession - E5 Tern Haven", PatternPriority::MostSpecific),
            episode("Succession", 5, "Tern Haven", None)
        );
    }

    #[test]
    fn test_most_specific_falls_back_to_bare() {
        assert_eq!(
            parse_with("Band of BrothersE7The Breaking Point", PatternPriority::MostSpecific),
            episode("Band of Brothers", 7, "The Breaking Point", None)
        );
    }

    #[test]
    fn test_season_zero_is_dropped() {
        assert_eq!(
            parse_with("Doctor Who S0E1 Special", PatternPriority::MostSpecific),
            episode("Doctor Who", 1, "Special", None)
        );
    }

    #[test]
    fn test_output_fields_are_trimmed() {
        let inputs = [
            "  Band of Brothers  E7   The Breaking Point  ",
            " Margin Call ",
            "Succession:E5",
            "Dark S1E3  ",
            "\n",
        ];
        for input in inputs {
            match parse(input) {
                ParsedTitle::Movie { title } => assert_eq!(title, title.trim()),
                ParsedTitle::Episode {
                    series_title,
                    episode_title,
                    ..
                } => {
                    assert_eq!(series_title, series_title.trim());
                    assert_eq!(episode_title, episode_title.trim());
                    assert!(!series_title.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_non_ascii_digits_are_not_a_marker() {
        assert_eq!(
            parse("Show E\u{0663} Part E2 Finale"),
            episode("Show E\u{0663} Part", 2, "Finale", None)
        );
        assert_eq!(parse("Show E\u{0663}"), movie("Show E\u{0663}"));
    }

    #[test]
    fn test_byte_order_mark_is_trimmed() {
        assert_eq!(parse("\u{feff}Margin Call"), movie("Margin Call"));
        assert_eq!(
            parse("\u{feff} Band of BrothersE7The Breaking Point\u{feff}"),
            episode("Band of Brothers", 7, "The Breaking Point", None)
        );
    }

    #[test]
    fn test_priority_deserializes_kebab_case() {
        let p: PatternPriority = serde_json::from_str("\"most-specific\"").unwrap();
        assert_eq!(p, PatternPriority::MostSpecific);
        assert_eq!(PatternPriority::default(), PatternPriority::Compatible);
    }
}
