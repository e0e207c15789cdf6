use std::sync::OnceLock;

use anyhow::{bail, Result};
use regex::Regex;
use serde::Serialize;

use crate::animation::{
    AnimationConfig, AnimationKind, Color, Shape, DEFAULT_DURATION_SECONDS,
    MAX_PROMPT_DURATION_SECONDS, MIN_PROMPT_DURATION_SECONDS,
};
use crate::script::generate_scene_script;

// Each table is checked top to bottom; the first entry with a matching keyword wins.
const SHAPE_KEYWORDS: [(Shape, &[&str]); 2] = [
    (Shape::Square, &["square", "rectangle"]),
    (Shape::Triangle, &["triangle"]),
];

const COLOR_KEYWORDS: [(Color, &[&str]); 4] = [
    (Color::Red, &["red"]),
    (Color::Green, &["green"]),
    (Color::Purple, &["purple", "violet"]),
    (Color::Yellow, &["yellow"]),
];

const ANIMATION_KEYWORDS: [(AnimationKind, &[&str]); 4] = [
    (AnimationKind::Rotate, &["rotate", "spin", "turn"]),
    (AnimationKind::Fade, &["fade", "disappear"]),
    (AnimationKind::Move, &["move", "slide", "shift"]),
    (AnimationKind::Pulse, &["pulse", "beat"]),
];

/// Parsed prompt as returned by `POST /parse-prompt`.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedPrompt {
    #[serde(flatten)]
    pub config: AnimationConfig,
    #[serde(rename = "manimCode")]
    pub script: String,
}

/// Maps free text onto an [`AnimationConfig`]. Never fails: anything it can't
/// recognise keeps the default (circle, blue, grow, 3 seconds).
pub fn parse_prompt(prompt: &str) -> AnimationConfig {
    let lower = prompt.to_lowercase();

    AnimationConfig {
        shape: first_keyword_match(&lower, &SHAPE_KEYWORDS).unwrap_or_default(),
        color: first_keyword_match(&lower, &COLOR_KEYWORDS).unwrap_or_default(),
        animation: first_keyword_match(&lower, &ANIMATION_KEYWORDS).unwrap_or_default(),
        duration: parse_duration_seconds(&lower).unwrap_or(DEFAULT_DURATION_SECONDS),
    }
}

/// Entry point for the HTTP and CLI surfaces: rejects blank input, then parses
/// and attaches the generated scene script.
pub fn parse_prompt_request(prompt: &str) -> Result<ParsedPrompt> {
    if prompt.trim().is_empty() {
        bail!("prompt is empty");
    }

    let config = parse_prompt(prompt);
    tracing::debug!(
        shape = %config.shape,
        color = %config.color,
        animation = %config.animation,
        duration = config.duration,
        "parsed prompt"
    );
    Ok(ParsedPrompt {
        config,
        script: generate_scene_script(&config),
    })
}

fn first_keyword_match<T: Copy>(haystack: &str, table: &[(T, &[&str])]) -> Option<T> {
    table
        .iter()
        .find(|(_, keywords)| contains_any(haystack, keywords))
        .map(|(value, _)| *value)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Only the first ASCII number followed by a seconds-like unit counts; an
/// out-of-range value is dropped rather than clamped.
fn parse_duration_seconds(lower: &str) -> Option<u32> {
    static DURATION_RE: OnceLock<Regex> = OnceLock::new();
    let re = DURATION_RE.get_or_init(|| {
        Regex::new(r"([0-9]+)\s*(?:second|sec|s)").expect("duration regex should compile")
    });
    re.captures(lower)
        .and_then(|capture| capture.get(1))
        .and_then(|value| value.as_str().parse::<u32>().ok())
        .filter(|seconds| {
            (MIN_PROMPT_DURATION_SECONDS..=MAX_PROMPT_DURATION_SECONDS).contains(seconds)
        })
}
