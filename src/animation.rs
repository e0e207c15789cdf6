use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DURATION_SECONDS: u32 = 3;
pub const MIN_PROMPT_DURATION_SECONDS: u32 = 1;
pub const MAX_PROMPT_DURATION_SECONDS: u32 = 10;
pub const MAX_DIRECT_DURATION_SECONDS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Shape {
    #[default]
    Circle,
    Square,
    Triangle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Color {
    Red,
    #[default]
    Blue,
    Green,
    Purple,
    Yellow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum AnimationKind {
    #[default]
    Grow,
    Rotate,
    Fade,
    Move,
    Pulse,
}

impl Shape {
    pub const ALL: [Shape; 3] = [Shape::Circle, Shape::Square, Shape::Triangle];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Square => "square",
            Self::Triangle => "triangle",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|shape| token.trim().eq_ignore_ascii_case(shape.as_str()))
    }
}

impl Color {
    pub const ALL: [Color; 5] = [
        Color::Red,
        Color::Blue,
        Color::Green,
        Color::Purple,
        Color::Yellow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Purple => "purple",
            Self::Yellow => "yellow",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|color| token.trim().eq_ignore_ascii_case(color.as_str()))
    }
}

impl AnimationKind {
    pub const ALL: [AnimationKind; 5] = [
        AnimationKind::Grow,
        AnimationKind::Rotate,
        AnimationKind::Fade,
        AnimationKind::Move,
        AnimationKind::Pulse,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grow => "grow",
            Self::Rotate => "rotate",
            Self::Fade => "fade",
            Self::Move => "move",
            Self::Pulse => "pulse",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| token.trim().eq_ignore_ascii_case(kind.as_str()))
    }
}

// Unknown tokens map to the field default instead of rejecting the request.
macro_rules! lenient_token {
    ($ty:ident, $field:literal) => {
        impl From<String> for $ty {
            fn from(token: String) -> Self {
                $ty::from_token(&token).unwrap_or_else(|| {
                    let fallback = $ty::default();
                    tracing::warn!(
                        field = $field,
                        token = %token,
                        fallback = fallback.as_str(),
                        "unknown token, using default"
                    );
                    fallback
                })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

lenient_token!(Shape, "shape");
lenient_token!(Color, "color");
lenient_token!(AnimationKind, "animation_type");

fn default_duration() -> u32 {
    DEFAULT_DURATION_SECONDS
}

/// One request's worth of animation parameters. Built fresh per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationConfig {
    #[serde(default)]
    pub shape: Shape,
    #[serde(default)]
    pub color: Color,
    #[serde(default, rename = "animation_type", alias = "animationType")]
    pub animation: AnimationKind,
    #[serde(default = "default_duration")]
    pub duration: u32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            shape: Shape::default(),
            color: Color::default(),
            animation: AnimationKind::default(),
            duration: DEFAULT_DURATION_SECONDS,
        }
    }
}

impl AnimationConfig {
    /// Short human label, e.g. `red square rotate`.
    pub fn summary(&self) -> String {
        format!("{} {} {}", self.color, self.shape, self.animation)
    }
}

/// Body of a render call: the config plus an optional raw scene script.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderRequest {
    #[serde(flatten)]
    pub config: AnimationConfig,
    #[serde(
        default,
        rename = "manim_code",
        alias = "manimCode",
        skip_serializing_if = "Option::is_none"
    )]
    pub script_override: Option<String>,
}

impl RenderRequest {
    pub fn from_config(config: AnimationConfig) -> Self {
        Self {
            config,
            script_override: None,
        }
    }

    /// Returns the override only when it carries non-blank text.
    pub fn script_override(&self) -> Option<&str> {
        self.script_override
            .as_deref()
            .filter(|script| !script.trim().is_empty())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let duration = self.config.duration;
        if duration == 0 {
            anyhow::bail!("duration must be at least 1 second");
        }
        if duration > MAX_DIRECT_DURATION_SECONDS {
            anyhow::bail!(
                "duration must be at most {MAX_DIRECT_DURATION_SECONDS} seconds, got {duration}"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_case_insensitive_and_unknown_falls_back() {
        let config: AnimationConfig = serde_json::from_str(
            r#"{"shape":"TRIANGLE","color":"magenta","animation_type":"Pulse","duration":4}"#,
        )
        .expect("config should parse");
        assert_eq!(config.shape, Shape::Triangle);
        assert_eq!(config.color, Color::Blue);
        assert_eq!(config.animation, AnimationKind::Pulse);
        assert_eq!(config.duration, 4);
    }

    #[test]
    fn camel_case_aliases_are_accepted() {
        let request: RenderRequest = serde_json::from_str(
            r#"{"shape":"square","color":"red","animationType":"fade","duration":2,"manimCode":"x = 1"}"#,
        )
        .expect("request should parse");
        assert_eq!(request.config.animation, AnimationKind::Fade);
        assert_eq!(request.script_override(), Some("x = 1"));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: AnimationConfig = serde_json::from_str("{}").expect("empty object parses");
        assert_eq!(config, AnimationConfig::default());
    }

    #[test]
    fn serializes_with_snake_case_field_names() {
        let value = serde_json::to_value(AnimationConfig::default()).expect("serialize");
        assert_eq!(value["animation_type"], "grow");
        assert_eq!(value["shape"], "circle");
        assert_eq!(value["color"], "blue");
        assert_eq!(value["duration"], 3);
    }

    #[test]
    fn blank_override_is_ignored() {
        let mut request = RenderRequest::default();
        request.script_override = Some("   \n".to_owned());
        assert_eq!(request.script_override(), None);
    }

    #[test]
    fn direct_duration_bounds_are_checked() {
        let mut request = RenderRequest::default();
        request.config.duration = 0;
        assert!(request.validate().is_err());
        request.config.duration = 11;
        assert!(request.validate().is_err());
        request.config.duration = 10;
        assert!(request.validate().is_ok());
    }
}
