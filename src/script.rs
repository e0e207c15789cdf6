use crate::animation::{AnimationConfig, AnimationKind, Color, Shape};

/// Scene class every generated script defines; the renderer is told to render it by name.
pub const SCENE_CLASS: &str = "AnimationScene";

const BODY_INDENT: &str = "        ";

/// Fills the config into a Manim scene. Only enum tokens and the integer
/// duration are interpolated, so caller-supplied text never reaches the source.
pub fn generate_scene_script(config: &AnimationConfig) -> String {
    let mut lines = vec![
        "from manim import *".to_owned(),
        String::new(),
        format!("class {SCENE_CLASS}(Scene):"),
        "    def construct(self):".to_owned(),
        format!("{BODY_INDENT}shape = {}", manim_shape(config.shape)),
        format!("{BODY_INDENT}shape.set_color({})", manim_color(config.color)),
        format!("{BODY_INDENT}self.add(shape)"),
    ];
    lines.extend(
        animation_lines(config.animation, config.duration)
            .into_iter()
            .map(|line| format!("{BODY_INDENT}{line}")),
    );

    let mut script = lines.join("\n");
    script.push('\n');
    script
}

fn manim_shape(shape: Shape) -> &'static str {
    match shape {
        Shape::Circle => "Circle()",
        Shape::Square => "Square()",
        Shape::Triangle => "Triangle()",
    }
}

fn manim_color(color: Color) -> &'static str {
    match color {
        Color::Red => "RED",
        Color::Blue => "BLUE",
        Color::Green => "GREEN",
        Color::Purple => "PURPLE",
        Color::Yellow => "YELLOW",
    }
}

fn animation_lines(kind: AnimationKind, duration: u32) -> Vec<String> {
    match kind {
        AnimationKind::Grow => vec![format!(
            "self.play(shape.animate.scale(2), run_time={duration})"
        )],
        AnimationKind::Rotate => vec![format!(
            "self.play(Rotate(shape, angle=2*PI), run_time={duration})"
        )],
        AnimationKind::Fade => vec![format!("self.play(FadeOut(shape), run_time={duration})")],
        AnimationKind::Move => vec![format!(
            "self.play(shape.animate.shift(RIGHT*3), run_time={duration})"
        )],
        AnimationKind::Pulse => {
            let half = f64::from(duration) / 2.0;
            vec![
                format!("self.play(shape.animate.scale(1.5), run_time={half:.1})"),
                format!("self.play(shape.animate.scale(1), run_time={half:.1})"),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt_parser::parse_prompt;

    #[test]
    fn default_config_renders_expected_scene() {
        let script = generate_scene_script(&AnimationConfig::default());
        assert_eq!(
            script,
            concat!(
                "from manim import *\n",
                "\n",
                "class AnimationScene(Scene):\n",
                "    def construct(self):\n",
                "        shape = Circle()\n",
                "        shape.set_color(BLUE)\n",
                "        self.add(shape)\n",
                "        self.play(shape.animate.scale(2), run_time=3)\n",
            )
        );
    }

    #[test]
    fn pulse_splits_duration_in_two_steps() {
        let config = AnimationConfig {
            animation: AnimationKind::Pulse,
            duration: 3,
            ..AnimationConfig::default()
        };
        let script = generate_scene_script(&config);
        assert!(script.contains("        self.play(shape.animate.scale(1.5), run_time=1.5)\n"));
        assert!(script.contains("        self.play(shape.animate.scale(1), run_time=1.5)\n"));
    }

    #[test]
    fn every_parsed_config_yields_well_formed_script() {
        for shape in Shape::ALL {
            for color in Color::ALL {
                for kind in AnimationKind::ALL {
                    let prompt = format!("{kind} a {color} {shape} for 4 seconds");
                    let config = parse_prompt(&prompt);
                    assert_eq!((config.shape, config.color, config.animation), (shape, color, kind));
                    let script = generate_scene_script(&config);

                    assert!(script.starts_with("from manim import *\n"));
                    assert!(script.contains(&format!("class {SCENE_CLASS}(Scene):\n")));
                    assert!(script.contains("    def construct(self):\n"));
                    assert!(script.contains(manim_shape(config.shape)));
                    assert!(script.contains(&format!("set_color({})", manim_color(config.color))));
                    assert!(script.contains("self.play("));
                    for line in script.lines().skip(4).filter(|line| !line.is_empty()) {
                        assert!(line.starts_with(BODY_INDENT), "unindented body line: {line}");
                    }
                }
            }
        }
    }
}
