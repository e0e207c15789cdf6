#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Stand-in for `manim`: writes a tiny file where Manim would put its video.
pub const FAKE_MANIM_OK: &str = r#"
media=""
prev=""
for arg; do
  if [ "$prev" = "--media_dir" ]; then media="$arg"; fi
  prev="$arg"
done
mkdir -p "$media/videos/scene/480p15"
printf 'fake-mp4' > "$media/videos/scene/480p15/AnimationScene.mp4"
"#;

pub const FAKE_MANIM_BROKEN: &str = r#"
echo "ModuleNotFoundError: No module named 'manim'" >&2
exit 1
"#;

pub const FAKE_MANIM_SILENT: &str = "exit 0\n";

pub const FAKE_MANIM_SLOW: &str = "exec sleep 10\n";

/// Stand-in for `ffmpeg`: the last argument is the output path.
pub const FAKE_FFMPEG_OK: &str = r#"
for last; do :; done
printf 'fake-mp4' > "$last"
"#;

pub const FAKE_FFMPEG_BROKEN: &str = r#"
echo "Unknown filter 'blend'" >&2
exit 1
"#;

#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).expect("fake tool should write");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("fake tool should be executable");
    path
}
