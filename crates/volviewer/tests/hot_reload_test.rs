//! End-to-end hot reload: a running viewer picks up shader edits.

use std::path::Path;
use std::time::{Duration, Instant};

use volviewer::{ShaderConfig, Viewer, ViewerConfig, WatchConfig, WatchMode};

const DEADLINE: Duration = Duration::from_secs(10);
const HEADER: &str = "#version 460 core\n";

fn viewer_for(shader: &Path, backend: WatchMode) -> Viewer {
    Viewer::new(ViewerConfig {
        arena_size: 1 << 20,
        dispatch_timeout_ms: 50,
        frame_rate: 1000,
        watch: WatchConfig {
            backend,
            poll_interval_ms: 50,
        },
        shaders: vec![ShaderConfig {
            path: shader.to_str().unwrap().to_owned(),
            header: HEADER.to_owned(),
        }],
        ..ViewerConfig::default()
    })
    .unwrap()
}

/// Runs frames until the first shader reaches `generation`.
fn frames_until_generation(viewer: &mut Viewer, generation: u64) -> bool {
    let start = Instant::now();
    while start.elapsed() < DEADLINE {
        viewer.frame().unwrap();
        let shader = viewer.shaders().get(0).unwrap().borrow();
        if shader.generation >= generation {
            return true;
        }
    }
    false
}

fn edit_is_reloaded(backend: WatchMode) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("render_model.frag.glsl");
    std::fs::write(&path, "void main() { v1(); }\n").unwrap();

    let mut viewer = viewer_for(&path, backend);
    {
        let shader = viewer.shaders().get(0).unwrap().borrow();
        assert_eq!(shader.generation, 1);
        assert_eq!(shader.text, format!("{HEADER}void main() {{ v1(); }}\n"));
    }
    let arena_before = viewer.arena().cursor();

    std::thread::sleep(Duration::from_millis(1100));
    std::fs::write(&path, "void main() { v2(); }\n").unwrap();
    assert!(frames_until_generation(&mut viewer, 2), "edit never reloaded");

    let shader = viewer.shaders().get(0).unwrap().borrow();
    assert_eq!(shader.text, format!("{HEADER}void main() {{ v2(); }}\n"));
    // Reloads run in scratch.
    assert_eq!(viewer.arena().cursor(), arena_before);
}

#[test]
fn test_native_backend_reloads_edit() {
    edit_is_reloaded(WatchMode::Native);
}

#[test]
fn test_poll_backend_reloads_edit() {
    edit_is_reloaded(WatchMode::Poll);
}

#[test]
fn test_missing_shader_loads_once_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("late.frag.glsl");

    let mut viewer = viewer_for(&path, WatchMode::Poll);
    assert!(!viewer.shaders().get(0).unwrap().borrow().is_loaded());

    std::fs::write(&path, "void main() {}\n").unwrap();
    assert!(frames_until_generation(&mut viewer, 1), "new file never loaded");
}
