//! # Hot-Reloaded Shader Sources
//!
//! Each shader is a text file with a configured header prepended. The
//! composed text is rebuilt whenever the file changes. A failed reload
//! (unreadable or empty file, invalid UTF-8, arena full) keeps the previous
//! text, so the viewer always has the last good source.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use tracing::{info, warn};
use volviewer_core::{Arena, Span};
use volviewer_os::{FileWatchContext, Platform, WatchResult};

use crate::config::ShaderConfig;

/// The current source of one shader.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderSource {
    /// File the body is read from.
    pub path: String,
    /// Text placed in front of the file's contents.
    pub header: String,
    /// Header followed by the last successfully read body.
    pub text: String,
    /// Number of successful loads.
    pub generation: u64,
}

impl ShaderSource {
    /// Creates an unloaded source.
    #[must_use]
    pub fn new(config: &ShaderConfig) -> Self {
        Self {
            path: config.path.clone(),
            header: config.header.clone(),
            text: String::new(),
            generation: 0,
        }
    }

    /// Whether a load has ever succeeded.
    #[inline]
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.generation > 0
    }
}

/// A shader shared between the library and its watch callback.
pub type SharedShader = Rc<RefCell<ShaderSource>>;

/// Re-reads `path` and swaps in header plus body on success.
///
/// The header and the body are laid out back to back in `arena`, so the
/// composed text is copied out once. Returns whether the source changed.
pub fn reload<P: Platform>(
    platform: &P,
    arena: &mut Arena,
    path: &Path,
    shader: &RefCell<ShaderSource>,
) -> bool {
    let header_len = shader.borrow().header.len();
    let Some(header) = arena.try_alloc(1, 1, header_len) else {
        warn!(path = %path.display(), "no arena space for shader header");
        return false;
    };
    arena
        .bytes_mut(header)
        .copy_from_slice(shader.borrow().header.as_bytes());

    let body = platform.read_whole_file(arena, path);
    if body.is_empty() {
        warn!(path = %path.display(), "shader reload failed, keeping previous source");
        return false;
    }
    debug_assert_eq!(header.end(), body.offset);

    let text = arena.str(Span::new(header.offset, header.len + body.len));
    if text.is_empty() {
        warn!(path = %path.display(), "shader is not valid UTF-8, keeping previous source");
        return false;
    }

    let mut source = shader.borrow_mut();
    source.text.clear();
    source.text.push_str(text);
    source.generation += 1;
    info!(
        path = %path.display(),
        generation = source.generation,
        bytes = source.text.len(),
        "shader loaded"
    );
    true
}

/// Shaders kept current by file watches.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    shaders: Vec<SharedShader>,
}

impl ShaderLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of shaders.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    /// Whether the library is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// The shader at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SharedShader> {
        self.shaders.get(index)
    }

    /// Iterates over all shaders.
    pub fn iter(&self) -> impl Iterator<Item = &SharedShader> {
        self.shaders.iter()
    }

    /// Loads a shader once and registers a watch that reloads it on change.
    ///
    /// A failed first load is not an error: the shader stays unloaded until
    /// its file becomes readable. Returns the shader's index.
    ///
    /// # Errors
    ///
    /// Returns the watch registration error.
    pub fn load<P>(
        &mut self,
        platform: &P,
        arena: &mut Arena,
        watch: &mut FileWatchContext,
        config: &ShaderConfig,
    ) -> WatchResult<usize>
    where
        P: Platform + Clone + 'static,
    {
        let shader: SharedShader = Rc::new(RefCell::new(ShaderSource::new(config)));
        {
            let mut scratch = arena.scratch();
            reload(platform, &mut scratch, Path::new(&config.path), &shader);
        }

        let platform = platform.clone();
        let watched = Rc::clone(&shader);
        watch.add_watch(arena, &config.path, move |path, arena| {
            reload(&platform, arena, path, &watched);
        })?;

        self.shaders.push(shader);
        Ok(self.shaders.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volviewer_os::NativePlatform;

    fn shader(header: &str) -> RefCell<ShaderSource> {
        RefCell::new(ShaderSource::new(&ShaderConfig {
            path: String::new(),
            header: header.to_owned(),
        }))
    }

    #[test]
    fn test_reload_prepends_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render_model.frag.glsl");
        std::fs::write(&path, "void main() {}\n").unwrap();

        let mut arena = Arena::with_capacity(1 << 16).unwrap();
        let source = shader("#version 460 core\n");
        assert!(reload(&NativePlatform::default(), &mut arena, &path, &source));

        let source = source.borrow();
        assert_eq!(source.text, "#version 460 core\nvoid main() {}\n");
        assert_eq!(source.generation, 1);
    }

    #[test]
    fn test_failed_reload_keeps_previous_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post.frag.glsl");
        std::fs::write(&path, "void main() {}\n").unwrap();

        let platform = NativePlatform::default();
        let mut arena = Arena::with_capacity(1 << 16).unwrap();
        let source = shader("// header\n");
        assert!(reload(&platform, &mut arena, &path, &source));

        std::fs::write(&path, "").unwrap();
        assert!(!reload(&platform, &mut arena, &path, &source));
        std::fs::remove_file(&path).unwrap();
        assert!(!reload(&platform, &mut arena, &path, &source));

        let source = source.borrow();
        assert_eq!(source.text, "// header\nvoid main() {}\n");
        assert_eq!(source.generation, 1);
    }

    #[test]
    fn test_disabled_arena_keeps_previous_text() {
        let mut arena = Arena::disabled();
        let source = shader("");
        assert!(!reload(
            &NativePlatform::default(),
            &mut arena,
            Path::new("missing.glsl"),
            &source
        ));
        assert!(!source.borrow().is_loaded());
    }
}
