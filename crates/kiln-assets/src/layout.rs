//! Fixed source and output layout of a kiln site.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// File name of the generated icon sprite, written into the source image directory.
pub const SPRITE_FILE: &str = "sprite.svg";

/// Raster image extensions handled by the image tasks.
pub const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Source and output roots. Every other path is derived from these two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    /// Source tree root
    pub source_dir: PathBuf,

    /// Output tree root
    pub output_dir: PathBuf,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self::new("source", "build")
    }
}

impl SiteLayout {
    /// Create a layout from a source and output root.
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Directory holding the stylesheet entry and everything it imports.
    pub fn styles_dir(&self) -> PathBuf {
        self.source_dir.join("css")
    }

    pub fn styles_entry(&self) -> PathBuf {
        self.styles_dir().join("style.css")
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.source_dir.join("js")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.source_dir.join("img")
    }

    pub fn icons_dir(&self) -> PathBuf {
        self.images_dir().join("icons")
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.source_dir.join("fonts")
    }

    /// The one generated file that lives in the source tree.
    pub fn sprite_path(&self) -> PathBuf {
        self.images_dir().join(SPRITE_FILE)
    }

    pub fn css_out_dir(&self) -> PathBuf {
        self.output_dir.join("css")
    }

    pub fn js_out_dir(&self) -> PathBuf {
        self.output_dir.join("js")
    }

    pub fn img_out_dir(&self) -> PathBuf {
        self.output_dir.join("img")
    }

    /// Whether `path` is a top-level template of the source root.
    pub fn is_template(&self, path: &Path) -> bool {
        has_extension(path, &["html"]) && path.parent() == Some(self.source_dir.as_path())
    }

    /// Whether `path` is a stylesheet under the styles directory.
    pub fn is_stylesheet(&self, path: &Path) -> bool {
        has_extension(path, &["css"]) && path.starts_with(self.styles_dir())
    }
}

/// Check a path's extension against a list, case-insensitively.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// List files directly inside `dir` with one of `extensions`, sorted by path.
///
/// A missing directory yields an empty list.
pub fn files_in(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    collect(dir, Some(1), extensions)
}

/// List files anywhere below `dir` with one of `extensions`, sorted by path.
pub fn files_below(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    collect(dir, None, extensions)
}

fn collect(dir: &Path, max_depth: Option<usize>, extensions: &[&str]) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut walker = WalkDir::new(dir).follow_links(true);
    if let Some(depth) = max_depth {
        walker = walker.max_depth(depth);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| has_extension(p, extensions))
        .collect();

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn derives_paths_from_roots() {
        let layout = SiteLayout::new("src", "out");

        assert_eq!(layout.styles_entry(), PathBuf::from("src/css/style.css"));
        assert_eq!(layout.sprite_path(), PathBuf::from("src/img/sprite.svg"));
        assert_eq!(layout.icons_dir(), PathBuf::from("src/img/icons"));
        assert_eq!(layout.js_out_dir(), PathBuf::from("out/js"));
    }

    #[test]
    fn classifies_templates_and_stylesheets() {
        let layout = SiteLayout::new("src", "out");

        assert!(layout.is_template(Path::new("src/index.html")));
        assert!(!layout.is_template(Path::new("src/layouts/base.html")));
        assert!(layout.is_stylesheet(Path::new("src/css/blocks/header.css")));
        assert!(!layout.is_stylesheet(Path::new("src/index.html")));
    }

    #[test]
    fn lists_top_level_files_only() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("b.svg"), "").unwrap();
        fs::write(temp.path().join("a.SVG"), "").unwrap();
        fs::write(temp.path().join("c.png"), "").unwrap();
        fs::write(temp.path().join("nested/d.svg"), "").unwrap();

        let top = files_in(temp.path(), &["svg"]);
        let names: Vec<_> = top
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.SVG", "b.svg"]);

        assert_eq!(files_below(temp.path(), &["svg"]).len(), 3);
        assert!(files_in(&temp.path().join("missing"), &["svg"]).is_empty());
    }
}
