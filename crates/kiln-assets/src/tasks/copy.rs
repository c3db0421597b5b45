//! Passthrough copy of fonts, favicon and web manifest.

use std::path::PathBuf;

use crate::error::BuildError;
use crate::layout::{files_in, SiteLayout};
use crate::tasks::{copy_file, relative_to, TaskOutput};

/// Copy static assets to the output root, keeping their path relative to the source root.
pub fn copy_static(layout: &SiteLayout) -> Result<TaskOutput, BuildError> {
    let mut sources: Vec<PathBuf> = files_in(&layout.fonts_dir(), &["woff2", "woff"]);
    sources.extend(files_in(&layout.source_dir, &["ico"]));
    sources.extend(files_in(&layout.source_dir, &["webmanifest"]));

    let mut written = Vec::with_capacity(sources.len());
    for source in sources {
        let target = layout
            .output_dir
            .join(relative_to(&source, &layout.source_dir));
        copy_file(&source, &target)?;
        tracing::debug!("Copied {}", source.display());
        written.push(target);
    }

    Ok(TaskOutput::new(written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn copies_static_assets_preserving_paths() {
        let temp = tempdir().unwrap();
        let layout = SiteLayout::new(temp.path().join("source"), temp.path().join("build"));
        fs::create_dir_all(layout.fonts_dir()).unwrap();
        fs::write(layout.fonts_dir().join("inter.woff2"), b"font").unwrap();
        fs::write(layout.fonts_dir().join("notes.txt"), b"skip").unwrap();
        fs::write(layout.source_dir.join("favicon.ico"), b"ico").unwrap();
        fs::write(layout.source_dir.join("manifest.webmanifest"), b"{}").unwrap();

        let output = copy_static(&layout).unwrap();

        assert_eq!(output.len(), 3);
        assert_eq!(
            fs::read(layout.output_dir.join("fonts/inter.woff2")).unwrap(),
            b"font"
        );
        assert!(layout.output_dir.join("favicon.ico").exists());
        assert!(layout.output_dir.join("manifest.webmanifest").exists());
        assert!(!layout.output_dir.join("fonts/notes.txt").exists());
    }

    #[test]
    fn missing_font_dir_copies_nothing() {
        let temp = tempdir().unwrap();
        let layout = SiteLayout::new(temp.path().join("source"), temp.path().join("build"));

        assert!(copy_static(&layout).unwrap().is_empty());
    }
}
