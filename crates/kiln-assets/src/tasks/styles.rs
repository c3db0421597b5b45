//! Stylesheet bundling and vendor prefixing using lightningcss.

use std::path::Path;

use lightningcss::bundler::{Bundler, FileProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use serde::Deserialize;

use crate::error::BuildError;
use crate::layout::SiteLayout;
use crate::tasks::{write_file, TaskOutput};

/// Minimum browser major versions to generate prefixed declarations for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrowserTargets {
    pub chrome: Option<u32>,
    pub firefox: Option<u32>,
    pub safari: Option<u32>,
    pub edge: Option<u32>,
    pub ios_saf: Option<u32>,
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            chrome: Some(80),
            firefox: Some(72),
            safari: Some(13),
            edge: Some(80),
            ios_saf: Some(13),
        }
    }
}

impl BrowserTargets {
    /// Convert to lightningcss targets. Versions are encoded as `major << 16`.
    pub fn to_targets(&self) -> Targets {
        let version = |major: Option<u32>| major.map(|m| m << 16);

        Targets {
            browsers: Some(Browsers {
                chrome: version(self.chrome),
                firefox: version(self.firefox),
                safari: version(self.safari),
                edge: version(self.edge),
                ios_saf: version(self.ios_saf),
                ..Browsers::default()
            }),
            ..Targets::default()
        }
    }
}

/// A compiled stylesheet and its source map.
#[derive(Debug, Clone)]
pub struct CompiledStylesheet {
    pub code: String,
    pub map: String,
}

/// Compile the stylesheet entry into `css/style.css` and `css/style.css.map`.
pub fn compile(layout: &SiteLayout, browsers: &BrowserTargets) -> Result<TaskOutput, BuildError> {
    let entry = layout.styles_entry();
    if !entry.is_file() {
        return Err(BuildError::read(&entry, "stylesheet entry not found"));
    }

    // The output directory mirrors the stylesheet directory, so map sources
    // relative to it resolve from the map's own location.
    let compiled = compile_stylesheet(&entry, &layout.styles_dir(), browsers.to_targets())?;

    let css_path = layout.css_out_dir().join("style.css");
    let map_path = layout.css_out_dir().join("style.css.map");

    write_file(
        &css_path,
        format!(
            "{}\n/*# sourceMappingURL=style.css.map */\n",
            compiled.code.trim_end()
        ),
    )?;
    write_file(&map_path, compiled.map)?;

    Ok(TaskOutput::new(vec![css_path, map_path]))
}

/// Bundle `entry` with its imports, add vendor prefixes for `targets`, and print it with a source map.
///
/// Source paths in the map are relative to `project_root`.
pub fn compile_stylesheet(
    entry: &Path,
    project_root: &Path,
    targets: Targets,
) -> Result<CompiledStylesheet, BuildError> {
    let style_error = |message: String| BuildError::StyleError {
        path: entry.display().to_string(),
        message,
    };

    let fs = FileProvider::new();
    let root = project_root.to_string_lossy().into_owned();
    let mut source_map = SourceMap::new(&root);

    let mut stylesheet = {
        let mut bundler = Bundler::new(&fs, Some(&mut source_map), ParserOptions::default());
        bundler
            .bundle(entry)
            .map_err(|e| style_error(e.to_string()))?
    };

    // Prefixed variants are produced by the minify pass, not by printing.
    stylesheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| style_error(e.to_string()))?;

    let result = stylesheet
        .to_css(PrinterOptions {
            minify: false,
            source_map: Some(&mut source_map),
            project_root: Some(&root),
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| style_error(e.to_string()))?;

    let mut mappings = Vec::new();
    source_map
        .write_vlq(&mut mappings)
        .map_err(|e| style_error(format!("source map: {:?}", e)))?;

    let map = serde_json::json!({
        "version": 3,
        "file": "style.css",
        "sources": source_map.get_sources(),
        "sourcesContent": source_map.get_sources_content(),
        "names": source_map.get_names(),
        "mappings": String::from_utf8_lossy(&mappings),
    });

    Ok(CompiledStylesheet {
        code: result.code,
        map: map.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn site(entry: &str) -> (tempfile::TempDir, SiteLayout) {
        let temp = tempdir().unwrap();
        let layout = SiteLayout::new(temp.path().join("source"), temp.path().join("build"));
        fs::create_dir_all(layout.styles_dir()).unwrap();
        fs::write(layout.styles_entry(), entry).unwrap();
        (temp, layout)
    }

    #[test]
    fn flattens_imports() {
        let (_temp, layout) = site("@import \"blocks/header.css\";\n.page { margin: 0; }\n");
        fs::create_dir_all(layout.styles_dir().join("blocks")).unwrap();
        fs::write(
            layout.styles_dir().join("blocks/header.css"),
            ".header { color: red; }\n",
        )
        .unwrap();

        compile(&layout, &BrowserTargets::default()).unwrap();

        let css = fs::read_to_string(layout.css_out_dir().join("style.css")).unwrap();
        assert!(css.contains(".header"));
        assert!(css.contains(".page"));
        assert!(!css.contains("@import"));
        assert!(css.contains("sourceMappingURL=style.css.map"));

        let map = fs::read_to_string(layout.css_out_dir().join("style.css.map")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&map).unwrap();
        let mut sources: Vec<&str> = json["sources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s.as_str().unwrap())
            .collect();
        sources.sort();
        assert_eq!(sources, vec!["blocks/header.css", "style.css"]);
    }

    #[test]
    fn adds_vendor_prefixes_for_targets() {
        let (_temp, layout) = site(".card { user-select: none; }\n");

        compile(&layout, &BrowserTargets::default()).unwrap();

        let css = fs::read_to_string(layout.css_out_dir().join("style.css")).unwrap();
        assert!(css.contains("-webkit-user-select"));
    }

    #[test]
    fn writes_source_map() {
        let (_temp, layout) = site(".a { color: blue; }\n");

        let output = compile(&layout, &BrowserTargets::default()).unwrap();

        assert_eq!(output.len(), 2);
        let map = fs::read_to_string(layout.css_out_dir().join("style.css.map")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&map).unwrap();
        assert_eq!(json["version"], 3);
        assert!(json["mappings"].as_str().is_some());
    }

    #[test]
    fn missing_import_fails_with_path() {
        let (_temp, layout) = site("@import \"nope.css\";\n");

        let err = compile(&layout, &BrowserTargets::default()).unwrap_err();

        assert!(matches!(err, BuildError::StyleError { .. }));
    }

    #[test]
    fn missing_entry_fails() {
        let temp = tempdir().unwrap();
        let layout = SiteLayout::new(temp.path().join("source"), temp.path().join("build"));

        assert!(compile(&layout, &BrowserTargets::default()).is_err());
    }
}
