//! SVG cleanup and icon sprite generation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::BuildError;
use crate::layout::{files_in, SiteLayout};
use crate::tasks::{write_file, TaskOutput};

static PROLOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\?xml.*?\?>|<!DOCTYPE[^>]*>|<!--.*?-->").expect("valid prolog regex")
});

static METADATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<metadata\b[^>]*/>|<metadata\b.*?</metadata\s*>").expect("valid metadata regex")
});

static EDITOR_ELEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<(?:sodipodi|inkscape):[\w-]+\b[^>]*/>|<(?:sodipodi|inkscape):[\w-]+\b[^>]*>.*?</(?:sodipodi|inkscape):[\w-]+\s*>",
    )
    .expect("valid editor element regex")
});

static EDITOR_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+(?:xmlns:(?:sodipodi|inkscape|sketch)|(?:sodipodi|inkscape|sketch):[\w-]+)\s*=\s*"[^"]*""#)
        .expect("valid editor attribute regex")
});

static BETWEEN_TAGS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid between-tags regex"));

static ROOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<svg\b([^>]*?)/?>(.*)</svg\s*>|<svg\b([^>]*?)/>").expect("valid root regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
});

/// Root attributes that do not carry over to a `<symbol>`.
const DROPPED_SYMBOL_ATTRS: &[&str] = &["id", "width", "height", "version", "x", "y"];

/// Strip markup that has no visual effect.
pub fn optimize_svg(markup: &str) -> String {
    let markup = PROLOG_RE.replace_all(markup, "");
    let markup = METADATA_RE.replace_all(&markup, "");
    let markup = EDITOR_ELEMENT_RE.replace_all(&markup, "");
    let markup = EDITOR_ATTR_RE.replace_all(&markup, "");
    let markup = BETWEEN_TAGS_RE.replace_all(&markup, "><");

    markup.trim().to_string()
}

/// Optimize every standalone SVG in the image directory. Icons are left to the sprite.
pub fn optimize_all(layout: &SiteLayout) -> Result<TaskOutput, BuildError> {
    let out_dir = layout.img_out_dir();
    let mut written = Vec::new();

    for path in files_in(&layout.images_dir(), &["svg"]) {
        let markup = fs::read_to_string(&path).map_err(|e| BuildError::read(&path, e))?;
        let target = out_dir.join(path.file_name().unwrap_or_default());
        write_file(&target, optimize_svg(&markup))?;
        written.push(target);
    }

    Ok(TaskOutput::new(written))
}

/// Turn one icon document into a `<symbol>` with the given id.
pub fn to_symbol(path: &Path, id: &str, markup: &str) -> Result<String, BuildError> {
    let optimized = optimize_svg(markup);
    let caps = ROOT_RE.captures(&optimized).ok_or_else(|| BuildError::SvgError {
        path: path.display().to_string(),
        message: "no <svg> root element".to_string(),
    })?;

    let attrs = caps.get(1).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
    let inner = caps.get(2).map_or("", |m| m.as_str());

    let mut symbol = format!("<symbol id=\"{}\"", id);
    for attr in ATTR_RE.captures_iter(attrs) {
        let name = &attr[1];
        if name == "xmlns" || name.starts_with("xmlns:") || DROPPED_SYMBOL_ATTRS.contains(&name) {
            continue;
        }
        let value = attr.get(2).or_else(|| attr.get(3)).map_or("", |m| m.as_str());
        symbol.push_str(&format!(" {}=\"{}\"", name, value));
    }
    symbol.push('>');
    symbol.push_str(inner);
    symbol.push_str("</symbol>");

    Ok(symbol)
}

/// Combine every icon into one inline sprite document.
pub fn build_sprite(icons: &[PathBuf]) -> Result<String, BuildError> {
    let mut sprite = String::from("<svg xmlns=\"http://www.w3.org/2000/svg\">");

    for path in icons {
        let markup = fs::read_to_string(path).map_err(|e| BuildError::read(path, e))?;
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| BuildError::read(path, "non UTF-8 file name"))?;
        sprite.push_str(&to_symbol(path, id, &markup)?);
    }

    sprite.push_str("</svg>");
    Ok(sprite)
}

/// Regenerate the icon sprite from scratch.
///
/// The sprite is written into the source image directory, not the output
/// tree, so that templates and the SVG task pick it up like any other image.
pub fn sprite(layout: &SiteLayout) -> Result<TaskOutput, BuildError> {
    let icons = files_in(&layout.icons_dir(), &["svg"]);
    let sprite = build_sprite(&icons)?;

    let target = layout.sprite_path();
    write_file(&target, sprite)?;
    tracing::debug!("Wrote {} symbols to {}", icons.len(), target.display());

    Ok(TaskOutput::new(vec![target]))
}
