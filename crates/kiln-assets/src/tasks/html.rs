//! Template rendering and HTML whitespace collapsing.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use minijinja::{context, path_loader, Environment};
use rayon::prelude::*;
use regex::Regex;

use crate::error::BuildError;
use crate::layout::{files_in, SiteLayout};
use crate::tasks::{write_file, BuildMode, TaskOutput};

/// One token of markup: a verbatim element, a comment, a tag or a text run.
///
/// `pre`, `textarea`, `script` and `style` elements are matched whole so their
/// contents are never collapsed.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<pre\b.*?</pre\s*>|<textarea\b.*?</textarea\s*>|<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->|<[^>]*>|[^<]+|<",
    )
    .expect("valid token regex")
});

static TAG_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^</?([a-zA-Z][a-zA-Z0-9-]*)").expect("valid tag name regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Elements rendered in the flow of text. Whitespace next to them is visible.
const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "bdi", "bdo", "big", "button", "cite", "code", "del", "dfn",
    "em", "font", "i", "img", "input", "ins", "kbd", "label", "mark", "math", "nobr", "object",
    "q", "rp", "rt", "rtc", "ruby", "s", "samp", "select", "small", "span", "strike", "strong",
    "sub", "sup", "svg", "textarea", "time", "tt", "u", "var",
];

/// Template engine rooted at the source directory.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create an engine that resolves `extends` and `include` against `source_dir`.
    pub fn new(source_dir: &Path) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(source_dir));
        Self { env }
    }

    /// Render a template by its name relative to the source directory.
    pub fn render(&self, name: &str, mode: BuildMode) -> Result<String, BuildError> {
        let template_error = |e: minijinja::Error| BuildError::TemplateError {
            name: name.to_string(),
            message: e.to_string(),
        };

        let tmpl = self.env.get_template(name).map_err(template_error)?;
        tmpl.render(context! { mode => mode.as_str() })
            .map_err(template_error)
    }
}

/// Render every top-level template into the output root.
pub fn render(layout: &SiteLayout, mode: BuildMode) -> Result<TaskOutput, BuildError> {
    let engine = TemplateEngine::new(&layout.source_dir);
    let templates = files_in(&layout.source_dir, &["html"]);

    let written: Vec<PathBuf> = templates
        .par_iter()
        .map(|path| {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| BuildError::read(path, "non UTF-8 file name"))?;

            let html = collapse_whitespace(&engine.render(name, mode)?);
            let target = layout.output_dir.join(name);
            write_file(&target, html)?;
            tracing::debug!("Rendered {}", name);

            Ok(target)
        })
        .collect::<Result<_, BuildError>>()?;

    Ok(TaskOutput::new(written))
}

/// Collapse insignificant whitespace.
///
/// Runs of whitespace become one space. A space next to a block-level tag, a
/// comment or the document edge is dropped; a space between inline content is
/// kept. `pre`, `textarea`, `script` and `style` elements are copied as is.
pub fn collapse_whitespace(html: &str) -> String {
    let tokens: Vec<&str> = TOKEN_RE.find_iter(html).map(|m| m.as_str()).collect();
    let mut out = String::with_capacity(html.len());

    for (i, token) in tokens.iter().enumerate() {
        if is_markup(token) {
            out.push_str(token);
            continue;
        }

        let mut text = WHITESPACE_RE.replace_all(token, " ").into_owned();
        let block_before = i == 0 || is_block(tokens[i - 1]);
        let block_after = tokens.get(i + 1).map_or(true, |next| is_block(next));

        if block_after && text.ends_with(' ') {
            text.pop();
        }
        if block_before && text.starts_with(' ') {
            text.remove(0);
        }
        out.push_str(&text);
    }

    out
}

fn is_markup(token: &str) -> bool {
    token.len() > 1 && token.starts_with('<')
}

fn is_block(token: &str) -> bool {
    if !is_markup(token) {
        return false;
    }
    match TAG_NAME_RE.captures(token) {
        Some(caps) => {
            let name = caps[1].to_ascii_lowercase();
            !INLINE_TAGS.contains(&name.as_str())
        }
        // Comments and doctypes
        None => true,
    }
}
