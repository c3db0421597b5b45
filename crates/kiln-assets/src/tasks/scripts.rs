//! Script minification with oxc.

use std::fs;
use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use rayon::prelude::*;

use crate::error::BuildError;
use crate::layout::{files_in, SiteLayout};
use crate::tasks::{write_file, TaskOutput};

/// Minify every top-level script into the output script directory.
///
/// Files are processed independently; there is no bundling.
pub fn minify_all(layout: &SiteLayout) -> Result<TaskOutput, BuildError> {
    let scripts = files_in(&layout.scripts_dir(), &["js", "mjs"]);
    let out_dir = layout.js_out_dir();

    let written: Vec<PathBuf> = scripts
        .par_iter()
        .map(|path| {
            let source = fs::read_to_string(path).map_err(|e| BuildError::read(path, e))?;
            let code = minify_script(path, &source)?;

            let target = out_dir.join(path.file_name().unwrap_or_default());
            write_file(&target, code)?;
            tracing::debug!("Minified {}", path.display());

            Ok(target)
        })
        .collect::<Result<_, BuildError>>()?;

    Ok(TaskOutput::new(written))
}

/// Compress and mangle one script.
pub fn minify_script(path: &Path, source: &str) -> Result<String, BuildError> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or_default();

    let parsed = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = parsed.errors.first() {
        return Err(BuildError::ScriptError {
            path: path.display().to_string(),
            message: error.to_string(),
        });
    }

    let mut program = parsed.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::default()),
    };
    let minified = Minifier::new(options).build(&allocator, &mut program);

    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            ..CodegenOptions::default()
        })
        .with_scoping(minified.scoping)
        .build(&program)
        .code;

    Ok(code)
}
