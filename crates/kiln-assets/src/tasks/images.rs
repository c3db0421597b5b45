//! Raster image recompression, passthrough and WebP derivation.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, ImageFormat};
use rayon::prelude::*;

use crate::error::BuildError;
use crate::layout::{files_below, SiteLayout, RASTER_EXTENSIONS};
use crate::tasks::{copy_file, relative_to, write_file, TaskOutput};

fn image_error(path: &Path, e: impl std::fmt::Display) -> BuildError {
    BuildError::ImageError {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn raster_images(layout: &SiteLayout) -> Vec<PathBuf> {
    files_below(&layout.images_dir(), RASTER_EXTENSIONS)
}

/// Run `f` over every raster image in parallel, collecting the written paths.
fn for_each_image<F>(layout: &SiteLayout, f: F) -> Result<TaskOutput, BuildError>
where
    F: Fn(&Path, &Path) -> Result<PathBuf, BuildError> + Sync,
{
    let images_dir = layout.images_dir();
    let out_dir = layout.img_out_dir();

    let written: Vec<PathBuf> = raster_images(layout)
        .par_iter()
        .map(|source| f(source, &out_dir.join(relative_to(source, &images_dir))))
        .collect::<Result<_, BuildError>>()?;

    Ok(TaskOutput::new(written))
}

/// Recompress every raster image into the output image directory.
///
/// The smaller of the original and recompressed bytes is written, so an
/// image never grows.
pub fn optimize(layout: &SiteLayout, jpeg_quality: u8) -> Result<TaskOutput, BuildError> {
    for_each_image(layout, |source, target| {
        let original = fs::read(source).map_err(|e| BuildError::read(source, e))?;
        let recompressed = recompress(source, &original, jpeg_quality)?;

        if recompressed.len() < original.len() {
            tracing::debug!(
                "Optimized {} ({} -> {} bytes)",
                source.display(),
                original.len(),
                recompressed.len()
            );
            write_file(target, recompressed)?;
        } else {
            write_file(target, original)?;
        }

        Ok(target.to_path_buf())
    })
}

/// Copy every raster image unmodified.
pub fn copy(layout: &SiteLayout) -> Result<TaskOutput, BuildError> {
    for_each_image(layout, |source, target| {
        copy_file(source, target)?;
        Ok(target.to_path_buf())
    })
}

/// Write a lossless WebP sibling for every raster image.
pub fn derive_webp(layout: &SiteLayout) -> Result<TaskOutput, BuildError> {
    check_webp_siblings(layout)?;

    for_each_image(layout, |source, target| {
        let img = image::open(source).map_err(|e| image_error(source, e))?;
        let webp = encode_webp(source, &img)?;

        let target = target.with_extension("webp");
        write_file(&target, webp)?;
        tracing::debug!("Derived {}", target.display());

        Ok(target)
    })
}

/// Images that differ only in extension would derive the same `.webp` file.
fn check_webp_siblings(layout: &SiteLayout) -> Result<(), BuildError> {
    let mut derived: HashMap<PathBuf, PathBuf> = HashMap::new();

    for source in raster_images(layout) {
        if let Some(first) = derived.insert(source.with_extension("webp"), source.clone()) {
            return Err(image_error(
                &source,
                format!("derives the same WebP image as {}", first.display()),
            ));
        }
    }

    Ok(())
}

/// Re-encode image bytes in their own format.
pub fn recompress(path: &Path, bytes: &[u8], jpeg_quality: u8) -> Result<Vec<u8>, BuildError> {
    let format = ImageFormat::from_path(path).map_err(|e| image_error(path, e))?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(|e| image_error(path, e))?;

    let mut buf = Vec::new();
    match format {
        ImageFormat::Png => {
            PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive)
                .write_image(img.as_bytes(), img.width(), img.height(), img.color())
                .map_err(|e| image_error(path, e))?;
        }
        ImageFormat::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, jpeg_quality)
                .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                .map_err(|e| image_error(path, e))?;
        }
        other => {
            return Err(image_error(path, format!("unsupported format {:?}", other)));
        }
    }

    Ok(buf)
}

fn encode_webp(path: &Path, img: &DynamicImage) -> Result<Vec<u8>, BuildError> {
    let rgba = img.to_rgba8();
    let mut buf = Vec::new();

    WebPEncoder::new_lossless(&mut buf)
        .write_image(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)
        .map_err(|e| image_error(path, e))?;

    Ok(buf)
}
