//! Image validation and size normalization.
//!
//! Raster formats go through the `image` crate. Bytes it cannot decode get a
//! second chance as SVG via resvg, so vector images pasted into a document
//! are kept rather than dropped.

use std::io::Cursor;
use std::sync::{Arc, OnceLock};

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{fontdb, Options, Tree};

use crate::report::SkipReason;

/// Global font database - loaded once and reused
static FONT_DB: OnceLock<Arc<fontdb::Database>> = OnceLock::new();

fn get_font_db() -> Arc<fontdb::Database> {
    FONT_DB
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            Arc::new(db)
        })
        .clone()
}

/// A successfully decoded image.
pub enum DecodedImage {
    Raster {
        image: DynamicImage,
        /// Container format of the source bytes, reused when re-encoding.
        format: Option<ImageFormat>,
    },
    Svg(Tree),
}

impl DecodedImage {
    pub fn decode(bytes: &[u8]) -> Result<Self, SkipReason> {
        let raster_error = match image::load_from_memory(bytes) {
            Ok(image) => {
                return Ok(DecodedImage::Raster {
                    image,
                    format: image::guess_format(bytes).ok(),
                });
            }
            Err(e) => e,
        };

        let mut opts = Options::default();
        opts.fontdb = get_font_db();
        match Tree::from_data(bytes, &opts) {
            Ok(tree) => Ok(DecodedImage::Svg(tree)),
            Err(_) => Err(SkipReason::Decode(raster_error.to_string())),
        }
    }

    /// Natural size in pixels. SVG sizes are rounded up.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            DecodedImage::Raster { image, .. } => (image.width(), image.height()),
            DecodedImage::Svg(tree) => {
                let size = tree.size();
                (size.width().ceil() as u32, size.height().ceil() as u32)
            }
        }
    }

    /// Re-encodes the image at exactly `width`×`height`, ignoring aspect ratio.
    ///
    /// Returns `None` when the natural size already matches. `max_pixels`
    /// bounds the target area.
    pub fn resized_to(
        &self,
        width: u32,
        height: u32,
        max_pixels: u64,
    ) -> Result<Option<Vec<u8>>, SkipReason> {
        if self.dimensions() == (width, height) {
            return Ok(None);
        }
        if u64::from(width) * u64::from(height) > max_pixels {
            return Err(SkipReason::Resize(format!(
                "{width}x{height} exceeds the {max_pixels} pixel limit"
            )));
        }

        let bytes = match self {
            DecodedImage::Raster { image, format } => {
                let resized = image.resize_exact(width, height, FilterType::Lanczos3);
                encode_raster(&resized, *format)?
            }
            DecodedImage::Svg(tree) => rasterize_svg(tree, width, height)?,
        };
        Ok(Some(bytes))
    }
}

/// Encodes in `format` when it has an encoder that accepts the pixel
/// layout, PNG otherwise.
fn encode_raster(image: &DynamicImage, format: Option<ImageFormat>) -> Result<Vec<u8>, SkipReason> {
    if let Some(format) = format.filter(|f| *f != ImageFormat::Png) {
        match write_image(image, format) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => log::debug!("Re-encoding as {format:?} failed ({e}), using PNG"),
        }
    }
    write_image(image, ImageFormat::Png).map_err(|e| SkipReason::Resize(e.to_string()))
}

fn write_image(image: &DynamicImage, format: ImageFormat) -> image::ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format)?;
    Ok(buf.into_inner())
}

/// Renders the SVG into a transparent `width`×`height` PNG.
fn rasterize_svg(tree: &Tree, width: u32, height: u32) -> Result<Vec<u8>, SkipReason> {
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| SkipReason::Resize(format!("cannot allocate {width}x{height} pixmap")))?;

    let size = tree.size();
    let transform = Transform::from_scale(
        width as f32 / size.width(),
        height as f32 / size.height(),
    );
    resvg::render(tree, transform, &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| SkipReason::Resize(format!("PNG encode error: {e}")))
}
