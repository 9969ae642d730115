//! PDF page rendering via Google PDFium.
//!
//! Produces one PNG bitmap per page for the recognition capability.
//! `PdfiumRenderer` is `Send + Sync` and holds no PDFium handle: the upstream
//! `Pdfium` type is `!Send`, so each render binds the library afresh (the OS
//! caches the `dlopen`, so repeat binds are cheap).

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::PageRenderer;
use super::ExtractionError;

/// Cap on either output dimension, guards against absurd page sizes.
const MAX_DIMENSION_PX: u32 = 4096;

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

pub struct PdfiumRenderer {
    library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    /// Create a renderer, verifying PDFium is loadable now rather than on the
    /// first scanned page.
    ///
    /// `library_path` points at the PDFium shared library; `None` searches
    /// next to the executable and then the system library paths.
    pub fn new(library_path: Option<&Path>) -> Result<Self, ExtractionError> {
        let renderer = Self {
            library_path: library_path.map(Path::to_path_buf),
        };
        renderer.bind()?;
        Ok(renderer)
    }

    fn bind(&self) -> Result<Pdfium, ExtractionError> {
        if let Some(path) = &self.library_path {
            let bindings = Pdfium::bind_to_library(path).map_err(|e| {
                ExtractionError::RecognitionUnavailable(format!(
                    "Failed to load PDFium from {}: {e}",
                    path.display()
                ))
            })?;
            return Ok(Pdfium::new(bindings));
        }

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                debug!(dir = %exe_dir.display(), "Loaded PDFium next to executable");
                return Ok(Pdfium::new(bindings));
            }
        }

        let bindings = Pdfium::bind_to_system_library().map_err(|e| {
            ExtractionError::RecognitionUnavailable(format!("PDFium library not found: {e}"))
        })?;
        Ok(Pdfium::new(bindings))
    }
}

/// Pixel dimensions for a page at `dpi`, each clamped to [1, MAX_DIMENSION_PX]
/// with aspect ratio preserved when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(|e| ExtractionError::Rendering {
                page: page_index,
                reason: format!("PDFium load failed: {e}"),
            })?;

        let pages = document.pages();
        let index = u16::try_from(page_index).map_err(|_| ExtractionError::Rendering {
            page: page_index,
            reason: "page index exceeds u16".into(),
        })?;
        let page = pages.get(index).map_err(|_| ExtractionError::Rendering {
            page: page_index,
            reason: format!("out of range (document has {} pages)", pages.len()),
        })?;

        let (target_w, target_h) =
            compute_render_dimensions(page.width().value, page.height().value, dpi);
        if target_w == MAX_DIMENSION_PX || target_h == MAX_DIMENSION_PX {
            warn!(page = page_index, target_w, target_h, "Page render size capped");
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::Rendering {
                page: page_index,
                reason: e.to_string(),
            })?;

        let mut cursor = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
        let png = cursor.into_inner();

        debug!(
            page = page_index,
            width = target_w,
            height = target_h,
            png_size = png.len(),
            "Rendered page bitmap"
        );
        Ok(png)
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Renderer returning a tiny PNG per page; out-of-range pages error.
pub struct MockPageRenderer {
    page_count: usize,
}

impl MockPageRenderer {
    pub fn new(page_count: usize) -> Self {
        Self { page_count }
    }
}

impl PageRenderer for MockPageRenderer {
    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        if page_index >= self.page_count {
            return Err(ExtractionError::Rendering {
                page: page_index,
                reason: format!("out of range (mock has {} pages)", self.page_count),
            });
        }
        let img = image::GrayImage::from_pixel(8, 8, image::Luma([255u8]));
        let mut cursor = Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::ImageProcessing(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}
