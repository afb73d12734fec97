use crate::config::AnnotationConfig;
use crate::db::models::detection_models::Detection;
use crate::error::Error;
use ab_glyph::{FontVec, PxScale};
use image::Rgb;
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use log::{debug, warn};
use std::path::Path;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 16.0;

/// Draws detection overlays onto a copy of the source image. Output is
/// deterministic: `result_<source stem>.jpg` under the results directory.
pub struct AnnotationRenderer {
    font: Option<FontVec>,
}

impl AnnotationRenderer {
    /// Font problems downgrade to box-only rendering instead of failing.
    pub fn new(config: &AnnotationConfig) -> Self {
        let font = config.font_path.as_ref().and_then(|path| match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => Some(font),
                Err(e) => {
                    warn!("Failed to parse label font {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read label font {}: {}", path.display(), e);
                None
            }
        });

        if font.is_none() {
            debug!("No label font loaded; boxes will be drawn without labels");
        }

        Self { font }
    }

    /// Draw one rectangle per detection plus a `class: confidence` label
    /// above it, and write the annotated JPEG. Returns the output file
    /// name.
    pub fn render(
        &self,
        source_path: &Path,
        detections: &[Detection],
        results_dir: &Path,
    ) -> Result<String, Error> {
        let image = image::open(source_path)
            .map_err(|e| Error::Render(format!("Failed to open {}: {}", source_path.display(), e)))?;
        let mut canvas = image.to_rgb8();
        let (width, height) = canvas.dimensions();

        for detection in detections {
            let b = &detection.bounding_box;
            let x0 = b.x_min.round().clamp(0.0, (width - 1) as f64) as i32;
            let y0 = b.y_min.round().clamp(0.0, (height - 1) as f64) as i32;
            let x1 = b.x_max.round().clamp(0.0, (width - 1) as f64) as i32;
            let y1 = b.y_max.round().clamp(0.0, (height - 1) as f64) as i32;

            if x1 <= x0 || y1 <= y0 {
                debug!("Skipping degenerate box for detection {}", detection.id);
                continue;
            }

            let w = (x1 - x0) as u32;
            let h = (y1 - y0) as u32;

            for inset in 0..BOX_THICKNESS {
                let inset_u = inset as u32;
                if w <= 2 * inset_u || h <= 2 * inset_u {
                    break;
                }
                draw_hollow_rect_mut(
                    &mut canvas,
                    Rect::at(x0 + inset, y0 + inset).of_size(w - 2 * inset_u, h - 2 * inset_u),
                    BOX_COLOR,
                );
            }

            if let Some(font) = &self.font {
                let label = format!("{}: {:.2}", detection.class_name, detection.confidence);
                let label_y = (y0 - LABEL_SCALE as i32 - 2).max(0);
                draw_text_mut(&mut canvas, BOX_COLOR, x0, label_y, PxScale::from(LABEL_SCALE), font, &label);
            }
        }

        let stem = source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        let output_name = format!("result_{}.jpg", stem);
        let output_path = results_dir.join(&output_name);

        canvas
            .save(&output_path)
            .map_err(|e| Error::Render(format!("Failed to write {}: {}", output_path.display(), e)))?;

        Ok(output_name)
    }
}
