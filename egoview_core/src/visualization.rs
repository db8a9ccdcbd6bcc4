//! Visualization module for EgoView using Rerun.io
//!
//! Streams the overlaid camera feed plus the projected boxes as 2-D geometry
//! layered on the image entity, with per-frame scalar stats.
//!
//! Enable with the `visualization` feature flag.

use image::RgbaImage;
use nalgebra::Point2;
use rerun::{RecordingStream, RecordingStreamBuilder};

use crate::bbox::BOX_EDGES;

/// Rerun-based display for the ego camera feed.
pub struct FeedVisualizer {
    rec: RecordingStream,
}

impl FeedVisualizer {
    /// Create a new visualizer that spawns the Rerun viewer
    pub fn new(app_id: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let rec = RecordingStreamBuilder::new(app_id).spawn()?;
        Ok(Self { rec })
    }

    /// Create a visualizer that saves to a file (for sharing)
    pub fn new_to_file(app_id: &str, path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let rec = RecordingStreamBuilder::new(app_id).save(path)?;
        Ok(Self { rec })
    }

    /// Blit the (already overlaid) camera frame.
    pub fn log_frame(&self, image: &RgbaImage) -> Result<(), Box<dyn std::error::Error>> {
        let (width, height) = image.dimensions();
        self.rec.log(
            "camera/feed",
            &rerun::Image::from_color_model_and_bytes(
                image.as_raw().clone(),
                [width, height],
                rerun::ColorModel::RGBA,
                rerun::ChannelDatatype::U8,
            ),
        )?;
        Ok(())
    }

    /// Draw the projected box edges as 2-D line segments over the image.
    /// Corners that failed projection drop their edges, like the raster
    /// overlay does.
    pub fn log_boxes(
        &self,
        boxes: &[[Option<Point2<f64>>; 8]],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut strips: Vec<Vec<[f32; 2]>> = Vec::new();
        for corners in boxes {
            for [a, b] in BOX_EDGES {
                if let (Some(p0), Some(p1)) = (corners[a], corners[b]) {
                    strips.push(vec![
                        [p0.x as f32, p0.y as f32],
                        [p1.x as f32, p1.y as f32],
                    ]);
                }
            }
        }

        self.rec.log(
            "camera/feed/boxes",
            &rerun::LineStrips2D::new(strips).with_colors([[0, 255, 0, 255]]),
        )?;
        Ok(())
    }

    /// Log per-frame stats as scalar time series.
    pub fn log_stats(
        &self,
        vehicles_drawn: usize,
        frame_latency_ms: f64,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.rec.log(
            "stats/vehicles",
            &rerun::Scalars::new([vehicles_drawn as f64]),
        )?;

        self.rec.log(
            "stats/latency_ms",
            &rerun::Scalars::new([frame_latency_ms]),
        )?;

        Ok(())
    }

    /// Set the frame sequence for timeline scrubbing
    pub fn set_frame(&self, frame: u64) {
        self.rec.set_time_sequence("frame", frame as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires Rerun viewer
    fn test_visualizer_creation() {
        let viz = FeedVisualizer::new("test_app");
        assert!(viz.is_ok());
    }
}
