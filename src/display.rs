//! Output devices.
//!
//! The compositor only produces a [`Canvas`]; a [`Display`] puts it on
//! glass. [`SimulatedDisplay`] saves an image file instead (PPM, PNG or BMP
//! picked by the extension), which is what runs on development machines.

use std::path::{Path, PathBuf};

use embedded_graphics::prelude::Size;
use image::RgbImage;
use thiserror::Error;

use crate::canvas::Canvas;
use crate::color::{ColorMap, ColorValue};

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("image is {actual:?}, display expects {expected:?}")]
    SizeMismatch { expected: Size, actual: Size },

    #[error("display hardware error: {0}")]
    Hardware(String),
}

/// Something that can show a finished canvas.
pub trait Display {
    /// Native resolution
    fn size(&self) -> Size;

    /// Color of the frame around the active area
    fn set_border(&mut self, color: ColorValue) -> Result<(), DisplayError>;

    fn show(&mut self, canvas: &Canvas) -> Result<(), DisplayError>;
}

/// Reject canvases that do not match the panel
pub fn check_size(display: &dyn Display, canvas: &Canvas) -> Result<(), DisplayError> {
    let actual = Size::new(canvas.width(), canvas.height());
    let expected = display.size();
    if actual != expected {
        return Err(DisplayError::SizeMismatch { expected, actual });
    }
    Ok(())
}

/// Writes each shown canvas to an image file.
pub struct SimulatedDisplay {
    path: PathBuf,
    size: Size,
    color_map: ColorMap,
    border: Option<ColorValue>,
}

impl SimulatedDisplay {
    pub fn new(path: impl Into<PathBuf>, size: Size, color_map: ColorMap) -> Self {
        SimulatedDisplay {
            path: path.into(),
            size,
            color_map,
            border: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn border(&self) -> Option<ColorValue> {
        self.border
    }
}

impl Display for SimulatedDisplay {
    fn size(&self) -> Size {
        self.size
    }

    fn set_border(&mut self, color: ColorValue) -> Result<(), DisplayError> {
        self.border = Some(color);
        Ok(())
    }

    fn show(&mut self, canvas: &Canvas) -> Result<(), DisplayError> {
        check_size(&*self, canvas)?;
        let raw: Vec<u8> = canvas
            .pixels()
            .iter()
            .flat_map(|&pixel| self.color_map.to_rgb(pixel))
            .collect();
        let image = RgbImage::from_raw(canvas.width(), canvas.height(), raw).ok_or(
            DisplayError::SizeMismatch {
                expected: self.size,
                actual: Size::new(canvas.width(), canvas.height()),
            },
        )?;
        image.save(&self.path)?;
        tracing::info!(path = %self.path.display(), "image written");
        Ok(())
    }
}
