//! Waveshare 4.2" B/W/Red V2 driver (SSD1683 controller).
//!
//! Generic over small SPI and GPIO traits so the protocol can be exercised
//! without hardware; the Linux bindings live in `hardware`.
//!
//! The panel keeps two planes: a black/white plane sent with command 0x24
//! and an inverted red plane sent with 0x26. Canvases must use the
//! three-color palette (black, white, red); any other value is mapped to the
//! closest of the three.

use std::thread;
use std::time::Duration;

use embedded_graphics::prelude::Size;
use thiserror::Error;

use crate::canvas::Canvas;
use crate::color::{ColorValue, NamedColor, Palette};
use crate::display::{check_size, Display, DisplayError};

/// Display dimensions
pub const EPD_WIDTH: u32 = 400;
pub const EPD_HEIGHT: u32 = 300;

/// Busy polls of 10 ms before giving up
const BUSY_POLLS: u32 = 500;

/// Panel colors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    White,
    Black,
    Red,
}

impl Color {
    /// Panel color for a canvas value
    pub fn from_value(value: ColorValue) -> Self {
        match value {
            ColorValue::Palette(index) => {
                match Palette::ThreeColor.entries().get(index as usize) {
                    Some(NamedColor::Black) => Color::Black,
                    Some(NamedColor::White) => Color::White,
                    _ => Color::Red,
                }
            }
            ColorValue::Rgb(r, g, b) => {
                let luma = (2126 * r as u32 + 7152 * g as u32 + 722 * b as u32) / 10_000;
                if r > 160 && g < 100 && b < 100 {
                    Color::Red
                } else if luma < 128 {
                    Color::Black
                } else {
                    Color::White
                }
            }
        }
    }

    /// BorderWaveform (0x3C) setting
    fn border_waveform(self) -> u8 {
        match self {
            Color::White => 0x05,
            Color::Black => 0x04,
            Color::Red => 0x06,
        }
    }
}

#[derive(Error, Debug)]
pub enum EpdError {
    #[error("SPI error: {0}")]
    Spi(String),

    #[error("GPIO error: {0}")]
    Gpio(String),
}

impl From<EpdError> for DisplayError {
    fn from(err: EpdError) -> Self {
        DisplayError::Hardware(err.to_string())
    }
}

/// Byte-wise SPI writer
pub trait SoftwareSpi {
    fn write_byte(&mut self, data: u8) -> Result<(), EpdError>;
}

/// Output pin
pub trait GpioPin {
    fn set_high(&mut self) -> Result<(), EpdError>;
    fn set_low(&mut self) -> Result<(), EpdError>;
}

/// Input pin
pub trait InputPin {
    fn is_high(&self) -> Result<bool, EpdError>;
}

/// Both planes of one frame
pub struct DisplayBuffer {
    width: u32,
    height: u32,
    black_buffer: Vec<u8>,
    red_buffer: Vec<u8>,
}

impl DisplayBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let bytes_per_row = width.div_ceil(8);
        let buffer_size = (bytes_per_row * height) as usize;
        Self {
            width,
            height,
            black_buffer: vec![0xFF; buffer_size], // White by default
            red_buffer: vec![0x00; buffer_size],   // No red by default
        }
    }

    pub fn from_canvas(canvas: &Canvas) -> Self {
        let mut buffer = DisplayBuffer::new(canvas.width(), canvas.height());
        let width = canvas.width().max(1);
        for (i, &value) in canvas.pixels().iter().enumerate() {
            let i = i as u32;
            buffer.set_pixel(i % width, i / width, Color::from_value(value));
        }
        buffer
    }

    pub fn black_buffer(&self) -> &[u8] {
        &self.black_buffer
    }

    pub fn red_buffer(&self) -> &[u8] {
        &self.red_buffer
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }

        // Rows of bytes, MSB is the leftmost pixel
        let bytes_per_row = self.width.div_ceil(8);
        let byte_index = (y * bytes_per_row + x / 8) as usize;
        let bit_mask = 0x80 >> (x % 8);

        match color {
            Color::White => {
                self.black_buffer[byte_index] |= bit_mask;
                self.red_buffer[byte_index] &= !bit_mask;
            }
            Color::Black => {
                self.black_buffer[byte_index] &= !bit_mask;
                self.red_buffer[byte_index] &= !bit_mask;
            }
            Color::Red => {
                self.black_buffer[byte_index] |= bit_mask;
                self.red_buffer[byte_index] |= bit_mask;
            }
        }
    }
}

/// EPD 4.2" B/W/Red V2 display driver
pub struct Epd4in2bV2<SPI, DC, RST, BUSY> {
    spi: SPI,
    dc_pin: DC,
    rst_pin: RST,
    busy_pin: BUSY,
    width: u32,
    height: u32,
    border: Color,
    settle: Duration,
}

impl<SPI, DC, RST, BUSY> Epd4in2bV2<SPI, DC, RST, BUSY>
where
    SPI: SoftwareSpi,
    DC: GpioPin,
    RST: GpioPin,
    BUSY: InputPin,
{
    /// Chip select is expected to be handled by the SPI device.
    pub fn new(spi: SPI, dc_pin: DC, rst_pin: RST, busy_pin: BUSY) -> Self {
        Self {
            spi,
            dc_pin,
            rst_pin,
            busy_pin,
            width: EPD_WIDTH,
            height: EPD_HEIGHT,
            border: Color::White,
            settle: Duration::from_millis(200),
        }
    }

    /// Reset pulse and busy poll delays; zero in tests
    pub fn with_settle_time(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn into_parts(self) -> (SPI, DC, RST, BUSY) {
        (self.spi, self.dc_pin, self.rst_pin, self.busy_pin)
    }

    fn pause(&self, millis: u64) {
        if !self.settle.is_zero() {
            thread::sleep(Duration::from_millis(millis));
        }
    }

    fn reset(&mut self) -> Result<(), EpdError> {
        self.rst_pin.set_high()?;
        self.pause(200);
        self.rst_pin.set_low()?;
        self.pause(5);
        self.rst_pin.set_high()?;
        self.pause(200);
        tracing::debug!("panel reset");
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> Result<(), EpdError> {
        self.dc_pin.set_low()?;
        self.spi.write_byte(command)
    }

    fn send_data(&mut self, data: u8) -> Result<(), EpdError> {
        self.dc_pin.set_high()?;
        self.spi.write_byte(data)
    }

    /// Wait while BUSY is high, giving up after about five seconds
    fn read_busy(&mut self) -> Result<(), EpdError> {
        let mut polls = 0;
        while self.busy_pin.is_high()? {
            self.pause(10);
            polls += 1;
            if polls > BUSY_POLLS {
                tracing::warn!("BUSY pin timeout, display may be stuck");
                break;
            }
        }
        tracing::trace!(polls, "panel ready");
        Ok(())
    }

    fn turn_on_display(&mut self) -> Result<(), EpdError> {
        self.send_command(0x22)?;
        self.send_data(0xF7)?;
        self.send_command(0x20)?;
        self.read_busy()
    }

    pub fn init(&mut self) -> Result<(), EpdError> {
        self.reset()?;

        self.read_busy()?;
        self.send_command(0x12)?; // SWRESET
        self.read_busy()?;

        self.send_command(0x3C)?; // BorderWaveform
        self.send_data(self.border.border_waveform())?;

        self.send_command(0x18)?; // Built-in temperature sensor
        self.send_data(0x80)?;

        self.send_command(0x11)?; // Data entry mode
        self.send_data(0x03)?;

        self.send_command(0x44)?; // RAM X start/end
        self.send_data(0x00)?;
        self.send_data((self.width / 8 - 1) as u8)?;

        self.send_command(0x45)?; // RAM Y start/end
        self.send_data(0x00)?;
        self.send_data(0x00)?;
        self.send_data(((self.height - 1) % 256) as u8)?;
        self.send_data(((self.height - 1) / 256) as u8)?;

        self.send_command(0x4E)?; // RAM X counter
        self.send_data(0x00)?;

        self.send_command(0x4F)?; // RAM Y counter
        self.send_data(0x00)?;
        self.send_data(0x00)?;

        self.read_busy()?;
        tracing::debug!(border = ?self.border, "panel initialized");
        Ok(())
    }

    /// Send both planes and refresh
    pub fn display(&mut self, buffer: &DisplayBuffer) -> Result<(), EpdError> {
        let black_pixels: u32 = buffer.black_buffer().iter().map(|b| b.count_zeros()).sum();
        let red_pixels: u32 = buffer.red_buffer().iter().map(|b| b.count_ones()).sum();
        tracing::debug!(black_pixels, red_pixels, "sending frame");

        self.send_command(0x24)?;
        for &byte in buffer.black_buffer() {
            self.send_data(byte)?;
        }

        self.send_command(0x26)?;
        for &byte in buffer.red_buffer() {
            self.send_data(!byte)?;
        }

        self.turn_on_display()
    }

    /// POWER_OFF then DEEP_SLEEP mode 1, which keeps the image after power loss
    pub fn sleep(&mut self) -> Result<(), EpdError> {
        self.send_command(0x02)?;
        self.read_busy()?;
        self.send_command(0x10)?;
        self.send_data(0x01)?;
        self.read_busy()
    }
}

impl<SPI, DC, RST, BUSY> Display for Epd4in2bV2<SPI, DC, RST, BUSY>
where
    SPI: SoftwareSpi,
    DC: GpioPin,
    RST: GpioPin,
    BUSY: InputPin,
{
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn set_border(&mut self, color: ColorValue) -> Result<(), DisplayError> {
        self.border = Color::from_value(color);
        Ok(())
    }

    fn show(&mut self, canvas: &Canvas) -> Result<(), DisplayError> {
        check_size(&*self, canvas)?;
        let buffer = DisplayBuffer::from_canvas(canvas);
        self.init()?;
        self.display(&buffer)?;
        self.sleep()?;
        tracing::info!("image shown on e-paper panel");
        Ok(())
    }
}
