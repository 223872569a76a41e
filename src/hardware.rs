//! Linux GPIO character device and spidev bindings for the e-paper driver.

use std::io::Write;

use linux_embedded_hal::gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use linux_embedded_hal::spidev::{SpiModeFlags, Spidev, SpidevOptions};

use crate::config::HardwareConfig;
use crate::epd4in2b_v2::{Epd4in2bV2, EpdError, GpioPin, InputPin, SoftwareSpi};

const CONSUMER: &str = "daily-agenda";

pub type Panel = Epd4in2bV2<SpidevHwSpi, CdevOutputPin, CdevOutputPin, CdevInputPin>;

/// Open the SPI device and request the control lines.
pub fn open_panel(config: &HardwareConfig) -> Result<Panel, EpdError> {
    let mut chip = Chip::new(&config.gpio_chip).map_err(gpio)?;
    let dc = CdevOutputPin::new(&mut chip, config.dc_pin)?;
    let rst = CdevOutputPin::new(&mut chip, config.rst_pin)?;
    let busy = CdevInputPin::new(&mut chip, config.busy_pin)?;
    let spi = SpidevHwSpi::new(&config.spi_device)?;
    tracing::debug!(
        chip = %config.gpio_chip.display(),
        spi = %config.spi_device.display(),
        dc = config.dc_pin,
        rst = config.rst_pin,
        busy = config.busy_pin,
        "panel lines requested"
    );
    Ok(Epd4in2bV2::new(spi, dc, rst, busy))
}

fn gpio(e: impl std::fmt::Display) -> EpdError {
    EpdError::Gpio(e.to_string())
}

pub struct CdevOutputPin {
    line: LineHandle,
}

pub struct CdevInputPin {
    line: LineHandle,
}

impl CdevOutputPin {
    pub fn new(chip: &mut Chip, offset: u32) -> Result<Self, EpdError> {
        let line = chip
            .get_line(offset)
            .map_err(gpio)?
            .request(LineRequestFlags::OUTPUT, 0, CONSUMER)
            .map_err(gpio)?;
        Ok(Self { line })
    }
}

impl CdevInputPin {
    pub fn new(chip: &mut Chip, offset: u32) -> Result<Self, EpdError> {
        let line = chip
            .get_line(offset)
            .map_err(gpio)?
            .request(LineRequestFlags::INPUT, 0, CONSUMER)
            .map_err(gpio)?;
        Ok(Self { line })
    }
}

impl GpioPin for CdevOutputPin {
    fn set_high(&mut self) -> Result<(), EpdError> {
        self.line.set_value(1).map_err(gpio)
    }

    fn set_low(&mut self) -> Result<(), EpdError> {
        self.line.set_value(0).map_err(gpio)
    }
}

impl InputPin for CdevInputPin {
    fn is_high(&self) -> Result<bool, EpdError> {
        Ok(self.line.get_value().map_err(gpio)? == 1)
    }
}

pub struct SpidevHwSpi {
    dev: Spidev,
}

impl SpidevHwSpi {
    pub fn new(path: &std::path::Path) -> Result<Self, EpdError> {
        let spi = |e: std::io::Error| EpdError::Spi(e.to_string());
        let mut dev = Spidev::open(path).map_err(spi)?;
        let opts = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(4_000_000)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        dev.configure(&opts).map_err(spi)?;
        Ok(Self { dev })
    }
}

impl SoftwareSpi for SpidevHwSpi {
    fn write_byte(&mut self, data: u8) -> Result<(), EpdError> {
        self.dev
            .write_all(&[data])
            .map_err(|e| EpdError::Spi(e.to_string()))
    }
}
