//! PiFace Control and Display (CAD) board support
//!
//! The board carries one MCP23S17 port expander on SPI:
//!
//! ```text
//!   MCP23S17 port A ◄── 8 switches (active low, pulled up)
//!   MCP23S17 port B ──► HD44780 16x2 LCD (4-bit bus) + backlight
//! ```
//!
//! - [`mcp23s17`] - register access to the expander
//! - [`lcd`] - character display on port B
//! - [`switches`] - switch levels on port A and the pin event dispatcher
//!
//! Everything is generic over `embedded-hal` 1.0 SPI and delay traits, so
//! any platform SPI implementation can drive the board.

pub mod lcd;
pub mod mcp23s17;
pub mod switches;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use thiserror::Error;

pub use lcd::Lcd;
pub use mcp23s17::Mcp23s17;
pub use switches::{Edge, SwitchDispatcher, SwitchEvent, SwitchPort};

/// Errors from the CAD board drivers
#[derive(Error, Debug)]
pub enum CadError<E: core::fmt::Debug> {
    #[error("SPI bus error: {0:?}")]
    Bus(E),

    #[error("Cursor position out of range: column {col}, row {row}")]
    InvalidPosition { col: u8, row: u8 },

    #[error("Switch pin out of range (0-7): {0}")]
    InvalidPin(u8),
}

/// The CAD board: expander, LCD state and a delay provider
pub struct PifaceCad<SPI, D> {
    chip: Mcp23s17<SPI>,
    delay: D,
    lcd: lcd::LcdState,
}

impl<SPI, D> PifaceCad<SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    /// Hardware address of the expander on a stock board
    pub const DEFAULT_ADDRESS: u8 = 0;

    /// Create a driver for a board at the default address
    pub fn new(spi: SPI, delay: D) -> Self {
        Self::new_with_address(spi, delay, Self::DEFAULT_ADDRESS)
    }

    /// Create a driver for a board at a specific hardware address
    pub fn new_with_address(spi: SPI, delay: D, address: u8) -> Self {
        Self {
            chip: Mcp23s17::new(spi, address),
            delay,
            lcd: lcd::LcdState::default(),
        }
    }

    /// Configure the expander and run the LCD power-on sequence
    pub fn init(&mut self) -> Result<(), CadError<SPI::Error>> {
        self.chip.init().map_err(CadError::Bus)?;
        self.lcd().init()?;
        tracing::debug!(address = self.chip.hardware_address(), "PiFace CAD initialised");
        Ok(())
    }

    /// Borrow the LCD
    pub fn lcd(&mut self) -> Lcd<'_, SPI, D> {
        Lcd::new(&mut self.chip, &mut self.delay, &mut self.lcd)
    }

    /// Borrow the switch port (port A of the expander)
    pub fn switches(&mut self) -> &mut Mcp23s17<SPI> {
        &mut self.chip
    }

    /// Show `text` on a freshly cleared display with the backlight on
    pub fn show_text(&mut self, text: &str) -> Result<(), CadError<SPI::Error>> {
        let mut lcd = self.lcd();
        lcd.backlight_on()?;
        lcd.clear()?;
        lcd.write(text)
    }

    /// Release the SPI device and delay
    pub fn release(self) -> (SPI, D) {
        (self.chip.release(), self.delay)
    }
}

/// [`DelayNs`] backed by `std::thread::sleep`
///
/// The delay provider for host binaries that pair [`PifaceCad`] with a
/// platform SPI device.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(ns as u64));
    }
}
