//! MCP23S17 16-bit SPI port expander driver.
//!
//! Generic over any [`embedded_hal::spi::SpiDevice`]. The driver talks to
//! the chip in `IOCON.BANK = 0` mode (registers paired A/B) with hardware
//! addressing enabled.
//!
//! SPI frames are three bytes: `[opcode, register, data]`, where the opcode
//! is `0b0100_AAAR` (A = hardware address, R = 1 for read).

use embedded_hal::spi::SpiDevice;

// ── Registers (IOCON.BANK = 0) ─────────────────────────────────────────────

pub const IODIRA: u8 = 0x00;
pub const IODIRB: u8 = 0x01;
pub const IPOLA: u8 = 0x02;
pub const IPOLB: u8 = 0x03;
pub const GPINTENA: u8 = 0x04;
pub const GPINTENB: u8 = 0x05;
pub const IOCON: u8 = 0x0A;
pub const GPPUA: u8 = 0x0C;
pub const GPPUB: u8 = 0x0D;
pub const GPIOA: u8 = 0x12;
pub const GPIOB: u8 = 0x13;
pub const OLATA: u8 = 0x14;
pub const OLATB: u8 = 0x15;

// IOCON bits
pub const IOCON_BANK: u8 = 0x80;
pub const IOCON_MIRROR: u8 = 0x40;
pub const IOCON_SEQOP: u8 = 0x20;
pub const IOCON_HAEN: u8 = 0x08;

const WRITE_OPCODE: u8 = 0x40;
const READ_OPCODE: u8 = 0x41;

/// One of the two 8-bit ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    A,
    B,
}

impl Port {
    /// GPIO register of the port
    pub fn gpio(self) -> u8 {
        match self {
            Port::A => GPIOA,
            Port::B => GPIOB,
        }
    }

    /// Direction register of the port
    pub fn iodir(self) -> u8 {
        match self {
            Port::A => IODIRA,
            Port::B => IODIRB,
        }
    }

    /// Pull-up register of the port
    pub fn gppu(self) -> u8 {
        match self {
            Port::A => GPPUA,
            Port::B => GPPUB,
        }
    }
}

/// MCP23S17 driver
pub struct Mcp23s17<SPI> {
    spi: SPI,
    hardware_address: u8,
}

impl<SPI: SpiDevice> Mcp23s17<SPI> {
    /// Create a driver for the chip at `hardware_address` (0-7)
    pub fn new(spi: SPI, hardware_address: u8) -> Self {
        Self {
            spi,
            hardware_address: hardware_address & 0x07,
        }
    }

    /// Hardware address (A2..A0 pins)
    pub fn hardware_address(&self) -> u8 {
        self.hardware_address
    }

    fn opcode(&self, base: u8) -> u8 {
        base | (self.hardware_address << 1)
    }

    /// Write one register
    pub fn write_register(&mut self, register: u8, value: u8) -> Result<(), SPI::Error> {
        let frame = [self.opcode(WRITE_OPCODE), register, value];
        self.spi.write(&frame)
    }

    /// Read one register
    pub fn read_register(&mut self, register: u8) -> Result<u8, SPI::Error> {
        let mut frame = [self.opcode(READ_OPCODE), register, 0];
        self.spi.transfer_in_place(&mut frame)?;
        Ok(frame[2])
    }

    /// Set one bit of a register, leaving the others unchanged
    pub fn write_bit(&mut self, register: u8, bit: u8, on: bool) -> Result<(), SPI::Error> {
        let current = self.read_register(register)?;
        let mask = 1u8 << (bit & 0x07);
        let new_val = if on { current | mask } else { current & !mask };
        self.write_register(register, new_val)
    }

    /// Read the input levels of a port
    pub fn read_port(&mut self, port: Port) -> Result<u8, SPI::Error> {
        self.read_register(port.gpio())
    }

    /// Drive the output latches of a port
    pub fn write_port(&mut self, port: Port, value: u8) -> Result<(), SPI::Error> {
        self.write_register(port.gpio(), value)
    }

    /// Configure for the PiFace CAD wiring
    ///
    /// - hardware addressing on, sequential mode on, banks paired
    /// - port A: eight inputs with pull-ups (switches)
    /// - port B: eight outputs, driven low (LCD)
    pub fn init(&mut self) -> Result<(), SPI::Error> {
        self.write_register(IOCON, IOCON_HAEN)?;
        self.write_register(IODIRA, 0xFF)?;
        self.write_register(GPPUA, 0xFF)?;
        self.write_register(IPOLA, 0x00)?;
        self.write_register(GPINTENA, 0x00)?;
        self.write_register(IODIRB, 0x00)?;
        self.write_register(GPIOB, 0x00)?;
        Ok(())
    }

    /// Release the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }
}
