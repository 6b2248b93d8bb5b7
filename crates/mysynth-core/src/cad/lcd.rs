//! HD44780 character LCD on port B of the CAD expander.
//!
//! The display runs in 4-bit mode. Port B wiring:
//!
//! | bit | signal    |
//! |-----|-----------|
//! | 0-3 | D4-D7     |
//! | 4   | E         |
//! | 5   | R/W       |
//! | 6   | RS        |
//! | 7   | backlight |
//!
//! R/W is held low: the driver never reads the busy flag and waits the
//! datasheet execution times instead.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use super::mcp23s17::{Mcp23s17, Port};
use super::CadError;

// ── Port B bits ────────────────────────────────────────────────────────────

pub const DATA_MASK: u8 = 0x0F;
pub const ENABLE: u8 = 0x10;
pub const READ_WRITE: u8 = 0x20;
pub const REGISTER_SELECT: u8 = 0x40;
pub const BACKLIGHT: u8 = 0x80;

// ── Commands ───────────────────────────────────────────────────────────────

pub const CLEAR_DISPLAY: u8 = 0x01;
pub const RETURN_HOME: u8 = 0x02;
pub const ENTRY_MODE_SET: u8 = 0x04;
pub const DISPLAY_CONTROL: u8 = 0x08;
pub const FUNCTION_SET: u8 = 0x20;
pub const SET_DDRAM_ADDRESS: u8 = 0x80;

// Flags
pub const ENTRY_LEFT: u8 = 0x02;
pub const DISPLAY_ON: u8 = 0x04;
pub const CURSOR_ON: u8 = 0x02;
pub const BLINK_ON: u8 = 0x01;
pub const TWO_LINES: u8 = 0x08;

/// Visible columns
pub const COLUMNS: u8 = 16;

/// Visible rows
pub const ROWS: u8 = 2;

/// DDRAM address of the first column of each row
const ROW_OFFSETS: [u8; ROWS as usize] = [0x00, 0x40];

/// Execution time of clear and home
const SLOW_COMMAND_US: u32 = 2600;

/// Execution time of every other instruction
const FAST_COMMAND_US: u32 = 50;

/// Display state that must survive between borrows of the LCD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcdState {
    backlight: bool,
    display_control: u8,
    col: u8,
    row: u8,
}

impl Default for LcdState {
    fn default() -> Self {
        Self {
            backlight: false,
            display_control: DISPLAY_ON,
            col: 0,
            row: 0,
        }
    }
}

/// Borrowed handle to the LCD
pub struct Lcd<'a, SPI, D> {
    chip: &'a mut Mcp23s17<SPI>,
    delay: &'a mut D,
    state: &'a mut LcdState,
}

impl<'a, SPI, D> Lcd<'a, SPI, D>
where
    SPI: SpiDevice,
    D: DelayNs,
{
    pub fn new(chip: &'a mut Mcp23s17<SPI>, delay: &'a mut D, state: &'a mut LcdState) -> Self {
        Self { chip, delay, state }
    }

    fn backlight_bit(&self) -> u8 {
        if self.state.backlight {
            BACKLIGHT
        } else {
            0
        }
    }

    /// Latch one nibble with a pulse on E
    fn write_nibble(&mut self, nibble: u8, rs: bool) -> Result<(), CadError<SPI::Error>> {
        let mut bits = (nibble & DATA_MASK) | self.backlight_bit();
        if rs {
            bits |= REGISTER_SELECT;
        }
        self.chip
            .write_port(Port::B, bits | ENABLE)
            .map_err(CadError::Bus)?;
        self.delay.delay_us(1);
        self.chip.write_port(Port::B, bits).map_err(CadError::Bus)?;
        self.delay.delay_us(FAST_COMMAND_US);
        Ok(())
    }

    fn send(&mut self, byte: u8, rs: bool) -> Result<(), CadError<SPI::Error>> {
        self.write_nibble(byte >> 4, rs)?;
        self.write_nibble(byte & DATA_MASK, rs)
    }

    /// Send an instruction byte
    pub fn command(&mut self, command: u8) -> Result<(), CadError<SPI::Error>> {
        self.send(command, false)?;
        if command == CLEAR_DISPLAY || command == RETURN_HOME {
            self.delay.delay_us(SLOW_COMMAND_US);
        }
        Ok(())
    }

    /// Power-on sequence: switch to 4-bit mode, two lines, display on, cleared
    pub fn init(&mut self) -> Result<(), CadError<SPI::Error>> {
        self.delay.delay_ms(15);
        self.write_nibble(0x03, false)?;
        self.delay.delay_ms(5);
        self.write_nibble(0x03, false)?;
        self.delay.delay_us(100);
        self.write_nibble(0x03, false)?;
        self.write_nibble(0x02, false)?;

        self.command(FUNCTION_SET | TWO_LINES)?;
        self.state.display_control = DISPLAY_ON;
        self.command(DISPLAY_CONTROL | self.state.display_control)?;
        self.command(ENTRY_MODE_SET | ENTRY_LEFT)?;
        self.clear()
    }

    /// Clear the display and move the cursor home
    pub fn clear(&mut self) -> Result<(), CadError<SPI::Error>> {
        self.command(CLEAR_DISPLAY)?;
        self.state.col = 0;
        self.state.row = 0;
        Ok(())
    }

    /// Move the cursor home without clearing
    pub fn home(&mut self) -> Result<(), CadError<SPI::Error>> {
        self.command(RETURN_HOME)?;
        self.state.col = 0;
        self.state.row = 0;
        Ok(())
    }

    pub fn backlight_on(&mut self) -> Result<(), CadError<SPI::Error>> {
        self.set_backlight(true)
    }

    pub fn backlight_off(&mut self) -> Result<(), CadError<SPI::Error>> {
        self.set_backlight(false)
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), CadError<SPI::Error>> {
        self.state.backlight = on;
        let bits = self.backlight_bit();
        self.chip.write_port(Port::B, bits).map_err(CadError::Bus)
    }

    pub fn display_on(&mut self) -> Result<(), CadError<SPI::Error>> {
        self.state.display_control |= DISPLAY_ON;
        self.command(DISPLAY_CONTROL | self.state.display_control)
    }

    pub fn display_off(&mut self) -> Result<(), CadError<SPI::Error>> {
        self.state.display_control &= !DISPLAY_ON;
        self.command(DISPLAY_CONTROL | self.state.display_control)
    }

    /// Show or hide the underline cursor and blinking block
    pub fn set_cursor_style(
        &mut self,
        cursor: bool,
        blink: bool,
    ) -> Result<(), CadError<SPI::Error>> {
        self.state.display_control &= DISPLAY_ON;
        if cursor {
            self.state.display_control |= CURSOR_ON;
        }
        if blink {
            self.state.display_control |= BLINK_ON;
        }
        self.command(DISPLAY_CONTROL | self.state.display_control)
    }

    /// Move the cursor to a visible cell
    pub fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), CadError<SPI::Error>> {
        if col >= COLUMNS || row >= ROWS {
            return Err(CadError::InvalidPosition { col, row });
        }
        self.command(SET_DDRAM_ADDRESS | (col + ROW_OFFSETS[row as usize]))?;
        self.state.col = col;
        self.state.row = row;
        Ok(())
    }

    /// Current cursor position as (column, row)
    pub fn cursor(&self) -> (u8, u8) {
        (self.state.col, self.state.row)
    }

    /// Write text at the cursor
    ///
    /// `\n` moves to the start of the next row (wrapping to the top).
    /// Anything outside printable ASCII is shown as `?`.
    pub fn write(&mut self, text: &str) -> Result<(), CadError<SPI::Error>> {
        for ch in text.chars() {
            if ch == '\n' {
                let row = (self.state.row + 1) % ROWS;
                self.set_cursor(0, row)?;
                continue;
            }
            let byte = if ch.is_ascii() && !ch.is_ascii_control() {
                ch as u8
            } else {
                b'?'
            };
            self.send(byte, true)?;
            self.state.col = self.state.col.saturating_add(1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cad::testing::{MockDelay, MockSpi};

    /// Rebuild (rs, byte) pairs from the nibbles latched on falling E
    fn decode(port_b: &[u8]) -> Vec<(bool, u8)> {
        let nibbles: Vec<(bool, u8)> = port_b
            .iter()
            .filter(|&&v| v & ENABLE != 0)
            .map(|&v| (v & REGISTER_SELECT != 0, v & DATA_MASK))
            .collect();
        nibbles
            .chunks(2)
            .map(|pair| (pair[0].0, (pair[0].1 << 4) | pair[1].1))
            .collect()
    }

    fn with_lcd<F>(f: F) -> (MockSpi, MockDelay, LcdState)
    where
        F: FnOnce(&mut Lcd<'_, MockSpi, MockDelay>),
    {
        let mut chip = Mcp23s17::new(MockSpi::new(), 0);
        let mut delay = MockDelay::default();
        let mut state = LcdState::default();
        {
            let mut lcd = Lcd::new(&mut chip, &mut delay, &mut state);
            f(&mut lcd);
        }
        (chip.release(), delay, state)
    }

    #[test]
    fn test_write_sends_data_bytes() {
        let (spi, _, state) = with_lcd(|lcd| lcd.write("Hi").unwrap());
        assert_eq!(decode(&spi.port_b), vec![(true, b'H'), (true, b'i')]);
        assert_eq!((state.col, state.row), (2, 0));
    }

    #[test]
    fn test_newline_moves_to_second_row() {
        let (spi, _, state) = with_lcd(|lcd| lcd.write("a\nb").unwrap());
        assert_eq!(
            decode(&spi.port_b),
            vec![
                (true, b'a'),
                (false, SET_DDRAM_ADDRESS | 0x40),
                (true, b'b')
            ]
        );
        assert_eq!((state.col, state.row), (1, 1));
    }

    #[test]
    fn test_non_ascii_replaced() {
        let (spi, _, _) = with_lcd(|lcd| lcd.write("é\t").unwrap());
        assert_eq!(decode(&spi.port_b), vec![(true, b'?'), (true, b'?')]);
    }

    #[test]
    fn test_clear_waits_for_slow_command() {
        let (spi, delay, _) = with_lcd(|lcd| lcd.clear().unwrap());
        assert_eq!(decode(&spi.port_b), vec![(false, CLEAR_DISPLAY)]);
        assert!(delay.total_ns >= SLOW_COMMAND_US as u64 * 1000);
    }

    #[test]
    fn test_backlight_kept_on_data_writes() {
        let (spi, _, _) = with_lcd(|lcd| {
            lcd.backlight_on().unwrap();
            lcd.write("x").unwrap();
        });
        assert_eq!(spi.port_b[0], BACKLIGHT);
        assert!(spi.port_b.iter().all(|v| v & BACKLIGHT != 0));
    }

    #[test]
    fn test_backlight_off_clears_bit() {
        let (spi, _, state) = with_lcd(|lcd| {
            lcd.backlight_on().unwrap();
            lcd.backlight_off().unwrap();
        });
        assert_eq!(spi.port_b, vec![BACKLIGHT, 0]);
        assert!(!state.backlight);
    }

    #[test]
    fn test_set_cursor_out_of_range() {
        with_lcd(|lcd| {
            let err = lcd.set_cursor(16, 0).unwrap_err();
            assert!(matches!(err, CadError::InvalidPosition { col: 16, row: 0 }));
            assert!(lcd.set_cursor(3, 2).is_err());
            lcd.set_cursor(15, 1).unwrap();
            assert_eq!(lcd.cursor(), (15, 1));
        });
    }

    #[test]
    fn test_init_sequence() {
        let (spi, delay, _) = with_lcd(|lcd| lcd.init().unwrap());
        let latched: Vec<u8> = spi
            .port_b
            .iter()
            .filter(|&&v| v & ENABLE != 0)
            .map(|&v| v & DATA_MASK)
            .collect();

        // Four single nibbles to enter 4-bit mode
        assert_eq!(&latched[..4], &[0x03, 0x03, 0x03, 0x02]);
        assert_eq!(
            decode(&spi.port_b[8..]),
            vec![
                (false, FUNCTION_SET | TWO_LINES),
                (false, DISPLAY_CONTROL | DISPLAY_ON),
                (false, ENTRY_MODE_SET | ENTRY_LEFT),
                (false, CLEAR_DISPLAY),
            ]
        );
        assert!(delay.total_ns >= 20_000_000);
    }

    #[test]
    fn test_display_off_and_cursor_style() {
        let (spi, _, _) = with_lcd(|lcd| {
            lcd.display_off().unwrap();
            lcd.display_on().unwrap();
            lcd.set_cursor_style(true, true).unwrap();
        });
        assert_eq!(
            decode(&spi.port_b),
            vec![
                (false, DISPLAY_CONTROL),
                (false, DISPLAY_CONTROL | DISPLAY_ON),
                (false, DISPLAY_CONTROL | DISPLAY_ON | CURSOR_ON | BLINK_ON),
            ]
        );
    }
}
