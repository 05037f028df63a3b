//! Status screen rendering over the display driver

use core::fmt::Write;
use heapless::String;
use crate::hal::DisplayDriver;
use crate::state::DriveState;
use crate::types::layout::*;
use crate::types::{Field, ENTRY_DIGITS};
use crate::entry::CursorState;

/// RGB565 color
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Color(pub u16);

impl Color {
    pub const BLACK: Color = Color(0x0000);
    pub const WHITE: Color = Color(0xFFFF);
    pub const RED: Color = Color(0xF800);
    pub const GREEN: Color = Color(0x07E0);
    pub const YELLOW: Color = Color(0xFFE0);
}

const BANNER_TEXT: &str = "VOLTAGE TOO HIGH";
const BANNER_BLANK: &str = "                ";

/// Incremental status screen: redraws only what changed since last refresh
pub struct StatusView {
    initialized: bool,
    last_rpm: String<16>,
    last_running: Option<bool>,
    last_too_high: Option<bool>,
}

impl StatusView {
    pub const fn new() -> Self {
        Self {
            initialized: false,
            last_rpm: String::new(),
            last_running: None,
            last_too_high: None,
        }
    }

    /// Force a full redraw on the next refresh
    pub fn invalidate(&mut self) {
        self.initialized = false;
    }

    pub fn refresh<D: DisplayDriver, const Q: usize>(
        &mut self,
        display: &mut D,
        state: &DriveState<Q>,
    ) -> Result<(), D::Error> {
        let full = !self.initialized;
        if full {
            display.clear(Color::BLACK)?;
            for field in Field::ALL {
                display.draw_string(LABEL_LEFT_PX, row_y(field.row()), Color::WHITE, Color::BLACK, field.label(), TEXT_SIZE)?;
            }
            self.last_rpm.clear();
            self.last_running = None;
            self.last_too_high = None;
            self.initialized = true;
        }

        let changed = state.entry.take_changed();
        if let Some((cursor, digits)) = changed.or_else(|| full.then(|| state.entry.snapshot())) {
            for field in Field::ALL {
                let shown = if field.row() == cursor.row {
                    digits
                } else {
                    committed_digits(field, state.setpoints.load(field))
                };
                draw_field(display, field, &shown)?;
            }
            draw_cursor(display, cursor)?;
        }

        let mut rpm: String<16> = String::new();
        // "RPM: " plus at most 11 characters always fits
        let _ = write!(rpm, "RPM: {:.1}", state.rpm());
        if rpm != self.last_rpm {
            // Pad so a shorter reading erases the previous one
            let mut padded = rpm.clone();
            while padded.push(' ').is_ok() {}
            display.draw_string(LABEL_LEFT_PX, RPM_TOP_PX, Color::YELLOW, Color::BLACK, &padded, TEXT_SIZE)?;
            self.last_rpm = rpm;
        }

        let running = state.latch.running();
        if self.last_running != Some(running) {
            let (text, color) = if running {
                ("RUNNING", Color::GREEN)
            } else {
                ("STOPPED", Color::WHITE)
            };
            display.draw_string(LABEL_LEFT_PX, STATUS_TOP_PX, color, Color::BLACK, text, TEXT_SIZE)?;
            self.last_running = Some(running);
        }

        let too_high = state.latch.voltage_too_high();
        if self.last_too_high != Some(too_high) {
            let text = if too_high { BANNER_TEXT } else { BANNER_BLANK };
            display.draw_string(LABEL_LEFT_PX, BANNER_TOP_PX, Color::RED, Color::BLACK, text, TEXT_SIZE)?;
            self.last_too_high = Some(too_high);
        }

        Ok(())
    }
}

impl Default for StatusView {
    fn default() -> Self {
        Self::new()
    }
}

/// Digits that display a committed setpoint in its field's format
pub fn committed_digits(field: Field, value: f32) -> [u8; ENTRY_DIGITS] {
    let scaled = match field {
        Field::Voltage => value * 100.0,
        Field::Speed | Field::MaxSpeed => value,
    };
    let mut whole = ((scaled.max(0.0) + 0.5) as u32).min(99_999);
    let mut digits = [b'0'; ENTRY_DIGITS];
    for digit in digits.iter_mut().rev() {
        *digit = b'0' + (whole % 10) as u8;
        whole /= 10;
    }
    digits
}

fn draw_field<D: DisplayDriver>(display: &mut D, field: Field, digits: &[u8; ENTRY_DIGITS]) -> Result<(), D::Error> {
    let y = row_y(field.row());
    for cell in 0..field.cells() {
        let ch = if field.decimal_cell() == Some(cell) {
            '.'
        } else {
            char::from(digits[field.slot_for_cell(cell)])
        };
        display.draw_char(cell_x(cell), y, Color::WHITE, Color::BLACK, ch, TEXT_SIZE)?;
    }
    Ok(())
}

fn draw_cursor<D: DisplayDriver>(display: &mut D, cursor: CursorState) -> Result<(), D::Error> {
    for field in Field::ALL {
        let y = row_y(field.row()) + GLYPH_HEIGHT_PX + 2;
        display.draw_line(cell_x(0), y, cell_x(field.cells()), y, Color::BLACK)?;
    }
    let y = row_y(cursor.row) + GLYPH_HEIGHT_PX + 2;
    let x = cell_x(cursor.cell);
    display.draw_line(x, y, x + CELL_STEP_PX - 2, y, Color::WHITE)
}
