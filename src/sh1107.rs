//! SH1107 128x64 monochrome OLED
//!
//! Drawing goes into a local framebuffer through `embedded-graphics`;
//! nothing reaches the panel until [`SH1107::flush`]. Drawing itself cannot
//! fail; only [`SH1107::init`] and [`SH1107::flush`] touch the bus.

use core::convert::Infallible;

use display_interface::{AsyncWriteOnlyDataCommand, DataFormat, DisplayError};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;

pub const WIDTH: u8 = 128;
pub const HEIGHT: u8 = 64;
const ROW_BYTES: usize = WIDTH as usize / 8;
const BUFFER_SIZE: usize = ROW_BYTES * HEIGHT as usize;

const DISPLAY_OFF: u8 = 0xAE;
const DISPLAY_ON: u8 = 0xAF;
const PAGE_ADDRESS: u8 = 0xB0;
const LOWER_COLUMN: u8 = 0x00;
const HIGHER_COLUMN: u8 = 0x10;

/// Power-up register settings, one command per entry
const INIT_SEQUENCE: &[&[u8]] = &[
    &[LOWER_COLUMN],
    &[HIGHER_COLUMN],
    &[PAGE_ADDRESS],
    &[0xDC, 0x00], // Display start line
    &[0x81, 0x6F], // Contrast
    &[0x21],       // Vertical addressing mode
    &[0xA0],       // Segment remap
    &[0xC0],       // Common output scan direction
    &[0xA4],       // Display follows RAM
    &[0xA6],       // Normal (not inverted)
    &[0xA8, 0x3F], // Multiplex ratio (height - 1)
    &[0xD3, 0x60], // Display offset
    &[0xD5, 0x50], // Clock divide ratio / oscillator frequency
    &[0xD9, 0x22], // Discharge / precharge period
    &[0xDB, 0x35], // VCOM deselect level
    &[0xAD, 0x81], // DC-DC on
];

pub struct SH1107<DI, RST> {
    interface: DI,
    rst: RST,
    buffer: [u8; BUFFER_SIZE],
}

impl<DI, RST> SH1107<DI, RST>
where
    DI: AsyncWriteOnlyDataCommand,
    RST: OutputPin,
{
    pub fn new(interface: DI, rst: RST) -> Self {
        Self {
            interface,
            rst,
            buffer: [0; BUFFER_SIZE],
        }
    }

    /// Hardware reset followed by the register setup; leaves the panel on
    pub async fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), DisplayError> {
        self.reset(delay).await?;
        self.off().await?;
        for command in INIT_SEQUENCE {
            self.send_commands(command).await?;
        }
        self.on().await?;
        delay.delay_ms(10).await;
        Ok(())
    }

    async fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), DisplayError> {
        self.rst.set_high().map_err(|_| DisplayError::RSError)?;
        delay.delay_ms(1).await;
        self.rst.set_low().map_err(|_| DisplayError::RSError)?;
        delay.delay_ms(10).await;
        self.rst.set_high().map_err(|_| DisplayError::RSError)?;
        Ok(())
    }

    pub async fn off(&mut self) -> Result<(), DisplayError> {
        self.send_commands(&[DISPLAY_OFF]).await
    }

    pub async fn on(&mut self) -> Result<(), DisplayError> {
        self.send_commands(&[DISPLAY_ON]).await
    }

    /// Blank the framebuffer
    pub fn clear_buffer(&mut self) {
        self.buffer.fill(0x00);
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Send the whole framebuffer to the panel
    ///
    /// The panel runs in vertical addressing mode with a 90° offset, so each
    /// framebuffer row is written as one panel column, bottom row first.
    pub async fn flush(&mut self) -> Result<(), DisplayError> {
        self.send_commands(&[PAGE_ADDRESS]).await?;
        for row in 0..HEIGHT {
            let column = (HEIGHT - 1) - row;
            self.send_commands(&[LOWER_COLUMN | (column & 0x0F)]).await?;
            self.send_commands(&[HIGHER_COLUMN | (column >> 4)]).await?;

            let start = row as usize * ROW_BYTES;
            self.interface
                .send_data(DataFormat::U8(&self.buffer[start..start + ROW_BYTES]))
                .await?;
        }
        Ok(())
    }

    async fn send_commands(&mut self, commands: &[u8]) -> Result<(), DisplayError> {
        self.interface.send_commands(DataFormat::U8(commands)).await
    }

    fn set_pixel(&mut self, x: u32, y: u32, on: bool) {
        let index = (y as usize * WIDTH as usize + x as usize) / 8;
        let mask = 1 << (x % 8);
        if on {
            self.buffer[index] |= mask;
        } else {
            self.buffer[index] &= !mask;
        }
    }
}

impl<DI, RST> DrawTarget for SH1107<DI, RST>
where
    DI: AsyncWriteOnlyDataCommand,
    RST: OutputPin,
{
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, colour) in pixels {
            let (x, y) = (coord.x, coord.y);
            if x >= 0 && x < WIDTH as i32 && y >= 0 && y < HEIGHT as i32 {
                self.set_pixel(x as u32, y as u32, colour.is_on());
            }
        }
        Ok(())
    }

    fn clear(&mut self, colour: Self::Color) -> Result<(), Self::Error> {
        self.buffer.fill(if colour.is_on() { 0xFF } else { 0x00 });
        Ok(())
    }
}

impl<DI, RST> OriginDimensions for SH1107<DI, RST> {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Status;
    use crate::display::{draw_splash, draw_status};
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
    use embedded_hal::digital::ErrorType;

    struct NullInterface;

    impl AsyncWriteOnlyDataCommand for NullInterface {
        async fn send_commands(&mut self, _cmd: DataFormat<'_>) -> Result<(), DisplayError> {
            Ok(())
        }

        async fn send_data(&mut self, _buf: DataFormat<'_>) -> Result<(), DisplayError> {
            Ok(())
        }
    }

    struct NullPin;

    impl ErrorType for NullPin {
        type Error = Infallible;
    }

    impl OutputPin for NullPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn display() -> SH1107<NullInterface, NullPin> {
        SH1107::new(NullInterface, NullPin)
    }

    #[test]
    fn test_pixel_lands_in_row_major_buffer() {
        let mut display = display();
        Pixel(Point::new(9, 2), BinaryColor::On)
            .draw(&mut display)
            .unwrap();

        // Row 2 starts at byte 32, x=9 is bit 1 of the second byte
        assert_eq!(display.buffer()[33], 0b0000_0010);
        assert_eq!(display.buffer().iter().filter(|b| **b != 0).count(), 1);
    }

    #[test]
    fn test_out_of_bounds_pixels_are_dropped() {
        let mut display = display();
        Rectangle::new(Point::new(120, 60), Size::new(20, 20))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut display)
            .unwrap();

        // Only the 8x4 corner inside the panel is set
        let lit: u32 = display.buffer().iter().map(|b| b.count_ones()).sum();
        assert_eq!(lit, 32);
    }

    #[test]
    fn test_status_screen_draws_into_buffer() {
        let mut screen = display();
        let status = Status {
            setpoint: 32.0,
            input: 25.0,
            output: 30.0,
            kp: 30.0,
            ki: 0.0,
            kd: 0.0,
        };
        let drawn: Result<(), Infallible> = draw_status(&mut screen, &status);
        assert!(drawn.is_ok());
        assert!(screen.buffer().iter().any(|b| *b != 0));

        let drawn: Result<(), Infallible> = draw_splash(&mut screen, "RIMS rs", "v0.1.0");
        assert!(drawn.is_ok());
    }

    #[test]
    fn test_clear() {
        let mut display = display();
        display.clear(BinaryColor::On).unwrap();
        assert!(display.buffer().iter().all(|b| *b == 0xFF));

        display.clear_buffer();
        assert!(display.buffer().iter().all(|b| *b == 0));
    }
}
