//! Status screen
//!
//! Three lines of text, redrawn every tick:
//!
//! ```text
//! CURRENT:  63.41
//! SETPOINT: 65.00
//! PWM:      42.17
//! ```

use core::fmt::Write;

use embedded_graphics::mono_font::{ascii::FONT_6X10, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};

use crate::controller::Status;

const LINE_CHARS: usize = 24;
const LINE_SPACING: i32 = 14;
const TOP_MARGIN: i32 = 4;

pub type Line = heapless::String<LINE_CHARS>;

/// Text lines for the status screen
///
/// A value too wide for a line is cut off rather than failing the redraw.
pub fn status_lines(status: &Status) -> [Line; 3] {
    let mut current = Line::new();
    let mut setpoint = Line::new();
    let mut pwm = Line::new();
    let _ = write!(current, "CURRENT:  {:.2}", status.input);
    let _ = write!(setpoint, "SETPOINT: {:.2}", status.setpoint);
    let _ = write!(pwm, "PWM:      {:.2}", status.output);
    [current, setpoint, pwm]
}

/// Clear `target` and draw the status lines
pub fn draw_status<D>(target: &mut D, status: &Status) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(BinaryColor::Off)?;

    let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    for (row, line) in status_lines(status).iter().enumerate() {
        let position = Point::new(0, TOP_MARGIN + row as i32 * LINE_SPACING);
        Text::with_baseline(line, position, style, Baseline::Top).draw(target)?;
    }
    Ok(())
}

/// Boot screen: framed product name and version
pub fn draw_splash<D>(target: &mut D, name: &str, version: &str) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(BinaryColor::Off)?;

    Rectangle::new(Point::zero(), target.bounding_box().size)
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
        .draw(target)?;

    let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    Text::with_baseline(name, Point::new(6, 18), style, Baseline::Top).draw(target)?;
    Text::with_baseline(version, Point::new(6, 34), style, Baseline::Top).draw(target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::mock_display::MockDisplay;

    fn status() -> Status {
        Status {
            setpoint: 65.0,
            input: 63.414,
            output: 42.168,
            kp: 30.0,
            ki: 0.0,
            kd: 0.0,
        }
    }

    fn mock_display() -> MockDisplay<BinaryColor> {
        let mut display = MockDisplay::new();
        display.set_allow_out_of_bounds_drawing(true);
        display.set_allow_overdraw(true);
        display
    }

    fn lit_pixels(display: &MockDisplay<BinaryColor>) -> usize {
        let mut lit = 0;
        for y in 0..64 {
            for x in 0..64 {
                if display.get_pixel(Point::new(x, y)) == Some(BinaryColor::On) {
                    lit += 1;
                }
            }
        }
        lit
    }

    #[test]
    fn test_status_lines() {
        let lines = status_lines(&status());
        assert_eq!(lines[0].as_str(), "CURRENT:  63.41");
        assert_eq!(lines[1].as_str(), "SETPOINT: 65.00");
        assert_eq!(lines[2].as_str(), "PWM:      42.17");
    }

    #[test]
    fn test_oversized_value_is_cut_off() {
        let huge = Status {
            input: 1.0e20,
            ..status()
        };
        let lines = status_lines(&huge);
        assert!(lines[0].len() <= LINE_CHARS);
        assert_eq!(lines[1].as_str(), "SETPOINT: 65.00");
    }

    #[test]
    fn test_draw_status_lights_pixels() {
        let mut display = mock_display();
        draw_status(&mut display, &status()).unwrap();
        assert!(lit_pixels(&display) > 0);
    }

    #[test]
    fn test_draw_splash_lights_pixels() {
        let mut display = mock_display();
        draw_splash(&mut display, "RIMS rs", "v0.1.0").unwrap();
        // Frame alone is more than a few pixels
        assert!(lit_pixels(&display) > 100);
    }
}
