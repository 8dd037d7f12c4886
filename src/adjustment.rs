//! Setpoint adjustment buttons
//!
//! Both buttons are active-low with pull-ups. A press only counts once the
//! button is let go again, so holding a button down changes the setpoint
//! by a single step.

use embedded_hal::digital::PinState;

use crate::SETPOINT_STEP;

/// Per-button edge detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonState {
    #[default]
    Idle,
    PressedAwaitingRelease,
}

/// Single active-low button that reports press-release cycles
#[derive(Debug, Clone, Copy, Default)]
pub struct Button {
    state: ButtonState,
}

impl Button {
    pub const fn new() -> Self {
        Self {
            state: ButtonState::Idle,
        }
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Feed the current pin level; returns true on the release that ends a press
    pub fn update(&mut self, level: PinState) -> bool {
        match (self.state, level) {
            (ButtonState::Idle, PinState::Low) => {
                self.state = ButtonState::PressedAwaitingRelease;
                false
            }
            (ButtonState::PressedAwaitingRelease, PinState::High) => {
                self.state = ButtonState::Idle;
                true
            }
            _ => false,
        }
    }
}

/// Which way the setpoint moved this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Adjustment {
    Increased,
    Decreased,
}

/// Increment and decrement buttons acting on one setpoint
#[derive(Debug, Clone, Copy, Default)]
pub struct SetpointAdjuster {
    increment: Button,
    decrement: Button,
}

impl SetpointAdjuster {
    pub const fn new() -> Self {
        Self {
            increment: Button::new(),
            decrement: Button::new(),
        }
    }

    pub fn increment_state(&self) -> ButtonState {
        self.increment.state()
    }

    pub fn decrement_state(&self) -> ButtonState {
        self.decrement.state()
    }

    /// Run both button machines against the current pin levels
    ///
    /// The buttons are independent: a release of each in the same tick
    /// applies both steps and leaves the setpoint unchanged.
    pub fn update(
        &mut self,
        setpoint: &mut f32,
        increment: PinState,
        decrement: PinState,
    ) -> heapless::Vec<Adjustment, 2> {
        let mut applied = heapless::Vec::new();

        if self.increment.update(increment) {
            *setpoint += SETPOINT_STEP;
            let _ = applied.push(Adjustment::Increased);
        }
        if self.decrement.update(decrement) {
            *setpoint -= SETPOINT_STEP;
            let _ = applied.push(Adjustment::Decreased);
        }

        applied
    }
}
