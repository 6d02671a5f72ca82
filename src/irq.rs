//! Interrupt line handling
//!
//! The controller pulls its interrupt line low when a new report is ready.
//! The platform's interrupt handler should only call [`TouchSignal::notify`];
//! the report itself is read later by the polling task with
//! [`CypressTouch::poll`](crate::CypressTouch::poll), so no bus traffic ever
//! happens in interrupt context.

use core::sync::atomic::{AtomicBool, Ordering};

/// An input pin able to raise an interrupt on its falling edge
///
/// Edge interrupts are not covered by `embedded-hal`, so the platform
/// provides this for its GPIO type.
pub trait InterruptPin {
    type Error;

    /// Configure the pin as an input and enable the falling edge interrupt
    fn arm_falling_edge(&mut self) -> core::result::Result<(), Self::Error>;

    /// Disable the interrupt
    fn detach(&mut self);
}

/// Pending report flag shared between the interrupt handler and the
/// polling task
pub struct TouchSignal {
    pending: AtomicBool,
}

impl TouchSignal {
    pub const fn new() -> Self {
        TouchSignal {
            pending: AtomicBool::new(false),
        }
    }

    /// Record a falling edge. Safe to call from interrupt context.
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Consume a pending edge, returning `true` if there was one
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for TouchSignal {
    fn default() -> Self {
        Self::new()
    }
}
