//! Switch inputs and pin event dispatch
//!
//! The eight CAD switches sit on port A with pull-ups, so a released switch
//! reads 1 and a pressed one reads 0. A press is therefore a falling edge.
//!
//! [`SwitchDispatcher`] holds an explicit dispatch table from pin to
//! callbacks. Each [`poll`](SwitchDispatcher::poll) reads the port once,
//! compares it with the previous levels and invokes the matching callbacks
//! synchronously, lowest pin first, in registration order per pin.

use embedded_hal::spi::SpiDevice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::mcp23s17::{Mcp23s17, Port};
use super::CadError;

/// Number of switch pins
pub const PIN_COUNT: u8 = 8;

/// Source of raw switch levels, one bit per pin
pub trait SwitchPort {
    type Error: core::fmt::Debug;

    fn read_levels(&mut self) -> Result<u8, Self::Error>;
}

impl<SPI: SpiDevice> SwitchPort for Mcp23s17<SPI> {
    type Error = SPI::Error;

    fn read_levels(&mut self) -> Result<u8, Self::Error> {
        self.read_port(Port::A)
    }
}

impl<P: SwitchPort + ?Sized> SwitchPort for &mut P {
    type Error = P::Error;

    fn read_levels(&mut self) -> Result<u8, Self::Error> {
        (**self).read_levels()
    }
}

/// Which level changes a registration reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// 0 → 1 (switch released)
    Rising,
    /// 1 → 0 (switch pressed)
    Falling,
    /// Either direction
    Both,
}

impl Edge {
    fn matches(self, actual: Edge) -> bool {
        self == Edge::Both || self == actual
    }
}

/// A level change on one pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchEvent {
    /// Pin index (0-7)
    pub pin: u8,
    /// Direction of the change, `Rising` or `Falling`
    pub edge: Edge,
    /// All eight levels after the change
    pub levels: u8,
    /// When the poll observed the change
    pub timestamp: Instant,
}

type Callback<'a> = Box<dyn FnMut(&SwitchEvent) + 'a>;

struct Registration<'a> {
    pin: u8,
    edge: Edge,
    callback: Callback<'a>,
}

/// Polling dispatcher from pin events to registered callbacks
pub struct SwitchDispatcher<'a, P: SwitchPort> {
    port: P,
    registrations: Vec<Registration<'a>>,
    last_levels: Option<u8>,
}

impl<'a, P: SwitchPort> SwitchDispatcher<'a, P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            registrations: Vec::new(),
            last_levels: None,
        }
    }

    /// Call `callback` whenever `pin` changes in the direction of `edge`
    pub fn register<F>(
        &mut self,
        pin: u8,
        edge: Edge,
        callback: F,
    ) -> Result<(), CadError<P::Error>>
    where
        F: FnMut(&SwitchEvent) + 'a,
    {
        if pin >= PIN_COUNT {
            return Err(CadError::InvalidPin(pin));
        }
        self.registrations.push(Registration {
            pin,
            edge,
            callback: Box::new(callback),
        });
        Ok(())
    }

    /// Remove every registration for `pin`, returning how many were removed
    pub fn deregister(&mut self, pin: u8) -> usize {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.pin != pin);
        before - self.registrations.len()
    }

    /// Number of registrations
    pub fn registrations(&self) -> usize {
        self.registrations.len()
    }

    /// Levels seen by the last poll
    pub fn last_levels(&self) -> Option<u8> {
        self.last_levels
    }

    /// Read the port once and dispatch events for changed pins
    ///
    /// The first poll only records the baseline. Returns the number of
    /// callbacks invoked.
    pub fn poll(&mut self) -> Result<usize, CadError<P::Error>> {
        let levels = self.port.read_levels().map_err(CadError::Bus)?;
        let timestamp = Instant::now();

        let previous = match self.last_levels.replace(levels) {
            Some(previous) => previous,
            None => return Ok(0),
        };

        let changed = previous ^ levels;
        if changed == 0 {
            return Ok(0);
        }

        let mut invoked = 0;
        for pin in 0..PIN_COUNT {
            let mask = 1u8 << pin;
            if changed & mask == 0 {
                continue;
            }
            let edge = if levels & mask == 0 {
                Edge::Falling
            } else {
                Edge::Rising
            };
            let event = SwitchEvent {
                pin,
                edge,
                levels,
                timestamp,
            };
            tracing::trace!(pin, ?edge, levels, "Switch event");

            for registration in self
                .registrations
                .iter_mut()
                .filter(|r| r.pin == pin && r.edge.matches(edge))
            {
                (registration.callback)(&event);
                invoked += 1;
            }
        }

        Ok(invoked)
    }

    /// Poll every `interval` until `stop` is set
    ///
    /// Returns on the first bus error.
    pub fn run(&mut self, stop: &AtomicBool, interval: Duration) -> Result<(), CadError<P::Error>> {
        tracing::info!(
            registrations = self.registrations.len(),
            "Switch listener active"
        );
        while !stop.load(Ordering::SeqCst) {
            self.poll()?;
            std::thread::sleep(interval);
        }
        tracing::info!("Switch listener stopped");
        Ok(())
    }

    /// Release the port
    pub fn into_port(self) -> P {
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cad::testing::MockSpi;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Port returning scripted levels; the last one repeats
    struct ScriptPort(VecDeque<u8>);

    impl SwitchPort for ScriptPort {
        type Error = ();

        fn read_levels(&mut self) -> Result<u8, ()> {
            if self.0.len() > 1 {
                Ok(self.0.pop_front().unwrap_or(0xFF))
            } else {
                self.0.front().copied().ok_or(())
            }
        }
    }

    fn port(levels: &[u8]) -> ScriptPort {
        ScriptPort(levels.iter().copied().collect())
    }

    #[test]
    fn test_first_poll_is_baseline() {
        let hits = RefCell::new(0);
        let mut dispatcher = SwitchDispatcher::new(port(&[0x00, 0x00]));
        dispatcher
            .register(0, Edge::Both, |_| *hits.borrow_mut() += 1)
            .unwrap();

        assert_eq!(dispatcher.poll().unwrap(), 0);
        assert_eq!(dispatcher.last_levels(), Some(0x00));
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn test_press_is_falling_edge() {
        let events = RefCell::new(Vec::new());
        let mut dispatcher = SwitchDispatcher::new(port(&[0xFF, 0xFB, 0xFF]));
        dispatcher
            .register(2, Edge::Falling, |e| events.borrow_mut().push((e.pin, e.edge)))
            .unwrap();

        dispatcher.poll().unwrap();
        assert_eq!(dispatcher.poll().unwrap(), 1);
        // Release does not match a falling registration
        assert_eq!(dispatcher.poll().unwrap(), 0);
        assert_eq!(*events.borrow(), vec![(2, Edge::Falling)]);
    }

    #[test]
    fn test_callbacks_run_in_pin_then_registration_order() {
        let order = RefCell::new(Vec::new());
        let mut dispatcher = SwitchDispatcher::new(port(&[0xFF, 0b1111_0110]));
        dispatcher
            .register(3, Edge::Falling, |_| order.borrow_mut().push("3a"))
            .unwrap();
        dispatcher
            .register(0, Edge::Falling, |_| order.borrow_mut().push("0"))
            .unwrap();
        dispatcher
            .register(3, Edge::Both, |_| order.borrow_mut().push("3b"))
            .unwrap();

        dispatcher.poll().unwrap();
        assert_eq!(dispatcher.poll().unwrap(), 3);
        assert_eq!(*order.borrow(), vec!["0", "3a", "3b"]);
    }

    #[test]
    fn test_rising_edge_on_release() {
        let edges = RefCell::new(Vec::new());
        let mut dispatcher = SwitchDispatcher::new(port(&[0xFE, 0xFF]));
        dispatcher
            .register(0, Edge::Rising, |e| edges.borrow_mut().push(e.edge))
            .unwrap();
        dispatcher.poll().unwrap();
        dispatcher.poll().unwrap();
        assert_eq!(*edges.borrow(), vec![Edge::Rising]);
    }

    #[test]
    fn test_invalid_pin_rejected() {
        let mut dispatcher = SwitchDispatcher::new(port(&[0xFF]));
        let err = dispatcher.register(8, Edge::Falling, |_| {}).unwrap_err();
        assert!(matches!(err, CadError::InvalidPin(8)));
        assert_eq!(dispatcher.registrations(), 0);
    }

    #[test]
    fn test_deregister_removes_pin() {
        let mut dispatcher = SwitchDispatcher::new(port(&[0xFF]));
        dispatcher.register(1, Edge::Falling, |_| {}).unwrap();
        dispatcher.register(1, Edge::Rising, |_| {}).unwrap();
        dispatcher.register(2, Edge::Falling, |_| {}).unwrap();
        assert_eq!(dispatcher.deregister(1), 2);
        assert_eq!(dispatcher.registrations(), 1);
    }

    #[test]
    fn test_run_stops_on_flag() {
        let stop = AtomicBool::new(true);
        let mut dispatcher = SwitchDispatcher::new(port(&[0xFF]));
        dispatcher.run(&stop, Duration::from_millis(1)).unwrap();
        assert_eq!(dispatcher.last_levels(), None);
    }

    #[test]
    fn test_reads_port_a_of_expander() {
        let mut spi = MockSpi::new();
        spi.port_a_script = VecDeque::from(vec![0xFF, 0x7F]);
        let mut chip = Mcp23s17::new(spi, 0);
        let pins = RefCell::new(Vec::new());
        {
            let mut dispatcher = SwitchDispatcher::new(&mut chip);
            dispatcher
                .register(7, Edge::Falling, |e| pins.borrow_mut().push(e.pin))
                .unwrap();
            dispatcher.poll().unwrap();
            dispatcher.poll().unwrap();
        }
        assert_eq!(*pins.borrow(), vec![7]);
    }
}
