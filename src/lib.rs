//! Cypress TTSP capacitive touchscreen controller device driver
//!
//! This crate provides a device driver for Cypress TrueTouch (TTSP) touch
//! controllers using the two finger operating mode report.
//!
//! The controller connects to the target via I2C and three GPIO pins: reset
//! and enable outputs, and an interrupt input that falls when a new report is
//! ready. The [`embedded_hal`](https://docs.rs/embedded-hal) `blocking::i2c`
//! and `digital::v2` interfaces are used, so should work with any target that
//! provides these. Edge interrupts are outside `embedded-hal`, so the
//! interrupt pin must implement [`InterruptPin`].
//!
//! A device is created and brought up with:
//!
//! ```ignore
//!     let mut touch = cypress_ttsp::CypressTouch::new(
//!         i2c,
//!         cypress_ttsp::DEFAULT_I2C_ADDR,
//!         rst_pin,
//!         en_pin,
//!         int_pin,
//!     );
//!     let mut points = cypress_ttsp::LogicalTouches::new(540, 960);
//!     touch.setup(&mut delay, &mut points).unwrap();
//! ```
//!
//! Setup walks the controller from its bootloader through system information
//! mode into operating mode. Any failure leaves the driver permanently failed
//! with the interrupt detached.
//!
//! The interrupt handler should only note the falling edge in a
//! [`TouchSignal`]. A task then reads the report outside interrupt context:
//!
//! ```ignore
//!     static SIGNAL: TouchSignal = TouchSignal::new();
//!
//!     // interrupt handler
//!     SIGNAL.notify();
//!
//!     // polling task
//!     match touch.poll(&SIGNAL, &mut points) {
//!         Ok(Some(TouchUpdate::Touches(n))) => {
//!             for p in points.iter() {
//!                 info!("{}: {},{}", p.id, p.x, p.y);
//!             }
//!         }
//!         Ok(_) => {}
//!         Err(_) => warn!("Error"),
//!     }
//! ```

#![cfg_attr(not(test), no_std)]

use embedded_hal::blocking::i2c::{Read, Write};
use paste;

pub mod config;
pub mod irq;
pub mod records;
pub mod registers;
pub mod setup;
pub mod touch;

pub use config::{Config, Orientation, PowerVariant, TimingRegisters, DEFAULT_I2C_ADDR};
pub use irq::{InterruptPin, TouchSignal};
pub use records::{BootloaderInfo, SystemInfo, Touch, TouchReport};
pub use setup::{DeviceState, Stage};
pub use touch::{LogicalTouches, TouchPoint, TouchSink, TouchUpdate};

/// Errors produced by the touch controller driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// An error accessing the GPIO pins
    GPIOError,
    /// An error accessing the I2C interface
    I2CError,
    /// The device never acknowledged its address
    NotAcknowledged,
    /// The device is still in bootloader mode
    BootloaderActive,
    /// System information reported firmware version 0.0
    NoFirmwareVersion,
    /// Register write larger than a single transfer
    TransferTooLong,
    /// Buffer too small for the record being decoded
    ShortRecord,
    /// The device has not been set up yet
    NotReady,
    /// Setup failed at the given stage, the device is unusable
    Failed(Stage),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Power mode read back from the host mode register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    Operate,
    LowPower,
    DeepSleep,
    Unknown(u8),
}

impl From<u8> for PowerMode {
    fn from(hst_mode: u8) -> Self {
        match hst_mode & registers::HST_MODE_MASK {
            registers::OPERATE_MODE => PowerMode::Operate,
            registers::LOW_POWER_MODE => PowerMode::LowPower,
            registers::DEEP_SLEEP_MODE => PowerMode::DeepSleep,
            other => PowerMode::Unknown(other),
        }
    }
}

/// Cypress TTSP driver
pub struct CypressTouch<I2C, RST, EN, INT> {
    i2c: I2C,
    rst_pin: RST,
    en_pin: EN,
    int_pin: INT,
    config: Config,
    bootloader: BootloaderInfo,
    sysinfo: SystemInfo,
    hst_mode: u8,
    state: DeviceState,
}

impl<I2C, RST, EN, INT> CypressTouch<I2C, RST, EN, INT> {
    /// Create a new driver with the default configuration
    ///
    /// `i2c` is the I2C device
    /// `rst_pin` and `en_pin` are push pull output GPIOs
    /// `int_pin` is the interrupt input
    pub fn new(i2c: I2C, addr: u8, rst_pin: RST, en_pin: EN, int_pin: INT) -> Self {
        Self::new_with_config(i2c, Config::default().with_addr(addr), rst_pin, en_pin, int_pin)
    }

    pub fn new_with_config(i2c: I2C, config: Config, rst_pin: RST, en_pin: EN, int_pin: INT) -> Self {
        CypressTouch {
            i2c,
            rst_pin,
            en_pin,
            int_pin,
            config,
            bootloader: BootloaderInfo::default(),
            sysinfo: SystemInfo::default(),
            hst_mode: 0,
            state: DeviceState::Uninitialized,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bootloader registers as last read during setup
    pub fn bootloader_info(&self) -> &BootloaderInfo {
        &self.bootloader
    }

    /// System information read during setup, with the programmed timing
    pub fn system_info(&self) -> &SystemInfo {
        &self.sysinfo
    }

    /// Host mode register value as last written by a handshake
    pub fn host_mode(&self) -> u8 {
        self.hst_mode
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Give back the bus and pins
    pub fn release(self) -> (I2C, RST, EN, INT) {
        (self.i2c, self.rst_pin, self.en_pin, self.int_pin)
    }

    fn check_ready(&self) -> Result<()> {
        match self.state {
            DeviceState::Ready => Ok(()),
            DeviceState::Uninitialized => Err(Error::NotReady),
            DeviceState::Failed(stage) => Err(Error::Failed(stage)),
        }
    }
}

impl<I2C, RST, EN, INT> CypressTouch<I2C, RST, EN, INT>
where
    I2C: Write,
{
    /// Address the device with an empty write, `Ok` if it acknowledged
    pub fn ping(&mut self) -> Result<()> {
        self.i2c
            .write(self.config.addr, &[])
            .map_err(|_| Error::NotAcknowledged)
    }

    /// Write `data` to consecutive registers starting at `cmd`
    pub fn write_registers(&mut self, cmd: u8, data: &[u8]) -> Result<()> {
        if data.len() > registers::MAX_TRANSFER {
            return Err(Error::TransferTooLong);
        }
        let mut msg = [0u8; registers::MAX_TRANSFER + 1];
        msg[0] = cmd;
        msg[1..=data.len()].copy_from_slice(data);
        self.i2c
            .write(self.config.addr, &msg[..=data.len()])
            .map_err(|_| Error::I2CError)
    }

    /// Write a mode code to the host mode register
    pub fn set_mode(&mut self, mode: u8) -> Result<()> {
        self.write_registers(registers::BASE_ADDR, &[mode])
    }

    /// Switch between operating (`true`) and low power (`false`) mode
    pub fn set_power_state(&mut self, enabled: bool) -> Result<()> {
        let mode = if enabled {
            registers::OPERATE_MODE
        } else {
            registers::LOW_POWER_MODE
        };
        self.set_mode(mode)
    }
}

impl<I2C, RST, EN, INT> CypressTouch<I2C, RST, EN, INT>
where
    I2C: Write + Read,
{
    /// Read `buf.len()` bytes starting at register `cmd`
    ///
    /// Reads are split into transfers of at most 32 bytes. A failed transfer
    /// aborts the read.
    pub fn read_registers(&mut self, cmd: u8, buf: &mut [u8]) -> Result<()> {
        self.i2c
            .write(self.config.addr, &[cmd])
            .map_err(|_| Error::I2CError)?;
        for chunk in buf.chunks_mut(registers::MAX_TRANSFER) {
            self.i2c
                .read(self.config.addr, chunk)
                .map_err(|_| Error::I2CError)?;
        }
        Ok(())
    }

    /// Acknowledge a report by toggling the handshake bit of the host mode
    /// register. The controller stalls until this is done.
    pub fn handshake(&mut self) -> Result<()> {
        let mut hst_mode = [0u8; 1];
        self.read_registers(registers::BASE_ADDR, &mut hst_mode)?;
        let toggled = hst_mode[0] ^ registers::HST_MODE_HANDSHAKE;
        self.write_registers(registers::BASE_ADDR, &[toggled])?;
        self.hst_mode = toggled;
        Ok(())
    }

    /// Read the current power mode
    pub fn power_mode(&mut self) -> Result<PowerMode> {
        let mut hst_mode = [0u8; 1];
        self.read_registers(registers::BASE_ADDR, &mut hst_mode)?;
        Ok(PowerMode::from(hst_mode[0]))
    }

    /// Return `true` if the controller is in operating mode
    pub fn get_power_state(&mut self) -> Result<bool> {
        Ok(self.power_mode()? == PowerMode::Operate)
    }

    /// Read and acknowledge the touch report registers
    pub fn read_touch_report(&mut self) -> Result<TouchReport> {
        let mut rd_buf = [0u8; records::si::LEN];
        self.read_registers(registers::BASE_ADDR, &mut rd_buf)?;
        self.handshake()?;
        TouchReport::decode(&rd_buf)
    }

    /// Read a report and forward its touches to `sink`
    ///
    /// Reports without exactly one or two fingers are dropped with a warning
    /// and nothing is forwarded. The sink's touches are released before a
    /// valid report is forwarded and on a report with no fingers.
    pub fn update_touches<S: TouchSink + ?Sized>(&mut self, sink: &mut S) -> Result<TouchUpdate> {
        self.check_ready()?;
        let report = self.read_touch_report()?;
        if !report.is_valid() {
            #[cfg(feature = "defmt")]
            defmt::warn!("Invalid number of touches ({}), ignoring", report.fingers);
            if report.fingers == 0 {
                sink.release_touches();
                return Ok(TouchUpdate::Released);
            }
            return Ok(TouchUpdate::Discarded(report.fingers));
        }

        #[cfg(feature = "defmt")]
        defmt::trace!("Touch count: {}", report.fingers);
        sink.release_touches();
        for (id, t) in report.active().iter().enumerate() {
            sink.add_raw_touch(id as u8, t.x, t.y);
        }
        Ok(TouchUpdate::Touches(report.fingers))
    }

    /// Read a report if the interrupt line has signalled one
    ///
    /// Returns `Ok(None)` when no falling edge is pending.
    pub fn poll<S: TouchSink + ?Sized>(
        &mut self,
        signal: &TouchSignal,
        sink: &mut S,
    ) -> Result<Option<TouchUpdate>> {
        if !signal.take() {
            return Ok(None);
        }
        self.update_touches(sink).map(Some)
    }
}

macro_rules! register_read {
    ($name:ident) => {
        $crate::paste::paste! {
            impl<I2C, RST, EN, INT> CypressTouch<I2C, RST, EN, INT>
            where
                I2C: Write + Read,
            {
                #[doc="Read the " [<$name:upper>] " register"]
                pub fn [<read_ $name:lower>](&mut self) -> Result<u8> {
                    let mut rd_buf = [0u8; 1];
                    self.read_registers(registers::[<$name:upper>], &mut rd_buf)?;
                    Ok(rd_buf[0])
                }
            }
        }
    };
}

macro_rules! register_write {
    ($name:ident) => {
        $crate::paste::paste! {
            impl<I2C, RST, EN, INT> CypressTouch<I2C, RST, EN, INT>
            where
                I2C: Write,
            {
                #[doc="Write the " [<$name:upper>] " register"]
                pub fn [<write_ $name:lower>](&mut self, v: u8) -> Result<()> {
                    self.write_registers(registers::[<$name:upper>], &[v])
                }
            }
        }
    };
}

macro_rules! register_acc {
    ($name:ident, ro) => {
        register_read!($name);
    };
    ($name:ident, rw) => {
        register_read!($name);
        register_write!($name);
    };
}

// System information mode
register_acc!(ACT_INTRVL, rw);
register_acc!(TCH_TMOUT, rw);
register_acc!(LP_INTRVL, rw);
// Operating mode
register_acc!(DISTANCE, rw);


// End of file
