//! Controller bring-up
//!
//! The controller starts in its bootloader. Setup is a fixed sequence of
//! [`Stage`]s, each a precondition for the next, and the first failure is
//! final: the interrupt is detached and the driver stays failed.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::{Read, Write};
use embedded_hal::digital::v2::OutputPin;

use crate::config::PowerVariant;
use crate::irq::InterruptPin;
use crate::records::{self, BootloaderInfo, SystemInfo};
use crate::registers;
use crate::touch::TouchSink;
use crate::{CypressTouch, Error, Result};

/// Presence check attempts before giving up
pub const PRESENCE_RETRIES: u8 = 5;

const POWER_ON_DELAY_MS: u32 = 50;
const PRESENCE_RETRY_DELAY_MS: u32 = 20;
const SOFT_RESET_DELAY_MS: u32 = 20;
const BL_EXIT_DELAY_MS: u32 = 500;
const MODE_SWITCH_DELAY_MS: u32 = 20;
const TIMING_WRITE_DELAY_MS: u32 = 20;
const IRQ_SETTLE_DELAY_MS: u32 = 50;

/// Steps of the bring-up sequence, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    PowerOn,
    Presence,
    SoftReset,
    BootloaderRead,
    BootloaderExit,
    SysInfoMode,
    TimingRegisters,
    OperateMode,
    InterruptArm,
    Orientation,
    PowerState,
    Done,
}

/// Lifecycle of the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    Uninitialized,
    Ready,
    /// Setup failed at this stage; there is no way back
    Failed(Stage),
}

impl<I2C, RST, EN, INT> CypressTouch<I2C, RST, EN, INT>
where
    RST: OutputPin,
    EN: OutputPin,
{
    /// Power the controller up and release it from reset
    pub fn power_on(&mut self, delay: &mut dyn DelayMs<u32>) -> Result<()> {
        self.en_pin.set_high().map_err(|_| Error::GPIOError)?;
        delay.delay_ms(POWER_ON_DELAY_MS);
        self.rst_pin.set_high().map_err(|_| Error::GPIOError)?;
        delay.delay_ms(POWER_ON_DELAY_MS);
        if self.config.variant == PowerVariant::HardReset {
            self.hard_reset(delay)?;
        }
        Ok(())
    }

    /// Pulse the reset line
    pub fn hard_reset(&mut self, delay: &mut dyn DelayMs<u32>) -> Result<()> {
        self.rst_pin.set_high().map_err(|_| Error::GPIOError)?;
        delay.delay_ms(10);
        self.rst_pin.set_low().map_err(|_| Error::GPIOError)?;
        delay.delay_ms(2);
        self.rst_pin.set_high().map_err(|_| Error::GPIOError)?;
        delay.delay_ms(10);
        Ok(())
    }
}

impl<I2C, RST, EN, INT> CypressTouch<I2C, RST, EN, INT>
where
    I2C: Write,
{
    /// Ping the device up to `retries` times, 20ms apart
    pub fn ping_touchscreen(&mut self, retries: u8, delay: &mut dyn DelayMs<u32>) -> Result<()> {
        for _ in 0..retries {
            if self.ping().is_ok() {
                return Ok(());
            }
            delay.delay_ms(PRESENCE_RETRY_DELAY_MS);
        }
        Err(Error::NotAcknowledged)
    }

    /// Program the scan timing registers from the configuration
    pub fn set_sysinfo_registers(&mut self, delay: &mut dyn DelayMs<u32>) -> Result<()> {
        let timing = self.config.timing;
        self.sysinfo.act_intrvl = timing.act_intrvl;
        self.sysinfo.tch_tmout = timing.tch_tmout;
        self.sysinfo.lp_intrvl = timing.lp_intrvl;
        let regs = self.sysinfo.timing_bytes();
        self.write_registers(registers::ACT_INTRVL, &regs)?;
        delay.delay_ms(TIMING_WRITE_DELAY_MS);
        Ok(())
    }

    /// Enter operating mode and apply the distance tuning value
    pub fn set_operate_mode(&mut self) -> Result<()> {
        self.set_mode(registers::OPERATE_MODE)?;
        self.write_distance(self.config.distance)
    }
}

impl<I2C, RST, EN, INT> CypressTouch<I2C, RST, EN, INT>
where
    I2C: Write,
    RST: OutputPin,
{
    /// Hold the reset line released and request a soft reset
    pub fn soft_reset(&mut self, delay: &mut dyn DelayMs<u32>) -> Result<()> {
        self.rst_pin.set_high().map_err(|_| Error::GPIOError)?;
        self.set_mode(registers::SOFT_RST_MODE)?;
        delay.delay_ms(SOFT_RESET_DELAY_MS);
        Ok(())
    }
}

impl<I2C, RST, EN, INT> CypressTouch<I2C, RST, EN, INT>
where
    I2C: Write + Read,
{
    /// Read the bootloader registers
    pub fn load_bootloader_registers(&mut self) -> Result<BootloaderInfo> {
        let mut rd_buf = [0u8; records::bl::LEN];
        self.read_registers(registers::BASE_ADDR, &mut rd_buf)?;
        let info = BootloaderInfo::decode(&rd_buf)?;
        self.bootloader = info;
        Ok(info)
    }

    /// Ask the bootloader to start the application firmware
    ///
    /// Fails with `BootloaderActive` unless the status register reports the
    /// application running afterwards.
    pub fn exit_bootloader_mode(&mut self, delay: &mut dyn DelayMs<u32>) -> Result<()> {
        let mut cmd = [0u8; 11];
        cmd[0] = registers::BL_CMD_FILE_OFFSET;
        cmd[1] = registers::BL_CMD;
        cmd[2] = registers::BL_CMD_EXIT;
        cmd[3..].copy_from_slice(&registers::BL_DEFAULT_KEY);
        self.write_registers(registers::BASE_ADDR, &cmd)?;
        delay.delay_ms(BL_EXIT_DELAY_MS);

        let info = self.load_bootloader_registers()?;
        if !info.app_running() {
            #[cfg(feature = "defmt")]
            defmt::error!("Bootloader status {=u8:#x}, error {=u8:#x}", info.status, info.error);
            return Err(Error::BootloaderActive);
        }
        Ok(())
    }

    /// Enter system information mode and read the system information
    pub fn set_sysinfo_mode(&mut self, delay: &mut dyn DelayMs<u32>) -> Result<()> {
        self.set_mode(registers::SYSINFO_MODE)?;
        delay.delay_ms(MODE_SWITCH_DELAY_MS);

        let mut rd_buf = [0u8; records::si::LEN];
        self.read_registers(registers::BASE_ADDR, &mut rd_buf)?;
        self.sysinfo = SystemInfo::decode(&rd_buf)?;
        self.handshake()?;

        if !self.sysinfo.has_firmware_version() {
            return Err(Error::NoFirmwareVersion);
        }
        #[cfg(feature = "defmt")]
        defmt::info!(
            "TTSP firmware {=u16:#x}, app {=u8:x}.{=u8:x}, bootloader {=u8:x}.{=u8:x}",
            self.sysinfo.firmware_version(),
            self.sysinfo.app_verh,
            self.sysinfo.app_verl,
            self.sysinfo.bl_verh,
            self.sysinfo.bl_verl
        );
        Ok(())
    }
}

impl<I2C, RST, EN, INT> CypressTouch<I2C, RST, EN, INT>
where
    INT: InterruptPin,
{
    /// Enable the falling edge interrupt and let the line settle
    pub fn arm_interrupt(&mut self, delay: &mut dyn DelayMs<u32>) -> Result<()> {
        self.int_pin
            .arm_falling_edge()
            .map_err(|_| Error::GPIOError)?;
        delay.delay_ms(IRQ_SETTLE_DELAY_MS);
        Ok(())
    }
}

impl<I2C, RST, EN, INT> CypressTouch<I2C, RST, EN, INT>
where
    I2C: Write + Read,
    RST: OutputPin,
    EN: OutputPin,
    INT: InterruptPin,
{
    /// Bring the controller up into operating mode
    ///
    /// `sink` receives the raw coordinate space once the controller is
    /// running. On failure the interrupt is detached and every later call
    /// returns `Error::Failed`.
    pub fn setup<S: TouchSink + ?Sized>(
        &mut self,
        delay: &mut dyn DelayMs<u32>,
        sink: &mut S,
    ) -> Result<()> {
        match self.state {
            DeviceState::Ready => return Ok(()),
            DeviceState::Failed(stage) => return Err(Error::Failed(stage)),
            DeviceState::Uninitialized => {}
        }

        let mut stage = Stage::PowerOn;
        while stage != Stage::Done {
            #[cfg(feature = "defmt")]
            defmt::debug!("Setup stage {}", stage);
            match self.run_stage(stage, delay, sink) {
                Ok(next) => stage = next,
                Err(e) => {
                    #[cfg(feature = "defmt")]
                    defmt::error!("Setup failed at {}: {}", stage, e);
                    self.int_pin.detach();
                    self.state = DeviceState::Failed(stage);
                    return Err(e);
                }
            }
        }
        self.state = DeviceState::Ready;
        Ok(())
    }

    /// Run a single stage, returning the stage to run next
    pub fn run_stage<S: TouchSink + ?Sized>(
        &mut self,
        stage: Stage,
        delay: &mut dyn DelayMs<u32>,
        sink: &mut S,
    ) -> Result<Stage> {
        match stage {
            Stage::PowerOn => {
                self.power_on(delay)?;
                Ok(Stage::Presence)
            }
            Stage::Presence => {
                self.ping_touchscreen(PRESENCE_RETRIES, delay)?;
                Ok(Stage::SoftReset)
            }
            Stage::SoftReset => {
                self.soft_reset(delay)?;
                Ok(Stage::BootloaderRead)
            }
            Stage::BootloaderRead => {
                self.load_bootloader_registers()?;
                Ok(Stage::BootloaderExit)
            }
            Stage::BootloaderExit => {
                self.exit_bootloader_mode(delay)?;
                Ok(Stage::SysInfoMode)
            }
            Stage::SysInfoMode => {
                self.set_sysinfo_mode(delay)?;
                Ok(Stage::TimingRegisters)
            }
            Stage::TimingRegisters => {
                self.set_sysinfo_registers(delay)?;
                Ok(Stage::OperateMode)
            }
            Stage::OperateMode => {
                self.set_operate_mode()?;
                Ok(Stage::InterruptArm)
            }
            Stage::InterruptArm => {
                self.arm_interrupt(delay)?;
                Ok(Stage::Orientation)
            }
            Stage::Orientation => {
                sink.set_orientation(self.config.orientation);
                Ok(Stage::PowerState)
            }
            Stage::PowerState => {
                if self.config.variant == PowerVariant::HardReset {
                    self.set_power_state(true)?;
                }
                Ok(Stage::Done)
            }
            Stage::Done => Ok(Stage::Done),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::{sim_device, FakeIrq, NoPin, RecordingDelay, RecordingSink, SimBus, ADDR};
    use crate::{Config, Orientation};
    use embedded_hal_mock::eh0::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_hal_mock::eh0::digital::{Mock as PinMock, State, Transaction as PinTransaction};

    fn bootloader_record(status: u8) -> Vec<u8> {
        let mut rec = vec![0u8; records::bl::LEN];
        rec[records::bl::STATUS] = status;
        rec
    }

    fn sysinfo_record(verh: u8, verl: u8) -> Vec<u8> {
        let mut rec = vec![0u8; records::si::LEN];
        rec[records::si::HST_MODE] = 0x10;
        rec[records::si::TTS_VERH] = verh;
        rec[records::si::TTS_VERL] = verl;
        rec[records::si::ACT_INTRVL] = 0x11;
        rec[records::si::TCH_TMOUT] = 0x22;
        rec[records::si::LP_INTRVL] = 0x33;
        rec
    }

    #[test]
    pub fn full_setup_sequence() {
        let bl_exit = vec![
            0x00, 0x00, 0xFF, 0xA5, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
        ];
        let expectations = [
            // presence
            I2cTransaction::write(ADDR, vec![]),
            // soft reset
            I2cTransaction::write(ADDR, vec![0x00, 0x01]),
            // bootloader read
            I2cTransaction::write(ADDR, vec![0x00]),
            I2cTransaction::read(ADDR, bootloader_record(0x00)),
            // bootloader exit
            I2cTransaction::write(ADDR, bl_exit),
            I2cTransaction::write(ADDR, vec![0x00]),
            I2cTransaction::read(ADDR, bootloader_record(0x10)),
            // system information mode and handshake
            I2cTransaction::write(ADDR, vec![0x00, 0x10]),
            I2cTransaction::write(ADDR, vec![0x00]),
            I2cTransaction::read(ADDR, sysinfo_record(0x02, 0x07)),
            I2cTransaction::write(ADDR, vec![0x00]),
            I2cTransaction::read(ADDR, vec![0x10]),
            I2cTransaction::write(ADDR, vec![0x00, 0x90]),
            // timing registers
            I2cTransaction::write(ADDR, vec![0x1D, 0x00, 0xFF, 0x0A]),
            // operating mode and distance
            I2cTransaction::write(ADDR, vec![0x00, 0x00]),
            I2cTransaction::write(ADDR, vec![0x1E, 0xF8]),
            // power state
            I2cTransaction::write(ADDR, vec![0x00, 0x00]),
        ];
        let i2c = I2cMock::new(&expectations);
        let mut i2c_clone = i2c.clone();

        let en = PinMock::new(&[PinTransaction::set(State::High)]);
        let mut en_clone = en.clone();
        let rst = PinMock::new(&[
            PinTransaction::set(State::High),
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
            // soft reset keeps the line released
            PinTransaction::set(State::High),
        ]);
        let mut rst_clone = rst.clone();

        let mut dev = CypressTouch::new(i2c, ADDR, rst, en, FakeIrq::default());
        let mut delay = RecordingDelay::default();
        let mut sink = RecordingSink::default();
        dev.setup(&mut delay, &mut sink).unwrap();

        assert_eq!(dev.state(), DeviceState::Ready);
        assert!(dev.bootloader_info().app_running());
        assert_eq!(dev.system_info().firmware_version(), 0x0207);
        assert_eq!(dev.system_info().timing_bytes(), [0x00, 0xFF, 0x0A]);
        assert_eq!(dev.host_mode(), 0x90);
        assert_eq!(sink.orientation, Some(Orientation::default()));
        assert_eq!(delay.calls, vec![50, 50, 10, 2, 10, 20, 500, 20, 20, 50]);

        let (_, _, _, irq) = dev.release();
        assert!(irq.armed);
        assert!(!irq.detached);

        i2c_clone.done();
        en_clone.done();
        rst_clone.done();
    }

    #[test]
    pub fn enable_pin_variant_skips_reset_pulse_and_power_write() {
        let mut bus = SimBus::default();
        // bootloader reports the application running, firmware 1.0
        bus.image = sysinfo_record(0x01, 0x00);
        bus.image[records::bl::STATUS] = 0x10;
        let config = Config::default().with_variant(PowerVariant::EnablePin);
        let mut dev = CypressTouch::new_with_config(bus, config, NoPin, NoPin, FakeIrq::default());
        let mut delay = RecordingDelay::default();
        let mut sink = RecordingSink::default();
        dev.setup(&mut delay, &mut sink).unwrap();

        assert_eq!(delay.calls, vec![50, 50, 20, 500, 20, 20, 50]);
        let bus = dev.release().0;
        assert_eq!(bus.writes.last(), Some(&vec![0x1E, 0xF8]));
    }

    #[test]
    pub fn setup_fails_when_device_never_acknowledges() {
        let mut bus = SimBus::default();
        bus.nack = true;
        let config = Config::default().with_variant(PowerVariant::EnablePin);
        let mut dev = CypressTouch::new_with_config(bus, config, NoPin, NoPin, FakeIrq::default());
        let mut delay = RecordingDelay::default();
        let mut sink = RecordingSink::default();

        assert_eq!(
            dev.setup(&mut delay, &mut sink),
            Err(Error::NotAcknowledged)
        );
        assert_eq!(dev.state(), DeviceState::Failed(Stage::Presence));
        // power on, then five attempts each followed by a 20ms backoff
        assert_eq!(delay.calls, vec![50, 50, 20, 20, 20, 20, 20]);
        assert!(sink.orientation.is_none());

        // the failed state is permanent
        assert_eq!(
            dev.setup(&mut delay, &mut sink),
            Err(Error::Failed(Stage::Presence))
        );
        assert_eq!(delay.calls.len(), 7);

        let (_, _, _, irq) = dev.release();
        assert!(irq.detached);
        assert!(!irq.armed);
    }

    #[test]
    pub fn presence_attempt_count() {
        struct CountingNack(u32);

        impl Write for CountingNack {
            type Error = ();

            fn write(&mut self, _addr: u8, bytes: &[u8]) -> core::result::Result<(), ()> {
                assert!(bytes.is_empty());
                self.0 += 1;
                Err(())
            }
        }

        let mut dev = CypressTouch::new(CountingNack(0), ADDR, NoPin, NoPin, FakeIrq::default());
        let mut delay = RecordingDelay::default();
        assert_eq!(
            dev.ping_touchscreen(PRESENCE_RETRIES, &mut delay),
            Err(Error::NotAcknowledged)
        );
        assert_eq!(dev.release().0 .0, 5);
        assert!(delay.calls.iter().all(|&ms| ms >= 20));
    }

    #[test]
    pub fn presence_succeeds_on_first_ack() {
        let mut dev = sim_device(SimBus::default());
        let mut delay = RecordingDelay::default();
        dev.ping_touchscreen(PRESENCE_RETRIES, &mut delay).unwrap();
        assert!(delay.calls.is_empty());
        assert_eq!(dev.release().0.writes, vec![Vec::<u8>::new()]);
    }

    #[test]
    pub fn exit_bootloader_depends_on_status_bit() {
        for status in 0..=255u8 {
            let mut dev = sim_device(SimBus::with_image(&bootloader_record(status)));
            let mut delay = RecordingDelay::default();
            let res = dev.exit_bootloader_mode(&mut delay);
            if status & 0x10 != 0 {
                assert_eq!(res, Ok(()));
            } else {
                assert_eq!(res, Err(Error::BootloaderActive));
            }
            assert_eq!(delay.calls, vec![500]);
        }
    }

    #[test]
    pub fn sysinfo_mode_requires_firmware_version() {
        for (verh, verl, ok) in [
            (0x00, 0x00, false),
            (0x00, 0x01, true),
            (0x01, 0x00, true),
            (0xFF, 0xFF, true),
        ] {
            let mut dev = sim_device(SimBus::with_image(&sysinfo_record(verh, verl)));
            let mut delay = RecordingDelay::default();
            let res = dev.set_sysinfo_mode(&mut delay);
            assert_eq!(res.is_ok(), ok);
            if !ok {
                assert_eq!(res, Err(Error::NoFirmwareVersion));
            }
            // handshake happens either way
            let bus = dev.release().0;
            assert_eq!(bus.writes.last(), Some(&vec![0x00, 0x90]));
        }
    }

    #[test]
    pub fn sysinfo_mode_fails_on_zero_version_whatever_else() {
        for fill in [0x00u8, 0x5A, 0xFF] {
            let mut rec = vec![fill; records::si::LEN];
            rec[records::si::TTS_VERH] = 0;
            rec[records::si::TTS_VERL] = 0;
            let mut dev = sim_device(SimBus::with_image(&rec));
            let mut delay = RecordingDelay::default();
            assert_eq!(
                dev.set_sysinfo_mode(&mut delay),
                Err(Error::NoFirmwareVersion)
            );
        }
    }

    #[test]
    pub fn bootloader_exit_failure_detaches_interrupt() {
        // status bit never set
        let mut dev = sim_device(SimBus::with_image(&bootloader_record(0x00)));
        let mut delay = RecordingDelay::default();
        let mut sink = RecordingSink::default();
        assert_eq!(
            dev.setup(&mut delay, &mut sink),
            Err(Error::BootloaderActive)
        );
        assert_eq!(dev.state(), DeviceState::Failed(Stage::BootloaderExit));
        assert!(dev.release().3.detached);
    }

    #[test]
    pub fn interrupt_arm_failure_is_fatal() {
        let mut bus = SimBus::default();
        bus.image = sysinfo_record(0x01, 0x00);
        bus.image[records::bl::STATUS] = 0x10;
        let irq = FakeIrq {
            fail: true,
            ..Default::default()
        };
        let mut dev = CypressTouch::new(bus, ADDR, NoPin, NoPin, irq);
        let mut delay = RecordingDelay::default();
        let mut sink = RecordingSink::default();
        assert_eq!(dev.setup(&mut delay, &mut sink), Err(Error::GPIOError));
        assert_eq!(dev.state(), DeviceState::Failed(Stage::InterruptArm));
        assert!(sink.orientation.is_none());
    }

    fn responsive_bus() -> SimBus {
        let mut bus = SimBus::with_image(&sysinfo_record(0x01, 0x00));
        bus.image[records::bl::STATUS] = 0x10;
        bus
    }

    fn failing_setup(bus: SimBus) -> (Result<()>, DeviceState, Vec<u32>, SimBus, FakeIrq) {
        let mut dev = CypressTouch::new(bus, ADDR, NoPin, NoPin, FakeIrq::default());
        let mut delay = RecordingDelay::default();
        let mut sink = RecordingSink::default();
        let res = dev.setup(&mut delay, &mut sink);
        assert!(sink.orientation.is_none());
        let state = dev.state();
        let (bus, _, _, irq) = dev.release();
        (res, state, delay.calls, bus, irq)
    }

    #[test]
    pub fn soft_reset_bus_error_is_fatal() {
        let mut bus = responsive_bus();
        bus.nack_data = true;
        let (res, state, delays, bus, irq) = failing_setup(bus);

        assert_eq!(res, Err(Error::I2CError));
        assert_eq!(state, DeviceState::Failed(Stage::SoftReset));
        assert!(irq.detached);
        // power on and reset pulse only, no soft reset wait
        assert_eq!(delays, vec![50, 50, 10, 2, 10]);
        assert_eq!(bus.writes, vec![Vec::<u8>::new()]);
    }

    #[test]
    pub fn bootloader_read_error_is_fatal() {
        let mut bus = responsive_bus();
        bus.fail_reads = true;
        let (res, state, delays, bus, irq) = failing_setup(bus);

        assert_eq!(res, Err(Error::I2CError));
        assert_eq!(state, DeviceState::Failed(Stage::BootloaderRead));
        assert!(irq.detached);
        assert_eq!(delays, vec![50, 50, 10, 2, 10, 20]);
        assert_eq!(bus.reads, vec![records::bl::LEN]);
    }

    #[test]
    pub fn timing_register_write_error_is_fatal() {
        let mut bus = responsive_bus();
        bus.nack_reg = Some(registers::ACT_INTRVL);
        let (res, state, delays, _, irq) = failing_setup(bus);

        assert_eq!(res, Err(Error::I2CError));
        assert_eq!(state, DeviceState::Failed(Stage::TimingRegisters));
        assert!(irq.detached);
        // no wait after the refused timing write
        assert_eq!(delays, vec![50, 50, 10, 2, 10, 20, 500, 20]);
    }

    #[test]
    pub fn distance_write_error_is_fatal() {
        let mut bus = responsive_bus();
        bus.nack_reg = Some(registers::DISTANCE);
        let (res, state, delays, bus, irq) = failing_setup(bus);

        assert_eq!(res, Err(Error::I2CError));
        assert_eq!(state, DeviceState::Failed(Stage::OperateMode));
        assert!(irq.detached);
        assert!(!irq.armed);
        assert_eq!(delays, vec![50, 50, 10, 2, 10, 20, 500, 20, 20]);
        assert_eq!(bus.writes.last(), Some(&vec![0x00, 0x00]));
    }
}
