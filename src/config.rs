//! Driver configuration

/// Default I2C device address for Cypress TTSP controllers
pub const DEFAULT_I2C_ADDR: u8 = 0x24;

/// Raw X extent of the panel
pub const DEFAULT_X_RAW_MAX: u16 = 682;
/// Raw Y extent of the panel
pub const DEFAULT_Y_RAW_MAX: u16 = 1023;

/// Default distance tuning value written in operating mode
pub const DEFAULT_DISTANCE: u8 = 0xF8;

/// How the controller is powered up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerVariant {
    /// Pulse the reset line after power on and write the operating power
    /// state once setup completes
    HardReset,
    /// Power is controlled by the enable line only
    EnablePin,
}

/// Scan timing registers programmed in system information mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingRegisters {
    /// Active scan interval
    pub act_intrvl: u8,
    /// Touch timeout before dropping to low power
    pub tch_tmout: u8,
    /// Low power scan interval
    pub lp_intrvl: u8,
}

impl Default for TimingRegisters {
    fn default() -> Self {
        TimingRegisters {
            act_intrvl: 0x00,
            tch_tmout: 0xFF,
            lp_intrvl: 0x0A,
        }
    }
}

/// Raw coordinate space reported by the controller and how it maps to the
/// panel's logical orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Orientation {
    pub x_raw_max: u16,
    pub y_raw_max: u16,
    pub invert_x: bool,
    pub invert_y: bool,
    pub swap_xy: bool,
}

impl Default for Orientation {
    fn default() -> Self {
        Orientation {
            x_raw_max: DEFAULT_X_RAW_MAX,
            y_raw_max: DEFAULT_Y_RAW_MAX,
            invert_x: false,
            invert_y: true,
            swap_xy: true,
        }
    }
}

impl Orientation {
    /// Map a raw controller position onto a `width` x `height` screen
    ///
    /// Each raw axis is scaled against its own maximum and inverted if
    /// requested, then the axes are swapped.
    pub fn to_logical(&self, x_raw: u16, y_raw: u16, width: u16, height: u16) -> (u16, u16) {
        let (x_extent, y_extent) = if self.swap_xy {
            (height, width)
        } else {
            (width, height)
        };
        let x = scale(x_raw, self.x_raw_max, x_extent, self.invert_x);
        let y = scale(y_raw, self.y_raw_max, y_extent, self.invert_y);
        if self.swap_xy {
            (y, x)
        } else {
            (x, y)
        }
    }
}

fn scale(raw: u16, raw_max: u16, extent: u16, invert: bool) -> u16 {
    if raw_max == 0 || extent == 0 {
        return 0;
    }
    let raw = raw.min(raw_max) as u32;
    let last = extent as u32 - 1;
    let v = raw * last / raw_max as u32;
    if invert {
        (last - v) as u16
    } else {
        v as u16
    }
}

/// Driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub addr: u8,
    pub variant: PowerVariant,
    pub timing: TimingRegisters,
    pub distance: u8,
    pub orientation: Orientation,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: DEFAULT_I2C_ADDR,
            variant: PowerVariant::HardReset,
            timing: TimingRegisters::default(),
            distance: DEFAULT_DISTANCE,
            orientation: Orientation::default(),
        }
    }
}

impl Config {
    pub fn with_addr(mut self, addr: u8) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_variant(mut self, variant: PowerVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_timing(mut self, timing: TimingRegisters) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_distance(mut self, distance: u8) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    pub fn defaults_match_panel() {
        let cfg = Config::default();
        assert_eq!(cfg.addr, 0x24);
        assert_eq!(cfg.distance, 0xF8);
        assert_eq!(cfg.timing.act_intrvl, 0x00);
        assert_eq!(cfg.timing.tch_tmout, 0xFF);
        assert_eq!(cfg.timing.lp_intrvl, 0x0A);
        assert_eq!(cfg.orientation.x_raw_max, 682);
        assert_eq!(cfg.orientation.y_raw_max, 1023);
        assert!(cfg.orientation.invert_y);
        assert!(cfg.orientation.swap_xy);
        assert!(!cfg.orientation.invert_x);
    }

    #[test]
    pub fn builder_overrides() {
        let cfg = Config::default()
            .with_addr(0x1A)
            .with_variant(PowerVariant::EnablePin)
            .with_distance(0x80);
        assert_eq!(cfg.addr, 0x1A);
        assert_eq!(cfg.variant, PowerVariant::EnablePin);
        assert_eq!(cfg.distance, 0x80);
    }

    #[test]
    pub fn logical_mapping_identity() {
        let o = Orientation {
            x_raw_max: 1000,
            y_raw_max: 1000,
            invert_x: false,
            invert_y: false,
            swap_xy: false,
        };
        assert_eq!(o.to_logical(0, 0, 101, 201), (0, 0));
        assert_eq!(o.to_logical(1000, 1000, 101, 201), (100, 200));
        assert_eq!(o.to_logical(500, 500, 101, 201), (50, 100));
        // out of range positions clamp to the edge
        assert_eq!(o.to_logical(4000, 4000, 101, 201), (100, 200));
    }

    #[test]
    pub fn logical_mapping_default_panel() {
        let o = Orientation::default();
        // raw origin: x = 0, y inverted to the far edge, then swapped
        assert_eq!(o.to_logical(0, 0, 1024, 683), (1023, 0));
        assert_eq!(o.to_logical(682, 1023, 1024, 683), (0, 682));
    }
}
