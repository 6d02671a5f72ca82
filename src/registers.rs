//! Register IDs and mode codes for Cypress TTSP controllers

macro_rules! register_id {
    ($name:ident, $addr:literal) => {
        $crate::paste::paste! {
            pub const [<$name:upper>]: u8 = $addr;
        }
    };
}

// Register addresses (single byte, written ahead of every transfer)
register_id!(BASE_ADDR, 0x00);
// System information mode register map
register_id!(ACT_INTRVL, 0x1D);
register_id!(TCH_TMOUT, 0x1E);
register_id!(LP_INTRVL, 0x1F);
// Operating mode register map
register_id!(DISTANCE, 0x1E);

// Host mode codes, written to BASE_ADDR
register_id!(OPERATE_MODE, 0x00);
register_id!(SOFT_RST_MODE, 0x01);
register_id!(DEEP_SLEEP_MODE, 0x02);
register_id!(LOW_POWER_MODE, 0x04);
register_id!(SYSINFO_MODE, 0x10);

/// Handshake toggle bit in the host mode register
pub const HST_MODE_HANDSHAKE: u8 = 1 << 7;

/// Mode bits in the host mode register
pub const HST_MODE_MASK: u8 = 0x7F;

/// Bootloader status bit set once the application firmware is running
pub const BL_STATUS_APP_RUNNING: u8 = 1 << 4;

/// Bootloader command bytes following the file offset
pub const BL_CMD_FILE_OFFSET: u8 = 0x00;
pub const BL_CMD: u8 = 0xFF;
pub const BL_CMD_EXIT: u8 = 0xA5;

/// Factory default bootloader security key
pub const BL_DEFAULT_KEY: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

/// Largest single I2C read the controller accepts
pub const MAX_TRANSFER: usize = 32;
