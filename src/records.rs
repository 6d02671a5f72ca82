//! Fixed-layout register records read from the controller
//!
//! Each record is decoded from (and where needed encoded back to) a plain
//! byte slice using the field offsets below, so no memory layout is assumed.

use crate::{Error, Result};

/// Bootloader record field offsets
pub mod bl {
    pub const FILE: usize = 0;
    pub const STATUS: usize = 1;
    pub const ERROR: usize = 2;
    pub const BLVER_HI: usize = 3;
    pub const BLVER_LO: usize = 4;
    pub const BLD_BLVER_HI: usize = 5;
    pub const BLD_BLVER_LO: usize = 6;
    pub const TTSPVER_HI: usize = 7;
    pub const TTSPVER_LO: usize = 8;
    pub const APPID_HI: usize = 9;
    pub const APPID_LO: usize = 10;
    pub const APPVER_HI: usize = 11;
    pub const APPVER_LO: usize = 12;
    pub const CID: usize = 13;
    pub const LEN: usize = 16;
}

/// System information record field offsets
pub mod si {
    pub const HST_MODE: usize = 0;
    pub const MFG_STAT: usize = 1;
    pub const MFG_CMD: usize = 2;
    pub const CID: usize = 3;
    pub const UID: usize = 7;
    pub const BL_VERH: usize = 15;
    pub const BL_VERL: usize = 16;
    pub const TTS_VERH: usize = 17;
    pub const TTS_VERL: usize = 18;
    pub const APP_IDH: usize = 19;
    pub const APP_IDL: usize = 20;
    pub const APP_VERH: usize = 21;
    pub const APP_VERL: usize = 22;
    pub const SCN_TYP: usize = 28;
    pub const ACT_INTRVL: usize = 29;
    pub const TCH_TMOUT: usize = 30;
    pub const LP_INTRVL: usize = 31;
    pub const LEN: usize = 32;
}

/// Touch record field offsets (operating mode)
pub mod tr {
    pub const FINGERS: usize = 2;
    pub const X0: usize = 3;
    pub const Y0: usize = 5;
    pub const Z0: usize = 7;
    pub const DET_TYPE: usize = 8;
    pub const X1: usize = 9;
    pub const Y1: usize = 11;
    pub const Z1: usize = 13;
    pub const LEN: usize = 14;
}

fn check_len(buf: &[u8], len: usize) -> Result<()> {
    if buf.len() < len {
        return Err(Error::ShortRecord);
    }
    Ok(())
}

fn u16_be_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

/// Snapshot of the bootloader registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootloaderInfo {
    pub file: u8,
    pub status: u8,
    pub error: u8,
    pub bl_version: u16,
    pub bld_bl_version: u16,
    pub ttsp_version: u16,
    pub app_id: u16,
    pub app_version: u16,
    pub chip_id: [u8; 3],
}

impl BootloaderInfo {
    /// Decode the first `bl::LEN` bytes of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_len(buf, bl::LEN)?;
        let mut chip_id = [0u8; 3];
        chip_id.copy_from_slice(&buf[bl::CID..bl::CID + 3]);
        Ok(BootloaderInfo {
            file: buf[bl::FILE],
            status: buf[bl::STATUS],
            error: buf[bl::ERROR],
            bl_version: u16_be_at(buf, bl::BLVER_HI),
            bld_bl_version: u16_be_at(buf, bl::BLD_BLVER_HI),
            ttsp_version: u16_be_at(buf, bl::TTSPVER_HI),
            app_id: u16_be_at(buf, bl::APPID_HI),
            app_version: u16_be_at(buf, bl::APPVER_HI),
            chip_id,
        })
    }

    /// `true` once the controller has left bootloader mode
    pub fn app_running(&self) -> bool {
        self.status & crate::registers::BL_STATUS_APP_RUNNING != 0
    }
}

/// System information registers, valid while in system information mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemInfo {
    pub hst_mode: u8,
    pub mfg_stat: u8,
    pub mfg_cmd: u8,
    pub chip_id: [u8; 3],
    pub uid: [u8; 8],
    pub bl_verh: u8,
    pub bl_verl: u8,
    pub tts_verh: u8,
    pub tts_verl: u8,
    pub app_idh: u8,
    pub app_idl: u8,
    pub app_verh: u8,
    pub app_verl: u8,
    pub scn_typ: u8,
    pub act_intrvl: u8,
    pub tch_tmout: u8,
    pub lp_intrvl: u8,
}

impl SystemInfo {
    /// Decode the first `si::LEN` bytes of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_len(buf, si::LEN)?;
        let mut chip_id = [0u8; 3];
        chip_id.copy_from_slice(&buf[si::CID..si::CID + 3]);
        let mut uid = [0u8; 8];
        uid.copy_from_slice(&buf[si::UID..si::UID + 8]);
        Ok(SystemInfo {
            hst_mode: buf[si::HST_MODE],
            mfg_stat: buf[si::MFG_STAT],
            mfg_cmd: buf[si::MFG_CMD],
            chip_id,
            uid,
            bl_verh: buf[si::BL_VERH],
            bl_verl: buf[si::BL_VERL],
            tts_verh: buf[si::TTS_VERH],
            tts_verl: buf[si::TTS_VERL],
            app_idh: buf[si::APP_IDH],
            app_idl: buf[si::APP_IDL],
            app_verh: buf[si::APP_VERH],
            app_verl: buf[si::APP_VERL],
            scn_typ: buf[si::SCN_TYP],
            act_intrvl: buf[si::ACT_INTRVL],
            tch_tmout: buf[si::TCH_TMOUT],
            lp_intrvl: buf[si::LP_INTRVL],
        })
    }

    /// Firmware version reported by the controller
    pub fn firmware_version(&self) -> u16 {
        u16::from_be_bytes([self.tts_verh, self.tts_verl])
    }

    /// A responsive controller never reports firmware version 0.0
    pub fn has_firmware_version(&self) -> bool {
        self.tts_verh != 0 || self.tts_verl != 0
    }

    /// The three timing registers as written back to `ACT_INTRVL`
    pub fn timing_bytes(&self) -> [u8; 3] {
        [self.act_intrvl, self.tch_tmout, self.lp_intrvl]
    }
}

/// Position and pressure of a single finger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Touch {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

/// Touch report read on every poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchReport {
    /// Number of active fingers, only 1 and 2 are valid
    pub fingers: u8,
    pub touches: [Touch; 2],
    pub detection_type: u8,
}

impl TouchReport {
    /// Decode the first `tr::LEN` bytes of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self> {
        check_len(buf, tr::LEN)?;
        Ok(TouchReport {
            fingers: buf[tr::FINGERS],
            touches: [
                Touch {
                    x: u16_be_at(buf, tr::X0),
                    y: u16_be_at(buf, tr::Y0),
                    z: buf[tr::Z0],
                },
                Touch {
                    x: u16_be_at(buf, tr::X1),
                    y: u16_be_at(buf, tr::Y1),
                    z: buf[tr::Z1],
                },
            ],
            detection_type: buf[tr::DET_TYPE],
        })
    }

    /// `true` if the finger count is one the controller can actually report
    pub fn is_valid(&self) -> bool {
        matches!(self.fingers, 1 | 2)
    }

    /// The active touches of a valid report
    pub fn active(&self) -> &[Touch] {
        if self.is_valid() {
            &self.touches[..self.fingers as usize]
        } else {
            &[]
        }
    }
}
