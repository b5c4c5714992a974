// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The slice of CP15 the core consumes: the control word (for the
//! exception vector base) and the TCM base registers. Wait-for-interrupt
//! is intercepted one level up, in the ARM9's `set_cp15`.

use common::numutil::NumExt;

#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Cp15 {
    pub control: u32,
    pub dtcm: u32,
    pub itcm: u32,
}

impl Cp15 {
    /// Exception vector base; control bit 13 selects the high vectors.
    pub fn exception_base(&self) -> u32 {
        if self.control.is_bit(13) {
            0xFFFF_0000
        } else {
            0
        }
    }

    /// Base address of the DTCM region.
    pub fn dtcm_base(&self) -> u32 {
        self.dtcm & 0xFFFF_F000
    }

    pub fn get(&self, cn: u32, cm: u32, cp: u32) -> u32 {
        match (cn, cm, cp) {
            // ID registers
            (0, 0, 0 | 3..=7) => 0x4105_9461,
            (0, 0, 1) => 0x0F0D_2112,
            (0, 0, 2) => 0x0014_0180,

            (1, 0, 0) => self.control,
            (9, 1, 0) => self.dtcm,
            (9, 1, 1) => self.itcm,

            _ => 0,
        }
    }

    pub fn set(&mut self, cn: u32, cm: u32, cp: u32, value: u32) {
        match (cn, cm, cp) {
            (1, 0, 0) => self.control = value,
            (9, 1, 0) => self.dtcm = value,
            (9, 1, 1) => self.itcm = value,
            _ => log::trace!("unhandled CP15 write C{cn},C{cm},{cp} = 0x{value:08X}"),
        }
    }
}

impl Default for Cp15 {
    fn default() -> Self {
        Self {
            // High exception vectors, like the BIOS leaves them
            control: 0x0000_2078,
            dtcm: 0,
            itcm: 0,
        }
    }
}
