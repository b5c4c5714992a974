// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Bitfield views over the raw PPU registers. The engines store the raw
//! words (the I/O surface is byte-lane based) and decode through these
//! while rendering.

use common::numutil::NumExt;
use modular_bitfield::{bitfield, specifiers::*};

#[bitfield]
#[repr(u32)]
#[derive(Debug, Default, Copy, Clone)]
pub struct DisplayControl {
    pub bg_mode: B3,
    pub bg0_3d: bool,
    pub tile_obj_1d: bool,
    pub bitmap_obj_2d_dim: bool,
    pub bitmap_obj_1d: bool,
    pub forced_blank: bool,
    pub bg_en: B4,
    pub obj_en: bool,
    pub win0_en: bool,
    pub win1_en: bool,
    pub winobj_en: bool,
    pub display_mode: B2,
    pub vram_block: B2,
    pub tile_obj_boundary: B2,
    pub bitmap_obj_boundary: B1,
    pub hblank_oam_access: bool,
    pub char_base_block: B3,
    pub screen_base_block: B3,
    pub bg_ext_pal: bool,
    pub obj_ext_pal: bool,
}

impl DisplayControl {
    #[inline]
    pub fn bg_enabled(&self, bg: u16) -> bool {
        self.bg_en().is_bit(bg)
    }
}

#[bitfield]
#[repr(u16)]
#[derive(Debug, Default, Copy, Clone)]
pub struct BgControl {
    pub priority: B2,
    pub char_base: B4,
    pub mosaic_en: bool,
    /// One 256-color palette instead of 16x16; selects the extended
    /// and bitmap modes on extended backgrounds.
    pub single_palette: bool,
    pub screen_base: B5,
    /// Extended-palette slot select on text BG0/BG1, wraparound on
    /// affine backgrounds.
    pub flag13: bool,
    pub screen_size: B2,
}
