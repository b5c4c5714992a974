// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The 2D engines. Each one composes a scanline at a time from up to
//! four background layers and the sprite layer into a 256x192
//! framebuffer of 15-bit colors, bit 15 marking opaque pixels.

mod affine;
mod objects;
mod registers;
mod text;

use std::sync::Arc;

use arrayvec::ArrayVec;
use common::numutil::{hword, byte_of, NumExt, U16Ext, U32Ext};

pub use registers::{BgControl, DisplayControl};

pub const WIDTH: usize = 256;
pub const HEIGHT: usize = 192;
const BUF: usize = WIDTH * HEIGHT;

/// Borrowed views of the video memory an engine reads while rendering.
pub struct VideoRegions<'a> {
    /// This engine's 1KB palette half: BG colors, then OBJ colors.
    pub palette: &'a [u8],
    /// This engine's 1KB of OAM.
    pub oam: &'a [u8],
    pub bg_vram: &'a [u8],
    pub obj_vram: &'a [u8],
}

/// One of the two 2D engines.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Gpu2D {
    engine_b: bool,

    framebuffer: Vec<u16>,
    /// Scratch layers: the four backgrounds, then the sprite layer
    /// split into its four priority tiers.
    layers: Vec<Vec<u16>>,

    dispcnt: u32,
    bg_cnt: [u16; 4],
    bg_h_ofs: [u16; 4],
    bg_v_ofs: [u16; 4],
    bg_pa: [i16; 2],
    bg_pb: [i16; 2],
    bg_pc: [i16; 2],
    bg_pd: [i16; 2],
    bg_x: [u32; 2],
    bg_y: [u32; 2],
    /// Reference-point counters, re-latched on write and at frame start,
    /// stepped by PB/PD per drawn line.
    internal_x: [i32; 2],
    internal_y: [i32; 2],
    master_bright: u16,

    /// Extended palette slots: four for backgrounds, one for objects.
    #[cfg_attr(feature = "serde", serde(skip, default = "empty_slots"))]
    ext_palettes: [Option<Arc<[u8]>>; 5],
}

fn empty_slots() -> [Option<Arc<[u8]>>; 5] {
    [None, None, None, None, None]
}

impl Gpu2D {
    pub fn new(engine_b: bool) -> Self {
        Self {
            engine_b,
            framebuffer: vec![0; BUF],
            layers: vec![vec![0; BUF]; 8],
            dispcnt: 0,
            bg_cnt: [0; 4],
            bg_h_ofs: [0; 4],
            bg_v_ofs: [0; 4],
            bg_pa: [0x100; 2],
            bg_pb: [0; 2],
            bg_pc: [0; 2],
            bg_pd: [0x100; 2],
            bg_x: [0; 2],
            bg_y: [0; 2],
            internal_x: [0; 2],
            internal_y: [0; 2],
            master_bright: 0,
            ext_palettes: empty_slots(),
        }
    }

    /// The finished frame, 256x192 cells of RGB5 with bit 15 set on
    /// opaque pixels.
    pub fn framebuffer(&self) -> &[u16] {
        &self.framebuffer
    }

    /// Bind an extended palette slot to a 16-bit-indexed RGB5 table.
    pub fn set_ext_palette(&mut self, slot: usize, data: Arc<[u8]>) {
        self.ext_palettes[slot] = Some(data);
    }

    /// Compose one scanline into the framebuffer.
    pub fn draw_scanline(&mut self, line: u16, vid: &VideoRegions) {
        let disp = DisplayControl::from(self.dispcnt);
        let start = line.us() * WIDTH;

        if disp.forced_blank() || disp.display_mode() == 0 {
            self.framebuffer[start..start + WIDTH].fill(0xFFFF);
            return;
        }
        if disp.display_mode() != 1 {
            // VRAM/main-memory display needs the LCDC banks, which live
            // with the external memory
            log::debug!("unhandled display mode {}", disp.display_mode());
            self.framebuffer[start..start + WIDTH].fill(0xFFFF);
            return;
        }

        for layer in &mut self.layers {
            layer[start..start + WIDTH].fill(0);
        }

        if disp.obj_en() {
            self.draw_objects(line, vid, &disp);
        }

        let mode = disp.bg_mode();
        if disp.bg_enabled(0) && !(disp.bg0_3d() && !self.engine_b) {
            self.draw_text(0, line, vid);
        }
        if disp.bg_enabled(1) {
            self.draw_text(1, line, vid);
        }
        if disp.bg_enabled(2) {
            match mode {
                0 | 1 | 3 => self.draw_text(2, line, vid),
                2 | 4 => self.draw_affine(2, line, vid),
                5 => self.draw_extended(2, line, vid),
                inv => log::debug!("invalid BG mode {inv}"),
            }
        }
        if disp.bg_enabled(3) {
            match mode {
                0 => self.draw_text(3, line, vid),
                1 | 2 => self.draw_affine(3, line, vid),
                3 | 4 | 5 => self.draw_extended(3, line, vid),
                _ => (),
            }
        }

        self.compose(line, vid, &disp);
    }

    /// Pick the topmost opaque pixel per column. Sprites win against
    /// backgrounds of the same priority; background ties go to the
    /// lower index.
    fn compose(&mut self, line: u16, vid: &VideoRegions, disp: &DisplayControl) {
        let backdrop = Self::palette_color(vid, 0) | 0x8000;

        let mut order: ArrayVec<(u8, usize), 4> = ArrayVec::new();
        for bg in 0..4 {
            let skip_3d = bg == 0 && disp.bg0_3d() && !self.engine_b;
            if disp.bg_enabled(bg.u16()) && !skip_3d {
                order.push((BgControl::from(self.bg_cnt[bg]).priority(), bg));
            }
        }
        order.sort_unstable();

        let start = line.us() * WIDTH;
        for x in 0..WIDTH {
            let idx = start + x;
            let mut color = backdrop;
            'pixel: for prio in 0..4usize {
                let obj = self.layers[4 + prio][idx];
                if obj.is_bit(15) {
                    color = obj;
                    break 'pixel;
                }
                for &(p, bg) in &order {
                    if p.us() == prio && self.layers[bg][idx].is_bit(15) {
                        color = self.layers[bg][idx];
                        break 'pixel;
                    }
                }
            }
            self.framebuffer[idx] = self.apply_master_bright(color);
        }
    }

    /// Master brightness: bits 14-15 select none/lighten/darken, bits
    /// 0-4 the factor, applied per RGB5 channel.
    fn apply_master_bright(&self, color: u16) -> u16 {
        let factor = ((self.master_bright & 0x1F).u32()).min(16);
        let mode = self.master_bright >> 14;
        if factor == 0 || mode == 0 || mode == 3 {
            return color;
        }

        let mut out = color & 0x8000;
        for shift in [0, 5, 10] {
            let channel = ((color >> shift) & 0x1F).u32();
            let channel = match mode {
                1 => channel + ((31 - channel) * factor) / 16,
                _ => channel - (channel * factor) / 16,
            };
            out |= (channel.min(31) << shift).u16();
        }
        out
    }

    pub(super) fn palette_color(vid: &VideoRegions, idx: usize) -> u16 {
        read16(vid.palette, idx * 2) & 0x7FFF
    }

    pub(super) fn obj_palette_color(vid: &VideoRegions, idx: usize) -> u16 {
        read16(vid.palette, 0x200 + idx * 2) & 0x7FFF
    }

    /// Color from an extended palette slot, or the standard palette
    /// when the slot is unbound.
    pub(super) fn ext_color(&self, vid: &VideoRegions, slot: usize, idx: usize) -> u16 {
        match &self.ext_palettes[slot] {
            Some(table) => read16(table, idx * 2) & 0x7FFF,
            None => {
                let fallback = if slot == 4 { 0x200 } else { 0 };
                read16(vid.palette, fallback + (idx & 0xFF) * 2) & 0x7FFF
            }
        }
    }

    // Byte-lane register I/O

    pub fn read_disp_cnt(&self, byte: u32) -> u8 {
        byte_of(self.dispcnt, byte)
    }

    pub fn read_bg_cnt(&self, bg: usize, byte: u32) -> u8 {
        byte_of(self.bg_cnt[bg], byte)
    }

    pub fn read_master_bright(&self, byte: u32) -> u8 {
        byte_of(self.master_bright, byte)
    }

    pub fn write_disp_cnt(&mut self, byte: u32, value: u8) {
        self.dispcnt = self.dispcnt.set_byte(byte, value);
        if self.engine_b {
            // Engine B lacks the 3D, VRAM-display and base-block bits
            self.dispcnt &= 0xC0B1_FFF7;
        }
    }

    pub fn write_bg_cnt(&mut self, bg: usize, byte: u32, value: u8) {
        self.bg_cnt[bg] = self.bg_cnt[bg].set_byte(byte, value);
    }

    pub fn write_bg_h_ofs(&mut self, bg: usize, byte: u32, value: u8) {
        self.bg_h_ofs[bg] = self.bg_h_ofs[bg].set_byte(byte, value) & 0x1FF;
    }

    pub fn write_bg_v_ofs(&mut self, bg: usize, byte: u32, value: u8) {
        self.bg_v_ofs[bg] = self.bg_v_ofs[bg].set_byte(byte, value) & 0x1FF;
    }

    pub fn write_bg_pa(&mut self, aff: usize, byte: u32, value: u8) {
        self.bg_pa[aff] = (self.bg_pa[aff] as u16).set_byte(byte, value) as i16;
    }

    pub fn write_bg_pb(&mut self, aff: usize, byte: u32, value: u8) {
        self.bg_pb[aff] = (self.bg_pb[aff] as u16).set_byte(byte, value) as i16;
    }

    pub fn write_bg_pc(&mut self, aff: usize, byte: u32, value: u8) {
        self.bg_pc[aff] = (self.bg_pc[aff] as u16).set_byte(byte, value) as i16;
    }

    pub fn write_bg_pd(&mut self, aff: usize, byte: u32, value: u8) {
        self.bg_pd[aff] = (self.bg_pd[aff] as u16).set_byte(byte, value) as i16;
    }

    /// Writes to a reference point re-latch its counter immediately.
    pub fn write_bg_x(&mut self, aff: usize, byte: u32, value: u8) {
        self.bg_x[aff] = self.bg_x[aff].set_byte(byte, value);
        self.internal_x[aff] = sign_extend_28(self.bg_x[aff]);
    }

    pub fn write_bg_y(&mut self, aff: usize, byte: u32, value: u8) {
        self.bg_y[aff] = self.bg_y[aff].set_byte(byte, value);
        self.internal_y[aff] = sign_extend_28(self.bg_y[aff]);
    }

    pub fn write_master_bright(&mut self, byte: u32, value: u8) {
        self.master_bright = self.master_bright.set_byte(byte, value);
    }

    /// Re-latch the affine counters; runs at the start of each frame.
    pub fn latch_affine(&mut self) {
        for aff in 0..2 {
            self.internal_x[aff] = sign_extend_28(self.bg_x[aff]);
            self.internal_y[aff] = sign_extend_28(self.bg_y[aff]);
        }
    }
}

fn sign_extend_28(value: u32) -> i32 {
    ((value << 4) as i32) >> 4
}

/// Read a byte of video memory; sizes are powers of two, so out-of-range
/// addresses mirror.
pub(super) fn read8(arr: &[u8], addr: usize) -> u8 {
    arr[addr & (arr.len() - 1)]
}

pub(super) fn read16(arr: &[u8], addr: usize) -> u16 {
    hword(read8(arr, addr), read8(arr, addr + 1))
}
