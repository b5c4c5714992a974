// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Affine and extended backgrounds. Both walk the scanline through the
//! affine transform; they differ in what the sampled cell means.

use common::numutil::NumExt;

use super::{read8, read16, BgControl, DisplayControl, Gpu2D, VideoRegions, WIDTH};

impl Gpu2D {
    /// The plain affine mode: 8-bit map entries, 256-color tiles.
    pub(super) fn draw_affine(&mut self, bg: usize, line: u16, vid: &VideoRegions) {
        let aff = bg - 2;
        let cnt = BgControl::from(self.bg_cnt[bg]);
        let disp = DisplayControl::from(self.dispcnt);

        let mut screen_base = cnt.screen_base().us() * 0x800;
        let mut char_base = cnt.char_base().us() * 0x4000;
        if !self.engine_b {
            screen_base += disp.screen_base_block().us() * 0x1_0000;
            char_base += disp.char_base_block().us() * 0x1_0000;
        }
        let size = 128 << cnt.screen_size();

        let (mut x, mut y) = (self.internal_x[aff], self.internal_y[aff]);
        let (pa, pc) = (self.bg_pa[aff] as i32, self.bg_pc[aff] as i32);
        let start = line.us() * WIDTH;

        for px in 0..WIDTH {
            let (tx, ty) = (x >> 8, y >> 8);
            x += pa;
            y += pc;
            let Some((tx, ty)) = wrap_coords(tx, ty, size, cnt.flag13()) else {
                continue;
            };

            let map_addr = screen_base + (ty >> 3) * (size >> 3) + (tx >> 3);
            let tile = read8(vid.bg_vram, map_addr).us();
            let idx = read8(vid.bg_vram, char_base + tile * 64 + (ty & 7) * 8 + (tx & 7));
            if idx != 0 {
                self.layers[bg][start + px] = Self::palette_color(vid, idx.us()) | 0x8000;
            }
        }
        self.step_affine(aff);
    }

    /// Extended backgrounds: 16-bit-map tiles with the extended palette,
    /// or an 8-bit/direct-color bitmap, all under the affine transform.
    pub(super) fn draw_extended(&mut self, bg: usize, line: u16, vid: &VideoRegions) {
        let aff = bg - 2;
        let cnt = BgControl::from(self.bg_cnt[bg]);
        let disp = DisplayControl::from(self.dispcnt);

        let (mut x, mut y) = (self.internal_x[aff], self.internal_y[aff]);
        let (pa, pc) = (self.bg_pa[aff] as i32, self.bg_pc[aff] as i32);
        let start = line.us() * WIDTH;

        if cnt.single_palette() {
            // Bitmap variants; the character-base LSB picks direct color
            let data_base = cnt.screen_base().us() * 0x4000;
            let direct = cnt.char_base() & 1 != 0;
            let (w, h): (usize, usize) = match cnt.screen_size() {
                0 => (128, 128),
                1 => (256, 256),
                2 => (512, 256),
                _ => (512, 512),
            };

            for px in 0..WIDTH {
                let (tx, ty) = (x >> 8, y >> 8);
                x += pa;
                y += pc;
                let in_range = (0..w as i32).contains(&tx) && (0..h as i32).contains(&ty);
                if !in_range && !cnt.flag13() {
                    continue;
                }
                let (tx, ty) = (tx as usize & (w - 1), ty as usize & (h - 1));

                if direct {
                    let color = read16(vid.bg_vram, data_base + (ty * w + tx) * 2);
                    if color.is_bit(15) {
                        self.layers[bg][start + px] = color;
                    }
                } else {
                    let idx = read8(vid.bg_vram, data_base + ty * w + tx);
                    if idx != 0 {
                        self.layers[bg][start + px] =
                            Self::palette_color(vid, idx.us()) | 0x8000;
                    }
                }
            }
        } else {
            // 16-bit map entries with 8-bit tiles and the extended
            // palette, like a text background put through the transform
            let mut screen_base = cnt.screen_base().us() * 0x800;
            let mut char_base = cnt.char_base().us() * 0x4000;
            if !self.engine_b {
                screen_base += disp.screen_base_block().us() * 0x1_0000;
                char_base += disp.char_base_block().us() * 0x1_0000;
            }
            let size = 128 << cnt.screen_size();
            let use_ext = disp.bg_ext_pal();

            for px in 0..WIDTH {
                let (tx, ty) = (x >> 8, y >> 8);
                x += pa;
                y += pc;
                let Some((tx, ty)) = wrap_coords(tx, ty, size, cnt.flag13()) else {
                    continue;
                };

                let map_addr = screen_base + ((ty >> 3) * (size >> 3) + (tx >> 3)) * 2;
                let map = read16(vid.bg_vram, map_addr);
                let tile = (map & 0x3FF).us();
                let fx = if map.is_bit(10) { 7 - (tx & 7) } else { tx & 7 };
                let fy = if map.is_bit(11) { 7 - (ty & 7) } else { ty & 7 };
                let pal = (map >> 12).us();

                let idx = read8(vid.bg_vram, char_base + tile * 64 + fy * 8 + fx).us();
                if idx == 0 {
                    continue;
                }
                let color = if use_ext {
                    self.ext_color(vid, bg, pal * 256 + idx)
                } else {
                    Self::palette_color(vid, idx)
                };
                self.layers[bg][start + px] = color | 0x8000;
            }
        }
        self.step_affine(aff);
    }

    /// Advance the reference counters one line.
    fn step_affine(&mut self, aff: usize) {
        self.internal_x[aff] += self.bg_pb[aff] as i32;
        self.internal_y[aff] += self.bg_pd[aff] as i32;
    }
}

/// Clamp or wrap transformed coordinates per the overflow bit.
fn wrap_coords(x: i32, y: i32, size: usize, wrap: bool) -> Option<(usize, usize)> {
    let range = 0..size as i32;
    if range.contains(&x) && range.contains(&y) {
        Some((x as usize, y as usize))
    } else if wrap {
        Some((x as usize & (size - 1), y as usize & (size - 1)))
    } else {
        None
    }
}
