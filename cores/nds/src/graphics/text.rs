// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use common::numutil::NumExt;

use super::{read8, read16, BgControl, DisplayControl, Gpu2D, VideoRegions, WIDTH};

impl Gpu2D {
    /// Render one line of a text background into its layer: tiled, with
    /// fine horizontal and vertical scroll.
    pub(super) fn draw_text(&mut self, bg: usize, line: u16, vid: &VideoRegions) {
        let cnt = BgControl::from(self.bg_cnt[bg]);
        let disp = DisplayControl::from(self.dispcnt);
        let hofs = self.bg_h_ofs[bg].us();
        let vofs = self.bg_v_ofs[bg].us();
        let size = cnt.screen_size();

        let mut screen_base = cnt.screen_base().us() * 0x800;
        let mut char_base = cnt.char_base().us() * 0x4000;
        if !self.engine_b {
            screen_base += disp.screen_base_block().us() * 0x1_0000;
            char_base += disp.char_base_block().us() * 0x1_0000;
        }

        let y = (line.us() + vofs) & if size < 2 { 0xFF } else { 0x1FF };
        let ext_slot = if bg < 2 && cnt.flag13() { bg + 2 } else { bg };
        let use_ext = disp.bg_ext_pal() && cnt.single_palette();

        let start = line.us() * WIDTH;
        for x in 0..WIDTH {
            let bx = (x + hofs) & if size & 1 == 0 { 0xFF } else { 0x1FF };

            // Each 256x256 quadrant is its own 2KB screen block
            let mut block = screen_base;
            if bx > 255 {
                block += 0x800;
            }
            if y > 255 {
                block += if size == 3 { 0x1000 } else { 0x800 };
            }
            let map_addr = block + (((y & 0xFF) >> 3) * 32 + ((bx & 0xFF) >> 3)) * 2;
            let map = read16(vid.bg_vram, map_addr);

            let tile = (map & 0x3FF).us();
            let tx = if map.is_bit(10) { 7 - (bx & 7) } else { bx & 7 };
            let ty = if map.is_bit(11) { 7 - (y & 7) } else { y & 7 };
            let pal = (map >> 12).us();

            let color = if cnt.single_palette() {
                let idx = read8(vid.bg_vram, char_base + tile * 64 + ty * 8 + tx).us();
                if idx == 0 {
                    continue;
                }
                if use_ext {
                    self.ext_color(vid, ext_slot, pal * 256 + idx)
                } else {
                    Self::palette_color(vid, idx)
                }
            } else {
                let byte = read8(vid.bg_vram, char_base + tile * 32 + ty * 4 + tx / 2);
                let idx = if tx & 1 == 0 { byte & 0xF } else { byte >> 4 };
                if idx == 0 {
                    continue;
                }
                Self::palette_color(vid, pal * 16 + idx.us())
            };
            self.layers[bg][start + x] = color | 0x8000;
        }
    }
}
