// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use common::numutil::{hword, NumExt};
use modular_bitfield::{bitfield, specifiers::*, BitfieldSpecifier};

use super::{read8, DisplayControl, Gpu2D, VideoRegions, HEIGHT, WIDTH};

const OBJ_X_SIZE: [i32; 16] = [8, 16, 32, 64, 16, 32, 32, 64, 8, 8, 16, 32, 8, 8, 8, 8];
const OBJ_Y_SIZE: [i32; 16] = [8, 16, 32, 64, 8, 8, 16, 32, 16, 32, 32, 64, 8, 8, 8, 8];

impl Gpu2D {
    /// Render the sprites crossing this line into the object priority
    /// tiers. Lower OAM indices win within a tier.
    pub(super) fn draw_objects(&mut self, line: u16, vid: &VideoRegions, disp: &DisplayControl) {
        for idx in 0..128 {
            let attrs: [u8; 8] = vid.oam[idx * 8..idx * 8 + 8].try_into().unwrap();
            let obj = Object::from_bytes(attrs);
            match obj.kind() {
                ObjectKind::Normal => self.draw_obj_normal(obj, line, vid, disp),
                ObjectKind::Affine => self.draw_obj_affine(obj, line, vid, disp, false),
                ObjectKind::AffineDouble => self.draw_obj_affine(obj, line, vid, disp, true),
                ObjectKind::Disable => (),
            }
        }
    }

    fn draw_obj_normal(
        &mut self,
        obj: Object,
        line: u16,
        vid: &VideoRegions,
        disp: &DisplayControl,
    ) {
        if !obj.renderable() {
            return;
        }
        let (width, height) = obj.size();
        let (ox, oy) = obj.position();
        let sprite_y = line as i32 - oy;
        if sprite_y < 0 || sprite_y >= height {
            return;
        }
        let sprite_y = if obj.vflip() {
            height - 1 - sprite_y
        } else {
            sprite_y
        };

        for sx in 0..width {
            let screen_x = ox + sx;
            if !(0..WIDTH as i32).contains(&screen_x) {
                continue;
            }
            let sprite_x = if obj.hflip() { width - 1 - sx } else { sx };
            self.draw_obj_pixel(&obj, line, screen_x, sprite_x, sprite_y, width, vid, disp);
        }
    }

    fn draw_obj_affine(
        &mut self,
        obj: Object,
        line: u16,
        vid: &VideoRegions,
        disp: &DisplayControl,
        double: bool,
    ) {
        if !obj.renderable() {
            return;
        }
        let (width, height) = obj.size();
        let (bounds_w, bounds_h) = if double {
            (width * 2, height * 2)
        } else {
            (width, height)
        };
        let (ox, oy) = obj.position();
        let iy = line as i32 - oy - bounds_h / 2;
        if iy < -bounds_h / 2 || iy >= bounds_h / 2 {
            return;
        }

        let params = affine_params(vid.oam, obj.affine_group().us());
        for ix in -bounds_w / 2..bounds_w / 2 {
            let screen_x = ox + bounds_w / 2 + ix;
            if !(0..WIDTH as i32).contains(&screen_x) {
                continue;
            }

            let sprite_x = ((params[0] * ix + params[1] * iy) >> 8) + width / 2;
            let sprite_y = ((params[2] * ix + params[3] * iy) >> 8) + height / 2;
            if (0..width).contains(&sprite_x) && (0..height).contains(&sprite_y) {
                self.draw_obj_pixel(&obj, line, screen_x, sprite_x, sprite_y, width, vid, disp);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_obj_pixel(
        &mut self,
        obj: &Object,
        line: u16,
        screen_x: i32,
        sprite_x: i32,
        sprite_y: i32,
        width: i32,
        vid: &VideoRegions,
        disp: &DisplayControl,
    ) {
        let (tx, ty) = ((sprite_x >> 3) as usize, (sprite_y >> 3) as usize);
        let (fx, fy) = ((sprite_x & 7) as usize, (sprite_y & 7) as usize);
        let tile = obj.tile().us();
        let depth256 = obj.depth256();
        let tile_size = if depth256 { 64 } else { 32 };

        let addr = if disp.tile_obj_1d() {
            let boundary = 32 << disp.tile_obj_boundary().us();
            let row_tiles = (width >> 3) as usize;
            tile * boundary + (ty * row_tiles + tx) * tile_size
        } else {
            // 2D mapping: a fixed 32-tile-wide sheet
            let tile = if depth256 { tile & !1 } else { tile };
            tile * 32 + ty * 0x400 + tx * tile_size
        };

        let idx = if depth256 {
            read8(vid.obj_vram, addr + fy * 8 + fx).us()
        } else {
            let byte = read8(vid.obj_vram, addr + fy * 4 + fx / 2);
            (if fx & 1 == 0 { byte & 0xF } else { byte >> 4 }).us()
        };
        if idx == 0 {
            return;
        }

        let color = if depth256 {
            if disp.obj_ext_pal() {
                self.ext_color(vid, 4, obj.palette().us() * 256 + idx)
            } else {
                Self::obj_palette_color(vid, idx)
            }
        } else {
            Self::obj_palette_color(vid, obj.palette().us() * 16 + idx)
        };

        let tier = &mut self.layers[4 + obj.priority().us()];
        let pos = line.us() * WIDTH + screen_x as usize;
        if !tier[pos].is_bit(15) {
            tier[pos] = color | 0x8000;
        }
    }
}

/// The rotation/scaling parameter group at the given OAM slot.
fn affine_params(oam: &[u8], group: usize) -> [i32; 4] {
    let mut out = [0; 4];
    let mut offs = group * 32 + 6;
    for param in &mut out {
        *param = hword(oam[offs & 0x3FF], oam[(offs + 1) & 0x3FF]) as i16 as i32;
        offs += 8;
    }
    out
}

#[bitfield]
#[repr(u64)]
#[derive(Debug, Copy, Clone)]
pub struct Object {
    pub y: B8,
    pub kind: ObjectKind,
    pub mode: ObjectMode,
    pub mosaic_en: bool,
    pub depth256: bool,
    pub shape: B2,
    pub x: B9,
    /// Rotation/scaling parameter group. Bits 3-4 double as the H/V
    /// flips on non-affine sprites.
    pub affine_group: B5,
    pub size_sel: B2,
    pub tile: B10,
    pub priority: B2,
    pub palette: B4,
    #[skip]
    __: B16,
}

#[derive(BitfieldSpecifier, Debug, PartialEq)]
#[bits = 2]
pub enum ObjectKind {
    Normal = 0,
    Affine = 1,
    Disable = 2,
    AffineDouble = 3,
}

#[derive(BitfieldSpecifier, Debug, PartialEq)]
#[bits = 2]
pub enum ObjectMode {
    Normal = 0,
    SemiTransparent = 1,
    Window = 2,
    Bitmap = 3,
}

impl Object {
    fn size(&self) -> (i32, i32) {
        let idx = ((self.shape() << 2) | self.size_sel()).us();
        (OBJ_X_SIZE[idx], OBJ_Y_SIZE[idx])
    }

    fn position(&self) -> (i32, i32) {
        let mut x = self.x() as i32;
        let mut y = self.y() as i32;
        if x >= WIDTH as i32 {
            x -= 1 << 9;
        }
        if y >= HEIGHT as i32 {
            y -= 1 << 8;
        }
        (x, y)
    }

    fn hflip(&self) -> bool {
        self.affine_group().is_bit(3)
    }

    fn vflip(&self) -> bool {
        self.affine_group().is_bit(4)
    }

    /// Window masking and bitmap sprites belong to the effects
    /// machinery, which is not part of this renderer.
    fn renderable(&self) -> bool {
        self.mode() == ObjectMode::Normal || self.mode() == ObjectMode::SemiTransparent
    }
}
