// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The memory-mapped register file. All access is byte-lane based:
//! wider accesses decompose into byte reads/writes, which matches how
//! the registers patch their underlying words.

use arm_cpu::{interface::RwType, Cpu};
use common::numutil::{byte_of, NumExt};

use crate::{addr::*, NdsCpu};

pub(crate) fn read<DS: NdsCpu, T: RwType>(ds: &mut DS, addr: u32) -> T {
    let mut value = 0u32;
    for i in (0..T::WIDTH).rev() {
        value = (value << 8) | read8(ds, addr.wrapping_add(i)) as u32;
    }
    T::from_u32(value)
}

pub(crate) fn write<DS: NdsCpu, T: RwType>(ds: &mut DS, addr: u32, value: T) {
    for i in 0..T::WIDTH {
        write8(ds, addr.wrapping_add(i), byte_of(value, i));
    }
}

fn read8<DS: NdsCpu>(ds: &mut DS, addr: u32) -> u8 {
    let offs = addr & 0xFF_FFFF;
    match offs {
        // PPU registers, engine A then B
        0x0..=0x6F | 0x1000..=0x106F => {
            let eng = (offs >= 0x1000) as usize;
            let reg = offs & 0xFFF;
            let gpu = &ds.gpu[eng];
            match reg {
                DISPCNT..=0x3 => gpu.read_disp_cnt(reg),
                DISPSTAT => ((ds.vcount >= 192) as u8) | (((ds.vcount & 0x100) >> 1) as u8),
                VCOUNT => ds.vcount.u8(),
                0x7 => (ds.vcount >> 8).u8(),
                BG0CNT..=BG3CNT_END => gpu.read_bg_cnt(((reg - BG0CNT) >> 1).us(), reg & 1),
                MASTER_BRIGHT | 0x6D => gpu.read_master_bright(reg & 1),
                _ => 0,
            }
        }

        IME => ds.cpu().ime as u8,
        0x209..=0x20B => 0,
        IE..=0x213 => byte_of(ds.cpur().ie, offs & 3),
        IF..=0x217 => byte_of(ds.cpur().irf, offs & 3),
        POSTFLG => ds.cpur().post_flg,

        _ => {
            log::trace!("read from unhandled I/O register 0x{addr:08X}");
            0
        }
    }
}

fn write8<DS: NdsCpu>(ds: &mut DS, addr: u32, value: u8) {
    let offs = addr & 0xFF_FFFF;
    match offs {
        0x0..=0x6F | 0x1000..=0x106F => {
            let eng = (offs >= 0x1000) as usize;
            let reg = offs & 0xFFF;
            let gpu = &mut ds.gpu[eng];
            match reg {
                DISPCNT..=0x3 => gpu.write_disp_cnt(reg, value),
                BG0CNT..=BG3CNT_END => {
                    gpu.write_bg_cnt(((reg - BG0CNT) >> 1).us(), reg & 1, value)
                }
                BG0HOFS..=BG3VOFS_END => {
                    let bg = ((reg - BG0HOFS) >> 2).us();
                    if reg & 2 == 0 {
                        gpu.write_bg_h_ofs(bg, reg & 1, value);
                    } else {
                        gpu.write_bg_v_ofs(bg, reg & 1, value);
                    }
                }
                BG2PA..=BG3Y_END => {
                    let aff = ((reg - BG2PA) >> 4).us();
                    match reg & 0xF {
                        0x0 | 0x1 => gpu.write_bg_pa(aff, reg & 1, value),
                        0x2 | 0x3 => gpu.write_bg_pb(aff, reg & 1, value),
                        0x4 | 0x5 => gpu.write_bg_pc(aff, reg & 1, value),
                        0x6 | 0x7 => gpu.write_bg_pd(aff, reg & 1, value),
                        0x8..=0xB => gpu.write_bg_x(aff, reg & 3, value),
                        _ => gpu.write_bg_y(aff, reg & 3, value),
                    }
                }
                MASTER_BRIGHT | 0x6D => gpu.write_master_bright(reg & 1, value),
                _ => (),
            }
        }

        IME => Cpu::write_ime(ds, value),
        IE..=0x213 => {
            let shift = (offs & 3) * 8;
            Cpu::write_ie(ds, 0xFF << shift, (value as u32) << shift);
        }
        IF..=0x217 => {
            let shift = (offs & 3) * 8;
            ds.cpu().write_irf(0xFF << shift, (value as u32) << shift);
        }
        POSTFLG => ds.cpu().write_post_flg(value),
        HALTCNT => {
            // The ARM7 halts through this register; the ARM9 uses CP15
            if !DS::IS_ARM9 && value.is_bit(7) {
                ds.cpu().halt();
            }
        }

        _ => log::trace!("write to unhandled I/O register 0x{addr:08X}"),
    }
}
