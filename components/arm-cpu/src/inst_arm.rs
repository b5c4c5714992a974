// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Handlers for ARM instructions.
//! Every handler returns the opcode's cycle cost.

use common::numutil::{NumExt, U32Ext};

use crate::{
    interface::{ArmSystem, DldiFunction, HLE_IRQ_RETURN},
    registers::{
        Flag::{Carry, QClamped, Thumb},
        Mode,
    },
    Cpu,
};

pub type ArmHandler<S> = fn(&mut S, ArmInst) -> u16;
pub type ArmLut<S> = [ArmHandler<S>; 4096];

#[derive(Copy, Clone)]
pub struct ArmInst(pub u32);

impl ArmInst {
    /// The register number at the given bit position.
    #[inline]
    pub fn reg(self, pos: u32) -> u32 {
        (self.0 >> pos) & 0xF
    }
}

impl<S: ArmSystem> Cpu<S> {
    pub fn arm_unknown(gg: &mut S, inst: ArmInst) -> u16 {
        gg.cpu().log_unknown_opcode("ARM", inst.0);
        1
    }

    /// Opcodes with the reserved condition code. BLX hides here on the
    /// ARM9, and so do the HLE BIOS return marker and the patched DLDI
    /// entry points when those back-ends are attached.
    pub(crate) fn handle_reserved(gg: &mut S, opcode: u32) -> u16 {
        if (opcode & 0x0E00_0000) == 0x0A00_0000 {
            return Self::arm_blx_label(gg, ArmInst(opcode));
        }

        if gg.bios_active() && opcode == HLE_IRQ_RETURN {
            return Self::finish_hle_irq(gg);
        }

        if gg.dldi_patched() {
            if let Some(func) = DldiFunction::from_opcode(opcode) {
                let r0 = gg.cpur().registers[0];
                let r1 = gg.cpur().registers[1];
                let r2 = gg.cpur().registers[2];
                let ret = match func {
                    DldiFunction::Startup => gg.dldi_startup(),
                    DldiFunction::IsInserted => gg.dldi_is_inserted(),
                    DldiFunction::ReadSectors => gg.dldi_read_sectors(r0, r1, r2),
                    DldiFunction::WriteSectors => gg.dldi_write_sectors(r0, r1, r2),
                    DldiFunction::ClearStatus => gg.dldi_clear_status(),
                    DldiFunction::Shutdown => gg.dldi_shutdown(),
                };
                gg.cpu().registers[0] = ret;
                return Self::bx_reg(gg, 14);
            }
        }

        Self::arm_unknown(gg, ArmInst(opcode))
    }

    pub fn arm_b<const LINK: bool>(gg: &mut S, inst: ArmInst) -> u16 {
        let nn = inst.0.i24() * 4;
        let pc = gg.cpur().pc();
        if LINK {
            gg.cpu().registers[14] = pc.wrapping_sub(4);
        }
        Self::set_pc(gg, pc.wrapping_add_signed(nn));
        3
    }

    /// BLX with a label, encoded with the reserved condition (ARM9).
    pub(crate) fn arm_blx_label(gg: &mut S, inst: ArmInst) -> u16 {
        if !S::IS_ARM9 {
            return Self::arm_unknown(gg, inst);
        }
        let nn = (inst.0.i24() * 4) + ((inst.0.bit(24) as i32) * 2);
        let pc = gg.cpur().pc();
        gg.cpu().registers[14] = pc.wrapping_sub(4);
        gg.cpu().set_flag(Thumb, true);
        Self::set_pc(gg, pc.wrapping_add_signed(nn));
        3
    }

    pub fn arm_bx(gg: &mut S, inst: ArmInst) -> u16 {
        Self::bx_reg(gg, inst.reg(0))
    }

    /// Branch to the address in the given register, switching to THUMB
    /// when its bit 0 is set.
    pub(crate) fn bx_reg(gg: &mut S, idx: u32) -> u16 {
        let target = gg.cpur().reg(idx);
        if target.is_bit(0) {
            gg.cpu().set_flag(Thumb, true);
        } else {
            gg.cpu().set_flag(Thumb, false);
        }
        Self::set_pc(gg, target & !1);
        3
    }

    /// BLX with a register operand (ARM9).
    pub fn arm_blx_reg(gg: &mut S, inst: ArmInst) -> u16 {
        if !S::IS_ARM9 {
            return Self::arm_unknown(gg, inst);
        }
        let lr = gg.cpur().pc().wrapping_sub(4);
        gg.cpu().registers[14] = lr;
        Self::bx_reg(gg, inst.reg(0))
    }

    pub fn arm_swi(gg: &mut S, _inst: ArmInst) -> u16 {
        Self::exception(gg, crate::exceptions::vector::SWI)
    }

    /// Data processing with a register operand; the shift amount comes
    /// from an immediate or, with bit 4 set, another register.
    pub fn arm_alu_reg<const SET: bool>(gg: &mut S, inst: ArmInst) -> u16 {
        let op = inst.0.bits(21, 4);
        let d = inst.reg(12);
        let ty = inst.0.bits(5, 2);
        let carry = gg.cpur().flag(Carry) as u32;

        let (rn, op2) = if inst.0.is_bit(4) {
            // Shift amount from a register; R15 operands read one fetch
            // further ahead here
            let by = gg.cpur().reg(inst.reg(8)) & 0xFF;
            let rm = gg.cpur().reg_pc4(inst.reg(0));
            let rn = gg.cpur().reg_pc4(inst.reg(16));
            (rn, gg.cpu().shifted_op::<SET, false>(rm, ty, by))
        } else {
            let by = inst.0.bits(7, 5);
            let rm = gg.cpur().reg(inst.reg(0));
            let rn = gg.cpur().reg(inst.reg(16));
            (rn, gg.cpu().shifted_op::<SET, true>(rm, ty, by))
        };
        Self::dataproc_finish::<SET>(gg, op, rn, op2, d, carry)
    }

    /// Data processing with a rotated 8-bit immediate operand.
    pub fn arm_alu_imm<const SET: bool>(gg: &mut S, inst: ArmInst) -> u16 {
        let op = inst.0.bits(21, 4);
        let d = inst.reg(12);
        let carry = gg.cpur().flag(Carry) as u32;
        let by = inst.0.bits(8, 4) << 1;
        let op2 = gg.cpu().ror::<SET, false>(inst.0 & 0xFF, by);
        let rn = gg.cpur().reg(inst.reg(16));
        Self::dataproc_finish::<SET>(gg, op, rn, op2, d, carry)
    }

    fn dataproc_finish<const SET: bool>(
        gg: &mut S,
        op: u32,
        rn: u32,
        op2: u32,
        d: u32,
        carry: u32,
    ) -> u16 {
        let (value, test) = gg.cpu().dataproc::<SET>(op, rn, op2, carry);
        if test {
            return 1;
        }
        if d == 15 {
            if SET {
                // Exception return: the banked SPSR comes back first
                let spsr = gg.cpur().spsr();
                Self::set_cpsr(gg, spsr, false);
            }
            gg.cpu().registers[15] = value;
            Self::flush_pipeline(gg);
            3
        } else {
            gg.cpu().registers[d.us()] = value;
            1
        }
    }

    pub fn arm_mrs(gg: &mut S, inst: ArmInst) -> u16 {
        let d = inst.reg(12);
        let value = if inst.0.is_bit(22) {
            gg.cpur().spsr()
        } else {
            gg.cpur().cpsr
        };
        if d != 15 {
            gg.cpu().registers[d.us()] = value;
        }
        1
    }

    pub fn arm_msr_reg(gg: &mut S, inst: ArmInst) -> u16 {
        let value = gg.cpur().reg(inst.reg(0));
        Self::msr(gg, inst, value)
    }

    pub fn arm_msr_imm(gg: &mut S, inst: ArmInst) -> u16 {
        let by = inst.0.bits(8, 4) << 1;
        let value = (inst.0 & 0xFF).rotate_right(by);
        Self::msr(gg, inst, value)
    }

    fn msr(gg: &mut S, inst: ArmInst, value: u32) -> u16 {
        let mut mask = 0u32;
        if inst.0.is_bit(19) {
            mask |= 0xFF00_0000;
        }
        if inst.0.is_bit(18) {
            mask |= 0x00FF_0000;
        }
        if inst.0.is_bit(17) {
            mask |= 0x0000_FF00;
        }
        if inst.0.is_bit(16) {
            mask |= 0x0000_00FF;
        }
        // The control byte is only writable in privileged modes
        if gg.cpur().mode() == Mode::User {
            mask &= 0xF000_0000;
        }

        if inst.0.is_bit(22) {
            let cpu = gg.cpu();
            let spsr = (cpu.spsr() & !mask) | (value & mask);
            cpu.set_spsr(spsr);
        } else {
            let new = (gg.cpur().cpsr & !mask) | (value & mask);
            Self::set_cpsr(gg, new, false);
        }
        1
    }

    /// MUL/MLA and the four long multiplies.
    pub fn arm_mul(gg: &mut S, inst: ArmInst) -> u16 {
        let op = inst.0.bits(21, 3);
        if op == 2 || op == 3 {
            return Self::arm_unknown(gg, inst);
        }
        let set = inst.0.is_bit(20);
        let d = inst.reg(16);
        let n = inst.reg(12);
        let rs = gg.cpur().reg(inst.reg(8));
        let rm = gg.cpur().reg(inst.reg(0));

        let cpu = gg.cpu();
        match op {
            0 => {
                let res = rm.wrapping_mul(rs);
                if set {
                    cpu.set_nz::<true>(res);
                }
                cpu.registers[d.us()] = res;
            }
            1 => {
                let res = rm.wrapping_mul(rs).wrapping_add(cpu.registers[n.us()]);
                if set {
                    cpu.set_nz::<true>(res);
                }
                cpu.registers[d.us()] = res;
            }
            4 | 5 => {
                let mut res = (rm as u64).wrapping_mul(rs as u64);
                if op == 5 {
                    let acc = ((cpu.registers[d.us()] as u64) << 32) | cpu.registers[n.us()] as u64;
                    res = res.wrapping_add(acc);
                }
                if set {
                    cpu.set_nz_64::<true>(res);
                }
                cpu.registers[n.us()] = res as u32;
                cpu.registers[d.us()] = (res >> 32) as u32;
            }
            _ => {
                let mut res = (rm as i32 as i64).wrapping_mul(rs as i32 as i64) as u64;
                if op == 7 {
                    let acc = ((cpu.registers[d.us()] as u64) << 32) | cpu.registers[n.us()] as u64;
                    res = res.wrapping_add(acc);
                }
                if set {
                    cpu.set_nz_64::<true>(res);
                }
                cpu.registers[n.us()] = res as u32;
                cpu.registers[d.us()] = (res >> 32) as u32;
            }
        }
        2
    }

    pub fn arm_swp(gg: &mut S, inst: ArmInst) -> u16 {
        let addr = gg.cpur().reg(inst.reg(16));
        let rm = gg.cpur().reg(inst.reg(0));
        let d = inst.reg(12);
        if inst.0.is_bit(22) {
            let old = gg.get::<u8>(addr).u32();
            gg.set::<u8>(addr, rm.u8());
            gg.cpu().registers[d.us()] = old;
        } else {
            let old = Self::read_word_rotated(gg, addr);
            gg.set::<u32>(addr & !3, rm);
            gg.cpu().registers[d.us()] = old;
        }
        2
    }

    /// Halfword and signed loads/stores.
    pub fn arm_strh_ldr(gg: &mut S, inst: ArmInst) -> u16 {
        let pre = inst.0.is_bit(24);
        let up = inst.0.is_bit(23);
        let imm = inst.0.is_bit(22);
        let writeback = inst.0.is_bit(21) || !pre;
        let load = inst.0.is_bit(20);
        let op = inst.0.bits(5, 2);
        let n = inst.reg(16);
        let d = inst.reg(12);

        if !load && op != 1 {
            // The LDRD/STRD slots of the ARM9; not taken by this core
            return Self::arm_unknown(gg, inst);
        }

        let offs = if imm {
            (inst.0.bits(8, 4) << 4) | inst.0.bits(0, 4)
        } else {
            gg.cpur().reg(inst.reg(0))
        };
        let base = gg.cpur().reg(n);
        let addr = if pre {
            Self::mod_with_offs(base, offs, up)
        } else {
            base
        };
        let wb_value = if pre {
            addr
        } else {
            Self::mod_with_offs(base, offs, up)
        };

        if load {
            let value = match op {
                1 => Self::read_hword(gg, addr),
                2 => gg.get::<u8>(addr) as i8 as i32 as u32,
                _ => Self::read_hword_signed(gg, addr),
            };
            if writeback && n != d {
                gg.cpu().registers[n.us()] = wb_value;
            }
            Self::set_reg(gg, d, value);
            if d == 15 {
                3
            } else {
                2
            }
        } else {
            let value = gg.cpur().reg_pc4(d);
            gg.set::<u16>(addr & !1, value.u16());
            if writeback {
                gg.cpu().registers[n.us()] = wb_value;
            }
            2
        }
    }

    /// Word and byte loads/stores.
    pub fn arm_ldrstr(gg: &mut S, inst: ArmInst) -> u16 {
        let pre = inst.0.is_bit(24);
        let up = inst.0.is_bit(23);
        let byte = inst.0.is_bit(22);
        let writeback = inst.0.is_bit(21) || !pre;
        let load = inst.0.is_bit(20);
        let n = inst.reg(16);
        let d = inst.reg(12);

        let offs = if inst.0.is_bit(25) {
            // Register offset, shifted by an immediate; no flag update
            let rm = gg.cpur().reg(inst.reg(0));
            let ty = inst.0.bits(5, 2);
            let by = inst.0.bits(7, 5);
            gg.cpu().shifted_op::<false, true>(rm, ty, by)
        } else {
            inst.0 & 0xFFF
        };
        let base = gg.cpur().reg(n);
        let addr = if pre {
            Self::mod_with_offs(base, offs, up)
        } else {
            base
        };
        let wb_value = if pre {
            addr
        } else {
            Self::mod_with_offs(base, offs, up)
        };

        if load {
            let value = if byte {
                gg.get::<u8>(addr).u32()
            } else {
                Self::read_word_rotated(gg, addr)
            };
            if writeback && n != d {
                gg.cpu().registers[n.us()] = wb_value;
            }
            if d == 15 {
                if S::IS_ARM9 && value.is_bit(0) {
                    gg.cpu().set_flag(Thumb, true);
                }
                Self::set_pc(gg, value & !1);
                3
            } else {
                gg.cpu().registers[d.us()] = value;
                2
            }
        } else {
            let value = gg.cpur().reg_pc4(d);
            if byte {
                gg.set::<u8>(addr, value.u8());
            } else {
                gg.set::<u32>(addr & !3, value);
            }
            if writeback {
                gg.cpu().registers[n.us()] = wb_value;
            }
            2
        }
    }

    /// Block transfers, all four addressing modes, with S-bit user-bank
    /// transfer and SPSR restore on PC loads.
    pub fn arm_stm_ldm(gg: &mut S, inst: ArmInst) -> u16 {
        let pre = inst.0.is_bit(24);
        let up = inst.0.is_bit(23);
        let s_bit = inst.0.is_bit(22);
        let writeback = inst.0.is_bit(21);
        let load = inst.0.is_bit(20);
        let n = inst.reg(16);
        let rlist = (inst.0 & 0xFFFF).u16();

        if rlist == 0 {
            return Self::transfer_empty_rlist(gg, n, pre, up, load);
        }

        let count = rlist.count_ones();
        let base = gg.cpur().reg(n);
        // The lowest register always goes to the lowest address; the
        // descending modes just start lower.
        let lowest = if up {
            base.wrapping_add((pre as u32) * 4)
        } else {
            base.wrapping_sub(4 * count)
                .wrapping_add((!pre as u32) * 4)
        };
        let final_base = Self::mod_with_offs(base, 4 * count, up);
        let user_bank = s_bit && !(load && rlist.is_bit(15));

        let mut addr = lowest;
        let mut cost = 2;
        for r in 0..16u16 {
            if !rlist.is_bit(r) {
                continue;
            }
            if load {
                let value = gg.get::<u32>(addr);
                if r == 15 {
                    if s_bit {
                        let spsr = gg.cpur().spsr();
                        Self::set_cpsr(gg, spsr, false);
                    }
                    if S::IS_ARM9 && value.is_bit(0) {
                        gg.cpu().set_flag(Thumb, true);
                    }
                    gg.cpu().registers[15] = value & !1;
                    Self::flush_pipeline(gg);
                    cost = 3;
                } else if user_bank {
                    gg.cpu().set_user_reg(r.us(), value);
                } else {
                    gg.cpu().registers[r.us()] = value;
                }
            } else {
                let value = if user_bank {
                    gg.cpur().user_reg(r.us())
                } else {
                    gg.cpur().reg_pc4(r.u32())
                };
                gg.set::<u32>(addr, value);
            }
            addr = addr.wrapping_add(4);
        }

        // On loads the base only updates when it was not in the list
        if writeback && (!load || !rlist.is_bit(n.u16())) {
            gg.cpu().registers[n.us()] = final_base;
        }
        cost
    }

    /// An empty register list transfers R15 and moves the base by 0x40
    /// on the ARM7; the ARM9 only moves the base.
    fn transfer_empty_rlist(gg: &mut S, n: u32, pre: bool, up: bool, load: bool) -> u16 {
        let base = gg.cpur().reg(n);
        gg.cpu().registers[n.us()] = Self::mod_with_offs(base, 0x40, up);
        if S::IS_ARM9 {
            return 2;
        }

        if load {
            let value = gg.get::<u32>(base);
            Self::set_pc(gg, value);
            3
        } else {
            let addr = match (up, pre) {
                (true, true) => base.wrapping_add(4),
                (true, false) => base,
                (false, true) => base.wrapping_sub(0x40),
                (false, false) => base.wrapping_sub(0x3C),
            };
            let value = gg.cpur().pc().wrapping_add(4);
            gg.set::<u32>(addr, value);
            2
        }
    }

    /// Coprocessor register transfers; only CP15 on the ARM9 is wired.
    pub fn arm_mrc_mcr(gg: &mut S, inst: ArmInst) -> u16 {
        let cp_num = inst.0.bits(8, 4);
        if !S::IS_ARM9 || cp_num != 15 {
            return Self::arm_unknown(gg, inst);
        }
        let cn = inst.reg(16);
        let cm = inst.reg(0);
        let cp = inst.0.bits(5, 3);
        let d = inst.reg(12);

        if inst.0.is_bit(20) {
            let value = gg.get_cp15(cn, cm, cp);
            if d != 15 {
                gg.cpu().registers[d.us()] = value;
            }
        } else {
            let value = gg.cpur().reg(d);
            gg.set_cp15(cn, cm, cp, value);
        }
        1
    }

    /// Count leading zeros (ARM9).
    pub fn arm_clz(gg: &mut S, inst: ArmInst) -> u16 {
        if !S::IS_ARM9 {
            return Self::arm_unknown(gg, inst);
        }
        let value = gg.cpur().reg(inst.reg(0));
        gg.cpu().registers[inst.reg(12).us()] = value.leading_zeros();
        1
    }

    /// Saturating add/subtract family (ARM9).
    pub fn arm_qalu(gg: &mut S, inst: ArmInst) -> u16 {
        if !S::IS_ARM9 {
            return Self::arm_unknown(gg, inst);
        }
        let op = inst.0.bits(21, 2);
        let rm = gg.cpur().reg(inst.reg(0)) as i32;
        let rn = gg.cpur().reg(inst.reg(16)) as i32;
        let d = inst.reg(12);

        let (value, saturated) = match op {
            0 => (rm.saturating_add(rn), rm.checked_add(rn).is_none()),
            1 => (rm.saturating_sub(rn), rm.checked_sub(rn).is_none()),
            _ => {
                let doubled = rn.saturating_mul(2);
                let dbl_sat = rn.checked_mul(2).is_none();
                if op == 2 {
                    (
                        rm.saturating_add(doubled),
                        dbl_sat || rm.checked_add(doubled).is_none(),
                    )
                } else {
                    (
                        rm.saturating_sub(doubled),
                        dbl_sat || rm.checked_sub(doubled).is_none(),
                    )
                }
            }
        };
        if saturated {
            gg.cpu().set_flag(QClamped, true);
        }
        gg.cpu().registers[d.us()] = value as u32;
        1
    }

    /// Read a word, rotating unaligned accesses as LDR does.
    pub(crate) fn read_word_rotated(gg: &mut S, addr: u32) -> u32 {
        let value = gg.get::<u32>(addr & !3);
        value.rotate_right((addr & 3) << 3)
    }

    /// Read a halfword; unaligned reads rotate on the ARM7.
    pub(crate) fn read_hword(gg: &mut S, addr: u32) -> u32 {
        let value = gg.get::<u16>(addr & !1).u32();
        if !S::IS_ARM9 && addr.is_bit(0) {
            value.rotate_right(8)
        } else {
            value
        }
    }

    /// Read a sign-extended halfword; unaligned reads degrade to a
    /// sign-extended byte on the ARM7.
    pub(crate) fn read_hword_signed(gg: &mut S, addr: u32) -> u32 {
        if !S::IS_ARM9 && addr.is_bit(0) {
            gg.get::<u8>(addr) as i8 as i32 as u32
        } else {
            gg.get::<u16>(addr & !1) as i16 as i32 as u32
        }
    }

    #[inline]
    pub(crate) fn mod_with_offs(value: u32, offs: u32, up: bool) -> u32 {
        if up {
            value.wrapping_add(offs)
        } else {
            value.wrapping_sub(offs)
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{
        interface::ArmSystem,
        registers::Flag::{Carry, Thumb, Zero},
        testing::TestNine,
    };

    #[test]
    fn branches() {
        let mut gg = TestNine::new();
        // b +8
        gg.run_at(0x0200_0000, &[0xEA00_0002]);
        assert_eq!(gg.step(1), 3);
        assert_eq!(gg.cpu9.registers[15], 0x0200_0010 + 4);

        // bl +0
        gg.run_at(0x0200_0000, &[0xEB00_0000]);
        gg.step(1);
        assert_eq!(gg.cpu9.registers[14], 0x0200_0004);
        assert_eq!(gg.cpu9.registers[15], 0x0200_0008 + 4);

        // bx r0 into THUMB
        gg.run_at(0x0200_0000, &[0xE12F_FF10]);
        gg.cpu9.registers[0] = 0x0200_0101;
        gg.step(1);
        assert!(gg.cpu9.flag(Thumb));
        assert_eq!(gg.cpu9.registers[15], 0x0200_0100 + 2);
    }

    #[test]
    fn alu_immediate() {
        let mut gg = TestNine::new();
        gg.run_at(
            0x0200_0000,
            &[
                0xE3A0_0001, // mov r0, #1
                0xE280_0003, // add r0, r0, #3
                0xE250_1004, // subs r1, r0, #4
                0xE3A0_2C01, // mov r2, #0x100
            ],
        );
        gg.step(2);
        assert_eq!(gg.cpu9.registers[0], 4);
        gg.step(1);
        assert_eq!(gg.cpu9.registers[1], 0);
        assert!(gg.cpu9.flag(Zero) && gg.cpu9.flag(Carry));
        gg.step(1);
        assert_eq!(gg.cpu9.registers[2], 0x100);
    }

    #[test]
    fn alu_register_shifts() {
        let mut gg = TestNine::new();
        gg.run_at(
            0x0200_0000,
            &[
                0xE3A0_0003, // mov r0, #3
                0xE1A0_1100, // mov r1, r0, lsl #2
                0xE3A0_2002, // mov r2, #2
                0xE1A0_3230, // mov r3, r0, lsr r2
            ],
        );
        gg.step(4);
        assert_eq!(gg.cpu9.registers[1], 12);
        assert_eq!(gg.cpu9.registers[3], 0);
    }

    #[test]
    fn alu_pc_dest_flushes() {
        let mut gg = TestNine::new();
        // mov pc, r0
        gg.run_at(0x0200_0000, &[0xE1A0_F000]);
        gg.cpu9.registers[0] = 0x0200_0200;
        assert_eq!(gg.step(1), 3);
        assert_eq!(gg.cpu9.registers[15], 0x0200_0200 + 4);
    }

    #[test]
    fn ldr_str_roundtrip() {
        let mut gg = TestNine::new();
        gg.run_at(
            0x0200_0000,
            &[
                0xE581_0000, // str r0, [r1]
                0xE591_2000, // ldr r2, [r1]
                0xE5C1_0004, // strb r0, [r1, #4]
                0xE5D1_3004, // ldrb r3, [r1, #4]
            ],
        );
        gg.cpu9.registers[0] = 0xDEAD_BEEF;
        gg.cpu9.registers[1] = 0x0200_1000;
        assert_eq!(gg.step(2), 4);
        assert_eq!(gg.cpu9.registers[2], 0xDEAD_BEEF);
        gg.step(2);
        assert_eq!(gg.cpu9.registers[3], 0xEF);
    }

    #[test]
    fn ldr_unaligned_rotates() {
        let mut gg = TestNine::new();
        gg.set::<u32>(0x0200_1000, 0x1122_3344);
        // ldr r0, [r1, #1]
        gg.run_at(0x0200_0000, &[0xE591_0001]);
        gg.cpu9.registers[1] = 0x0200_1000;
        gg.step(1);
        assert_eq!(gg.cpu9.registers[0], 0x4411_2233);
    }

    #[test]
    fn post_index_writeback() {
        let mut gg = TestNine::new();
        // ldr r0, [r1], #4
        gg.run_at(0x0200_0000, &[0xE491_0004]);
        gg.set::<u32>(0x0200_1000, 7);
        gg.cpu9.registers[1] = 0x0200_1000;
        gg.step(1);
        assert_eq!(gg.cpu9.registers[0], 7);
        assert_eq!(gg.cpu9.registers[1], 0x0200_1004);
    }

    #[test]
    fn halfword_transfers() {
        let mut gg = TestNine::new();
        gg.run_at(
            0x0200_0000,
            &[
                0xE1C1_00B0, // strh r0, [r1]
                0xE1D1_20B0, // ldrh r2, [r1]
                0xE1D1_30D0, // ldrsb r3, [r1]
            ],
        );
        gg.cpu9.registers[0] = 0xFFFF_8899;
        gg.cpu9.registers[1] = 0x0200_1000;
        gg.step(2);
        assert_eq!(gg.cpu9.registers[2], 0x8899);
        gg.step(1);
        assert_eq!(gg.cpu9.registers[3], 0xFFFF_FF99);
    }

    #[test]
    fn block_transfer_roundtrip() {
        let mut gg = TestNine::new();
        gg.run_at(
            0x0200_0000,
            &[
                0xE92D_000F, // stmdb sp!, {r0-r3}
                0xE8BD_00F0, // ldmia sp!, {r4-r7}
            ],
        );
        gg.cpu9.registers[13] = 0x0200_2000;
        for r in 0..4 {
            gg.cpu9.registers[r] = 0x40 + r as u32;
        }
        gg.step(1);
        assert_eq!(gg.cpu9.registers[13], 0x0200_2000 - 16);
        gg.step(1);
        assert_eq!(gg.cpu9.registers[13], 0x0200_2000);
        for r in 4..8 {
            assert_eq!(gg.cpu9.registers[r], 0x40 + r as u32 - 4);
        }
    }

    #[test]
    fn mul_family() {
        let mut gg = TestNine::new();
        gg.run_at(
            0x0200_0000,
            &[
                0xE000_0291, // mul r0, r1, r2
                0xE083_4291, // umull r4, r3, r1, r2
            ],
        );
        gg.cpu9.registers[1] = 0x1_0001;
        gg.cpu9.registers[2] = 0x1_0001;
        assert_eq!(gg.step(1), 2);
        assert_eq!(gg.cpu9.registers[0], 0x0002_0001);
        gg.step(1);
        // 0x10001^2 = 0x1_0002_0001
        assert_eq!(gg.cpu9.registers[4], 0x0002_0001);
        assert_eq!(gg.cpu9.registers[3], 1);
    }

    #[test]
    fn swp_exchanges() {
        let mut gg = TestNine::new();
        gg.set::<u32>(0x0200_1000, 0x5555_5555);
        gg.run_at(0x0200_0000, &[0xE102_0091]); // swp r0, r1, [r2]
        gg.cpu9.registers[1] = 0xAAAA_AAAA;
        gg.cpu9.registers[2] = 0x0200_1000;
        gg.step(1);
        assert_eq!(gg.cpu9.registers[0], 0x5555_5555);
        assert_eq!(gg.get::<u32>(0x0200_1000), 0xAAAA_AAAA);
    }

    #[test]
    fn msr_switches_mode() {
        let mut gg = TestNine::new();
        // msr cpsr_c, #0xD2 (IRQ mode)
        gg.run_at(0x0200_0000, &[0xE321_F0D2]);
        gg.step(1);
        assert_eq!(gg.cpu9.cpsr & 0x1F, 0x12);
        assert!(gg.cpu9.has_spsr());
    }

    #[test]
    fn mrs_reads_cpsr() {
        let mut gg = TestNine::new();
        gg.run_at(0x0200_0000, &[0xE10F_0000]); // mrs r0, cpsr
        gg.step(1);
        assert_eq!(gg.cpu9.registers[0], gg.cpu9.cpsr);
    }

    #[test]
    fn clz_counts() {
        let mut gg = TestNine::new();
        gg.run_at(0x0200_0000, &[0xE16F_0F11]); // clz r0, r1
        gg.cpu9.registers[1] = 0x0000_0100;
        gg.step(1);
        assert_eq!(gg.cpu9.registers[0], 23);
    }

    #[test]
    fn mcr_mrc_talk_to_cp15() {
        let mut gg = TestNine::new();
        gg.run_at(0x0200_0000, &[0xEE11_0F10]); // mrc p15, 0, r0, c1, c0, 0
        gg.step(1);
        // The test system's CP15 read hook returns 0
        assert_eq!(gg.cpu9.registers[0], 0);
    }

    #[test]
    fn unknown_opcode_is_nonfatal() {
        let mut gg = TestNine::new();
        // The S-less test-op encoding space
        gg.run_at(0x0200_0000, &[0xE300_0001, 0xE3A0_0007]);
        assert_eq!(gg.step(1), 1);
        gg.step(1);
        assert_eq!(gg.cpu9.registers[0], 7);
    }
}
