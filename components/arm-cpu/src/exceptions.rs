// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Exception entry and the interrupt subsystem: IME/IE/IF, halt and wake,
//! and the HLE BIOS interrupt path.

use common::numutil::NumExt;

use crate::{interface::ArmSystem, registers::Flag::IrqDisable, Cpu};

/// Exception vector offsets.
pub mod vector {
    pub const RESET: u8 = 0x00;
    pub const UNDEFINED: u8 = 0x04;
    pub const SWI: u8 = 0x08;
    pub const PREFETCH_ABORT: u8 = 0x0C;
    pub const DATA_ABORT: u8 = 0x10;
    pub const ADDRESS_EXCEEDED: u8 = 0x14;
    pub const IRQ: u8 = 0x18;
    pub const FIQ: u8 = 0x1C;
}

/// Target mode per exception vector, indexed by `vector >> 2`.
const VECTOR_MODES: [u32; 8] = [0x13, 0x1B, 0x13, 0x17, 0x17, 0x13, 0x12, 0x11];

/// Registers the HLE BIOS interrupt shim saves: R0-R3, R12, R14.
const HLE_IRQ_REGS: u16 = 0x500F;

impl<S: ArmSystem> Cpu<S> {
    /// Does the pending condition hold right now?
    fn interrupt_pending(&self) -> bool {
        self.ime && (self.ie & self.irf) != 0 && !self.flag(IrqDisable)
    }

    /// Delay between an interrupt trigger and its delivery. The ARM7
    /// runs at half rate in NDS mode, so its delay is doubled.
    fn interrupt_delay(gg: &S) -> u32 {
        if !S::IS_ARM9 && !gg.gba_mode() {
            2
        } else {
            1
        }
    }

    /// Schedule the deferred interrupt task if the pending condition
    /// holds. Called whenever IME/IE/IF or CPSR.I may have changed.
    pub fn check_interrupt(gg: &mut S) {
        if gg.cpur().interrupt_pending() {
            let delay = Self::interrupt_delay(gg);
            gg.schedule_interrupt(delay);
        }
    }

    /// Raise the given interrupt line. Triggers delivery if the pending
    /// condition holds; otherwise just wakes the CPU if it may wake
    /// (the ARM9 additionally needs IME for that, the ARM7 does not).
    pub fn send_interrupt(gg: &mut S, bit: u16) {
        gg.cpu().irf |= 1 << bit;

        let cpu = gg.cpur();
        if cpu.ie & cpu.irf == 0 {
            return;
        }
        if cpu.interrupt_pending() {
            let delay = Self::interrupt_delay(gg);
            gg.schedule_interrupt(delay);
        } else if cpu.ime || !S::IS_ARM9 {
            gg.cpu().halted &= !1;
        }
    }

    /// The deferred interrupt task: enter the IRQ vector and unhalt,
    /// if the conditions still hold by the time it fires.
    pub fn interrupt(gg: &mut S) {
        if gg.cpur().interrupt_pending() {
            Self::exception(gg, vector::IRQ);
            gg.cpu().halted &= !1;
        }
    }

    /// Enter an exception vector and return the entry's cycle cost.
    /// Delegated to the HLE BIOS when one is active, unless the ARM9 has
    /// relocated its vectors to the zero page.
    pub fn exception(gg: &mut S, vector: u8) -> u16 {
        if gg.bios_active() && (!S::IS_ARM9 || gg.exception_base() != 0) {
            return gg.bios_execute(vector);
        }

        let cpsr = gg.cpur().cpsr;
        let mode = VECTOR_MODES[(vector >> 2).us()];
        Self::set_cpsr(gg, (cpsr & !0x3F) | (1 << 7) | mode, true);

        // The SPSR of the new mode now holds the source PSR, so its T bit
        // is the source state's; it selects the return-address
        // adjustment. This read must stay after the set_cpsr above.
        let base = if S::IS_ARM9 { gg.exception_base() } else { 0 };
        let cpu = gg.cpu();
        let adj = if cpu.spsr().is_bit(5) { 2 } else { 0 };
        cpu.registers[14] = cpu.registers[15].wrapping_add(adj);
        cpu.registers[15] = base + vector as u32;
        Self::flush_pipeline(gg);
        3
    }

    /// Entry half of the HLE BIOS interrupt shim: switch to IRQ mode,
    /// push the scratch registers the real BIOS would, point R14 at the
    /// sentinel return address, and jump to the guest's IRQ handler.
    pub fn handle_hle_irq(gg: &mut S) -> u16 {
        let cpsr = gg.cpur().cpsr;
        Self::set_cpsr(gg, (cpsr & !0x3F) | (1 << 7) | 0x12, true);

        let cpu = gg.cpu();
        let adj = if cpu.spsr().is_bit(5) { 2 } else { 0 };
        cpu.registers[14] = cpu.registers[15].wrapping_add(adj);
        Self::stmdb_writeback(gg, 13, HLE_IRQ_REGS);

        // Returning to this address fetches the HLE return opcode.
        gg.cpu().registers[14] = if S::IS_ARM9 { 0xFFFF_0000 } else { 0 };
        let handler_ptr = if S::IS_ARM9 {
            gg.dtcm_base().wrapping_add(0x3FFC)
        } else {
            0x03FF_FFFC
        };
        let handler = gg.get::<u32>(handler_ptr);
        gg.cpu().registers[15] = handler;
        Self::flush_pipeline(gg);
        3
    }

    /// Return half of the shim, reached through the sentinel opcode:
    /// pop the saved registers, restore the interrupted mode, resume.
    pub(crate) fn finish_hle_irq(gg: &mut S) -> u16 {
        if gg.bios_should_check() {
            gg.bios_check_wait_flags();
        }

        Self::ldmia_writeback(gg, 13, HLE_IRQ_REGS);
        let cpu = gg.cpu();
        cpu.registers[15] = cpu.registers[14].wrapping_sub(4);
        if cpu.has_spsr() {
            let spsr = cpu.spsr();
            Self::set_cpsr(gg, spsr, false);
        }
        Self::flush_pipeline(gg);
        3
    }

    /// STMDB with writeback, as the HLE shim needs it.
    fn stmdb_writeback(gg: &mut S, base: u32, rlist: u16) {
        let mut addr = gg.cpur().reg(base).wrapping_sub(4 * rlist.count_ones());
        gg.cpu().registers[base.us()] = addr;
        for r in 0..16 {
            if rlist.is_bit(r) {
                let value = gg.cpur().low(r);
                gg.set::<u32>(addr, value);
                addr = addr.wrapping_add(4);
            }
        }
    }

    /// LDMIA with writeback, the shim's counterpart to the above.
    fn ldmia_writeback(gg: &mut S, base: u32, rlist: u16) {
        let mut addr = gg.cpur().reg(base);
        for r in 0..16 {
            if rlist.is_bit(r) {
                let value = gg.get::<u32>(addr);
                gg.cpu().registers[r.us()] = value;
                addr = addr.wrapping_add(4);
            }
        }
        gg.cpu().registers[base.us()] = addr;
    }

    /// Write the IME register.
    pub fn write_ime(gg: &mut S, value: u8) {
        gg.cpu().ime = value.is_bit(0);
        Self::check_interrupt(gg);
    }

    /// Write the IE register through its per-CPU writable mask.
    pub fn write_ie(gg: &mut S, mask: u32, value: u32) {
        let writable = if S::IS_ARM9 {
            0x003F_3F7F
        } else if gg.gba_mode() {
            0x3FFF
        } else {
            0x01FF_3FFF
        };
        let mask = mask & writable;
        let cpu = gg.cpu();
        cpu.ie = (cpu.ie & !mask) | (value & mask);
        Self::check_interrupt(gg);
    }

    /// Write the IF register. Writing 1 to a bit acknowledges and
    /// clears it.
    pub fn write_irf(&mut self, mask: u32, value: u32) {
        self.irf &= !(value & mask);
    }

    /// Write the POSTFLG register. Bit 0 can be set but never cleared;
    /// bit 1 is freely writable on the ARM9 and ignored on the ARM7.
    pub fn write_post_flg(&mut self, value: u8) {
        self.post_flg |= value & 0x01;
        if S::IS_ARM9 {
            self.post_flg = (self.post_flg & !0x02) | (value & 0x02);
        }
    }
}

#[cfg(test)]
mod test {
    use super::vector;
    use crate::{
        registers::Flag::{IrqDisable, Thumb},
        testing::{TestNine, TestSeven},
        Cpu,
    };

    #[test]
    fn irf_write_is_acknowledge() {
        let mut gg = TestNine::new();
        gg.cpu9.irf = 0x5;
        gg.cpu9.write_irf(0xFFFF_FFFF, 0x1);
        assert_eq!(gg.cpu9.irf, 0x4);
        // Acknowledging an already-clear bit changes nothing
        gg.cpu9.write_irf(0xFFFF_FFFF, 0x1);
        assert_eq!(gg.cpu9.irf, 0x4);
    }

    #[test]
    fn post_flg_bit0_is_sticky() {
        let mut gg = TestNine::new();
        gg.cpu9.write_post_flg(0x1);
        assert_eq!(gg.cpu9.post_flg, 0x1);
        gg.cpu9.write_post_flg(0x0);
        assert_eq!(gg.cpu9.post_flg & 1, 0x1);
        // Bit 1 is writable both ways on the ARM9
        gg.cpu9.write_post_flg(0x2);
        assert_eq!(gg.cpu9.post_flg, 0x3);
        gg.cpu9.write_post_flg(0x0);
        assert_eq!(gg.cpu9.post_flg, 0x1);

        let mut gg = TestSeven::new();
        gg.cpu7.write_post_flg(0x3);
        assert_eq!(gg.cpu7.post_flg, 0x1);
    }

    #[test]
    fn send_interrupt_schedules_delivery() {
        let mut gg = TestNine::new();
        gg.cpu9.ime = true;
        gg.cpu9.ie = 1;
        gg.cpu9.cpsr &= !(1 << 7);
        Cpu::send_interrupt(&mut gg, 0);
        assert_eq!(gg.scheduled, vec![1]);

        // The ARM7 in NDS mode gets the doubled delay
        let mut gg = TestSeven::new();
        gg.cpu7.ime = true;
        gg.cpu7.ie = 1;
        gg.cpu7.cpsr &= !(1 << 7);
        Cpu::send_interrupt(&mut gg, 0);
        assert_eq!(gg.scheduled, vec![2]);
    }

    #[test]
    fn arm7_wakes_without_ime() {
        let mut gg = TestSeven::new();
        gg.cpu7.halted = 1;
        gg.cpu7.ime = false;
        gg.cpu7.ie = 1;
        Cpu::send_interrupt(&mut gg, 0);
        assert_eq!(gg.cpu7.halted, 0);
        assert!(gg.scheduled.is_empty());
    }

    #[test]
    fn arm9_needs_ime_to_wake() {
        let mut gg = TestNine::new();
        gg.cpu9.halted = 1;
        gg.cpu9.ime = false;
        gg.cpu9.ie = 1;
        Cpu::send_interrupt(&mut gg, 0);
        assert_eq!(gg.cpu9.halted, 1);

        gg.cpu9.ime = true;
        gg.cpu9.cpsr |= 1 << 7; // deliverable? no - but wake, yes
        Cpu::send_interrupt(&mut gg, 0);
        assert_eq!(gg.cpu9.halted, 0);
        assert!(gg.scheduled.is_empty());
    }

    #[test]
    fn interrupt_enters_irq_mode() {
        let mut gg = TestNine::new();
        gg.set_program(0x0200_0000, &[0xE1A0_0000; 4]); // mov r0, r0
        Cpu::set_pc(&mut gg, 0x0200_0000);
        let old_cpsr = {
            gg.cpu9.cpsr &= !(1 << 7);
            gg.cpu9.cpsr
        };
        gg.cpu9.ime = true;
        gg.cpu9.ie = 1;
        gg.cpu9.irf = 1;

        Cpu::interrupt(&mut gg);
        assert_eq!(gg.cpu9.cpsr & 0x1F, 0x12);
        assert!(gg.cpu9.flag(IrqDisable));
        // Pipeline flush leaves the PC one fetch past the vector
        assert_eq!(gg.cpu9.registers[15], gg.exc_base + 0x18 + 4);
        assert_eq!(gg.cpu9.spsr(), old_cpsr);
    }

    #[test]
    fn interrupt_respects_pending_condition() {
        let mut gg = TestNine::new();
        gg.cpu9.ime = false;
        gg.cpu9.ie = 1;
        gg.cpu9.irf = 1;
        let pc = gg.cpu9.registers[15];
        Cpu::interrupt(&mut gg);
        assert_eq!(gg.cpu9.registers[15], pc);
        assert_eq!(gg.cpu9.cpsr & 0x1F, 0x13);
    }

    #[test]
    fn exception_return_address_thumb_adjust() {
        let mut gg = TestNine::new();
        gg.set_program(0x0200_0000, &[0xE1A0_0000; 4]);
        Cpu::set_pc(&mut gg, 0x0200_0000);
        gg.cpu9.set_flag(Thumb, true);
        Cpu::flush_pipeline(&mut gg);
        let pc = gg.cpu9.registers[15];

        Cpu::exception(&mut gg, vector::SWI);
        // The saved SPSR's T bit selects the +2 adjustment
        assert_eq!(gg.cpu9.registers[14], pc + 2);
        assert!(!gg.cpu9.flag(Thumb));
    }
}
