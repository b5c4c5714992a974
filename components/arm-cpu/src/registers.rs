// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use bitmatch::bitmatch;
use common::numutil::NumExt;

use crate::{interface::ArmSystem, Cpu};

/// A register with values for FIQ and all other modes
#[derive(Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FiqReg {
    pub reg: u32,
    pub fiq: u32,
}

/// A register with different values for the different CPU modes,
/// indexed by `Mode::bank`.
pub type ModeReg = [u32; 6];

/// Execution context of the CPU, bits 0-4 of CPSR.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Mode {
    User,
    Fiq,
    Irq,
    Supervisor,
    Abort,
    Undefined,
    System,
}

impl Mode {
    /// Decode CPSR mode bits. Values outside the architected set yield
    /// None; the caller leaves the bank bindings untouched for those.
    #[bitmatch]
    pub fn get(n: u32) -> Option<Self> {
        #[bitmatch]
        match n {
            "10000" => Some(Self::User),
            "10001" => Some(Self::Fiq),
            "10010" => Some(Self::Irq),
            "10011" => Some(Self::Supervisor),
            "10111" => Some(Self::Abort),
            "11011" => Some(Self::Undefined),
            "11111" => Some(Self::System),
            _ => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::User => 0b10000,
            Self::Fiq => 0b10001,
            Self::Irq => 0b10010,
            Self::Supervisor => 0b10011,
            Self::Abort => 0b10111,
            Self::Undefined => 0b11011,
            Self::System => 0b11111,
        }
    }

    /// Index into `ModeReg` banks. System shares the User bank.
    pub fn bank(self) -> usize {
        match self {
            Self::User | Self::System => 0,
            Self::Fiq => 1,
            Self::Supervisor => 2,
            Self::Abort => 3,
            Self::Irq => 4,
            Self::Undefined => 5,
        }
    }

    /// Bank index of this mode's SPSR, if it has one.
    pub fn spsr_bank(self) -> Option<usize> {
        match self {
            Self::User | Self::System => None,
            m => Some(m.bank()),
        }
    }
}

/// Flags inside CPSR.
#[derive(Copy, Clone)]
pub enum Flag {
    Neg = 31,
    Zero = 30,
    Carry = 29,
    Overflow = 28,
    QClamped = 27,
    IrqDisable = 7,
    FiqDisable = 6,
    Thumb = 5,
}

impl<S: ArmSystem> Cpu<S> {
    #[inline]
    pub fn sp(&self) -> u32 {
        self.registers[13]
    }

    #[inline]
    pub fn lr(&self) -> u32 {
        self.registers[14]
    }

    #[inline]
    pub fn pc(&self) -> u32 {
        self.registers[15]
    }

    #[inline]
    pub fn reg(&self, idx: u32) -> u32 {
        self.registers[idx.us()]
    }

    /// Register read for operands fetched late in the pipeline;
    /// R15 reads 4 bytes further ahead.
    pub fn reg_pc4(&self, idx: u32) -> u32 {
        if idx == 15 {
            self.registers[15].wrapping_add(4)
        } else {
            self.registers[idx.us()]
        }
    }

    #[inline]
    pub fn low(&self, idx: u16) -> u32 {
        self.registers[idx.us()]
    }

    #[inline]
    pub fn flag(&self, flag: Flag) -> bool {
        self.cpsr.is_bit(flag as u16)
    }

    #[inline]
    pub fn set_flag(&mut self, flag: Flag, en: bool) {
        self.cpsr = self.cpsr.set_bit(flag as u16, en);
    }

    /// The mode the register file is currently bound to. Tracked
    /// separately from the CPSR so that a write with garbage mode bits
    /// leaves the bindings in a defined state.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.bank
    }

    /// The banked SPSR of the current mode; reads back the CPSR in
    /// User/System, which have none.
    pub fn spsr(&self) -> u32 {
        match self.bank.spsr_bank() {
            Some(bank) => self.spsr[bank],
            None => self.cpsr,
        }
    }

    #[inline]
    pub fn has_spsr(&self) -> bool {
        self.bank.spsr_bank().is_some()
    }

    /// Replace the current mode's SPSR, if it has one.
    pub fn set_spsr(&mut self, value: u32) {
        if let Some(bank) = self.bank.spsr_bank() {
            self.spsr[bank] = value;
        }
    }

    fn bank_reg(&self, mode: Mode, idx: usize) -> u32 {
        match idx {
            8..=12 if mode == Mode::Fiq => self.fiqs[idx - 8].fiq,
            8..=12 => self.fiqs[idx - 8].reg,
            13 => self.sp[mode.bank()],
            _ => self.lr[mode.bank()],
        }
    }

    fn set_bank_reg(&mut self, mode: Mode, idx: usize, value: u32) {
        match idx {
            8..=12 if mode == Mode::Fiq => self.fiqs[idx - 8].fiq = value,
            8..=12 => self.fiqs[idx - 8].reg = value,
            13 => self.sp[mode.bank()] = value,
            _ => self.lr[mode.bank()] = value,
        }
    }

    /// Register read that bypasses banking and always yields the User
    /// bank value; used by LDM/STM with the S bit.
    pub(crate) fn user_reg(&self, idx: usize) -> u32 {
        match idx {
            8..=12 if self.bank == Mode::Fiq => self.fiqs[idx - 8].reg,
            13 => self.sp[0],
            14 => self.lr[0],
            _ => self.registers[idx],
        }
    }

    pub(crate) fn set_user_reg(&mut self, idx: usize, value: u32) {
        match idx {
            8..=12 if self.bank == Mode::Fiq => self.fiqs[idx - 8].reg = value,
            13 => self.sp[0] = value,
            14 => self.lr[0] = value,
            _ => self.registers[idx] = value,
        }
    }

    /// Write R8-R14 back into the old mode's bank and load the new
    /// mode's bank. Opcodes always observe stable bindings; this only
    /// runs between opcodes, from `set_cpsr`.
    fn swap_banks(&mut self, new: Mode) {
        let old = self.bank;
        for idx in 8..15 {
            self.set_bank_reg(old, idx, self.registers[idx]);
        }
        for idx in 8..15 {
            self.registers[idx] = self.bank_reg(new, idx);
        }
        self.bank = new;
    }

    /// Set the CPSR. If the mode bits change, the register file is
    /// rebound per the mode bank table; if `save` is set and the new mode
    /// has an SPSR, the outgoing CPSR is snapshotted there. Finally the
    /// interrupt condition is re-checked, since this may have cleared the
    /// I bit or made IE&IF visible.
    pub fn set_cpsr(gg: &mut S, value: u32, save: bool) {
        let cpu = gg.cpu();
        let old_cpsr = cpu.cpsr;
        if value & 0x1F != old_cpsr & 0x1F {
            match Mode::get(value & 0x1F) {
                Some(new) => cpu.swap_banks(new),
                None => log::warn!("unknown {} CPU mode 0x{:02X}", S::NAME, value & 0x1F),
            }
        }

        if save {
            if let Some(bank) = cpu.bank.spsr_bank() {
                cpu.spsr[bank] = old_cpsr;
            }
        }
        cpu.cpsr = value;

        Self::check_interrupt(gg);
    }
}

#[cfg(test)]
mod test {
    use super::Mode;
    use crate::{testing::TestNine, Cpu};

    const MODES: [u32; 7] = [0x10, 0x11, 0x12, 0x13, 0x17, 0x1B, 0x1F];

    #[test]
    fn mode_decode() {
        assert_eq!(Mode::get(0x10), Some(Mode::User));
        assert_eq!(Mode::get(0x11), Some(Mode::Fiq));
        assert_eq!(Mode::get(0x12), Some(Mode::Irq));
        assert_eq!(Mode::get(0x13), Some(Mode::Supervisor));
        assert_eq!(Mode::get(0x17), Some(Mode::Abort));
        assert_eq!(Mode::get(0x1B), Some(Mode::Undefined));
        assert_eq!(Mode::get(0x1F), Some(Mode::System));
        assert_eq!(Mode::get(0x00), None);
        assert_eq!(Mode::get(0x16), None);
    }

    #[test]
    fn sp_lr_banked_per_mode() {
        let mut gg = TestNine::new();
        // Give every mode distinct R13/R14 values
        for (i, mode) in MODES.iter().enumerate() {
            Cpu::set_cpsr(&mut gg, 0xC0 | *mode, false);
            gg.cpu9.registers[13] = 0x1300 + i as u32;
            gg.cpu9.registers[14] = 0x1400 + i as u32;
        }
        // They read back per the bank table; System shares with User,
        // and System (iterated last) wrote that shared bank
        for (i, mode) in MODES.iter().enumerate() {
            Cpu::set_cpsr(&mut gg, 0xC0 | *mode, false);
            let expect = if *mode == 0x10 || *mode == 0x1F {
                6
            } else {
                i as u32
            };
            assert_eq!(gg.cpu9.registers[13], 0x1300 + expect, "mode {mode:02X}");
            assert_eq!(gg.cpu9.registers[14], 0x1400 + expect, "mode {mode:02X}");
        }
    }

    #[test]
    fn fiq_banks_r8_to_r12() {
        let mut gg = TestNine::new();
        Cpu::set_cpsr(&mut gg, 0xC0 | 0x1F, false);
        for r in 8..13 {
            gg.cpu9.registers[r] = 100 + r as u32;
        }
        Cpu::set_cpsr(&mut gg, 0xC0 | 0x11, false);
        for r in 8..13 {
            gg.cpu9.registers[r] = 200 + r as u32;
        }
        // IRQ mode sees the common bank again, FIQ its own
        Cpu::set_cpsr(&mut gg, 0xC0 | 0x12, false);
        for r in 8..13 {
            assert_eq!(gg.cpu9.registers[r], 100 + r as u32);
        }
        Cpu::set_cpsr(&mut gg, 0xC0 | 0x11, false);
        for r in 8..13 {
            assert_eq!(gg.cpu9.registers[r], 200 + r as u32);
        }
    }

    #[test]
    fn unknown_mode_keeps_bindings() {
        let mut gg = TestNine::new();
        Cpu::set_cpsr(&mut gg, 0xC0 | 0x12, false);
        gg.cpu9.registers[13] = 0xAAAA;
        Cpu::set_cpsr(&mut gg, 0xC0 | 0x05, false);
        // CPSR took the value, the register file did not move
        assert_eq!(gg.cpu9.cpsr & 0x1F, 0x05);
        assert_eq!(gg.cpu9.registers[13], 0xAAAA);
        assert_eq!(gg.cpu9.mode(), Mode::Irq);
    }

    #[test]
    fn spsr_only_in_exception_modes() {
        let mut gg = TestNine::new();
        Cpu::set_cpsr(&mut gg, 0xC0 | 0x1F, false);
        assert!(!gg.cpu9.has_spsr());
        Cpu::set_cpsr(&mut gg, 0xC0 | 0x10, false);
        assert!(!gg.cpu9.has_spsr());
        for mode in [0x11, 0x12, 0x13, 0x17, 0x1B] {
            Cpu::set_cpsr(&mut gg, 0xC0 | mode, false);
            assert!(gg.cpu9.has_spsr(), "mode {mode:02X}");
        }
    }

    #[test]
    fn save_snapshots_old_cpsr() {
        let mut gg = TestNine::new();
        Cpu::set_cpsr(&mut gg, 0xC0 | 0x1F, false);
        let old = gg.cpu9.cpsr;
        Cpu::set_cpsr(&mut gg, 0xC0 | 0x12, true);
        assert_eq!(gg.cpu9.spsr(), old);
    }
}
