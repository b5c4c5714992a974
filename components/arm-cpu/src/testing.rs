// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Bare-bones systems backing the unit tests of this crate: a flat RAM
//! mirror for a bus, plus recorders for the scheduling and BIOS hooks.

use common::numutil::NumExt;

use crate::{
    interface::{ArmSystem, RwType},
    Cpu,
};

const RAM_SIZE: usize = 0x10_0000;

fn offset(addr: u32) -> usize {
    addr.us() & (RAM_SIZE - 1)
}

macro_rules! test_system {
    ($name:ident, $cpu:ident, $arm9:expr) => {
        pub struct $name {
            pub $cpu: Cpu<$name>,
            pub ram: Vec<u8>,
            /// Delays passed to `schedule_interrupt`.
            pub scheduled: Vec<u32>,
            pub exc_base: u32,
            pub dtcm: u32,
            pub gba: bool,
            pub hle_bios: bool,
            /// Vectors the fake HLE BIOS was entered with.
            pub bios_calls: Vec<u8>,
            pub dldi: bool,
            /// DLDI calls observed, as (name, r0, r1, r2).
            pub dldi_calls: Vec<(&'static str, u32, u32, u32)>,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    $cpu: Cpu::default(),
                    ram: vec![0; RAM_SIZE],
                    scheduled: Vec::new(),
                    exc_base: if $arm9 { 0xFFFF_0000 } else { 0 },
                    dtcm: 0x0080_0000,
                    gba: false,
                    hle_bios: false,
                    bios_calls: Vec::new(),
                    dldi: false,
                    dldi_calls: Vec::new(),
                }
            }

            /// Write an ARM program and jump to it.
            pub fn run_at(&mut self, addr: u32, words: &[u32]) {
                self.set_program(addr, words);
                self.$cpu.registers[15] = addr;
                Cpu::flush_pipeline(self);
            }

            pub fn set_program(&mut self, addr: u32, words: &[u32]) {
                for (i, word) in words.iter().enumerate() {
                    self.set::<u32>(addr + (i as u32) * 4, *word);
                }
            }

            /// Write a THUMB program and jump to it.
            pub fn run_thumb_at(&mut self, addr: u32, halfwords: &[u16]) {
                for (i, half) in halfwords.iter().enumerate() {
                    self.set::<u16>(addr + (i as u32) * 2, *half);
                }
                self.$cpu.set_flag(crate::registers::Flag::Thumb, true);
                self.$cpu.registers[15] = addr;
                Cpu::flush_pipeline(self);
            }

            /// Execute the next `count` opcodes, returning the summed cost.
            pub fn step(&mut self, count: usize) -> u16 {
                let mut cycles = 0;
                for _ in 0..count {
                    cycles += Cpu::run_opcode(self);
                }
                cycles
            }
        }

        impl ArmSystem for $name {
            const IS_ARM9: bool = $arm9;

            fn cpur(&self) -> &Cpu<Self> {
                &self.$cpu
            }

            fn cpu(&mut self) -> &mut Cpu<Self> {
                &mut self.$cpu
            }

            fn get<T: RwType>(&mut self, addr: u32) -> T {
                let offs = offset(addr);
                let mut value = 0u32;
                for i in (0..T::WIDTH.us()).rev() {
                    value = (value << 8) | self.ram[(offs + i) & (RAM_SIZE - 1)] as u32;
                }
                T::from_u32(value)
            }

            fn set<T: RwType>(&mut self, addr: u32, value: T) {
                let offs = offset(addr);
                let value = value.u32();
                for i in 0..T::WIDTH.us() {
                    self.ram[(offs + i) & (RAM_SIZE - 1)] = (value >> (8 * i)) as u8;
                }
            }

            fn schedule_interrupt(&mut self, delay: u32) {
                self.scheduled.push(delay);
            }

            fn gba_mode(&self) -> bool {
                self.gba
            }

            fn exception_base(&self) -> u32 {
                self.exc_base
            }

            fn dtcm_base(&self) -> u32 {
                self.dtcm
            }

            fn bios_active(&self) -> bool {
                self.hle_bios
            }

            fn bios_execute(&mut self, vector: u8) -> u16 {
                self.bios_calls.push(vector);
                3
            }

            fn dldi_patched(&self) -> bool {
                self.dldi
            }

            fn dldi_startup(&mut self) -> u32 {
                self.dldi_calls.push(("startup", 0, 0, 0));
                1
            }

            fn dldi_is_inserted(&mut self) -> u32 {
                self.dldi_calls.push(("inserted", 0, 0, 0));
                1
            }

            fn dldi_read_sectors(&mut self, lba: u32, count: u32, buf: u32) -> u32 {
                self.dldi_calls.push(("read", lba, count, buf));
                1
            }

            fn dldi_write_sectors(&mut self, lba: u32, count: u32, buf: u32) -> u32 {
                self.dldi_calls.push(("write", lba, count, buf));
                1
            }

            fn dldi_clear_status(&mut self) -> u32 {
                self.dldi_calls.push(("clear", 0, 0, 0));
                1
            }

            fn dldi_shutdown(&mut self) -> u32 {
                self.dldi_calls.push(("shutdown", 0, 0, 0));
                1
            }
        }
    };
}

test_system!(TestNine, cpu9, true);
test_system!(TestSeven, cpu7, false);
