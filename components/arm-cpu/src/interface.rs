// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use common::numutil::NumExt;

use crate::{
    inst_arm::ArmLut,
    inst_thumb::ThumbLut,
    Cpu,
};

/// Trait for a system that contains this CPU.
/// It supplies the memory bus and the handful of collaborators the core
/// consumes: the CP15 base accessors, the interrupt scheduling hook, and
/// the optional HLE BIOS and DLDI back-ends.
pub trait ArmSystem: Sized + 'static {
    /// Is this the ARM9? The ARMv4 ARM7 otherwise.
    const IS_ARM9: bool;
    /// Name used in log messages.
    const NAME: &'static str = if Self::IS_ARM9 { "ARM9" } else { "ARM7" };
    /// LUT for ARM instructions.
    const ARM_LUT: ArmLut<Self> = Cpu::<Self>::make_arm_lut();
    /// LUT for THUMB instructions.
    const THUMB_LUT: ThumbLut<Self> = Cpu::<Self>::make_thumb_lut();

    /// Get the CPU.
    fn cpur(&self) -> &Cpu<Self>;
    /// Get the CPU.
    fn cpu(&mut self) -> &mut Cpu<Self>;

    /// Get the value at the given memory address.
    fn get<T: RwType>(&mut self, addr: u32) -> T;
    /// Set the value at the given memory address.
    fn set<T: RwType>(&mut self, addr: u32, value: T);

    /// Enqueue the deferred interrupt task on the shared scheduler,
    /// the given amount of cycles from now.
    fn schedule_interrupt(&mut self, delay: u32);
    /// Is the system running in GBA mode? Affects the interrupt delay and
    /// the IE writable mask of the ARM7.
    fn gba_mode(&self) -> bool {
        false
    }

    /// CP15: current exception vector base. Always 0 on the ARM7.
    fn exception_base(&self) -> u32 {
        0
    }
    /// CP15: current DTCM base. The guest IRQ handler pointer of the ARM9
    /// lives at its top.
    fn dtcm_base(&self) -> u32 {
        0
    }
    /// Read a CP15 register. Only consulted on the ARM9.
    fn get_cp15(&self, _cn: u32, _cm: u32, _cp: u32) -> u32 {
        0
    }
    /// Write a CP15 register. Only consulted on the ARM9.
    fn set_cp15(&mut self, _cn: u32, _cm: u32, _cp: u32, _value: u32) {}

    /// Is an HLE BIOS substituting for guest firmware?
    fn bios_active(&self) -> bool {
        false
    }
    /// Run the HLE BIOS handler for the given exception vector and return
    /// its cycle cost. Only called while `bios_active` holds.
    fn bios_execute(&mut self, _vector: u8) -> u16 {
        3
    }
    /// Is the HLE BIOS inside IntrWait and waiting for flags?
    fn bios_should_check(&self) -> bool {
        false
    }
    /// Ask the HLE BIOS to re-check its IntrWait flags.
    fn bios_check_wait_flags(&mut self) {}

    /// Has the guest DLDI driver been patched with the sentinel opcodes?
    fn dldi_patched(&self) -> bool {
        false
    }
    fn dldi_startup(&mut self) -> u32 {
        0
    }
    fn dldi_is_inserted(&mut self) -> u32 {
        0
    }
    fn dldi_read_sectors(&mut self, _lba: u32, _count: u32, _buf: u32) -> u32 {
        0
    }
    fn dldi_write_sectors(&mut self, _lba: u32, _count: u32, _buf: u32) -> u32 {
        0
    }
    fn dldi_clear_status(&mut self) -> u32 {
        0
    }
    fn dldi_shutdown(&mut self) -> u32 {
        0
    }
}

/// Trait for a type that the CPU can read/write memory with.
/// On this ARM CPU, it is u8, u16, u32.
pub trait RwType: NumExt + 'static {}

impl RwType for u8 {}
impl RwType for u16 {}
impl RwType for u32 {}

/// Opcode a jump to the HLE BIOS return address decodes to. It sits in the
/// reserved condition space; `handle_reserved` only honors it while the
/// HLE BIOS is active.
pub const HLE_IRQ_RETURN: u32 = 0xFF00_0000;

/// Sentinel opcodes patched over the guest DLDI driver's entry points.
/// All of them live in the reserved condition space and are only honored
/// while a DLDI back-end is attached.
pub const DLDI_START: u32 = 0xF800_0000;
pub const DLDI_INSERT: u32 = 0xF800_0001;
pub const DLDI_READ: u32 = 0xF800_0002;
pub const DLDI_WRITE: u32 = 0xF800_0003;
pub const DLDI_CLEAR: u32 = 0xF800_0004;
pub const DLDI_STOP: u32 = 0xF800_0005;

/// One of the six DLDI driver functions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DldiFunction {
    Startup,
    IsInserted,
    ReadSectors,
    WriteSectors,
    ClearStatus,
    Shutdown,
}

impl DldiFunction {
    pub fn from_opcode(opcode: u32) -> Option<Self> {
        Some(match opcode {
            DLDI_START => Self::Startup,
            DLDI_INSERT => Self::IsInserted,
            DLDI_READ => Self::ReadSectors,
            DLDI_WRITE => Self::WriteSectors,
            DLDI_CLEAR => Self::ClearStatus,
            DLDI_STOP => Self::Shutdown,
            _ => return None,
        })
    }
}
