// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Capability trait for the storage back-end behind a patched DLDI
//! driver. The patcher overwrites the guest driver's six entry points
//! with sentinel opcodes; when the CPU reaches one, the corresponding
//! callback runs and control returns to the guest through R14.

pub use arm_cpu::interface::{
    DLDI_CLEAR, DLDI_INSERT, DLDI_READ, DLDI_START, DLDI_STOP, DLDI_WRITE,
};

use crate::{bios::CpuId, Nds};

pub trait DldiDriver: Send {
    fn startup(&mut self, ds: &mut Nds) -> u32;
    fn is_inserted(&mut self, ds: &mut Nds) -> u32;
    /// Read `count` sectors starting at `lba` into guest memory at
    /// `buf`, through the given CPU's view of the bus.
    fn read_sectors(&mut self, cpu: CpuId, lba: u32, count: u32, buf: u32, ds: &mut Nds) -> u32;
    fn write_sectors(&mut self, cpu: CpuId, lba: u32, count: u32, buf: u32, ds: &mut Nds) -> u32;
    fn clear_status(&mut self, ds: &mut Nds) -> u32;
    fn shutdown(&mut self, ds: &mut Nds) -> u32;
}
