// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Capability trait for a high-level-emulated BIOS. An implementation
//! substitutes for guest firmware at exception entry; the core calls it
//! instead of jumping to the vector whenever one is attached (except on
//! the ARM9 with relocated, zero-page vectors).
//!
//! The return half of the HLE interrupt path works through a sentinel:
//! the shim sets R14 to the BIOS region, whose reads yield the reserved
//! `HLE_IRQ_RETURN` opcode while a BIOS is attached; executing it pops
//! the shim's stack frame and resumes the interrupted code.

use crate::Nds;

/// Which CPU a callback concerns.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CpuId {
    Arm9,
    Arm7,
}

pub trait HleBios: Send {
    /// Handle an exception vector in place of guest firmware. Returns
    /// the cycle cost to report for the exception entry.
    fn execute(&mut self, vector: u8, cpu: CpuId, ds: &mut Nds) -> u16;

    /// Is the BIOS inside IntrWait, waiting on interrupt flags?
    fn should_check(&self, cpu: CpuId) -> bool;

    /// Re-evaluate IntrWait's flags; called when an HLE interrupt
    /// finishes.
    fn check_wait_flags(&mut self, cpu: CpuId, ds: &mut Nds);
}
