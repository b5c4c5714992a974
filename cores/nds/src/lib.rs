// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! The dual-CPU system: an ARM9 and an ARM7 interleaved on a shared
//! cycle timeline, plus the two 2D engines.
//!
//! The frame drive runs whichever CPU is behind the global counter, one
//! opcode at a time; the ARM7 advances at half the ARM9's rate. Between
//! opcode bursts the scheduler's due events fire, which is where
//! scanlines are drawn and deferred interrupts delivered.

mod addr;
pub mod bios;
mod cpu;
pub mod cp15;
pub mod dldi;
pub mod graphics;
mod io;
pub mod memory;
pub mod scheduling;
#[cfg(test)]
mod tests;

use std::{
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use arm_cpu::{interface::ArmSystem, Cpu};
use common::{components::scheduler::Scheduler, Time, TimeS};

use crate::{
    bios::HleBios,
    cp15::Cp15,
    dldi::DldiDriver,
    graphics::Gpu2D,
    memory::Memory,
    scheduling::{NdsEvent, SCANLINE_CYCLES},
};

/// Macro for creating a wrapper of the system, specifically with
/// the use case of being able to implement ARM CPU support twice,
/// since the NDS has 2 CPUs.
macro_rules! nds_wrapper {
    ($name:ident) => {
        /// Wrapper for one of the CPUs.
        /// Raw pointer was chosen to avoid lifetimes.
        #[repr(transparent)]
        pub struct $name(*mut Nds);

        impl Deref for $name {
            type Target = Nds;

            #[inline]
            fn deref(&self) -> &Self::Target {
                unsafe { &*self.0 }
            }
        }

        impl DerefMut for $name {
            #[inline]
            fn deref_mut(&mut self) -> &mut Self::Target {
                unsafe { &mut *self.0 }
            }
        }

        unsafe impl Send for $name {}
    };
}

nds_wrapper!(Nds7);
nds_wrapper!(Nds9);

/// Trait for the per-CPU views of the system.
pub trait NdsCpu: ArmSystem + DerefMut<Target = Nds> {}

impl NdsCpu for Nds7 {}
impl NdsCpu for Nds9 {}

#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Nds {
    pub cpu7: Cpu<Nds7>,
    pub cpu9: Cpu<Nds9>,
    pub cp15: Cp15,
    pub memory: Memory,
    /// The two 2D engines, A then B.
    pub gpu: [Gpu2D; 2],
    pub scheduler: Scheduler<NdsEvent>,
    /// Current scanline of the video timing.
    pub vcount: u16,
    /// Single-CPU GBA mode: only the ARM7 runs, at the full clock.
    pub gba_mode: bool,

    /// Cleared by the frame-end event and by `stop()`; the drive loop
    /// re-arms it on entry and exits once it reads it cleared.
    #[cfg_attr(feature = "serde", serde(skip, default))]
    pub running: Arc<AtomicBool>,
    /// HLE BIOS standing in for guest firmware, if any.
    #[cfg_attr(feature = "serde", serde(skip, default))]
    pub bios: Option<Box<dyn HleBios>>,
    /// Storage back-end behind the patched DLDI driver, if any.
    #[cfg_attr(feature = "serde", serde(skip, default))]
    pub dldi: Option<Box<dyn DldiDriver>>,
}

impl Nds {
    #[inline]
    pub fn nds7(&mut self) -> Nds7 {
        Nds7(self as *mut Nds)
    }

    #[inline]
    pub fn nds9(&mut self) -> Nds9 {
        Nds9(self as *mut Nds)
    }

    /// Cold boot both CPUs into their BIOS vectors.
    pub fn init(&mut self) {
        Cpu::init(&mut self.nds9());
        Cpu::init(&mut self.nds7());
    }

    /// Boot an image directly, skipping the BIOS. The loader is expected
    /// to have placed the header mirror and binaries in main RAM.
    pub fn direct_boot(&mut self) {
        // State the BIOS would otherwise leave behind
        self.cp15.set(1, 0, 0, 0x0005_2078);
        self.cp15.set(9, 1, 0, 0x0300_000A);
        Cpu::direct_boot(&mut self.nds9());
        Cpu::direct_boot(&mut self.nds7());
        self.cpu9.post_flg = 1;
        self.cpu7.post_flg = 1;
    }

    /// Ask the drive loop to exit at its next outer iteration. Safe to
    /// call from another thread.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Drive the system for one frame.
    pub fn run_frame(&mut self) {
        if self.gba_mode {
            self.run_gba_frame();
        } else {
            self.run_nds_frame();
        }
    }

    /// The NDS drive: run both CPUs until the next scheduled event is
    /// due, then fire every due event, until the frame-end event (or an
    /// external stop) clears `running`. The swap doubles as the
    /// "mark started" gate.
    fn run_nds_frame(&mut self) {
        while self.running.swap(true, Ordering::AcqRel) {
            while self.scheduler.next_at() > self.scheduler.now() {
                let now = self.scheduler.now();
                if self.cpu9.halted == 0 && now >= self.cpu9.cycles {
                    let cost = Cpu::run_opcode(&mut self.nds9());
                    self.cpu9.cycles = now + cost as Time;
                }
                // The ARM7 runs at half the speed of the ARM9
                if self.cpu7.halted == 0 && now >= self.cpu7.cycles {
                    let cost = Cpu::run_opcode(&mut self.nds7());
                    self.cpu7.cycles = now + ((cost as Time) << 1);
                }

                // Count up to the next soonest wakeup
                let time9 = if self.cpu9.halted != 0 {
                    Time::MAX
                } else {
                    self.cpu9.cycles
                };
                let time7 = if self.cpu7.halted != 0 {
                    Time::MAX
                } else {
                    self.cpu7.cycles
                };
                let next = self.scheduler.next_at();
                self.scheduler.advance_to(time9.min(time7).min(next));
            }

            // Jump to the event and run everything scheduled for now,
            // including events a firing event schedules at this stamp
            self.scheduler.advance_to(self.scheduler.next_at());
            while let Some(event) = self.scheduler.get_next_pending() {
                event.kind.dispatch(self, event.late_by);
            }
        }
    }

    /// The GBA drive: single CPU, no rate scaling.
    fn run_gba_frame(&mut self) {
        while self.running.swap(true, Ordering::AcqRel) {
            if self.cpu7.cycles > self.scheduler.now() {
                self.scheduler.advance_to(self.cpu7.cycles);
            }
            while self.cpu7.halted == 0 && self.scheduler.next_at() > self.cpu7.cycles {
                let cost = Cpu::run_opcode(&mut self.nds7());
                self.scheduler.advance(cost as Time);
                self.cpu7.cycles = self.scheduler.now();
            }

            let due = self.scheduler.next_at().max(self.scheduler.now());
            self.scheduler.advance_to(due);
            while let Some(event) = self.scheduler.get_next_pending() {
                event.kind.dispatch(self, event.late_by);
            }
        }
    }

    /// Rebase all cycle counters so the shared timeline stays far from
    /// overflow. Event stamps move in lockstep.
    pub fn reset_cycles(&mut self) {
        let base = self.scheduler.now();
        self.cpu9.cycles -= base.min(self.cpu9.cycles);
        self.cpu7.cycles -= base.min(self.cpu7.cycles);
        self.scheduler.rebase(base);
    }
}

impl Default for Nds {
    fn default() -> Self {
        let mut ds = Self {
            cpu7: Cpu::default(),
            cpu9: Cpu::default(),
            cp15: Cp15::default(),
            memory: Memory::default(),
            gpu: [Gpu2D::new(false), Gpu2D::new(true)],
            scheduler: Scheduler::default(),
            vcount: 0,
            gba_mode: false,
            running: Arc::new(AtomicBool::new(false)),
            bios: None,
            dldi: None,
        };
        ds.scheduler
            .schedule(NdsEvent::Scanline, SCANLINE_CYCLES as TimeS);
        ds
    }
}
