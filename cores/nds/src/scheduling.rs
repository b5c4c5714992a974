// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! Scheduled events and the video cadence. One scanline event drives
//! both engines and re-schedules itself; deferred interrupts are the
//! other event kind, enqueued by the CPUs' interrupt logic.

use std::sync::atomic::Ordering;

use arm_cpu::Cpu;
use common::{components::scheduler::Kind, Time, TimeS};

use crate::{graphics::HEIGHT, Nds};

/// ARM9 cycles per scanline.
pub const SCANLINE_CYCLES: Time = 2130;
/// Total lines per frame, including V-blank.
pub const LINES_PER_FRAME: u16 = 263;
/// First line of V-blank.
pub const VBLANK_LINE: u16 = 192;

// The GBA's timing differs; its line is measured in ARM7 cycles.
const GBA_SCANLINE_CYCLES: Time = 1232;
const GBA_LINES_PER_FRAME: u16 = 228;
const GBA_VBLANK_LINE: u16 = 160;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum NdsEvent {
    /// The per-line video tick.
    Scanline,
    /// Deferred interrupt delivery on one of the CPUs.
    Interrupt { arm9: bool },
}

impl Kind for NdsEvent {}

impl Default for NdsEvent {
    fn default() -> Self {
        Self::Scanline
    }
}

impl NdsEvent {
    pub fn dispatch(self, ds: &mut Nds, late_by: TimeS) {
        match self {
            Self::Scanline => ds.scanline(late_by),
            Self::Interrupt { arm9: true } => Cpu::interrupt(&mut ds.nds9()),
            Self::Interrupt { arm9: false } => Cpu::interrupt(&mut ds.nds7()),
        }
    }
}

impl Nds {
    fn scanline(&mut self, late_by: TimeS) {
        let (lines, vblank, cycles) = if self.gba_mode {
            (GBA_LINES_PER_FRAME, GBA_VBLANK_LINE, GBA_SCANLINE_CYCLES)
        } else {
            (LINES_PER_FRAME, VBLANK_LINE, SCANLINE_CYCLES)
        };

        if !self.gba_mode && self.vcount < HEIGHT as u16 {
            let line = self.vcount;
            let (gpu, memory) = (&mut self.gpu, &self.memory);
            gpu[0].draw_scanline(line, &memory.video(false));
            gpu[1].draw_scanline(line, &memory.video(true));
        }

        if self.vcount == vblank {
            if !self.gba_mode {
                Cpu::send_interrupt(&mut self.nds9(), 0);
            }
            Cpu::send_interrupt(&mut self.nds7(), 0);
        }

        self.vcount += 1;
        if self.vcount == lines {
            self.vcount = 0;
            for gpu in &mut self.gpu {
                gpu.latch_affine();
            }
            // Frame finished; the drive loop exits on this
            self.running.store(false, Ordering::Release);
        }

        self.scheduler
            .schedule(NdsEvent::Scanline, cycles as TimeS - late_by);
    }
}
