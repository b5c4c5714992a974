// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! `ArmSystem` glue for the two CPUs. This is where the core's narrow
//! views of the bus, CP15, the HLE BIOS and the DLDI back-end attach to
//! the actual system.

use arm_cpu::{
    interface::{ArmSystem, RwType},
    Cpu,
};
use common::TimeS;

use crate::{
    bios::CpuId,
    memory,
    scheduling::NdsEvent,
    Nds7, Nds9,
};

impl ArmSystem for Nds9 {
    const IS_ARM9: bool = true;

    fn cpur(&self) -> &Cpu<Self> {
        &self.cpu9
    }

    fn cpu(&mut self) -> &mut Cpu<Self> {
        &mut self.cpu9
    }

    fn get<T: RwType>(&mut self, addr: u32) -> T {
        memory::read::<Self, T>(self, addr)
    }

    fn set<T: RwType>(&mut self, addr: u32, value: T) {
        memory::write::<Self, T>(self, addr, value);
    }

    fn schedule_interrupt(&mut self, delay: u32) {
        self.scheduler
            .schedule(NdsEvent::Interrupt { arm9: true }, delay as TimeS);
    }

    fn exception_base(&self) -> u32 {
        self.cp15.exception_base()
    }

    fn dtcm_base(&self) -> u32 {
        self.cp15.dtcm_base()
    }

    fn get_cp15(&self, cn: u32, cm: u32, cp: u32) -> u32 {
        self.cp15.get(cn, cm, cp)
    }

    fn set_cp15(&mut self, cn: u32, cm: u32, cp: u32, value: u32) {
        if (cn, cm, cp) == (7, 0, 4) {
            // Wait-for-interrupt
            self.cpu9.halt();
            return;
        }
        self.cp15.set(cn, cm, cp, value);
    }

    fn bios_active(&self) -> bool {
        self.bios.is_some()
    }

    fn bios_execute(&mut self, vector: u8) -> u16 {
        match self.bios.take() {
            Some(mut bios) => {
                let cycles = bios.execute(vector, CpuId::Arm9, self);
                self.bios = Some(bios);
                cycles
            }
            None => 3,
        }
    }

    fn bios_should_check(&self) -> bool {
        self.bios
            .as_ref()
            .is_some_and(|bios| bios.should_check(CpuId::Arm9))
    }

    fn bios_check_wait_flags(&mut self) {
        if let Some(mut bios) = self.bios.take() {
            bios.check_wait_flags(CpuId::Arm9, self);
            self.bios = Some(bios);
        }
    }

    fn dldi_patched(&self) -> bool {
        self.dldi.is_some()
    }

    fn dldi_startup(&mut self) -> u32 {
        self.with_dldi(|dldi, ds| dldi.startup(ds))
    }

    fn dldi_is_inserted(&mut self) -> u32 {
        self.with_dldi(|dldi, ds| dldi.is_inserted(ds))
    }

    fn dldi_read_sectors(&mut self, lba: u32, count: u32, buf: u32) -> u32 {
        self.with_dldi(|dldi, ds| dldi.read_sectors(CpuId::Arm9, lba, count, buf, ds))
    }

    fn dldi_write_sectors(&mut self, lba: u32, count: u32, buf: u32) -> u32 {
        self.with_dldi(|dldi, ds| dldi.write_sectors(CpuId::Arm9, lba, count, buf, ds))
    }

    fn dldi_clear_status(&mut self) -> u32 {
        self.with_dldi(|dldi, ds| dldi.clear_status(ds))
    }

    fn dldi_shutdown(&mut self) -> u32 {
        self.with_dldi(|dldi, ds| dldi.shutdown(ds))
    }
}

impl ArmSystem for Nds7 {
    const IS_ARM9: bool = false;

    fn cpur(&self) -> &Cpu<Self> {
        &self.cpu7
    }

    fn cpu(&mut self) -> &mut Cpu<Self> {
        &mut self.cpu7
    }

    fn get<T: RwType>(&mut self, addr: u32) -> T {
        memory::read::<Self, T>(self, addr)
    }

    fn set<T: RwType>(&mut self, addr: u32, value: T) {
        memory::write::<Self, T>(self, addr, value);
    }

    fn schedule_interrupt(&mut self, delay: u32) {
        self.scheduler
            .schedule(NdsEvent::Interrupt { arm9: false }, delay as TimeS);
    }

    fn gba_mode(&self) -> bool {
        self.gba_mode
    }

    fn bios_active(&self) -> bool {
        self.bios.is_some()
    }

    fn bios_execute(&mut self, vector: u8) -> u16 {
        match self.bios.take() {
            Some(mut bios) => {
                let cycles = bios.execute(vector, CpuId::Arm7, self);
                self.bios = Some(bios);
                cycles
            }
            None => 3,
        }
    }

    fn bios_should_check(&self) -> bool {
        self.bios
            .as_ref()
            .is_some_and(|bios| bios.should_check(CpuId::Arm7))
    }

    fn bios_check_wait_flags(&mut self) {
        if let Some(mut bios) = self.bios.take() {
            bios.check_wait_flags(CpuId::Arm7, self);
            self.bios = Some(bios);
        }
    }

    fn dldi_patched(&self) -> bool {
        self.dldi.is_some()
    }

    fn dldi_startup(&mut self) -> u32 {
        self.with_dldi(|dldi, ds| dldi.startup(ds))
    }

    fn dldi_is_inserted(&mut self) -> u32 {
        self.with_dldi(|dldi, ds| dldi.is_inserted(ds))
    }

    fn dldi_read_sectors(&mut self, lba: u32, count: u32, buf: u32) -> u32 {
        self.with_dldi(|dldi, ds| dldi.read_sectors(CpuId::Arm7, lba, count, buf, ds))
    }

    fn dldi_write_sectors(&mut self, lba: u32, count: u32, buf: u32) -> u32 {
        self.with_dldi(|dldi, ds| dldi.write_sectors(CpuId::Arm7, lba, count, buf, ds))
    }

    fn dldi_clear_status(&mut self) -> u32 {
        self.with_dldi(|dldi, ds| dldi.clear_status(ds))
    }

    fn dldi_shutdown(&mut self) -> u32 {
        self.with_dldi(|dldi, ds| dldi.shutdown(ds))
    }
}

impl crate::Nds {
    /// Run a DLDI callback with the take-call-restore pattern, so the
    /// back-end may access guest memory through the system.
    fn with_dldi(&mut self, call: impl FnOnce(&mut dyn crate::dldi::DldiDriver, &mut Self) -> u32) -> u32 {
        match self.dldi.take() {
            Some(mut dldi) => {
                let ret = call(dldi.as_mut(), self);
                self.dldi = Some(dldi);
                ret
            }
            None => 0,
        }
    }
}
