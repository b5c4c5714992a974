// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

//! System-level tests: boot, the dual-CPU drive, interrupt delivery
//! through the scheduler, and the video path.

use arm_cpu::{interface::ArmSystem, Cpu};

use crate::{
    graphics::{HEIGHT, WIDTH},
    scheduling::NdsEvent,
    Nds,
};

/// A no-op ARM program: mov r0, r0.
const NOP: u32 = 0xE1A0_0000;

fn with_programs(entry9: u32, entry7: u32) -> Nds {
    let mut ds = Nds::default();
    let mut nds9 = ds.nds9();
    nds9.set::<u32>(0x027F_FE24, entry9);
    nds9.set::<u32>(0x027F_FE34, entry7);
    ds.direct_boot();
    ds
}

fn set_program(ds: &mut Nds, addr: u32, words: &[u32]) {
    let mut nds9 = ds.nds9();
    for (i, word) in words.iter().enumerate() {
        nds9.set::<u32>(addr + (i as u32) * 4, *word);
    }
}

#[test]
fn cold_boot_lands_on_vectors() {
    let mut ds = Nds::default();
    ds.init();
    assert_eq!(ds.cpu9.cpsr, 0x0000_00D3);
    assert_eq!(ds.cpu9.registers[15], 0xFFFF_0000 + 4);
    assert_eq!(ds.cpu7.registers[15], 0 + 4);
    assert!(!ds.cpu9.ime && ds.cpu9.ie == 0 && ds.cpu9.irf == 0);
}

#[test]
fn direct_boot_seeds_state() {
    let mut ds = with_programs(0x0200_0800, 0x0238_0000);
    assert_eq!(ds.cpu9.cpsr, 0x0000_00DF);
    assert_eq!(ds.cpu9.registers[13], 0x0300_2F7C);
    assert_eq!(ds.cpu9.registers[15], 0x0200_0800 + 4);
    assert_eq!(ds.cpu7.registers[13], 0x0380_FD80);
    assert_eq!(ds.cpu7.registers[15], 0x0238_0000 + 4);
    // The CP15 state the BIOS would have left
    assert_eq!(ds.nds9().exception_base(), 0xFFFF_0000);
    assert_eq!(ds.cpu9.post_flg, 1);
}

#[test]
fn irf_acknowledge_through_the_bus() {
    let mut ds = Nds::default();
    ds.cpu9.irf = 0x1;
    let mut nds9 = ds.nds9();
    nds9.set::<u32>(0x0400_0214, 0x1);
    assert_eq!(ds.cpu9.irf, 0x0);
    // Acknowledging again stays clear
    let mut nds9 = ds.nds9();
    nds9.set::<u32>(0x0400_0214, 0x1);
    assert_eq!(ds.cpu9.irf, 0x0);
}

#[test]
fn ie_writes_are_masked() {
    let mut ds = Nds::default();
    let mut nds9 = ds.nds9();
    nds9.set::<u32>(0x0400_0210, 0xFFFF_FFFF);
    assert_eq!(ds.cpu9.ie, 0x003F_3F7F);

    let mut nds7 = ds.nds7();
    nds7.set::<u32>(0x0400_0210, 0xFFFF_FFFF);
    assert_eq!(ds.cpu7.ie, 0x01FF_3FFF);

    ds.cpu7.ie = 0;
    ds.gba_mode = true;
    let mut nds7 = ds.nds7();
    nds7.set::<u32>(0x0400_0210, 0xFFFF_FFFF);
    assert_eq!(ds.cpu7.ie, 0x3FFF);
}

#[test]
fn interrupt_delivery_through_scheduler() {
    let mut ds = with_programs(0x0200_0000, 0x0220_0000);
    set_program(&mut ds, 0x0200_0000, &[NOP; 4]);
    ds.cpu9.ime = true;
    ds.cpu9.ie = 1;
    ds.cpu9.cpsr &= !(1 << 7);

    let pre_cpsr = ds.cpu9.cpsr;
    Cpu::send_interrupt(&mut ds.nds9(), 0);

    // The deferred task sits one cycle out
    ds.scheduler.advance(1);
    let event = ds.scheduler.get_next_pending().unwrap();
    assert_eq!(event.kind, NdsEvent::Interrupt { arm9: true });
    event.kind.dispatch(&mut ds, event.late_by);

    assert_eq!(ds.cpu9.cpsr & 0x1F, 0x12);
    assert!(ds.cpu9.cpsr & (1 << 7) != 0);
    assert_eq!(ds.cpu9.registers[15], 0xFFFF_0000 + 0x18 + 4);
    assert_eq!(ds.cpu9.spsr(), pre_cpsr);
}

#[test]
fn arm7_interrupt_delay_is_doubled() {
    let mut ds = Nds::default();
    ds.cpu7.ime = true;
    ds.cpu7.ie = 1;
    ds.cpu7.cpsr &= !(1 << 7);
    Cpu::send_interrupt(&mut ds.nds7(), 0);

    ds.scheduler.advance(1);
    assert!(ds.scheduler.get_next_pending().is_none());
    ds.scheduler.advance(1);
    let event = ds.scheduler.get_next_pending().unwrap();
    assert_eq!(event.kind, NdsEvent::Interrupt { arm9: false });
}

#[test]
fn halted_arm7_wakes_without_ime() {
    let mut ds = Nds::default();
    ds.cpu7.halted = 1;
    ds.cpu7.ie = 1;
    Cpu::send_interrupt(&mut ds.nds7(), 0);
    assert_eq!(ds.cpu7.halted, 0);
    // And no delivery got scheduled: only the scanline event exists
    ds.scheduler.advance(4);
    assert!(matches!(
        ds.scheduler.get_next_pending(),
        None
    ));
}

#[test]
fn cycle_pacing_is_two_to_one() {
    let mut ds = with_programs(0x0200_0000, 0x0220_0000);
    // Both CPUs run straight-line NOPs; the ARM7 must retire half as
    // many opcodes per frame as the ARM9
    set_program(&mut ds, 0x0200_0000, &[NOP; 64]);
    set_program(&mut ds, 0x0220_0000, &[NOP; 64]);

    // First call arms the running flag, the second runs one frame
    ds.run_frame();
    ds.run_frame();

    let ops9 = (ds.cpu9.registers[15] - 4 - 0x0200_0000) / 4;
    let ops7 = (ds.cpu7.registers[15] - 4 - 0x0220_0000) / 4;
    assert!(ops9 > 1000, "ARM9 barely ran: {ops9}");
    let ratio = ops9 as f64 / ops7 as f64;
    assert!(
        (1.99..2.01).contains(&ratio),
        "ARM9 ran {ops9}, ARM7 ran {ops7}"
    );
}

#[test]
fn frame_drive_stops_at_frame_end() {
    let mut ds = with_programs(0x0200_0000, 0x0220_0000);
    ds.run_frame();
    ds.run_frame();
    // One full frame: back at line 0, with a fresh scanline pending
    assert_eq!(ds.vcount, 0);
    assert_eq!(
        ds.scheduler.now(),
        crate::scheduling::SCANLINE_CYCLES * crate::scheduling::LINES_PER_FRAME as u64
    );
}

#[test]
fn vblank_raises_interrupts() {
    let mut ds = with_programs(0x0200_0000, 0x0220_0000);
    ds.run_frame();
    ds.run_frame();
    assert!(ds.cpu9.irf & 1 != 0);
    assert!(ds.cpu7.irf & 1 != 0);
}

#[test]
fn gba_drive_runs_the_arm7_alone(){
    let mut ds = Nds::default();
    ds.gba_mode = true;
    let mut nds9 = ds.nds9();
    nds9.set::<u32>(0x027F_FE34, 0x0220_0000);
    Cpu::direct_boot(&mut ds.nds7());
    let pc9 = ds.cpu9.registers[15];

    ds.run_frame();
    ds.run_frame();
    assert!(ds.cpu7.registers[15] > 0x0220_0000 + 1000 * 4);
    assert_eq!(ds.cpu9.registers[15], pc9);
}

#[test]
fn reset_cycles_rebases_everything() {
    let mut ds = with_programs(0x0200_0000, 0x0220_0000);
    ds.run_frame();
    ds.run_frame();
    let ahead9 = ds.cpu9.cycles.saturating_sub(ds.scheduler.now());
    ds.reset_cycles();
    assert_eq!(ds.scheduler.now(), 0);
    assert_eq!(ds.cpu9.cycles, ahead9);
    // The pending scanline stamp moved in lockstep
    assert!(ds.scheduler.next_at() <= crate::scheduling::SCANLINE_CYCLES);
}

#[test]
fn framebuffer_has_full_dimensions() {
    let mut ds = Nds::default();
    // A visible backdrop color
    let mut nds9 = ds.nds9();
    nds9.set::<u16>(0x0500_0000, 0x1234);
    for line in 0..HEIGHT as u16 {
        let (gpu, memory) = (&mut ds.gpu, &ds.memory);
        gpu[0].draw_scanline(line, &memory.video(false));
        gpu[1].draw_scanline(line, &memory.video(true));
    }
    let fb = ds.gpu[0].framebuffer();
    assert_eq!(fb.len(), WIDTH * HEIGHT);
    // Display mode 0: every pixel is blank white
    assert!(fb.iter().all(|px| *px == 0xFFFF));

    // Normal mode with no layers: the opaque backdrop shows
    let mut nds9 = ds.nds9();
    nds9.set::<u32>(0x0400_0000, 0x0001_0000);
    for line in 0..HEIGHT as u16 {
        let (gpu, memory) = (&mut ds.gpu, &ds.memory);
        gpu[0].draw_scanline(line, &memory.video(false));
    }
    let fb = ds.gpu[0].framebuffer();
    assert!(fb.iter().all(|px| *px == (0x1234 | 0x8000)));
}

#[test]
fn text_background_renders_tiles() {
    let mut ds = Nds::default();
    let mut nds9 = ds.nds9();
    // Palette: color 1 = red
    nds9.set::<u16>(0x0500_0002, 0x001F);
    // DISPCNT: mode 0, BG0 on, normal display
    nds9.set::<u32>(0x0400_0000, 0x0001_0100);
    // BG0CNT: char base 1, screen base 2, 16-color
    nds9.set::<u16>(0x0400_0008, (2 << 8) | (1 << 2));
    // Map entry 0: tile 1, palette 0
    nds9.set::<u16>(0x0600_0000 + 2 * 0x800, 0x0001);
    // Tile 1: first row all color 1
    for i in 0..4 {
        nds9.set::<u8>(0x0600_4000 + 32 + i, 0x11);
    }

    let (gpu, memory) = (&mut ds.gpu, &ds.memory);
    gpu[0].draw_scanline(0, &memory.video(false));
    let fb = ds.gpu[0].framebuffer();
    for x in 0..8 {
        assert_eq!(fb[x], 0x001F | 0x8000, "pixel {x}");
    }
    // Color 0 of the tile is transparent; backdrop (color 0) shows
    assert_eq!(fb[8], 0x8000);
}

#[test]
fn master_brightness_applies() {
    let mut ds = Nds::default();
    let mut nds9 = ds.nds9();
    nds9.set::<u16>(0x0500_0000, 0x7FFF); // white backdrop
    nds9.set::<u32>(0x0400_0000, 0x0001_0000);
    // Darken by 8/16
    nds9.set::<u16>(0x0400_006C, 0x8008);
    let (gpu, memory) = (&mut ds.gpu, &ds.memory);
    gpu[0].draw_scanline(0, &memory.video(false));
    let px = ds.gpu[0].framebuffer()[0];
    assert_eq!(px & 0x7FFF, (16 << 10) | (16 << 5) | 16);

    // Lighten black by 16/16 saturates to white
    let mut nds9 = ds.nds9();
    nds9.set::<u16>(0x0500_0000, 0x0000);
    nds9.set::<u16>(0x0400_006C, 0x4010);
    let (gpu, memory) = (&mut ds.gpu, &ds.memory);
    gpu[0].draw_scanline(1, &memory.video(false));
    let px = ds.gpu[0].framebuffer()[WIDTH];
    assert_eq!(px & 0x7FFF, 0x7FFF);
}

#[test]
fn memory_regions_are_cpu_specific() {
    let mut ds = Nds::default();
    // The ARM7's private WRAM does not alias the shared bank
    let mut nds7 = ds.nds7();
    nds7.set::<u32>(0x0380_0000, 0xAABB_CCDD);
    nds7.set::<u32>(0x0300_0000, 0x1122_3344);
    assert_eq!(ds.nds7().get::<u32>(0x0380_0000), 0xAABB_CCDD);
    assert_eq!(ds.nds9().get::<u32>(0x0300_0000), 0x1122_3344);

    // Main RAM mirrors through its 4MB
    let mut nds9 = ds.nds9();
    nds9.set::<u32>(0x0200_0000, 77);
    assert_eq!(ds.nds9().get::<u32>(0x0240_0000), 77);
}
