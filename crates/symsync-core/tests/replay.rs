//! End-to-end: loader records in memory snapshots, decoded with the default
//! layout, rendered as GDB commands.

use symsync_core::events::{DebuggerEvent, EventBus, StopReason};
use symsync_core::gdb::GdbCommandWriter;
use symsync_core::layout::{LayoutInspector, RecordLayout};
use symsync_core::snapshot::{MemoryRegion, MemorySnapshot};
use symsync_core::sync::{SyncConfig, SyncController, Transition};
use symsync_core::types::Address;

const RECORD_POINTER: u64 = 0x2000_0000;
const RECORD: u64 = 0x2000_1000;
const SECTION_TABLE: u64 = 0x2000_2000;
const SECTION_NAMES: u64 = 0x2000_2100;
const DEBUG_LINK: u64 = 0x2000_3000;

struct App<'a>
{
    name: &'a str,
    entry: u32,
    sections: &'a [(&'a str, u32)],
    debug_link: &'a str,
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32)
{
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Lay out `app` the way the firmware's loader would.
fn snapshot(app: Option<&App<'_>>) -> MemorySnapshot
{
    let Some(app) = app else {
        return MemorySnapshot::from_regions(vec![MemoryRegion::new(RECORD_POINTER, vec![0; 4])]);
    };

    let mut link = app.debug_link.as_bytes().to_vec();
    link.push(0);
    while link.len() % 4 != 0 {
        link.push(0);
    }
    link.extend_from_slice(&0x5eed_u32.to_le_bytes());

    let mut record = vec![0u8; 0x6c];
    put_u32(&mut record, 0x00, app.sections.len() as u32);
    put_u32(&mut record, 0x04, SECTION_TABLE as u32);
    put_u32(&mut record, 0x08, link.len() as u32);
    put_u32(&mut record, 0x0c, DEBUG_LINK as u32);
    record[0x24..0x24 + app.name.len()].copy_from_slice(app.name.as_bytes());
    put_u32(&mut record, 0x68, app.entry);

    let mut table = vec![0u8; app.sections.len() * 8];
    let mut names = Vec::new();
    for (idx, (name, address)) in app.sections.iter().enumerate() {
        put_u32(&mut table, idx * 8, (SECTION_NAMES + names.len() as u64) as u32);
        put_u32(&mut table, idx * 8 + 4, *address);
        names.extend_from_slice(name.as_bytes());
        names.push(0);
    }

    MemorySnapshot::from_regions(vec![
        MemoryRegion::new(RECORD_POINTER, (RECORD as u32).to_le_bytes().to_vec()),
        MemoryRegion::new(RECORD, record),
        MemoryRegion::new(SECTION_TABLE, table),
        MemoryRegion::new(SECTION_NAMES, names),
        MemoryRegion::new(DEBUG_LINK, link),
    ])
}

const SNAKE: App<'static> = App {
    name: "Snake Game",
    entry: 0x2000_6a11,
    sections: &[(".text", 0x2000_6a00), (".rodata", 0x2000_7000), (".data", 0x2000_7400)],
    debug_link: "snake_game_d.elf",
};

const CLOCK: App<'static> = App {
    name: "Clock",
    entry: 0x2000_9001,
    sections: &[(".bss", 0x2000_9800), (".text", 0x2000_9000)],
    debug_link: "clock_d.elf",
};

#[test_log::test]
fn test_replay_snapshots()
{
    let bus = EventBus::new();
    let inspector = LayoutInspector::new(snapshot(None), Address::new(RECORD_POINTER), RecordLayout::default());
    let mut controller = SyncController::new(
        inspector,
        GdbCommandWriter::new(Vec::new()),
        bus.clone(),
        SyncConfig::default().with_elf_search_dir("apps"),
    );
    assert_eq!(controller.attach().unwrap(), Transition::Unchanged);

    for state in [Some(&SNAKE), Some(&SNAKE), Some(&CLOCK), None, None] {
        controller.target_mut().replace_memory(snapshot(state));
        assert!(bus.publish(DebuggerEvent::stopped(StopReason::Interrupt)));
        assert_eq!(controller.pump().unwrap(), 1);
    }
    controller.detach();

    let output = String::from_utf8(controller.loader().get_ref().clone()).unwrap();
    let commands: Vec<&str> = output.lines().collect();
    assert_eq!(
        commands,
        [
            "add-symbol-file -readnow apps/snake_game_d.elf 0x20006a00 -s .data 0x20007400 -s .rodata 0x20007000",
            "remove-symbol-file -a 0x20006a00",
            "add-symbol-file -readnow apps/clock_d.elf 0x20009000 -s .bss 0x20009800",
            "remove-symbol-file -a 0x20009000",
        ]
    );
}

#[test]
fn test_replay_tracks_decoded_descriptor()
{
    let inspector = LayoutInspector::new(snapshot(Some(&SNAKE)), Address::new(RECORD_POINTER), RecordLayout::default());
    let mut controller = SyncController::new(
        inspector,
        GdbCommandWriter::new(Vec::new()),
        EventBus::new(),
        SyncConfig::default(),
    );
    controller.reconcile().unwrap();

    let app = controller.tracked().unwrap();
    assert_eq!(app.name(), "Snake Game");
    assert_eq!(app.entry_address(), Address::new(0x2000_6a11));
    assert_eq!(app.text_address(), Address::new(0x2000_6a00));
    assert_eq!(app.debug_image_reference(), "snake_game_d.elf");
    assert_eq!(app.debug_image_checksum(), 0x5eed);
    assert_eq!(app.other_sections().len(), 2);
}
