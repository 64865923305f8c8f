//! End-to-end runs through the whole toolchain: assemble sources, pass
//! the objects through the on-disk codec, link, pass the image through
//! its codec, then execute until halt.

use hyp_arch::image::ProgramImage;
use hyp_arch::object::ObjectFile;
use hyp_asm::assemble_source;
use hyp_emu::machine::{flags, Machine, PC, SP};
use hyp_linker::Linker;

/// The first input provides the interrupt vector table; entry 0 points
/// at `start`, so the emulator boots into the program.
const IVT: &str = ".extern start\n.section ivt\n.word start,0,0,0\n.end\n";

fn emulate(sources: &[&str]) -> Machine {
    let mut linker = Linker::new();
    for (i, source) in sources.iter().enumerate() {
        let object = assemble_source(source).expect("source must assemble");

        let mut bytes = Vec::new();
        object.write_to(&mut bytes).expect("object serializes");
        let object = ObjectFile::read_from(&mut bytes.as_slice()).expect("object deserializes");

        linker
            .add_object(object, &format!("input{i}.o"))
            .expect("object links");
    }
    linker.finish().expect("link succeeds");

    let mut bytes = Vec::new();
    linker.build_image().write_to(&mut bytes).expect("image serializes");
    let image = ProgramImage::read_from(&mut bytes.as_slice()).expect("image deserializes");

    let mut machine = Machine::new();
    machine.load_image(&image).expect("image loads");
    machine.boot();
    machine.run().expect("program halts cleanly");
    machine
}

#[test]
fn forward_reference_jump_skips_the_first_halt() {
    let machine = emulate(&[
        IVT,
        ".global start\n.section text\nstart:jmp target\nhalt\ntarget:halt\n.end\n",
    ]);

    // ivt occupies [0, 8); the jump target is the second halt at 14.
    assert_eq!(machine.reg(PC), 15);
    assert_eq!(machine.reg(SP), 0xFF00);
}

#[test]
fn stack_discipline_round_trip() {
    let machine = emulate(&[
        IVT,
        ".global start\n.section text\nstart:ldr r0,$5\npush r0\npop r1\nhalt\n.end\n",
    ]);

    assert_eq!(machine.reg(0), 5);
    assert_eq!(machine.reg(1), 5);
    assert_eq!(machine.reg(SP), 0xFF00);
}

#[test]
fn cross_file_extern_load() {
    let machine = emulate(&[
        IVT,
        ".global x\n.section data\n.skip 4\nx:.word 0x1234\n.end\n",
        ".extern x\n.global start\n.section text\nstart:ldr r0,x\nhalt\n.end\n",
    ]);

    assert_eq!(machine.reg(0), 0x1234);
}

#[test]
fn pc_relative_load_within_a_section() {
    let machine = emulate(&[
        IVT,
        ".global start\n.section text\nstart:ldr r2,%val\nhalt\nval:.word 77\n.end\n",
    ]);

    assert_eq!(machine.reg(2), 77);
}

#[test]
fn pc_relative_call_across_sections() {
    let machine = emulate(&[
        IVT,
        ".global start\n.section text\nstart:call %sub\nhalt\n.section lib\nsub:ldr r5,$9\nret\n.end\n",
    ]);

    assert_eq!(machine.reg(5), 9);
    assert_eq!(machine.reg(SP), 0xFF00);
}

#[test]
fn cmp_sets_the_documented_flags() {
    let machine = emulate(&[
        IVT,
        ".global start\n.section text\nstart:ldr r0,$3\nldr r1,$5\ncmp r0,r1\nhalt\n.end\n",
    ]);

    assert!(!machine.flag(flags::Z));
    assert!(machine.flag(flags::N));
    assert!(machine.flag(flags::C));
    assert!(!machine.flag(flags::O));
    assert_eq!(machine.psw(), 0x6000 | flags::N | flags::C);
}

#[test]
fn int_dispatches_through_the_vector_table() {
    // Entry 3 of the IVT names the handler; `int r0` with r0 == 3
    // pushes pc and psw and vectors there, `iret` comes back.
    let machine = emulate(&[
        ".extern start,isr\n.section ivt\n.word start,0,0,isr\n.end\n",
        ".global start,isr\n.section text\nstart:ldr r0,$3\nint r0\nldr r2,$1\nhalt\nisr:ldr r1,$7\niret\n.end\n",
    ]);

    assert_eq!(machine.reg(1), 7);
    assert_eq!(machine.reg(2), 1);
    assert_eq!(machine.reg(SP), 0xFF00);
}

#[test]
fn word_lists_and_skip_lay_out_data() {
    let machine = emulate(&[
        IVT,
        ".global table,tail\n.section data\ntable:.word 0x7FFF,-32768\n.skip 2\ntail:.word table\n.end\n",
        ".extern table,tail\n.global start\n.section text\nstart:ldr r0,tail\nldr r1,table\nhalt\n.end\n",
    ]);

    // data sits at [8, 16); `tail` holds `table`'s absolute address.
    assert_eq!(machine.reg(0), 8);
    assert_eq!(machine.reg(1), 0x7FFF);
}
