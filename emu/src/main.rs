use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::process::exit;

use clap::Parser;
use color_print::cprintln;

use hyp_arch::image::ProgramImage;
use hyp_emu::machine::{Machine, PC};
use hyp_emu::EmuError;

const MEMORY_DUMP_PATH: &str = "emulator_out_memory_sample.hex";

#[derive(Parser, Debug)]
#[clap(name = "emulator", version, about = "Emulator for HYP-16 program images")]
struct Args {
    /// Input program image
    input: String,
}

fn main() {
    let args = Args::parse();
    let mut machine = Machine::new();

    if let Err(error) = run(&args, &mut machine) {
        print_failure(&machine, &error);
        exit(-1);
    }
    if write_memory_dump_file(&machine).is_err() {
        println!("{} opening failed.", MEMORY_DUMP_PATH);
        exit(-1);
    }
}

fn write_memory_dump_file(machine: &Machine) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(MEMORY_DUMP_PATH)?);
    machine.write_memory_dump(&mut out)?;
    out.flush()
}

fn run(args: &Args, machine: &mut Machine) -> Result<(), EmuError> {
    let file = File::open(&args.input).map_err(|_| EmuError::OpenFailed(args.input.clone()))?;
    let image = ProgramImage::read_from(&mut BufReader::new(file))?;

    machine.load_image(&image)?;
    machine.boot();
    machine.run()?;

    println!("Emulated processor executed halt instruction");
    println!("Emulated processor state: psw=0b{:016b}", machine.psw());
    for r in 0..8 {
        print!("r{}=0x{:04x}", r, machine.reg(r));
        if r % 4 == 3 {
            println!();
        } else {
            print!("\t");
        }
    }
    Ok(())
}

fn print_failure(machine: &Machine, error: &EmuError) {
    cprintln!("<red,bold>Emulating errors:</>");
    println!("{}", error);
    println!();
    println!("Unsuccessful instruction:");
    println!("Instruction at: 0x{:04x}", machine.reg(PC));
    for r in 0..8 {
        println!("r{} = 0x{:04x}", r, machine.reg(r));
    }
    println!("psw = 0x{:04x}", machine.psw());
}
