use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::Parser;
use color_print::cprintln;

use hyp_arch::object::ObjectFile;
use hyp_linker::{LinkError, Linker};

#[derive(Parser, Debug)]
#[clap(name = "linker", version, about = "Linker for HYP-16 relocatable objects")]
struct Args {
    /// Input relocatable object files, linked in the given order
    input: Vec<String>,

    /// Produce an executable image with sections placed one after another
    #[clap(long)]
    hex: bool,

    /// Produce a relocatable output instead of an executable (unimplemented)
    #[clap(long)]
    relocatable: bool,

    /// Place a section at a fixed address, e.g. text@0x4000 (unimplemented)
    #[clap(long, value_name = "SECTION@HEXADDR")]
    place: Vec<String>,

    /// Output program image
    #[clap(short, long, default_value = "linker_output_generic.o")]
    output: String,
}

/// `program.hex` gets a `program_text.hex` sibling with the byte dump.
fn hex_dump_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("linker_output");
    output.with_file_name(format!("{stem}_text.hex"))
}

fn main() {
    let args = Args::parse();

    if args.relocatable {
        println!("-relocatable is not implemented.");
        exit(-1);
    }
    if !args.place.is_empty() {
        println!("-place is not implemented.");
        exit(-1);
    }
    if !args.hex {
        println!("Either -relocatable or -hex has to be used.");
        exit(-1);
    }
    if args.input.is_empty() {
        println!("Input files paths are not specified.");
        exit(-1);
    }

    if let Err(error) = run(&args) {
        cprintln!("<red,bold>Linking errors:</>");
        println!("{}", error);
        exit(-1);
    }
}

fn run(args: &Args) -> Result<(), LinkError> {
    let mut linker = Linker::new();
    for path in &args.input {
        let file = File::open(path).map_err(|_| LinkError::OpenFailed(path.clone()))?;
        let object = ObjectFile::read_from(&mut BufReader::new(file))?;
        linker.add_object(object, path)?;
    }
    linker.finish()?;

    let output = PathBuf::from(&args.output);
    let mut hex = BufWriter::new(
        File::create(hex_dump_path(&output))
            .map_err(|_| LinkError::OpenFailed(args.output.clone()))?,
    );
    linker.write_hex_dump(&mut hex)?;
    hex.flush()?;

    let mut binary = BufWriter::new(
        File::create(&output).map_err(|_| LinkError::OpenFailed(args.output.clone()))?,
    );
    linker.build_image().write_to(&mut binary)?;
    binary.flush()?;
    Ok(())
}
