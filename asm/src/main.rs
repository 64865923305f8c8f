use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::Parser;

use hyp_asm::{assembler::Assembler, cleaner, dump, error};

#[derive(Parser, Debug)]
#[clap(name = "asm", version, about = "Assembler for the HYP-16 ISA")]
struct Args {
    /// Input assembly source
    input: String,

    /// Output relocatable object file
    #[clap(short, long, default_value = "assembler_output_generic.o")]
    output: String,
}

/// `program.o` gets a `program_text.o` sibling with the table dump.
fn text_dump_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("assembler_output");
    output.with_file_name(format!("{stem}_text.o"))
}

fn main() {
    let args = Args::parse();

    let source = match std::fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(_) => {
            println!("Can't open the file {}.", args.input);
            exit(-1);
        }
    };

    let lines = cleaner::clean_source(&source);
    let mut assembler = Assembler::new();
    if assembler.run_pass(&lines) {
        assembler.backpatch();
    }
    if assembler.has_errors() {
        error::print_diags(&args.input, &assembler.into_errors());
        exit(-1);
    }

    let object = assembler.into_object();
    let output = PathBuf::from(&args.output);
    if write_outputs(&object, &output).is_err() {
        println!("Can't open the file {} for writing.", args.output);
        exit(-1);
    }
}

fn write_outputs(object: &hyp_arch::object::ObjectFile, output: &Path) -> std::io::Result<()> {
    let mut text = BufWriter::new(File::create(text_dump_path(output))?);
    dump::write_text_dump(object, &mut text)?;
    text.flush()?;

    let mut binary = BufWriter::new(File::create(output)?);
    object.write_to(&mut binary)?;
    binary.flush()
}
