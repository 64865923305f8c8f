//! Human-readable dump of a relocatable object, written next to the
//! binary as `<stem>_text.o`.

use std::io::{self, Write};

use hyp_arch::dump::HexRowWriter;
use hyp_arch::object::{ObjectFile, RelocKind, Symbol};

fn symbol_type(symbol: &Symbol) -> &'static str {
    if symbol.local {
        "local"
    } else if symbol.defined {
        "global"
    } else if symbol.external {
        "extern"
    } else {
        "undef"
    }
}

pub fn write_text_dump<W: Write>(object: &ObjectFile, w: &mut W) -> io::Result<()> {
    writeln!(w, "Relocatable object file")?;

    writeln!(w, "\n\nSymbol table:")?;
    writeln!(w, "ID\tOffset\tType\tSection\tName")?;
    let mut symbols: Vec<&Symbol> = object.symbols.iter().collect();
    symbols.sort_by_key(|s| s.id);
    for symbol in symbols {
        writeln!(
            w,
            "{:04x}\t{:04x}\t{}\t{}\t{}",
            symbol.id,
            symbol.offset,
            symbol_type(symbol),
            symbol.section,
            symbol.name
        )?;
    }

    writeln!(w, "\n\nSection table:")?;
    writeln!(w, "ID\tName\tLength")?;
    let mut sections: Vec<_> = object.sections.iter().collect();
    sections.sort_by_key(|s| s.id);
    for section in &sections {
        writeln!(w, "{:04x}\t{}\t{:04x}", section.id, section.name, section.length)?;
    }

    writeln!(w, "\n\nSection data:")?;
    for section in &sections {
        if section.length == 0 {
            continue;
        }
        writeln!(w, "\nSection: {}", section.name)?;
        let mut rows = HexRowWriter::new(&mut *w);
        for (offset, byte) in section.data.iter().enumerate() {
            rows.push(offset as u32, *byte)?;
        }
        rows.finish()?;
    }

    writeln!(w, "\n\nRelocation table:")?;
    writeln!(w, "Offset\tType\tData/Command\tSymbol\tSection")?;
    for r in &object.relocations {
        writeln!(
            w,
            "{:04x}\t{}\t{}\t{}\t{}",
            r.offset,
            r.kind.tag(),
            if r.kind == RelocKind::AbsoluteLe { "D" } else { "C" },
            r.symbol,
            r.section
        )?;
    }
    Ok(())
}
