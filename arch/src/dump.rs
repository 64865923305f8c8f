//! Hex-row formatting shared by the linker's `.hex` dump and the
//! emulator's memory sample: `aaaa: bb bb bb bb bb bb bb bb`, eight
//! bytes per row, the row labeled with the address of its first byte.

use std::io::{self, Write};

pub struct HexRowWriter<W: Write> {
    out: W,
    written: usize,
}

impl<W: Write> HexRowWriter<W> {
    pub fn new(out: W) -> Self {
        HexRowWriter { out, written: 0 }
    }

    pub fn push(&mut self, address: u32, byte: u8) -> io::Result<()> {
        if self.written % 8 == 0 {
            if self.written != 0 {
                writeln!(self.out)?;
            }
            write!(self.out, "{:04x}: ", address)?;
        }
        write!(self.out, "{:02x} ", byte)?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        if self.written != 0 {
            writeln!(self.out)?;
        }
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_of_eight() {
        let mut w = HexRowWriter::new(Vec::new());
        for i in 0..10u32 {
            w.push(0x0100 + i, i as u8).unwrap();
        }
        let out = String::from_utf8(w.finish().unwrap()).unwrap();
        assert_eq!(
            out,
            "0100: 00 01 02 03 04 05 06 07 \n0108: 08 09 \n"
        );
    }

    #[test]
    fn empty_writes_nothing() {
        let w = HexRowWriter::new(Vec::new());
        assert!(w.finish().unwrap().is_empty());
    }
}
