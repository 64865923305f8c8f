//! The executable program image emitted by the linker and consumed by
//! the emulator: a sequence of program segments, each a byte payload
//! with a base virtual address. No symbol or relocation information
//! survives into an image.

use std::io::{self, Read, Write};

/// One loadable segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub data: Vec<u8>,
    pub base_address: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&(self.segments.len() as u32).to_ne_bytes())?;
        for segment in &self.segments {
            w.write_all(&(segment.data.len() as u32).to_ne_bytes())?;
            w.write_all(&segment.data)?;
            w.write_all(&segment.base_address.to_ne_bytes())?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<ProgramImage> {
        let mut buf = [0u8; 4];
        r.read_exact(&mut buf)?;
        let n_segments = u32::from_ne_bytes(buf);

        let mut image = ProgramImage::default();
        for _ in 0..n_segments {
            r.read_exact(&mut buf)?;
            let mut data = vec![0u8; u32::from_ne_bytes(buf) as usize];
            r.read_exact(&mut data)?;
            r.read_exact(&mut buf)?;
            image.segments.push(Segment {
                data,
                base_address: u32::from_ne_bytes(buf),
            });
        }
        Ok(image)
    }
}
