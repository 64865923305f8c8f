//! The relocatable object format shared by the assembler (producer) and
//! the linker (consumer).
//!
//! On disk an object file is three tables back to back: sections,
//! symbols, relocation records. Fixed-width integers are native-endian,
//! strings are `[u32 length][bytes]`. Sections and symbols are written
//! in ascending id order so that the reserved `UNDEF` (0) / `ABS` (1)
//! entries come first and user sections follow in declaration order.

use std::io::{self, Read, Write};

use thiserror::Error;

pub const SECTION_UNDEF: &str = "UNDEF";
pub const SECTION_ABS: &str = "ABS";

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("Unknown relocation type: {0}")]
    RelocType(String),

    #[error("Malformed string in object file")]
    BadString,
}

/// A named, contiguous byte container; the unit of aggregation at link
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: u32,
    pub length: u32,
    pub name: String,
    pub data: Vec<u8>,
}

impl Section {
    pub fn new(id: u32, name: &str) -> Self {
        Section {
            id,
            length: 0,
            name: name.to_string(),
            data: Vec::new(),
        }
    }
}

/// A named location resolved by assembler and linker cooperation.
///
/// `offset` is a byte offset within `section` for user sections, the
/// absolute value for `ABS` symbols and zero for `UNDEF` ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub id: u32,
    pub offset: i32,
    pub defined: bool,
    pub local: bool,
    pub external: bool,
    pub section: String,
    pub name: String,
}

/// Relocation kind; carries its payload endianness and addressing sense
/// intrinsically. On disk each kind is spelled as its `R_HYP_*` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    /// Absolute value in a little-endian directive field (`R_HYP_16`).
    AbsoluteLe,
    /// Absolute value in a big-endian command payload (`R_HYP_16_C`).
    AbsoluteBe,
    /// PC-relative value in a big-endian command payload (`R_HYP_16_PC_C`).
    PcRelBe,
}

impl RelocKind {
    pub fn tag(self) -> &'static str {
        match self {
            RelocKind::AbsoluteLe => "R_HYP_16",
            RelocKind::AbsoluteBe => "R_HYP_16_C",
            RelocKind::PcRelBe => "R_HYP_16_PC_C",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, ObjectError> {
        match tag {
            "R_HYP_16" => Ok(RelocKind::AbsoluteLe),
            "R_HYP_16_C" => Ok(RelocKind::AbsoluteBe),
            "R_HYP_16_PC_C" => Ok(RelocKind::PcRelBe),
            other => Err(ObjectError::RelocType(other.to_string())),
        }
    }

    pub fn is_little_endian(self) -> bool {
        matches!(self, RelocKind::AbsoluteLe)
    }

    pub fn is_pc_relative(self) -> bool {
        matches!(self, RelocKind::PcRelBe)
    }
}

/// A deferred fixup recording where a symbol's final address must be
/// written into a section. `offset` points at the byte where the low
/// payload byte lives; for big-endian kinds the high byte sits at
/// `offset - 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub section: String,
    pub offset: u32,
    pub kind: RelocKind,
    /// Section name when the referenced symbol is local, otherwise the
    /// symbol's own name.
    pub symbol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectFile {
    pub sections: Vec<Section>,
    pub symbols: Vec<Symbol>,
    pub relocations: Vec<Relocation>,
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_ne_bytes())
}

fn write_i32<W: Write>(w: &mut W, v: i32) -> io::Result<()> {
    w.write_all(&v.to_ne_bytes())
}

fn write_bool<W: Write>(w: &mut W, v: bool) -> io::Result<()> {
    w.write_all(&[v as u8])
}

fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_u32(w, s.len() as u32)?;
    w.write_all(s.as_bytes())
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_ne_bytes(buf))
}

fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_ne_bytes(buf))
}

fn read_bool<R: Read>(r: &mut R) -> io::Result<bool> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0] != 0)
}

fn read_bytes<R: Read>(r: &mut R, len: u32) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_string<R: Read>(r: &mut R) -> Result<String, ObjectError> {
    let len = read_u32(r)?;
    let bytes = read_bytes(r, len)?;
    String::from_utf8(bytes).map_err(|_| ObjectError::BadString)
}

impl ObjectFile {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut sections: Vec<&Section> = self.sections.iter().collect();
        sections.sort_by_key(|s| s.id);

        write_u32(w, sections.len() as u32)?;
        for section in sections {
            write_u32(w, section.id)?;
            write_u32(w, section.length)?;
            write_string(w, &section.name)?;
            write_u32(w, section.data.len() as u32)?;
            w.write_all(&section.data)?;
        }

        let mut symbols: Vec<&Symbol> = self.symbols.iter().collect();
        symbols.sort_by_key(|s| s.id);

        write_u32(w, symbols.len() as u32)?;
        for symbol in symbols {
            write_u32(w, symbol.id)?;
            write_i32(w, symbol.offset)?;
            write_bool(w, symbol.defined)?;
            write_bool(w, symbol.local)?;
            write_bool(w, symbol.external)?;
            write_string(w, &symbol.section)?;
            write_string(w, &symbol.name)?;
        }

        write_u32(w, self.relocations.len() as u32)?;
        for r in &self.relocations {
            write_string(w, &r.section)?;
            write_u32(w, r.offset)?;
            write_string(w, r.kind.tag())?;
            write_string(w, &r.symbol)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<ObjectFile, ObjectError> {
        let mut object = ObjectFile::default();

        let n_sections = read_u32(r)?;
        for _ in 0..n_sections {
            let id = read_u32(r)?;
            let length = read_u32(r)?;
            let name = read_string(r)?;
            let data_len = read_u32(r)?;
            let data = read_bytes(r, data_len)?;
            object.sections.push(Section {
                id,
                length,
                name,
                data,
            });
        }

        let n_symbols = read_u32(r)?;
        for _ in 0..n_symbols {
            let id = read_u32(r)?;
            let offset = read_i32(r)?;
            let defined = read_bool(r)?;
            let local = read_bool(r)?;
            let external = read_bool(r)?;
            let section = read_string(r)?;
            let name = read_string(r)?;
            object.symbols.push(Symbol {
                id,
                offset,
                defined,
                local,
                external,
                section,
                name,
            });
        }

        let n_relocs = read_u32(r)?;
        for _ in 0..n_relocs {
            let section = read_string(r)?;
            let offset = read_u32(r)?;
            let kind = RelocKind::from_tag(&read_string(r)?)?;
            let symbol = read_string(r)?;
            object.relocations.push(Relocation {
                section,
                offset,
                kind,
                symbol,
            });
        }
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ObjectFile {
        ObjectFile {
            sections: vec![
                Section::new(0, SECTION_UNDEF),
                Section::new(1, SECTION_ABS),
                Section {
                    id: 2,
                    length: 3,
                    name: "text".to_string(),
                    data: vec![0x00, 0x20, 0x40],
                },
            ],
            symbols: vec![
                Symbol {
                    id: 2,
                    offset: 0,
                    defined: true,
                    local: true,
                    external: false,
                    section: "text".to_string(),
                    name: "text".to_string(),
                },
                Symbol {
                    id: 3,
                    offset: 2,
                    defined: true,
                    local: false,
                    external: false,
                    section: "text".to_string(),
                    name: "entry".to_string(),
                },
                Symbol {
                    id: 4,
                    offset: 0,
                    defined: false,
                    local: false,
                    external: true,
                    section: SECTION_UNDEF.to_string(),
                    name: "helper".to_string(),
                },
            ],
            relocations: vec![Relocation {
                section: "text".to_string(),
                offset: 4,
                kind: RelocKind::AbsoluteBe,
                symbol: "entry".to_string(),
            }],
        }
    }

    #[test]
    fn roundtrip_is_byte_identical() {
        let object = sample();
        let mut first = Vec::new();
        object.write_to(&mut first).unwrap();

        let back = ObjectFile::read_from(&mut first.as_slice()).unwrap();
        let mut second = Vec::new();
        back.write_to(&mut second).unwrap();

        assert_eq!(first, second);
        assert_eq!(back.symbols.len(), 3);
        assert_eq!(back.relocations[0].kind, RelocKind::AbsoluteBe);
    }

    #[test]
    fn writer_orders_by_id() {
        let mut object = sample();
        object.sections.reverse();
        object.symbols.reverse();
        let mut bytes = Vec::new();
        object.write_to(&mut bytes).unwrap();

        let back = ObjectFile::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(back.sections[0].name, SECTION_UNDEF);
        assert_eq!(back.sections[1].name, SECTION_ABS);
        assert_eq!(back.sections[2].name, "text");
        assert!(back.symbols.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn reloc_tags() {
        for kind in [
            RelocKind::AbsoluteLe,
            RelocKind::AbsoluteBe,
            RelocKind::PcRelBe,
        ] {
            assert_eq!(RelocKind::from_tag(kind.tag()).unwrap(), kind);
        }
        assert!(RelocKind::from_tag("R_X86_64_PC32").is_err());
        assert!(RelocKind::AbsoluteLe.is_little_endian());
        assert!(!RelocKind::AbsoluteBe.is_little_endian());
        assert!(RelocKind::PcRelBe.is_pc_relative());
    }
}
