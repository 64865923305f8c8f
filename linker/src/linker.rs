//! Section aggregation, address assignment and relocation application.

use std::io::{self, Write};

use indexmap::IndexMap;

use hyp_arch::dump::HexRowWriter;
use hyp_arch::image::{ProgramImage, Segment};
use hyp_arch::object::{ObjectFile, Relocation, Section, Symbol, SECTION_ABS, SECTION_UNDEF};
use hyp_arch::MMAP_REGISTERS_START;

use crate::error::LinkError;

#[derive(Debug)]
struct LinkedSection {
    record: Section,
    base_address: u32,
}

#[derive(Debug)]
struct LinkedSymbol {
    record: Symbol,
    file: String,
}

#[derive(Debug)]
struct LinkedReloc {
    record: Relocation,
    file: String,
}

/// One input file's contribution to an aggregated section.
#[derive(Debug)]
struct Piece {
    #[allow(dead_code)]
    length: u32,
    /// Offset of the contribution inside the aggregate; shifted to an
    /// absolute address once section bases are assigned.
    base: u32,
}

#[derive(Debug, Default)]
pub struct Linker {
    sections: IndexMap<String, LinkedSection>,
    symbols: IndexMap<String, LinkedSymbol>,
    externs: Vec<String>,
    relocations: Vec<LinkedReloc>,
    /// section name -> input file -> that file's piece of the section.
    pieces: IndexMap<String, IndexMap<String, Piece>>,
}

impl Linker {
    pub fn new() -> Self {
        Linker::default()
    }

    /// Consumes one input object. Inputs must be added in command-line
    /// order; aggregation appends bytes in that order and section ids
    /// are assigned on first encounter.
    pub fn add_object(&mut self, object: ObjectFile, file: &str) -> Result<(), LinkError> {
        for section in object.sections {
            self.add_section(section, file);
        }
        for symbol in object.symbols {
            self.add_symbol(symbol, file)?;
        }
        for record in object.relocations {
            self.relocations.push(LinkedReloc {
                record,
                file: file.to_string(),
            });
        }
        Ok(())
    }

    fn add_section(&mut self, section: Section, file: &str) {
        // The contribution starts where the aggregate currently ends.
        if section.name != SECTION_UNDEF {
            let base = self
                .sections
                .get(&section.name)
                .map(|s| s.record.length)
                .unwrap_or(0);
            self.pieces.entry(section.name.clone()).or_default().insert(
                file.to_string(),
                Piece {
                    length: section.length,
                    base,
                },
            );
        }

        if let Some(aggregate) = self.sections.get_mut(&section.name) {
            aggregate.record.length += section.length;
            aggregate.record.data.extend_from_slice(&section.data);
            return;
        }

        let id = match section.name.as_str() {
            SECTION_UNDEF => 0,
            SECTION_ABS => 1,
            _ => self.sections.len() as u32,
        };
        let name = section.name.clone();
        self.sections.insert(
            name.clone(),
            LinkedSection {
                record: Section { id, ..section },
                base_address: 0,
            },
        );

        // A fresh aggregate brings its section symbol along; its offset
        // becomes the base address once those are assigned.
        let symbol_id = match name.as_str() {
            SECTION_UNDEF => 0,
            SECTION_ABS => 1,
            _ => self.symbols.len() as u32,
        };
        self.symbols.insert(
            name.clone(),
            LinkedSymbol {
                record: Symbol {
                    id: symbol_id,
                    offset: 0,
                    defined: true,
                    local: true,
                    external: false,
                    section: name.clone(),
                    name,
                },
                file: file.to_string(),
            },
        );
    }

    fn add_symbol(&mut self, symbol: Symbol, file: &str) -> Result<(), LinkError> {
        // Externs are buffered and checked once every input is read.
        if symbol.external {
            self.externs.push(symbol.name);
            return Ok(());
        }
        // Section symbols mirror the aggregate's own entry.
        if symbol.name == symbol.section {
            return Ok(());
        }
        if self.symbols.contains_key(&symbol.name) {
            return Err(LinkError::MultipleDefinitions(symbol.name));
        }

        let id = self.symbols.len() as u32;
        self.symbols.insert(
            symbol.name.clone(),
            LinkedSymbol {
                record: Symbol { id, ..symbol },
                file: file.to_string(),
            },
        );
        Ok(())
    }

    /// Runs the post-intake phases: extern resolution, base-address
    /// assignment and relocation application.
    pub fn finish(&mut self) -> Result<(), LinkError> {
        self.resolve_externs()?;
        self.assign_base_addresses()?;
        self.apply_relocations();
        Ok(())
    }

    fn resolve_externs(&self) -> Result<(), LinkError> {
        for name in &self.externs {
            if !self.symbols.contains_key(name) {
                return Err(LinkError::UnresolvedExtern(name.clone()));
            }
        }
        Ok(())
    }

    fn assign_base_addresses(&mut self) -> Result<(), LinkError> {
        let mut ordered: Vec<(u32, String)> = self
            .sections
            .values()
            .map(|s| (s.record.id, s.record.name.clone()))
            .collect();
        ordered.sort();

        let mut cursor: u32 = 0;
        for (_, name) in ordered {
            // The reserved sections generate no content.
            if name == SECTION_UNDEF || name == SECTION_ABS {
                continue;
            }
            let Some(section) = self.sections.get_mut(&name) else {
                continue;
            };
            section.base_address = cursor;
            let base = cursor;
            let length = section.record.length;
            cursor += length;

            if length > 0 && base + length > MMAP_REGISTERS_START as u32 {
                return Err(LinkError::SectionOverlap(name));
            }

            // Piece offsets become absolute addresses of each file's
            // contribution.
            if let Some(pieces) = self.pieces.get_mut(&name) {
                for piece in pieces.values_mut() {
                    piece.base += base;
                }
            }
        }

        // Re-home the symbols: a section symbol takes its base address,
        // anything else moves by the base of its file's contribution.
        // `ABS` symbols keep their absolute values.
        for linked in self.symbols.values_mut() {
            let symbol = &mut linked.record;
            if symbol.name == symbol.section {
                if let Some(section) = self.sections.get(&symbol.name) {
                    symbol.offset = section.base_address as i32;
                }
            } else if symbol.section != SECTION_ABS {
                let piece_base = self
                    .pieces
                    .get(&symbol.section)
                    .and_then(|pieces| pieces.get(&linked.file))
                    .map(|piece| piece.base)
                    .unwrap_or(0);
                symbol.offset += piece_base as i32;
            }
        }
        Ok(())
    }

    fn apply_relocations(&mut self) {
        // Translate in-file offsets into offsets from the start of the
        // aggregated section's data buffer: the piece shift and the
        // section base cancel once both are applied.
        for linked in &mut self.relocations {
            let record = &mut linked.record;
            let piece_base = self
                .pieces
                .get(&record.section)
                .and_then(|pieces| pieces.get(&linked.file))
                .map(|piece| piece.base)
                .unwrap_or(0);
            let section_base = self
                .sections
                .get(&record.section)
                .map(|s| s.base_address)
                .unwrap_or(0);
            record.offset = record.offset + piece_base - section_base;
        }

        let relocations = std::mem::take(&mut self.relocations);
        let mut survivors = Vec::new();

        for linked in relocations {
            let record = &linked.record;

            // A record against a section name stands for a local symbol:
            // its addition is that file's contribution base. Globals and
            // externs use the resolved symbol's final offset.
            let addition: u32 = if self.sections.contains_key(&record.symbol) {
                self.pieces
                    .get(&record.symbol)
                    .and_then(|pieces| pieces.get(&linked.file))
                    .map(|piece| piece.base)
                    .unwrap_or(0)
            } else {
                self.symbols
                    .get(&record.symbol)
                    .map(|s| s.record.offset as u32)
                    .unwrap_or(0)
            };

            let little_endian = record.kind.is_little_endian();
            let mut address: u32 = 0;
            let mut intra_section = false;
            if record.kind.is_pc_relative() {
                // The high byte of the big-endian field is the patch
                // site; its absolute address gets subtracted.
                let field = if little_endian {
                    record.offset
                } else {
                    record.offset - 1
                };
                address = field
                    + self
                        .sections
                        .get(&record.section)
                        .map(|s| s.base_address)
                        .unwrap_or(0);

                // A PC-relative reference into its own section became an
                // absolute displacement; the record dies here.
                intra_section = self
                    .symbols
                    .get(&record.symbol)
                    .map(|s| s.record.section == record.section)
                    .unwrap_or(false);
            }

            if let Some(section) = self.sections.get_mut(&record.section) {
                let offset = record.offset as usize;
                let data = &mut section.record.data;
                let (low, high) = if little_endian {
                    (offset, offset + 1)
                } else {
                    (offset, offset - 1)
                };
                let stored = u16::from_le_bytes([data[low], data[high]]);
                let patched = stored
                    .wrapping_add(addition as u16)
                    .wrapping_sub(address as u16);
                data[low] = patched as u8;
                data[high] = (patched >> 8) as u8;
            }

            if !intra_section {
                survivors.push(linked);
            }
        }
        self.relocations = survivors;
    }

    // ------------------------------------------------------------------
    // Output

    /// User sections in id order, each with its payload and base address.
    pub fn build_image(&self) -> ProgramImage {
        let mut ordered: Vec<&LinkedSection> = self.sections.values().collect();
        ordered.sort_by_key(|s| s.record.id);

        ProgramImage {
            segments: ordered
                .into_iter()
                .filter(|s| s.record.name != SECTION_UNDEF && s.record.name != SECTION_ABS)
                .map(|s| Segment {
                    data: s.record.data.clone(),
                    base_address: s.base_address,
                })
                .collect(),
        }
    }

    /// Textual dump of the loaded bytes, eight per row.
    pub fn write_hex_dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut ordered: Vec<&LinkedSection> = self.sections.values().collect();
        ordered.sort_by_key(|s| s.record.id);

        let mut rows = HexRowWriter::new(w);
        for section in ordered {
            if section.record.length == 0 {
                continue;
            }
            for (i, byte) in section.record.data.iter().enumerate() {
                rows.push(section.base_address + i as u32, *byte)?;
            }
        }
        rows.finish()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Introspection (used by the tests)

    pub fn section_base(&self, name: &str) -> Option<u32> {
        self.sections.get(name).map(|s| s.base_address)
    }

    pub fn section_data(&self, name: &str) -> Option<&[u8]> {
        self.sections.get(name).map(|s| s.record.data.as_slice())
    }

    pub fn symbol_offset(&self, name: &str) -> Option<i32> {
        self.symbols.get(name).map(|s| s.record.offset)
    }
}
