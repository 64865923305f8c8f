//! The assembler pass: symbol discovery and byte emission in one
//! traversal, followed by backpatching of forward references.

use indexmap::IndexMap;

use hyp_arch::inst::{AddrMode, Instruction, Mnemonic, UpdateMode};
use hyp_arch::object::{ObjectFile, Relocation, RelocKind, Section, Symbol, SECTION_ABS, SECTION_UNDEF};
use hyp_arch::reg::{Reg, REG_UNUSED};

use crate::cleaner::SourceLine;
use crate::error::AsmError;
use crate::parser::{self, Command, DataOperand, Directive, JumpOperand, Sign, Value};

/// A pending fixup for a symbol that was absent from the symbol table
/// at emission time. Records die on successful backpatching; a record
/// whose symbol never appears is an error.
#[derive(Debug, Clone)]
struct ForwardRef {
    section: String,
    /// Offset of the field to patch: the first payload byte, so the low
    /// byte for little-endian directive fields and the high byte for
    /// big-endian command payloads.
    offset: u32,
    kind: FixupKind,
    line: usize,
    symbol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FixupKind {
    Absolute { little_endian: bool, sign: Sign },
    PcRelative,
}

pub struct Assembler {
    symbols: IndexMap<String, Symbol>,
    sections: IndexMap<String, Section>,
    forward_refs: Vec<ForwardRef>,
    relocations: Vec<Relocation>,

    current_section: String,
    location_counter: u32,

    errors: Vec<(usize, AsmError)>,
    next_symbol_id: u32,
    next_section_id: u32,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        let mut assembler = Assembler {
            symbols: IndexMap::new(),
            sections: IndexMap::new(),
            forward_refs: Vec::new(),
            relocations: Vec::new(),
            current_section: String::new(),
            location_counter: 0,
            errors: Vec::new(),
            next_symbol_id: 0,
            next_section_id: 0,
        };

        // The two reserved sections: `UNDEF` collects undefined global
        // symbols, `ABS` holds symbols with absolute values. Ids 0 and 1.
        for name in [SECTION_UNDEF, SECTION_ABS] {
            let section_id = assembler.next_section_id;
            assembler.next_section_id += 1;
            assembler
                .sections
                .insert(name.to_string(), Section::new(section_id, name));

            let symbol_id = assembler.next_symbol_id;
            assembler.next_symbol_id += 1;
            assembler.symbols.insert(
                name.to_string(),
                Symbol {
                    id: symbol_id,
                    offset: 0,
                    defined: true,
                    local: true,
                    external: false,
                    section: name.to_string(),
                    name: name.to_string(),
                },
            );
        }
        assembler
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_errors(mut self) -> Vec<(usize, AsmError)> {
        self.errors.sort_by_key(|(line, _)| *line);
        self.errors
    }

    /// Runs the single logical pass over the cleaned source. Returns
    /// `true` when no errors were recorded, in which case backpatching
    /// may proceed.
    pub fn run_pass(&mut self, lines: &[SourceLine]) -> bool {
        'lines: for line in lines {
            let mut text = line.text.as_str();

            if let Some((label, rest)) = parser::split_label(text) {
                if let Err(e) = self.add_symbol(label) {
                    self.errors.push((line.number, e));
                }
                if rest.is_empty() {
                    continue;
                }
                text = rest;
            }

            match self.process_statement(text, line.number) {
                Ok(true) => break 'lines,
                Ok(false) => {}
                Err(e) => self.errors.push((line.number, e)),
            }
        }

        // Freeze the length of the last open section.
        if !self.current_section.is_empty() {
            let length = self.location_counter;
            if let Some(section) = self.sections.get_mut(&self.current_section) {
                section.length = length;
            }
        }
        self.errors.is_empty()
    }

    /// Resolves every surviving forward reference now that the whole
    /// symbol table is known, rewriting the recorded 2-byte fields.
    pub fn backpatch(&mut self) {
        let records = std::mem::take(&mut self.forward_refs);
        for record in records {
            if !self.symbols.contains_key(&record.symbol) {
                self.errors
                    .push((record.line, AsmError::UnresolvedSymbol(record.symbol)));
                continue;
            }

            // Reconstruct the location counter the reference was emitted
            // with, then resolve exactly as if the symbol had been known.
            let fill = match record.kind {
                FixupKind::PcRelative => {
                    let lc = record.offset - 3;
                    self.relative_addressing(&record.symbol, &record.section, lc, record.line)
                }
                FixupKind::Absolute {
                    little_endian,
                    sign,
                } => {
                    let lc = record.offset - if little_endian { 0 } else { 3 };
                    let value = self.absolute_addressing(
                        &record.symbol,
                        &record.section,
                        lc,
                        little_endian,
                        sign,
                        record.line,
                    );
                    match sign {
                        Sign::Minus => -value,
                        Sign::Plus => value,
                    }
                }
            } as u16;

            let little_endian = match record.kind {
                FixupKind::Absolute { little_endian, .. } => little_endian,
                FixupKind::PcRelative => false,
            };
            if let Some(section) = self.sections.get_mut(&record.section) {
                let offset = record.offset as usize;
                let [high, low] = fill.to_be_bytes();
                if little_endian {
                    section.data[offset] = low;
                    section.data[offset + 1] = high;
                } else {
                    section.data[offset] = high;
                    section.data[offset + 1] = low;
                }
            }
        }
    }

    pub fn to_object(&self) -> ObjectFile {
        ObjectFile {
            sections: self.sections.values().cloned().collect(),
            symbols: self.symbols.values().cloned().collect(),
            relocations: self.relocations.clone(),
        }
    }

    pub fn into_object(self) -> ObjectFile {
        ObjectFile {
            sections: self.sections.into_values().collect(),
            symbols: self.symbols.into_values().collect(),
            relocations: self.relocations,
        }
    }

    // ------------------------------------------------------------------
    // Statement dispatch

    /// Returns `Ok(true)` when `.end` terminates the pass.
    fn process_statement(&mut self, text: &str, line: usize) -> Result<bool, AsmError> {
        match parser::parse_directive(text) {
            Some(Directive::End) => return Ok(true),
            Some(Directive::Extern(names)) => {
                for name in names {
                    if let Err(e) = self.add_extern(&name) {
                        self.errors.push((line, e));
                    }
                }
            }
            Some(Directive::Global(names)) => {
                for name in names {
                    if let Err(e) = self.add_global(&name) {
                        self.errors.push((line, e));
                    }
                }
            }
            Some(Directive::Section(name)) => self.open_section(&name)?,
            Some(Directive::Word(values)) => self.emit_words(values, line)?,
            Some(Directive::Skip(count)) => self.emit_skip(count)?,
            None => self.emit_command(text, line)?,
        }
        Ok(false)
    }

    // ------------------------------------------------------------------
    // Symbol operations

    /// `name:` — defines `name` at the current location.
    fn add_symbol(&mut self, name: &str) -> Result<(), AsmError> {
        if self.current_section.is_empty() {
            return Err(AsmError::LabelOutsideSection);
        }

        if let Some(symbol) = self.symbols.get_mut(name) {
            if symbol.defined {
                return Err(AsmError::Redefinition);
            }
            if symbol.external {
                return Err(AsmError::ImportConflict);
            }
            // Only referenced so far; it gains its definition here.
            symbol.defined = true;
            symbol.offset = self.location_counter as i32;
            symbol.section = self.current_section.clone();
            return Ok(());
        }

        let id = self.next_symbol_id;
        self.next_symbol_id += 1;
        self.symbols.insert(
            name.to_string(),
            Symbol {
                id,
                offset: self.location_counter as i32,
                defined: true,
                local: true,
                external: false,
                section: self.current_section.clone(),
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// `.section name` — freezes the previous section and opens a new one.
    fn open_section(&mut self, name: &str) -> Result<(), AsmError> {
        if self.sections.contains_key(name) {
            // Re-opening a section would clash with its auto-symbol.
            return Err(AsmError::Redefinition);
        }

        if !self.current_section.is_empty() {
            let length = self.location_counter;
            if let Some(section) = self.sections.get_mut(&self.current_section) {
                section.length = length;
            }
        }

        self.location_counter = 0;
        self.current_section = name.to_string();

        let id = self.next_section_id;
        self.next_section_id += 1;
        self.sections
            .insert(name.to_string(), Section::new(id, name));

        // Every section owns a local symbol of the same name at offset 0.
        self.add_symbol(name)
    }

    /// `.global name` — marks `name` as exported.
    fn add_global(&mut self, name: &str) -> Result<(), AsmError> {
        if let Some(symbol) = self.symbols.get_mut(name) {
            if symbol.external {
                return Err(AsmError::ExternConflict);
            }
            symbol.local = false;
            return Ok(());
        }

        let id = self.next_symbol_id;
        self.next_symbol_id += 1;
        self.symbols.insert(
            name.to_string(),
            Symbol {
                id,
                offset: 0,
                defined: false,
                local: false,
                external: false,
                section: SECTION_UNDEF.to_string(),
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// `.extern name` — imports `name` from another module.
    fn add_extern(&mut self, name: &str) -> Result<(), AsmError> {
        if let Some(symbol) = self.symbols.get_mut(name) {
            if symbol.defined {
                return Err(AsmError::ImportOfLocal);
            }
            symbol.external = true;
            return Ok(());
        }

        let id = self.next_symbol_id;
        self.next_symbol_id += 1;
        self.symbols.insert(
            name.to_string(),
            Symbol {
                id,
                offset: 0,
                defined: false,
                local: false,
                external: true,
                section: SECTION_UNDEF.to_string(),
                name: name.to_string(),
            },
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Addressing resolution

    /// Absolute reference to `symbol` from `section` at offset `lc`.
    ///
    /// Known `ABS` symbols resolve to their value. Other known symbols
    /// produce a relocation record — against the owning section for
    /// local symbols, against the symbol itself for global or extern
    /// ones — and the returned fill value is the symbol's offset or 0
    /// respectively. Unknown symbols enqueue a forward reference and
    /// fill with 0; `sign` is applied at backpatch.
    fn absolute_addressing(
        &mut self,
        symbol: &str,
        section: &str,
        lc: u32,
        little_endian: bool,
        sign: Sign,
        line: usize,
    ) -> i32 {
        if let Some(found) = self.symbols.get(symbol) {
            if found.section == SECTION_ABS {
                return found.offset;
            }

            let global = !found.local || found.external;
            self.relocations.push(Relocation {
                section: section.to_string(),
                // Directive fields start at the low byte; command
                // payloads are big-endian, so +4 is their low byte.
                offset: lc + if little_endian { 0 } else { 4 },
                kind: if little_endian {
                    RelocKind::AbsoluteLe
                } else {
                    RelocKind::AbsoluteBe
                },
                symbol: if global {
                    found.name.clone()
                } else {
                    found.section.clone()
                },
            });
            return if global { 0 } else { found.offset };
        }

        self.forward_refs.push(ForwardRef {
            section: section.to_string(),
            // The first byte of the field: +3 points at the high byte of
            // a big-endian command payload.
            offset: lc + if little_endian { 0 } else { 3 },
            kind: FixupKind::Absolute {
                little_endian,
                sign,
            },
            line,
            symbol: symbol.to_string(),
        });
        0
    }

    /// PC-relative reference to `symbol` (`%symbol` operands).
    ///
    /// A symbol defined in the referencing section resolves to a plain
    /// displacement with no relocation record. Everything else carries
    /// a PC-relative relocation and an addend of −2 (the payload width),
    /// plus the symbol offset when it is a defined local elsewhere.
    fn relative_addressing(&mut self, symbol: &str, section: &str, lc: u32, line: usize) -> i32 {
        if let Some(found) = self.symbols.get(symbol) {
            if found.section == SECTION_ABS {
                return found.offset - 2;
            }
            if found.defined && found.section == section {
                return found.offset - (lc as i32 + 3) - 2;
            }

            let global = !found.local || found.external;
            self.relocations.push(Relocation {
                section: section.to_string(),
                offset: lc + 4,
                kind: RelocKind::PcRelBe,
                symbol: if global {
                    found.name.clone()
                } else {
                    found.section.clone()
                },
            });
            return if global { -2 } else { found.offset - 2 };
        }

        self.forward_refs.push(ForwardRef {
            section: section.to_string(),
            offset: lc + 3,
            kind: FixupKind::PcRelative,
            line,
            symbol: symbol.to_string(),
        });
        0
    }

    // ------------------------------------------------------------------
    // Emission

    fn emit_words(&mut self, values: Vec<Value>, line: usize) -> Result<(), AsmError> {
        if self.current_section.is_empty() {
            return Err(AsmError::DirectiveOutsideSection(".word"));
        }
        let section_name = self.current_section.clone();

        for value in values {
            let lc = self.location_counter;
            let fill = match value {
                Value::Literal(v) => v,
                Value::Symbol(s) => {
                    self.absolute_addressing(&s, &section_name, lc, true, Sign::Plus, line)
                }
            } as u16;

            if let Some(section) = self.sections.get_mut(&section_name) {
                section.data.extend_from_slice(&fill.to_le_bytes());
            }
            self.location_counter += 2;
        }
        Ok(())
    }

    fn emit_skip(&mut self, count: i32) -> Result<(), AsmError> {
        if self.current_section.is_empty() {
            return Err(AsmError::DirectiveOutsideSection(".skip"));
        }
        let count = count.max(0) as u32;
        if let Some(section) = self.sections.get_mut(&self.current_section) {
            section.data.resize(section.data.len() + count as usize, 0);
        }
        self.location_counter += count;
        Ok(())
    }

    fn emit_command(&mut self, text: &str, line: usize) -> Result<(), AsmError> {
        if self.current_section.is_empty() {
            return Err(AsmError::CommandOutsideSection(text.to_string()));
        }
        let command = parser::parse_command(text)?;
        let section_name = self.current_section.clone();
        let lc = self.location_counter;

        let inst = match command {
            Command::ZeroOp(m) => Instruction::zero_op(m),
            Command::OneReg(m, r) => Instruction::reg_only(m, r),
            Command::Push(r) => Instruction::push(r),
            Command::Pop(r) => Instruction::pop(r),
            Command::TwoReg(m, r_dst, r_src) => Instruction::two_reg(m, r_dst, r_src),
            Command::Jump(m, operand) => {
                let (r_src, mode, payload) =
                    self.jump_operand_fields(operand, &section_name, lc, line);
                Instruction::with_operand(m, REG_UNUSED, r_src, UpdateMode::None, mode, payload)
            }
            Command::Load(r_dst, operand) => {
                let (r_src, mode, payload) =
                    self.data_operand_fields(operand, &section_name, lc, line);
                Instruction::with_operand(Mnemonic::Ldr, r_dst, r_src, UpdateMode::None, mode, payload)
            }
            Command::Store(r_dst, operand) => {
                let (r_src, mode, payload) =
                    self.data_operand_fields(operand, &section_name, lc, line);
                Instruction::with_operand(Mnemonic::Str, r_dst, r_src, UpdateMode::None, mode, payload)
            }
        };

        self.location_counter += inst.size();
        if let Some(section) = self.sections.get_mut(&section_name) {
            inst.encode(&mut section.data);
        }
        Ok(())
    }

    fn absolute_payload(
        &mut self,
        value: Value,
        section: &str,
        lc: u32,
        sign: Sign,
        line: usize,
    ) -> u16 {
        let fill = match value {
            Value::Literal(v) => match sign {
                Sign::Minus => -v,
                Sign::Plus => v,
            },
            Value::Symbol(s) => self.absolute_addressing(&s, section, lc, false, sign, line),
        };
        fill as u16
    }

    fn jump_operand_fields(
        &mut self,
        operand: JumpOperand,
        section: &str,
        lc: u32,
        line: usize,
    ) -> (u8, AddrMode, u16) {
        match operand {
            JumpOperand::RegDirect(r) => (r, AddrMode::RegDir, 0),
            JumpOperand::RegIndirect(r) => (r, AddrMode::RegInd, 0),
            JumpOperand::Immediate(v) => {
                let payload = self.absolute_payload(v, section, lc, Sign::Plus, line);
                (REG_UNUSED, AddrMode::Immed, payload)
            }
            JumpOperand::MemDirect(v) => {
                let payload = self.absolute_payload(v, section, lc, Sign::Plus, line);
                (REG_UNUSED, AddrMode::MemDir, payload)
            }
            JumpOperand::RegIndirectDisp(r, sign, v) => {
                let payload = self.absolute_payload(v, section, lc, sign, line);
                (r, AddrMode::RegIndDisp, payload)
            }
            // Jumps spell PC-relative as regdir with displacement off pc.
            JumpOperand::PcRelative(sym) => {
                let payload = self.relative_addressing(&sym, section, lc, line) as u16;
                (Reg::PC.nibble(), AddrMode::RegDirDisp, payload)
            }
        }
    }

    fn data_operand_fields(
        &mut self,
        operand: DataOperand,
        section: &str,
        lc: u32,
        line: usize,
    ) -> (u8, AddrMode, u16) {
        match operand {
            DataOperand::RegDirect(r) => (r, AddrMode::RegDir, 0),
            DataOperand::RegIndirect(r) => (r, AddrMode::RegInd, 0),
            DataOperand::Immediate(v) => {
                let payload = self.absolute_payload(v, section, lc, Sign::Plus, line);
                (REG_UNUSED, AddrMode::Immed, payload)
            }
            DataOperand::MemDirect(v) => {
                let payload = self.absolute_payload(v, section, lc, Sign::Plus, line);
                (REG_UNUSED, AddrMode::MemDir, payload)
            }
            DataOperand::RegIndirectDisp(r, sign, v) => {
                let payload = self.absolute_payload(v, section, lc, sign, line);
                (r, AddrMode::RegIndDisp, payload)
            }
            // Load/store spell PC-relative as regind with displacement.
            DataOperand::PcRelative(sym) => {
                let payload = self.relative_addressing(&sym, section, lc, line) as u16;
                (Reg::PC.nibble(), AddrMode::RegIndDisp, payload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble_source;

    fn section<'a>(object: &'a ObjectFile, name: &str) -> &'a Section {
        object.sections.iter().find(|s| s.name == name).unwrap()
    }

    fn symbol<'a>(object: &'a ObjectFile, name: &str) -> &'a Symbol {
        object.symbols.iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn minimal_halt_program() {
        let object = assemble_source(".section text\nhalt\n.end\n").unwrap();
        assert_eq!(object.sections.len(), 3);
        assert_eq!(object.sections[0].name, SECTION_UNDEF);
        assert_eq!(object.sections[0].id, 0);
        assert_eq!(object.sections[1].name, SECTION_ABS);
        assert_eq!(object.sections[1].id, 1);

        let text = section(&object, "text");
        assert_eq!(text.id, 2);
        assert_eq!(text.length, 1);
        assert_eq!(text.data, vec![0x00]);

        let auto = symbol(&object, "text");
        assert!(auto.defined && auto.local && !auto.external);
        assert_eq!(auto.offset, 0);
        assert!(object.relocations.is_empty());
    }

    #[test]
    fn word_boundary_values() {
        let object =
            assemble_source(".section data\n.word 0x7FFF,-32768\n.end\n").unwrap();
        let data = section(&object, "data");
        assert_eq!(data.data, vec![0xFF, 0x7F, 0x00, 0x80]);
        assert_eq!(data.length, 4);
    }

    #[test]
    fn skip_zero_is_empty() {
        let object = assemble_source(".section data\n.skip 0\n.end\n").unwrap();
        assert_eq!(section(&object, "data").length, 0);
        assert!(section(&object, "data").data.is_empty());
    }

    #[test]
    fn word_symbol_makes_little_endian_relocation() {
        let object = assemble_source(
            ".section data\nx:.word 7\n.word x\n.end\n",
        )
        .unwrap();
        let data = section(&object, "data");
        // The second word holds the local symbol's offset verbatim.
        assert_eq!(data.data, vec![0x07, 0x00, 0x00, 0x00]);
        assert_eq!(
            object.relocations,
            vec![Relocation {
                section: "data".to_string(),
                offset: 2,
                kind: RelocKind::AbsoluteLe,
                symbol: "data".to_string(),
            }]
        );
    }

    #[test]
    fn forward_reference_is_backpatched() {
        let object = assemble_source(
            ".section text\njmp target\nhalt\ntarget:halt\n.end\n",
        )
        .unwrap();
        let text = section(&object, "text");
        assert_eq!(text.data, vec![0x50, 0xFF, 0x00, 0x00, 0x06, 0x00, 0x00]);

        // Backpatching re-resolved against a known local symbol, so the
        // relocation now points at the payload's low byte.
        assert_eq!(
            object.relocations,
            vec![Relocation {
                section: "text".to_string(),
                offset: 4,
                kind: RelocKind::AbsoluteBe,
                symbol: "text".to_string(),
            }]
        );
        assert_eq!(symbol(&object, "target").offset, 6);
    }

    #[test]
    fn pc_relative_same_section_needs_no_relocation() {
        let object = assemble_source(
            ".section text\nloop:halt\njmp %loop\n.end\n",
        )
        .unwrap();
        let text = section(&object, "text");
        // displacement = 0 - (1 + 3) - 2 = -6
        assert_eq!(text.data, vec![0x00, 0x50, 0xF7, 0x05, 0xFF, 0xFA]);
        assert!(object.relocations.is_empty());
    }

    #[test]
    fn pc_relative_forward_same_section() {
        let object = assemble_source(
            ".section text\njmp %next\nnext:halt\n.end\n",
        )
        .unwrap();
        let text = section(&object, "text");
        // The jump lands on the instruction right after the payload.
        assert_eq!(text.data, vec![0x50, 0xF7, 0x05, 0x00, 0x00, 0x00]);
        assert!(object.relocations.is_empty());
    }

    #[test]
    fn extern_reference_relocates_against_symbol() {
        let object = assemble_source(
            ".extern x\n.section text\nldr r0,x\n.end\n",
        )
        .unwrap();
        let text = section(&object, "text");
        assert_eq!(text.data, vec![0xA0, 0x0F, 0x04, 0x00, 0x00]);
        assert_eq!(
            object.relocations,
            vec![Relocation {
                section: "text".to_string(),
                offset: 4,
                kind: RelocKind::AbsoluteBe,
                symbol: "x".to_string(),
            }]
        );

        let x = symbol(&object, "x");
        assert!(x.external && !x.defined && !x.local);
        assert_eq!(x.section, SECTION_UNDEF);
    }

    #[test]
    fn pc_relative_extern_leaves_addend() {
        let object = assemble_source(
            ".extern far\n.section text\ncall %far\n.end\n",
        )
        .unwrap();
        let text = section(&object, "text");
        // -2 addend, big-endian.
        assert_eq!(text.data, vec![0x30, 0xF7, 0x05, 0xFF, 0xFE]);
        assert_eq!(object.relocations[0].kind, RelocKind::PcRelBe);
        assert_eq!(object.relocations[0].symbol, "far");
        assert_eq!(object.relocations[0].offset, 4);
    }

    #[test]
    fn push_pop_and_register_commands() {
        let object = assemble_source(
            ".section text\npush r0\npop r1\nnot psw\nadd r1,r2\nldr r3,[r1 + 2]\n.end\n",
        )
        .unwrap();
        let text = section(&object, "text");
        assert_eq!(
            text.data,
            vec![
                0xB0, 0x06, 0x12, // push r0
                0xA0, 0x16, 0x42, // pop r1
                0x80, 0x8F, // not psw
                0x70, 0x12, // add r1,r2
                0xA0, 0x31, 0x03, 0x00, 0x02, // ldr r3,[r1 + 2]
            ]
        );
    }

    #[test]
    fn negative_displacement_literal() {
        let object = assemble_source(".section text\njmp *[r1 - 4]\n.end\n").unwrap();
        let text = section(&object, "text");
        assert_eq!(text.data, vec![0x50, 0xF1, 0x03, 0xFF, 0xFC]);
    }

    #[test]
    fn unresolved_forward_reference_fails() {
        let errors = assemble_source(".section text\njmp nowhere\n.end\n").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, 2);
        assert!(matches!(errors[0].1, AsmError::UnresolvedSymbol(_)));
    }

    #[test]
    fn symbol_conflicts() {
        let errors =
            assemble_source(".section text\na:halt\na:halt\n.end\n").unwrap_err();
        assert!(matches!(errors[0].1, AsmError::Redefinition));

        let errors =
            assemble_source(".extern a\n.section text\na:halt\n.end\n").unwrap_err();
        assert!(matches!(errors[0].1, AsmError::ImportConflict));

        let errors =
            assemble_source(".extern a\n.global a\n.section text\nhalt\n.end\n").unwrap_err();
        assert!(matches!(errors[0].1, AsmError::ExternConflict));

        let errors =
            assemble_source(".section text\na:halt\n.extern a\n.end\n").unwrap_err();
        assert!(matches!(errors[0].1, AsmError::ImportOfLocal));
    }

    #[test]
    fn emission_outside_section_fails() {
        let errors = assemble_source("halt\n").unwrap_err();
        assert!(matches!(errors[0].1, AsmError::CommandOutsideSection(_)));

        let errors = assemble_source(".word 1\n").unwrap_err();
        assert!(matches!(
            errors[0].1,
            AsmError::DirectiveOutsideSection(".word")
        ));

        let errors = assemble_source("lbl:\n").unwrap_err();
        assert!(matches!(errors[0].1, AsmError::LabelOutsideSection));
    }

    #[test]
    fn end_stops_the_pass() {
        let object = assemble_source(".section text\nhalt\n.end\nnot a command\n").unwrap();
        assert_eq!(section(&object, "text").data, vec![0x00]);
    }

    #[test]
    fn global_then_definition_is_exported() {
        let object = assemble_source(
            ".global entry\n.section text\nentry:halt\n.end\n",
        )
        .unwrap();
        let entry = symbol(&object, "entry");
        assert!(entry.defined && !entry.local && !entry.external);
        assert_eq!(entry.section, "text");
    }

    #[test]
    fn global_reference_fills_zero_and_relocates_by_name() {
        let object = assemble_source(
            ".global entry\n.section text\njmp entry\nentry:halt\n.end\n",
        )
        .unwrap();
        let text = section(&object, "text");
        // Global symbols leave 0 in the field; the linker supplies the rest.
        assert_eq!(text.data, vec![0x50, 0xFF, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(object.relocations[0].symbol, "entry");
        assert_eq!(object.relocations[0].offset, 4);
    }
}
