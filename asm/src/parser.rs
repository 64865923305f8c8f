//! Statement recognizers for the cleaned assembly source.
//!
//! A line is either a label (optionally followed by a statement after
//! the colon), one of the directives, or an assembler command. The
//! recognizers here only classify text; the assembler core decides what
//! the pieces mean.

use hyp_arch::inst::Mnemonic;
use hyp_arch::reg::Reg;

use crate::error::AsmError;

/// A literal or a symbol reference in an operand position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Literal(i32),
    Symbol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Extern(Vec<String>),
    Global(Vec<String>),
    Section(String),
    Word(Vec<Value>),
    Skip(i32),
    End,
}

/// Operand of the jump family. The `immed` spelling is a bare symbol or
/// literal; memory-direct and the register forms carry a `*` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpOperand {
    Immediate(Value),
    RegDirect(u8),
    RegIndirect(u8),
    RegIndirectDisp(u8, Sign, Value),
    MemDirect(Value),
    PcRelative(String),
}

/// Operand of `ldr`/`str`. Here `immed` is spelled with `$` and the
/// bare symbol or literal means memory-direct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataOperand {
    Immediate(Value),
    RegDirect(u8),
    RegIndirect(u8),
    RegIndirectDisp(u8, Sign, Value),
    MemDirect(Value),
    PcRelative(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ZeroOp(Mnemonic),
    OneReg(Mnemonic, u8),
    Push(u8),
    Pop(u8),
    TwoReg(Mnemonic, u8, u8),
    Jump(Mnemonic, JumpOperand),
    Load(u8, DataOperand),
    Store(u8, DataOperand),
}

pub fn is_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Decimal (`-?[0-9]+`) or hexadecimal (`0x...`) literal.
pub fn parse_literal(s: &str) -> Option<i32> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return i32::from_str_radix(hex, 16).ok();
        }
        return None;
    }
    let digits = s.strip_prefix('-').unwrap_or(s);
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().ok();
    }
    None
}

pub fn parse_value(s: &str) -> Option<Value> {
    if let Some(lit) = parse_literal(s) {
        return Some(Value::Literal(lit));
    }
    if is_symbol(s) {
        return Some(Value::Symbol(s.to_string()));
    }
    None
}

fn parse_reg(s: &str) -> Option<u8> {
    Reg::parse(s).map(Reg::nibble)
}

/// `name:` or `name:<statement>` — returns the label and the remainder.
pub fn split_label(line: &str) -> Option<(&str, &str)> {
    let (head, rest) = line.split_once(':')?;
    if is_symbol(head) {
        Some((head, rest))
    } else {
        None
    }
}

fn parse_symbol_list(list: &str) -> Option<Vec<String>> {
    let names: Vec<&str> = list.split(',').collect();
    if names.iter().all(|n| is_symbol(n)) {
        Some(names.into_iter().map(str::to_string).collect())
    } else {
        None
    }
}

/// Recognizes a directive; `None` sends the line on to command parsing.
pub fn parse_directive(line: &str) -> Option<Directive> {
    if line == ".end" {
        return Some(Directive::End);
    }
    if let Some(rest) = line.strip_prefix(".extern ") {
        return parse_symbol_list(rest).map(Directive::Extern);
    }
    if let Some(rest) = line.strip_prefix(".global ") {
        return parse_symbol_list(rest).map(Directive::Global);
    }
    if let Some(rest) = line.strip_prefix(".section ") {
        if is_symbol(rest) {
            return Some(Directive::Section(rest.to_string()));
        }
        return None;
    }
    if let Some(rest) = line.strip_prefix(".word ") {
        let values: Option<Vec<Value>> = rest.split(',').map(parse_value).collect();
        return values.map(Directive::Word);
    }
    if let Some(rest) = line.strip_prefix(".skip ") {
        return parse_literal(rest).map(Directive::Skip);
    }
    None
}

pub fn parse_command(line: &str) -> Result<Command, AsmError> {
    let unknown = || AsmError::UnknownCommand(line.to_string());

    let (head, rest) = match line.split_once(' ') {
        Some((head, rest)) => (head, rest),
        None => {
            return match line {
                "halt" => Ok(Command::ZeroOp(Mnemonic::Halt)),
                "iret" => Ok(Command::ZeroOp(Mnemonic::Iret)),
                "ret" => Ok(Command::ZeroOp(Mnemonic::Ret)),
                _ => Err(unknown()),
            }
        }
    };

    match head {
        "int" | "not" => {
            let r = parse_reg(rest).ok_or_else(unknown)?;
            let mnemonic = if head == "int" {
                Mnemonic::Int
            } else {
                Mnemonic::Not
            };
            Ok(Command::OneReg(mnemonic, r))
        }
        "push" | "pop" => {
            let r = parse_reg(rest).ok_or_else(unknown)?;
            if head == "push" {
                Ok(Command::Push(r))
            } else {
                Ok(Command::Pop(r))
            }
        }
        "xchg" | "add" | "sub" | "mul" | "div" | "cmp" | "and" | "or" | "xor" | "test" | "shl"
        | "shr" => {
            let (r_dst, r_src) = rest.split_once(',').ok_or_else(unknown)?;
            let r_dst = parse_reg(r_dst).ok_or_else(unknown)?;
            let r_src = parse_reg(r_src).ok_or_else(unknown)?;
            let mnemonic = match head {
                "xchg" => Mnemonic::Xchg,
                "add" => Mnemonic::Add,
                "sub" => Mnemonic::Sub,
                "mul" => Mnemonic::Mul,
                "div" => Mnemonic::Div,
                "cmp" => Mnemonic::Cmp,
                "and" => Mnemonic::And,
                "or" => Mnemonic::Or,
                "xor" => Mnemonic::Xor,
                "test" => Mnemonic::Test,
                "shl" => Mnemonic::Shl,
                _ => Mnemonic::Shr,
            };
            Ok(Command::TwoReg(mnemonic, r_dst, r_src))
        }
        "call" | "jmp" | "jeq" | "jne" | "jgt" => {
            let mnemonic = match head {
                "call" => Mnemonic::Call,
                "jmp" => Mnemonic::Jmp,
                "jeq" => Mnemonic::Jeq,
                "jne" => Mnemonic::Jne,
                _ => Mnemonic::Jgt,
            };
            let operand = parse_jump_operand(rest)
                .ok_or_else(|| AsmError::AddressingUnsupported(line.to_string()))?;
            Ok(Command::Jump(mnemonic, operand))
        }
        "ldr" | "str" => {
            let (r_dst, operand) = rest.split_once(',').ok_or_else(unknown)?;
            let r_dst = parse_reg(r_dst).ok_or_else(unknown)?;
            let operand = parse_data_operand(operand)
                .ok_or_else(|| AsmError::AddressingUnsupported(line.to_string()))?;
            if head == "ldr" {
                Ok(Command::Load(r_dst, operand))
            } else {
                Ok(Command::Store(r_dst, operand))
            }
        }
        _ => Err(unknown()),
    }
}

fn parse_displacement(inner: &str) -> Option<(u8, Sign, Value)> {
    let (reg, sign, value) = if let Some((reg, value)) = inner.split_once(" + ") {
        (reg, Sign::Plus, value)
    } else if let Some((reg, value)) = inner.split_once(" - ") {
        (reg, Sign::Minus, value)
    } else {
        return None;
    };
    Some((parse_reg(reg)?, sign, parse_value(value)?))
}

fn parse_jump_operand(operand: &str) -> Option<JumpOperand> {
    if let Some(sym) = operand.strip_prefix('%') {
        if is_symbol(sym) {
            return Some(JumpOperand::PcRelative(sym.to_string()));
        }
        return None;
    }
    if let Some(starred) = operand.strip_prefix('*') {
        if let Some(r) = parse_reg(starred) {
            return Some(JumpOperand::RegDirect(r));
        }
        if let Some(inner) = starred.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if let Some(r) = parse_reg(inner) {
                return Some(JumpOperand::RegIndirect(r));
            }
            let (r, sign, value) = parse_displacement(inner)?;
            return Some(JumpOperand::RegIndirectDisp(r, sign, value));
        }
        return parse_value(starred).map(JumpOperand::MemDirect);
    }
    parse_value(operand).map(JumpOperand::Immediate)
}

fn parse_data_operand(operand: &str) -> Option<DataOperand> {
    if let Some(r) = parse_reg(operand) {
        return Some(DataOperand::RegDirect(r));
    }
    if let Some(inner) = operand.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if let Some(r) = parse_reg(inner) {
            return Some(DataOperand::RegIndirect(r));
        }
        let (r, sign, value) = parse_displacement(inner)?;
        return Some(DataOperand::RegIndirectDisp(r, sign, value));
    }
    if let Some(immediate) = operand.strip_prefix('$') {
        return parse_value(immediate).map(DataOperand::Immediate);
    }
    if let Some(sym) = operand.strip_prefix('%') {
        if is_symbol(sym) {
            return Some(DataOperand::PcRelative(sym.to_string()));
        }
        return None;
    }
    parse_value(operand).map(DataOperand::MemDirect)
}
