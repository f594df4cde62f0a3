//! Classfile reader: structural facts only
//!
//! Parses just enough of the classfile format to feed the classpath index:
//! constant pool, class hierarchy, member signatures and flags, outer-class
//! links from the `InnerClasses` attribute, and the method invocations
//! scanned out of each `Code` attribute (needed by hydration). Bytecode is
//! never rewritten; the parsed facts are immutable.

use crate::common::consts::MAGIC;
use crate::common::{Error, Result};
use crate::mapping::MemberRef;

use super::{ClassData, FieldData, MethodData};

mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
    pub const CONSTANT_METHODHANDLE: u8 = 15;
    pub const CONSTANT_METHODTYPE: u8 = 16;
    pub const CONSTANT_DYNAMIC: u8 = 17;
    pub const CONSTANT_INVOKEDYNAMIC: u8 = 18;
    pub const CONSTANT_MODULE: u8 = 19;
    pub const CONSTANT_PACKAGE: u8 = 20;
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class(u16),
    NameAndType(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    /// Tags the reader does not need to interpret
    Other,
    /// Second slot of a Long/Double entry
    Unusable,
}

struct Reader<'a> {
    class: &'a str,
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(class: &'a str, buf: &'a [u8]) -> Self {
        Self { class, buf, pos: 0 }
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::class_file_read(self.class, message)
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(self.err("unexpected end of class file"));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn skip(&mut self, n: usize) -> Result<()> {
        self.bytes(n).map(|_| ())
    }
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn read(reader: &mut Reader<'_>) -> Result<Self> {
        use constant_tags::*;
        let count = reader.u16()? as usize;
        let mut entries = vec![Constant::Unusable];
        while entries.len() < count {
            let tag = reader.u8()?;
            let constant = match tag {
                CONSTANT_UTF8 => {
                    let len = reader.u16()? as usize;
                    let raw = reader.bytes(len)?;
                    // Modified UTF-8; plain UTF-8 covers every name we need
                    Constant::Utf8(String::from_utf8_lossy(raw).into_owned())
                }
                CONSTANT_CLASS => Constant::Class(reader.u16()?),
                CONSTANT_NAMEANDTYPE => Constant::NameAndType(reader.u16()?, reader.u16()?),
                CONSTANT_METHODREF => Constant::MethodRef(reader.u16()?, reader.u16()?),
                CONSTANT_INTERFACEMETHODREF => {
                    Constant::InterfaceMethodRef(reader.u16()?, reader.u16()?)
                }
                CONSTANT_INTEGER | CONSTANT_FLOAT | CONSTANT_FIELDREF => {
                    reader.skip(4)?;
                    Constant::Other
                }
                CONSTANT_STRING | CONSTANT_METHODTYPE | CONSTANT_MODULE | CONSTANT_PACKAGE => {
                    reader.skip(2)?;
                    Constant::Other
                }
                CONSTANT_LONG | CONSTANT_DOUBLE => {
                    reader.skip(8)?;
                    entries.push(Constant::Other);
                    Constant::Unusable
                }
                CONSTANT_METHODHANDLE => {
                    reader.skip(3)?;
                    Constant::Other
                }
                CONSTANT_DYNAMIC | CONSTANT_INVOKEDYNAMIC => {
                    reader.skip(4)?;
                    Constant::Other
                }
                other => {
                    return Err(reader.err(format!("unknown constant pool tag {}", other)));
                }
            };
            entries.push(constant);
        }
        Ok(Self { entries })
    }

    fn get(&self, index: u16, class: &str) -> Result<&Constant> {
        self.entries
            .get(index as usize)
            .ok_or_else(|| Error::class_file_read(class, format!("constant index {} out of range", index)))
    }

    fn utf8(&self, index: u16, class: &str) -> Result<&str> {
        match self.get(index, class)? {
            Constant::Utf8(s) => Ok(s),
            _ => Err(Error::class_file_read(class, format!("constant {} is not Utf8", index))),
        }
    }

    fn class_name(&self, index: u16, class: &str) -> Result<&str> {
        match self.get(index, class)? {
            Constant::Class(name) => self.utf8(*name, class),
            _ => Err(Error::class_file_read(class, format!("constant {} is not Class", index))),
        }
    }

    fn name_and_type(&self, index: u16, class: &str) -> Result<(&str, &str)> {
        match self.get(index, class)? {
            Constant::NameAndType(name, desc) => {
                Ok((self.utf8(*name, class)?, self.utf8(*desc, class)?))
            }
            _ => Err(Error::class_file_read(
                class,
                format!("constant {} is not NameAndType", index),
            )),
        }
    }

    /// Resolve a Methodref/InterfaceMethodref into a member reference
    fn method_ref(&self, index: u16, class: &str) -> Result<Option<MemberRef>> {
        let (class_idx, nat_idx) = match self.get(index, class)? {
            Constant::MethodRef(c, n) | Constant::InterfaceMethodRef(c, n) => (*c, *n),
            _ => return Ok(None),
        };
        let owner = self.class_name(class_idx, class)?;
        let (name, desc) = self.name_and_type(nat_idx, class)?;
        Ok(Some(MemberRef::method(owner, name, desc)))
    }
}

/// Parse one classfile image into its structural facts
pub fn parse_class(bytes: &[u8]) -> Result<ClassData> {
    let mut reader = Reader::new("<unresolved>", bytes);
    if reader.u32()? != MAGIC {
        return Err(reader.err("bad magic number"));
    }
    reader.skip(4)?; // minor + major version
    let pool = ConstantPool::read(&mut reader)?;

    let access_flags = reader.u16()?;
    let this_class = reader.u16()?;
    let name = pool.class_name(this_class, "<unresolved>")?.to_string();
    let mut reader = Reader {
        class: &name,
        ..reader
    };

    let super_index = reader.u16()?;
    let super_name = if super_index == 0 {
        None
    } else {
        Some(pool.class_name(super_index, &name)?.to_string())
    };

    let interface_count = reader.u16()? as usize;
    let mut interfaces = Vec::with_capacity(interface_count);
    for _ in 0..interface_count {
        let idx = reader.u16()?;
        interfaces.push(pool.class_name(idx, &name)?.to_string());
    }

    let field_count = reader.u16()? as usize;
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        let flags = reader.u16()?;
        let name_idx = reader.u16()?;
        let desc_idx = reader.u16()?;
        skip_attributes(&mut reader)?;
        fields.push(FieldData {
            name: pool.utf8(name_idx, &name)?.to_string(),
            descriptor: pool.utf8(desc_idx, &name)?.to_string(),
            access_flags: flags,
        });
    }

    let method_count = reader.u16()? as usize;
    let mut methods = Vec::with_capacity(method_count);
    for _ in 0..method_count {
        let flags = reader.u16()?;
        let name_idx = reader.u16()?;
        let desc_idx = reader.u16()?;
        let invocations = read_method_attributes(&mut reader, &pool)?;
        methods.push(MethodData {
            name: pool.utf8(name_idx, &name)?.to_string(),
            descriptor: pool.utf8(desc_idx, &name)?.to_string(),
            access_flags: flags,
            invocations,
        });
    }

    let outer_class = read_outer_class(&mut reader, &pool, &name)?;

    Ok(ClassData {
        name,
        super_name,
        interfaces,
        outer_class,
        access_flags,
        fields,
        methods,
    })
}

fn skip_attributes(reader: &mut Reader<'_>) -> Result<()> {
    let count = reader.u16()? as usize;
    for _ in 0..count {
        reader.skip(2)?; // attribute name
        let len = reader.u32()? as usize;
        reader.skip(len)?;
    }
    Ok(())
}

fn read_method_attributes(reader: &mut Reader<'_>, pool: &ConstantPool) -> Result<Vec<MemberRef>> {
    let count = reader.u16()? as usize;
    let mut invocations = Vec::new();
    for _ in 0..count {
        let name_idx = reader.u16()?;
        let len = reader.u32()? as usize;
        let attr_name = pool.utf8(name_idx, reader.class)?;
        if attr_name == "Code" {
            let attr = reader.bytes(len)?;
            let mut code_reader = Reader::new(reader.class, attr);
            code_reader.skip(4)?; // max_stack + max_locals
            let code_len = code_reader.u32()? as usize;
            let code = code_reader.bytes(code_len)?;
            scan_invocations(code, pool, reader.class, &mut invocations)?;
            // exception table and nested attributes are irrelevant here
        } else {
            reader.skip(len)?;
        }
    }
    Ok(invocations)
}

fn read_outer_class(
    reader: &mut Reader<'_>,
    pool: &ConstantPool,
    class_name: &str,
) -> Result<Option<String>> {
    let count = reader.u16()? as usize;
    let mut outer = None;
    for _ in 0..count {
        let name_idx = reader.u16()?;
        let len = reader.u32()? as usize;
        let attr_name = pool.utf8(name_idx, class_name)?;
        if attr_name == "InnerClasses" {
            let attr = reader.bytes(len)?;
            let mut inner_reader = Reader::new(class_name, attr);
            let entries = inner_reader.u16()? as usize;
            for _ in 0..entries {
                let inner_info = inner_reader.u16()?;
                let outer_info = inner_reader.u16()?;
                inner_reader.skip(4)?; // inner name + flags
                if outer_info != 0
                    && pool.class_name(inner_info, class_name)? == class_name
                {
                    outer = Some(pool.class_name(outer_info, class_name)?.to_string());
                }
            }
        } else {
            reader.skip(len)?;
        }
    }
    // Nested classes compiled without InnerClasses metadata still follow
    // the `$` naming convention.
    if outer.is_none() {
        if let Some(idx) = class_name.rfind('$') {
            outer = Some(class_name[..idx].to_string());
        }
    }
    Ok(outer)
}

/// Walk the instruction stream of a Code attribute and collect every
/// invoked method reference.
fn scan_invocations(
    code: &[u8],
    pool: &ConstantPool,
    class_name: &str,
    out: &mut Vec<MemberRef>,
) -> Result<()> {
    let mut pc = 0usize;
    while pc < code.len() {
        let op = code[pc];
        if matches!(op, 0xb6 | 0xb7 | 0xb8 | 0xb9) {
            if pc + 2 >= code.len() {
                return Err(Error::class_file_read(class_name, "truncated invoke instruction"));
            }
            let index = u16::from_be_bytes([code[pc + 1], code[pc + 2]]);
            if let Some(target) = pool.method_ref(index, class_name)? {
                out.push(target);
            }
        }
        pc += instruction_length(op, code, pc)
            .ok_or_else(|| Error::class_file_read(class_name, format!("bad opcode 0x{:02x} at {}", op, pc)))?;
    }
    Ok(())
}

/// Length in bytes of the instruction at `pc`, operands included
fn instruction_length(op: u8, code: &[u8], pc: usize) -> Option<usize> {
    Some(match op {
        // one-byte operand
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => 2,
        // two-byte operand: constants, locals, branches, member refs
        0x11 | 0x13 | 0x14 | 0x84 | 0x99..=0xa8 | 0xb2..=0xb8 | 0xbb | 0xbd | 0xc0 | 0xc1
        | 0xc6 | 0xc7 => 3,
        // multianewarray
        0xc5 => 4,
        // invokeinterface, invokedynamic, goto_w, jsr_w
        0xb9 | 0xba | 0xc8 | 0xc9 => 5,
        // wide
        0xc4 => {
            if *code.get(pc + 1)? == 0x84 {
                6
            } else {
                4
            }
        }
        // tableswitch
        0xaa => {
            let pad = (4 - (pc + 1) % 4) % 4;
            let base = pc + 1 + pad;
            let low = read_i32(code, base + 4)?;
            let high = read_i32(code, base + 8)?;
            let count = (high as i64 - low as i64 + 1).max(0) as usize;
            1 + pad + 12 + 4 * count
        }
        // lookupswitch
        0xab => {
            let pad = (4 - (pc + 1) % 4) % 4;
            let base = pc + 1 + pad;
            let npairs = read_i32(code, base + 4)?.max(0) as usize;
            1 + pad + 8 + 8 * npairs
        }
        _ => 1,
    })
}

fn read_i32(code: &[u8], at: usize) -> Option<i32> {
    let b = code.get(at..at + 4)?;
    Some(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}
