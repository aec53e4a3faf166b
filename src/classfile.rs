//! JVM class-file decoder producing suspendability metadata records.
//!
//! Only the pieces the database needs are decoded: this-class and super-class
//! names, direct interfaces, and per-method suspend classifications derived
//! from each method's `Exceptions` attribute. A method whose throws clause
//! names the suspend-marker exception is recorded as `normal` (may suspend);
//! every other declared method is recorded as `none`. Method bodies are
//! never inspected.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::DbConfig;
use crate::entry::{ClassEntry, MethodKey};
use crate::suspend::SuspendType;

const ACC_SYNCHRONIZED: u16 = 0x0020;
const ACC_NATIVE: u16 = 0x0100;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid class file magic header")]
    BadMagic,
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstant { tag: u8 },
    #[error("invalid constant pool index {index}")]
    BadConstantIndex { index: u16 },
    #[error("invalid UTF-8 string in constant pool: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The class cannot be safely analyzed or rewritten. Never swallowed:
    /// scanning propagates this variant unchanged to the caller.
    #[error("class {class} cannot be instrumented: {reason}")]
    Unrecoverable { class: String, reason: String },
}

impl DecodeError {
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, DecodeError::Unrecoverable { .. })
    }
}

/// Everything the scan coordinator needs from one decoded class. The
/// instrumentation flags are opaque to the database; they only steer the
/// work-list decision.
#[derive(Debug, Clone)]
pub struct DecodedClass {
    pub name: String,
    pub entry: ClassEntry,
    pub needs_instrumentation: bool,
    pub already_instrumented: bool,
}

#[derive(Debug, Clone)]
pub struct ClassFileDecoder {
    marker_exception: String,
    instrumented_attribute: String,
    allow_monitors: bool,
}

impl ClassFileDecoder {
    pub fn new(config: &DbConfig) -> Self {
        Self {
            marker_exception: config.marker_exception.clone(),
            instrumented_attribute: config.instrumented_attribute.clone(),
            allow_monitors: config.allow_monitors,
        }
    }

    pub fn decode_full(&self, bytes: &[u8]) -> Result<DecodedClass, DecodeError> {
        let mut reader = Reader::new(bytes);
        reader.expect_magic()?;
        let _minor = reader.read_u2()?;
        let _major = reader.read_u2()?;
        let pool = ConstantPool::parse(&mut reader)?;

        let _access_flags = reader.read_u2()?;
        let this_class = reader.read_u2()?;
        let super_class = reader.read_u2()?;
        let name = pool.class_name(this_class)?;
        // Index 0 is reserved for the root object type, the only class
        // without a superclass.
        let super_name = if super_class == 0 {
            None
        } else {
            Some(pool.class_name(super_class)?)
        };

        let interfaces_count = reader.read_u2()?;
        let mut interfaces = Vec::with_capacity(interfaces_count as usize);
        for _ in 0..interfaces_count {
            interfaces.push(pool.class_name(reader.read_u2()?)?);
        }

        let fields_count = reader.read_u2()?;
        for _ in 0..fields_count {
            skip_member(&mut reader)?;
        }

        let mut methods = BTreeMap::new();
        let mut needs_instrumentation = false;
        let methods_count = reader.read_u2()?;
        for _ in 0..methods_count {
            let access_flags = reader.read_u2()?;
            let method_name = pool.utf8(reader.read_u2()?)?.to_string();
            let method_desc = pool.utf8(reader.read_u2()?)?.to_string();

            let mut suspendable = false;
            let attributes_count = reader.read_u2()?;
            for _ in 0..attributes_count {
                let attribute_name = pool.utf8(reader.read_u2()?)?;
                let length = reader.read_u4()? as usize;
                if attribute_name == "Exceptions" {
                    let thrown = reader.read_u2()?;
                    for _ in 0..thrown {
                        let exception = pool.class_name(reader.read_u2()?)?;
                        if exception == self.marker_exception {
                            suspendable = true;
                        }
                    }
                    let consumed = 2 + 2 * thrown as usize;
                    if consumed < length {
                        reader.skip(length - consumed)?;
                    }
                } else {
                    reader.skip(length)?;
                }
            }

            if suspendable {
                if access_flags & ACC_NATIVE != 0 {
                    return Err(DecodeError::Unrecoverable {
                        class: name,
                        reason: format!(
                            "native method {method_name}{method_desc} declares {}",
                            self.marker_exception
                        ),
                    });
                }
                if access_flags & ACC_SYNCHRONIZED != 0 && !self.allow_monitors {
                    return Err(DecodeError::Unrecoverable {
                        class: name,
                        reason: format!(
                            "synchronized method {method_name}{method_desc} declares {} and monitors are not permitted",
                            self.marker_exception
                        ),
                    });
                }
                needs_instrumentation = true;
            }

            let ty = if suspendable {
                SuspendType::Normal
            } else {
                SuspendType::None
            };
            methods.insert(MethodKey::new(method_name, method_desc), ty);
        }

        let mut already_instrumented = false;
        let attributes_count = reader.read_u2()?;
        for _ in 0..attributes_count {
            let attribute_name = pool.utf8(reader.read_u2()?)?;
            let length = reader.read_u4()? as usize;
            if attribute_name == self.instrumented_attribute {
                already_instrumented = true;
            }
            reader.skip(length)?;
        }

        Ok(DecodedClass {
            name,
            entry: ClassEntry::new(super_name, interfaces, methods),
            needs_instrumentation,
            already_instrumented,
        })
    }

    /// Minimal superclass-only decode: stops right after the super-class
    /// index, skipping all member-table work.
    pub fn decode_superclass_only(&self, bytes: &[u8]) -> Result<Option<String>, DecodeError> {
        let mut reader = Reader::new(bytes);
        reader.expect_magic()?;
        let _minor = reader.read_u2()?;
        let _major = reader.read_u2()?;
        let pool = ConstantPool::parse(&mut reader)?;

        let _access_flags = reader.read_u2()?;
        let _this_class = reader.read_u2()?;
        let super_class = reader.read_u2()?;
        if super_class == 0 {
            Ok(None)
        } else {
            Ok(Some(pool.class_name(super_class)?))
        }
    }
}

#[derive(Debug)]
enum Constant {
    Utf8(String),
    Class { name_index: u16 },
    Other,
    Unusable,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn parse(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable); // index 0 unused

        let mut index = 1;
        while index < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    let bytes = reader.read_slice(length)?;
                    Constant::Utf8(String::from_utf8(bytes.to_vec())?)
                }
                3 | 4 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    // longs and doubles occupy two pool slots
                    reader.skip(8)?;
                    entries.push(Constant::Other);
                    index += 1;
                    Constant::Unusable
                }
                7 => {
                    let name_index = reader.read_u2()?;
                    Constant::Class { name_index }
                }
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    Constant::Other
                }
                9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                15 => {
                    reader.skip(3)?;
                    Constant::Other
                }
                other => return Err(DecodeError::UnsupportedConstant { tag: other }),
            };
            entries.push(entry);
            index += 1;
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant, DecodeError> {
        self.entries
            .get(index as usize)
            .ok_or(DecodeError::BadConstantIndex { index })
    }

    fn utf8(&self, index: u16) -> Result<&str, DecodeError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(DecodeError::BadConstantIndex { index }),
        }
    }

    fn class_name(&self, index: u16) -> Result<String, DecodeError> {
        match self.get(index)? {
            Constant::Class { name_index } => Ok(self.utf8(*name_index)?.to_string()),
            _ => Err(DecodeError::BadConstantIndex { index }),
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn expect_magic(&mut self) -> Result<(), DecodeError> {
        const MAGIC: u32 = 0xCAFEBABE;
        if self.read_u4()? != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        Ok(())
    }

    fn read_u1(&mut self) -> Result<u8, DecodeError> {
        if self.pos >= self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        let value = self.data[self.pos];
        self.pos += 1;
        Ok(value)
    }

    fn read_u2(&mut self) -> Result<u16, DecodeError> {
        if self.pos + 2 > self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        let value = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    fn read_u4(&mut self) -> Result<u32, DecodeError> {
        if self.pos + 4 > self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        let value = u32::from_be_bytes([
            self.data[self.pos],
            self.data[self.pos + 1],
            self.data[self.pos + 2],
            self.data[self.pos + 3],
        ]);
        self.pos += 4;
        Ok(value)
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.pos + len > self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        if self.pos + len > self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        self.pos += len;
        Ok(())
    }
}

fn skip_member(reader: &mut Reader<'_>) -> Result<(), DecodeError> {
    reader.read_u2()?; // access_flags
    reader.read_u2()?; // name_index
    reader.read_u2()?; // descriptor_index
    let attributes_count = reader.read_u2()?;
    for _ in 0..attributes_count {
        reader.read_u2()?; // attribute_name_index
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}
