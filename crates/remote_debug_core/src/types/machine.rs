//! Static facts about the target machine, fixed for a session.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDescription {
    pub address_size: u64,
    pub big_endian: bool,
}

impl Default for MachineDescription {
    fn default() -> Self {
        Self {
            address_size: 8,
            big_endian: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    JBoolean,
    JByte,
    JChar,
    JDouble,
    JFloat,
    JInt,
    JLong,
    JShort,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 8] = [
        PrimitiveType::JBoolean,
        PrimitiveType::JByte,
        PrimitiveType::JChar,
        PrimitiveType::JDouble,
        PrimitiveType::JFloat,
        PrimitiveType::JInt,
        PrimitiveType::JLong,
        PrimitiveType::JShort,
    ];

    /// RPC method that reports this type's width.
    pub fn size_method(self) -> &'static str {
        match self {
            PrimitiveType::JBoolean => "getJBooleanSize",
            PrimitiveType::JByte => "getJByteSize",
            PrimitiveType::JChar => "getJCharSize",
            PrimitiveType::JDouble => "getJDoubleSize",
            PrimitiveType::JFloat => "getJFloatSize",
            PrimitiveType::JInt => "getJIntSize",
            PrimitiveType::JLong => "getJLongSize",
            PrimitiveType::JShort => "getJShortSize",
        }
    }

    pub fn from_size_method(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.size_method() == method)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveSizes {
    pub jboolean: u64,
    pub jbyte: u64,
    pub jchar: u64,
    pub jdouble: u64,
    pub jfloat: u64,
    pub jint: u64,
    pub jlong: u64,
    pub jshort: u64,
}

impl PrimitiveSizes {
    pub fn size_of(&self, ty: PrimitiveType) -> u64 {
        match ty {
            PrimitiveType::JBoolean => self.jboolean,
            PrimitiveType::JByte => self.jbyte,
            PrimitiveType::JChar => self.jchar,
            PrimitiveType::JDouble => self.jdouble,
            PrimitiveType::JFloat => self.jfloat,
            PrimitiveType::JInt => self.jint,
            PrimitiveType::JLong => self.jlong,
            PrimitiveType::JShort => self.jshort,
        }
    }

    pub fn set(&mut self, ty: PrimitiveType, size: u64) {
        let slot = match ty {
            PrimitiveType::JBoolean => &mut self.jboolean,
            PrimitiveType::JByte => &mut self.jbyte,
            PrimitiveType::JChar => &mut self.jchar,
            PrimitiveType::JDouble => &mut self.jdouble,
            PrimitiveType::JFloat => &mut self.jfloat,
            PrimitiveType::JInt => &mut self.jint,
            PrimitiveType::JLong => &mut self.jlong,
            PrimitiveType::JShort => &mut self.jshort,
        };
        *slot = size;
    }
}

impl Default for PrimitiveSizes {
    fn default() -> Self {
        Self {
            jboolean: 1,
            jbyte: 1,
            jchar: 2,
            jdouble: 8,
            jfloat: 4,
            jint: 4,
            jlong: 8,
            jshort: 2,
        }
    }
}

/// Compressed reference encoding: `full = base + (narrow << shift)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NarrowEncoding {
    pub base: u64,
    pub shift: u32,
}

impl NarrowEncoding {
    pub fn new(base: u64, shift: u32) -> Self {
        Self { base, shift }
    }

    /// Zero stays zero: a null narrow reference is a null reference.
    pub fn decode(&self, narrow: u64) -> u64 {
        if narrow == 0 {
            return 0;
        }
        self.base.wrapping_add(narrow << self.shift)
    }

    pub fn encode(&self, full: u64) -> u64 {
        if full == 0 {
            return 0;
        }
        full.wrapping_sub(self.base) >> self.shift
    }
}

/// Everything fetched from the target when a client session opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub os: String,
    pub cpu: String,
    pub machine: MachineDescription,
    pub sizes: PrimitiveSizes,
    pub heap_oop_size: u64,
    pub klass_ptr_size: u64,
    pub narrow_oop: NarrowEncoding,
    pub narrow_klass: NarrowEncoding,
    pub supports_command_tunnel: bool,
}

impl SessionInfo {
    pub fn address_size(&self) -> u64 {
        self.machine.address_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_methods_round_trip_through_names() {
        for ty in PrimitiveType::ALL {
            assert_eq!(PrimitiveType::from_size_method(ty.size_method()), Some(ty));
        }
        assert_eq!(PrimitiveType::from_size_method("getHeapOopSize"), None);
    }

    #[test]
    fn test_narrow_encoding_round_trip() {
        let encoding = NarrowEncoding::new(0x0000_0008_0000_0000, 3);
        let full = 0x0000_0008_0001_2340;
        let narrow = encoding.encode(full);
        assert_eq!(narrow, 0x2468);
        assert_eq!(encoding.decode(narrow), full);
        assert_eq!(encoding.decode(0), 0);
        assert_eq!(encoding.encode(0), 0);
    }

    #[test]
    fn test_primitive_sizes_set_and_get() {
        let mut sizes = PrimitiveSizes::default();
        sizes.set(PrimitiveType::JChar, 4);
        assert_eq!(sizes.size_of(PrimitiveType::JChar), 4);
        assert_eq!(sizes.size_of(PrimitiveType::JLong), 8);
    }
}
