//! The closed type-code enumeration (spec §3) and the per-variant table of
//! element size and signature-grammar letter (spec §6) that every other
//! component looks up.
//!
//! Built as a macro-generated table: one macro invocation lists every
//! variant once, and the macro expands it into the enum plus the lookup
//! methods, instead of hand-duplicating a `match` per property.

macro_rules! type_codes {
    ($(($variant:ident, $size:expr, $letter:expr, $is_record:expr)),* $(,)?) => {
        /// A scalar or record type code (spec §3).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TypeCode {
            $($variant,)*
        }

        impl TypeCode {
            /// Fixed element size in bytes. Meaningless for `Record`, whose
            /// size depends on its fields (callers must not call this on a
            /// record type code in isolation).
            pub const fn element_size(self) -> u8 {
                match self {
                    $(TypeCode::$variant => $size,)*
                }
            }

            /// The grammar letter used by the signature grammar (spec §6).
            pub const fn grammar_letter(self) -> char {
                match self {
                    $(TypeCode::$variant => $letter,)*
                }
            }

            /// Whether this is the `record` pseudo-type.
            pub const fn is_record(self) -> bool {
                match self {
                    $(TypeCode::$variant => $is_record,)*
                }
            }

            /// All non-record variants, for exhaustive tests.
            pub const ALL: &'static [TypeCode] = &[
                $(TypeCode::$variant,)*
            ];
        }
    };
}

// Grammar letters follow spec §6's twelve-letter scalar alphabet
// (C,S,L,Q,c,s,l,q,B,a,A,b for u8,u16,u32,u64,i8,i16,i32,i64,byte,char,
// char8,bool). char16/char32 have no letter in that alphabet; we extend
// it with 't'/'T' rather than reuse an existing one.
type_codes! {
    (U8,     1, 'C', false),
    (U16,    2, 'S', false),
    (U32,    4, 'L', false),
    (U64,    8, 'Q', false),
    (I8,     1, 'c', false),
    (I16,    2, 's', false),
    (I32,    4, 'l', false),
    (I64,    8, 'q', false),
    (Bool,   1, 'b', false),
    (Byte,   1, 'B', false),
    (Char,   1, 'a', false),
    (Char8,  1, 'A', false),
    (Char16, 2, 't', false),
    (Char32, 4, 'T', false),
    (Record, 0, '{', true),
}

impl TypeCode {
    /// Natural (unconstrained) bounds for a scalar type, as signed 64-bit
    /// bounds. Used by the default range check `Pack` runs when no
    /// explicit `RangeCheck*` instruction precedes it (spec §4.D; `Unpack`
    /// needs no such check, since reading a fixed-width little-endian
    /// integer can never produce a value outside its own type's range).
    /// `None` for types with no meaningful numeric bound check (bool,
    /// byte, char family, record).
    pub const fn natural_bounds_i64(self) -> Option<(i64, i64)> {
        match self {
            TypeCode::U8 => Some((0, u8::MAX as i64)),
            TypeCode::U16 => Some((0, u16::MAX as i64)),
            TypeCode::U32 => Some((0, u32::MAX as i64)),
            TypeCode::U64 => None, // exceeds i64 range; checked separately
            TypeCode::I8 => Some((i8::MIN as i64, i8::MAX as i64)),
            TypeCode::I16 => Some((i16::MIN as i64, i16::MAX as i64)),
            TypeCode::I32 => Some((i32::MIN as i64, i32::MAX as i64)),
            TypeCode::I64 => None, // full i64 range, nothing to check
            _ => None,
        }
    }
}
