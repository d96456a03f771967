//! The multivalue instruction set used by the embedded expression
//! mini-language ("pcode").
//!
//! A multivalue is a tagged union: an opcode from a closed enumeration
//! plus a payload whose variant is fixed by the opcode's type mask.
//! Payload/opcode agreement is enforced at construction time; a mismatch
//! is a caller error, never a silent coercion.
//!
//! The mnemonic and static-variable tables are process-wide immutable
//! lookups initialized once on first use.

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::io::{Error, Result};

/// Payload family prescribed by an opcode's type mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMask {
    /// No payload.
    None,
    /// 32-bit reference into the static-variable table.
    StaticVar,
    /// 64-bit signed integer literal.
    Int,
    /// 64-bit float literal.
    Float,
    /// Length-prefixed string literal.
    Str,
}

macro_rules! opcodes {
    ($(($variant:ident, $mnemonic:literal, $mask:ident)),+ $(,)?) => {
        /// Closed opcode enumeration of the expression mini-language.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant),+
        }

        impl Opcode {
            /// The 4-byte ASCII mnemonic written by the file codec.
            pub fn mnemonic(self) -> [u8; 4] {
                match self {
                    $(Opcode::$variant => *$mnemonic),+
                }
            }

            /// The payload family this opcode prescribes.
            pub fn mask(self) -> TypeMask {
                match self {
                    $(Opcode::$variant => TypeMask::$mask),+
                }
            }
        }

        static MNEMONICS: Lazy<IndexMap<[u8; 4], Opcode>> = Lazy::new(|| {
            let mut map = IndexMap::new();
            $(map.insert(*$mnemonic, Opcode::$variant);)+
            map
        });
    };
}

opcodes! {
    (Non,       b"NON ", None),
    (OpenParen, b"O_P(", None),
    (CloseParen,b"C_P)", None),
    (OpenBrace, b"O_B{", None),
    (CloseBrace,b"C_B}", None),
    (Statement, b"STM;", None),
    (Comma,     b"COM,", None),
    (Add,       b"ADD+", None),
    (Sub,       b"SUB-", None),
    (Mul,       b"MUL*", None),
    (Div,       b"DIV/", None),
    (Exp,       b"EXP^", None),
    (Negate,    b"NEG-", None),
    (BitAnd,    b"BAN&", None),
    (BitOr,     b"BOR|", None),
    (BitNot,    b"BNT~", None),
    (BitXor,    b"BXR%", None),
    (Equal,     b"EQU=", None),
    (NotEqual,  b"NEQ!", None),
    (Less,      b"LES<", None),
    (Greater,   b"GRE>", None),
    (LessEq,    b"LEQ<", None),
    (GreaterEq, b"GEQ>", None),
    (And,       b"AND&", None),
    (Or,        b"ORR|", None),
    (Not,       b"NOT!", None),
    (If,        b"IF_?", None),
    (Else,      b"ELS:", None),
    (EndIf,     b"EIF;", None),
    (Return,    b"RET.", None),
    (Int,       b"INT#", Int),
    (Float,     b"FLT#", Float),
    (Str,       b"STR$", Str),
    (StaticVar, b"S_V$", StaticVar),
    (Func,      b"FUN(", Str),
    (Ident,     b"IDN$", Str),
    (Continue,  b"CON;", None),
}

impl Opcode {
    /// Resolves a mnemonic read off the wire. Unknown mnemonics are a
    /// format error at the call site.
    pub fn from_mnemonic(mnemonic: [u8; 4]) -> Option<Opcode> {
        MNEMONICS.get(&mnemonic).copied()
    }
}

/// Payload of a [`MultiValue`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    StaticVar(u32),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Payload {
    fn mask(&self) -> TypeMask {
        match self {
            Payload::None => TypeMask::None,
            Payload::StaticVar(_) => TypeMask::StaticVar,
            Payload::Int(_) => TypeMask::Int,
            Payload::Float(_) => TypeMask::Float,
            Payload::Str(_) => TypeMask::Str,
        }
    }
}

/// One instruction of the expression mini-language: opcode + payload.
///
/// The fields are private so that an instance can only exist with a
/// payload matching the opcode's mask.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiValue {
    op: Opcode,
    payload: Payload,
}

impl MultiValue {
    /// Builds an instruction, rejecting payloads that do not match the
    /// opcode's type mask.
    pub fn new(op: Opcode, payload: Payload) -> Result<MultiValue> {
        if op.mask() != payload.mask() {
            return Err(Error::PayloadMismatch {
                op,
                expected: op.mask(),
            });
        }
        Ok(MultiValue { op, payload })
    }

    pub fn op(&self) -> Opcode {
        self.op
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

impl Default for MultiValue {
    fn default() -> Self {
        MultiValue {
            op: Opcode::Non,
            payload: Payload::None,
        }
    }
}

/// Static-variable table referenced by [`Payload::StaticVar`].
///
/// Id assignment is part of the wire contract; entries are only ever
/// appended.
static STATIC_VARS: Lazy<IndexMap<&'static str, u32>> = Lazy::new(|| {
    let mut map = IndexMap::new();
    for (id, name) in [
        "Source",
        "Target",
        "Owner",
        "Self",
        "Activation",
        "Power",
        "Level",
        "Rank",
        "Random",
        "Time",
    ]
    .iter()
    .enumerate()
    {
        map.insert(*name, id as u32);
    }
    map
});

/// Resolves a static-variable name to its wire id.
pub fn static_var_id(name: &str) -> Option<u32> {
    STATIC_VARS.get(name).copied()
}

/// Resolves a wire id back to the static-variable name.
pub fn static_var_name(id: u32) -> Option<&'static str> {
    STATIC_VARS
        .iter()
        .find(|(_, &v)| v == id)
        .map(|(k, _)| *k)
}
