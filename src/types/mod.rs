//! Type descriptors

mod datatype;

pub use datatype::{
    ArrayInfo, Datatype, DatatypeFlags, DatatypeKind, DATA_SIZE_BYTE, DATA_SIZE_DWORD,
    DATA_SIZE_WORD, DATA_SIZE_ZERO,
};
