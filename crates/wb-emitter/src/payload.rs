//! Message payloads accepted by an emitter
//!
//! A send takes either text or a raw byte buffer. Anything else converts to
//! [`Payload::Unsupported`] so callers holding loosely typed values still get
//! the same rejection the binding has always produced.

/// A message handed to [`Emitter::send`](crate::Emitter::send)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Text, transmitted NUL-terminated
    Text(String),
    /// Raw bytes, transmitted with an explicit length
    Bytes(Vec<u8>),
    /// A value of a type emitters cannot transmit
    Unsupported(&'static str),
}

impl Payload {
    /// Short name of the payload kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text(_) => "text",
            Payload::Bytes(_) => "bytes",
            Payload::Unsupported(type_name) => *type_name,
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&String> for Payload {
    fn from(text: &String) -> Self {
        Payload::Text(text.clone())
    }
}

impl From<&[u8]> for Payload {
    fn from(data: &[u8]) -> Self {
        Payload::Bytes(data.to_vec())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Bytes(data)
    }
}

impl<const N: usize> From<[u8; N]> for Payload {
    fn from(data: [u8; N]) -> Self {
        Payload::Bytes(data.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Payload {
    fn from(data: &[u8; N]) -> Self {
        Payload::Bytes(data.to_vec())
    }
}

macro_rules! unsupported_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Payload {
                fn from(_: $ty) -> Self {
                    Payload::Unsupported(stringify!($ty))
                }
            }
        )*
    };
}

unsupported_from!(
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    bool,
    char,
);
