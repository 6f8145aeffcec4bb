use std::fmt;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use crate::core::error::{Error, ErrorKind, Result};

/// Primary key of a note record. Allocated sequentially by the writer and
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteKey(pub u64);

impl NoteKey {
    pub fn new(key: u64) -> Self {
        NoteKey(key)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl From<u64> for NoteKey {
    fn from(key: u64) -> Self {
        NoteKey(key)
    }
}

// Fixed-size byte identifiers. Human readable formats (JSON) see lowercase hex,
// binary formats (bincode) see raw bytes.
macro_rules! hex_bytes_type {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn from_hex(s: &str) -> Result<Self> {
                let mut bytes = [0u8; $len];
                hex::decode_to_slice(s, &mut bytes).map_err(|e| {
                    Error::new(
                        ErrorKind::InvalidArgument,
                        format!("invalid {} hex '{}': {}", stringify!($name), s, e),
                    )
                })?;
                Ok($name(bytes))
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                let array: [u8; $len] = bytes.try_into().map_err(|_| {
                    Error::new(
                        ErrorKind::InvalidArgument,
                        format!("{} must be {} bytes, got {}", stringify!($name), $len, bytes.len()),
                    )
                })?;
                Ok($name(array))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_hex())
                } else {
                    serializer.serialize_bytes(&self.0)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                struct BytesVisitor;

                impl<'de> Visitor<'de> for BytesVisitor {
                    type Value = $name;

                    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        write!(f, "{} bytes or {} hex characters", $len, $len * 2)
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<$name, E> {
                        $name::from_hex(v).map_err(|e| E::custom(e.context))
                    }

                    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<$name, E> {
                        $name::from_slice(v).map_err(|e| E::custom(e.context))
                    }
                }

                if deserializer.is_human_readable() {
                    deserializer.deserialize_str(BytesVisitor)
                } else {
                    deserializer.deserialize_bytes(BytesVisitor)
                }
            }
        }
    };
}

hex_bytes_type!(
    /// sha256 digest of a note's canonical encoding.
    NoteId, 32
);
hex_bytes_type!(
    /// x-only secp256k1 public key of a note's author.
    Pubkey, 32
);
hex_bytes_type!(
    /// BIP-340 Schnorr signature over the note id.
    Sig, 64
);
