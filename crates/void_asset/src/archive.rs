//! Archive - bidirectional byte serializer
//!
//! Assets describe their persistent layout once: the same `serialize` method
//! writes fields when the archive is writing and fills them in when it is
//! reading. Individual fields are encoded with bincode (fixed-width little
//! endian integers, u64 length prefixes).

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AssetError, AssetResult};

enum Mode<'a> {
    Write(&'a mut Vec<u8>),
    Read(&'a [u8]),
}

/// Single-direction serializer handed to [`Asset::serialize`](crate::Asset::serialize)
pub struct Archive<'a> {
    mode: Mode<'a>,
}

impl<'a> Archive<'a> {
    /// Archive appending to `out`
    pub fn writer(out: &'a mut Vec<u8>) -> Self {
        Self {
            mode: Mode::Write(out),
        }
    }

    /// Archive consuming `data` from the front
    pub fn reader(data: &'a [u8]) -> Self {
        Self {
            mode: Mode::Read(data),
        }
    }

    pub fn is_writing(&self) -> bool {
        matches!(self.mode, Mode::Write(_))
    }

    /// Bytes not consumed yet (always 0 for writers)
    pub fn remaining(&self) -> usize {
        match &self.mode {
            Mode::Write(_) => 0,
            Mode::Read(data) => data.len(),
        }
    }

    /// Write `value`, or overwrite it with the next value in the stream
    pub fn value<T>(&mut self, value: &mut T) -> AssetResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        match &mut self.mode {
            Mode::Write(out) => bincode::serialize_into(&mut **out, value)?,
            Mode::Read(data) => *value = bincode::deserialize_from(data)?,
        }
        Ok(())
    }

    /// Write `bytes` verbatim, or read exactly `len` bytes into it
    pub fn raw(&mut self, bytes: &mut Vec<u8>, len: usize) -> AssetResult<()> {
        match &mut self.mode {
            Mode::Write(out) => {
                debug_assert_eq!(bytes.len(), len);
                out.extend_from_slice(bytes);
            }
            Mode::Read(data) => {
                if data.len() < len {
                    return Err(AssetError::UnexpectedEof {
                        needed: len,
                        available: data.len(),
                    });
                }
                let slice: &'a [u8] = *data;
                let (head, tail) = slice.split_at(len);
                bytes.clear();
                bytes.extend_from_slice(head);
                *data = tail;
            }
        }
        Ok(())
    }

    /// Write or read the four-byte type tag
    pub fn tag(&mut self, tag: &mut [u8; 4]) -> AssetResult<()> {
        let mut bytes = tag.to_vec();
        self.raw(&mut bytes, 4)?;
        tag.copy_from_slice(&bytes);
        Ok(())
    }
}
