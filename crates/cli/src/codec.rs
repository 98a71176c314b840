//! Chunk codec.
//!
//! The server stores whatever bytes it receives. The client picks how file bytes are
//! represented on the wire: as-is, or as base64 text.
//!
//! Decoding is stateful because the server re-blocks stored content into its own chunk sizes;
//! a base64 quantum may be split across two downloaded chunks.

use base64::{engine::general_purpose::STANDARD, Engine as _};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid base64 content: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("base64 content ends with {0} dangling bytes")]
    Truncated(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Encoding {
    /// Send file bytes unchanged
    #[default]
    Raw,
    /// Send file bytes as standard base64 text
    Base64,
}

impl Encoding {
    /// Encodes one block read from the source file.
    ///
    /// For base64, every block except the last must be a multiple of 3 bytes so that the
    /// concatenated output carries padding only at the very end.
    pub fn encode(self, block: &[u8]) -> Vec<u8> {
        match self {
            Encoding::Raw => block.to_vec(),
            Encoding::Base64 => STANDARD.encode(block).into_bytes(),
        }
    }

    pub fn decoder(self) -> Decoder {
        Decoder {
            encoding: self,
            pending: Vec::new(),
        }
    }
}

/// Turns downloaded chunks back into file bytes.
#[derive(Debug)]
pub struct Decoder {
    encoding: Encoding,
    pending: Vec<u8>,
}

impl Decoder {
    /// Decodes as much of `bytes` as possible, keeping any incomplete quantum for later.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self.encoding {
            Encoding::Raw => Ok(bytes.to_vec()),
            Encoding::Base64 => {
                self.pending.extend_from_slice(bytes);
                let ready = self.pending.len() - self.pending.len() % 4;
                if ready == 0 {
                    return Ok(Vec::new());
                }
                let rest = self.pending.split_off(ready);
                let decoded = STANDARD.decode(&self.pending)?;
                self.pending = rest;
                Ok(decoded)
            }
        }
    }

    /// Checks that nothing undecodable is left over.
    pub fn finish(self) -> Result<(), CodecError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(CodecError::Truncated(self.pending.len()))
        }
    }
}
