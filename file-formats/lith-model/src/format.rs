//! Format detection and top-level read entry points.
//!
//! The three binary readers share one probing contract: each inspects the
//! header gate at the start of the stream and returns
//! [`ModelError::UnsupportedFormat`](crate::ModelError::UnsupportedFormat)
//! when the gate does not match, without consuming anything the next probe
//! cares about. Probing therefore rewinds and tries each reader in a fixed
//! order until one accepts the stream.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::reader_abc::AbcReader;
use crate::reader_ltb_pc::PcLtbReader;
use crate::reader_ltb_ps2::Ps2LtbReader;

/// The on-disk model forms this crate can identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// PC binary LTB (file type 1, version 23)
    PcLtb,
    /// PS2 binary LTB (file type 2, version 16)
    Ps2Ltb,
    /// Binary ABC (version 12)
    Abc,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PcLtb => write!(f, "PC LTB"),
            Self::Ps2Ltb => write!(f, "PS2 LTB"),
            Self::Abc => write!(f, "ABC"),
        }
    }
}

/// Reads a model from a seekable stream, probing formats in order.
///
/// Probe order is PC LTB, PS2 LTB, then ABC. A gate mismatch moves on to
/// the next candidate; any other error is real damage in an identified
/// format and aborts immediately. Returns the model together with the kind
/// that accepted the stream.
pub fn read_model<R: Read + Seek>(reader: &mut R) -> Result<(Model, FileKind)> {
    for kind in [FileKind::PcLtb, FileKind::Ps2Ltb, FileKind::Abc] {
        reader.seek(SeekFrom::Start(0))?;
        let outcome = match kind {
            FileKind::PcLtb => PcLtbReader::new().read(reader),
            FileKind::Ps2Ltb => Ps2LtbReader::new().read(reader),
            FileKind::Abc => AbcReader::new().read(reader),
        };
        match outcome {
            Ok(model) => {
                log::debug!("stream identified as {kind}");
                return Ok((model, kind));
            }
            Err(ModelError::UnsupportedFormat {
                format,
                file_type,
                version,
            }) => {
                log::trace!(
                    "{format} probe declined (file type {file_type}, version {version})"
                );
            }
            Err(other) => return Err(other),
        }
    }
    Err(ModelError::CorruptModel(
        "no known model format matched the stream".to_string(),
    ))
}

/// Reads a model from a file on disk.
pub fn read_model_file<P: AsRef<Path>>(path: P) -> Result<(Model, FileKind)> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let result = read_model(&mut reader);
    if let Err(err) = &result {
        log::debug!("failed to read {}: {err}", path.display());
    }
    result
}
