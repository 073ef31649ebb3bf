//! Little-endian primitive readers/writers and the wire string helpers
//! shared by every format in the family.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{ModelError, Result};

/// Name substituted when a string payload cannot be decoded.
pub const PLACEHOLDER_NAME: &str = "UnknownName";

/// Extension trait for reading little-endian values from a reader
pub trait ReadExt: Read {
    fn read_u8(&mut self) -> std::io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_i8(&mut self) -> std::io::Result<i8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(i8::from_le_bytes(buf))
    }

    fn read_u16_le(&mut self) -> std::io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_i16_le(&mut self) -> std::io::Result<i16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }

    fn read_u32_le(&mut self) -> std::io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_i32_le(&mut self) -> std::io::Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_f32_le(&mut self) -> std::io::Result<f32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }
}

/// Extension trait for writing little-endian values to a writer
pub trait WriteExt: Write {
    fn write_u8(&mut self, n: u8) -> std::io::Result<()> {
        self.write_all(&[n])
    }

    fn write_i8(&mut self, n: i8) -> std::io::Result<()> {
        self.write_all(&n.to_le_bytes())
    }

    fn write_u16_le(&mut self, n: u16) -> std::io::Result<()> {
        self.write_all(&n.to_le_bytes())
    }

    fn write_i16_le(&mut self, n: i16) -> std::io::Result<()> {
        self.write_all(&n.to_le_bytes())
    }

    fn write_u32_le(&mut self, n: u32) -> std::io::Result<()> {
        self.write_all(&n.to_le_bytes())
    }

    fn write_i32_le(&mut self, n: i32) -> std::io::Result<()> {
        self.write_all(&n.to_le_bytes())
    }

    fn write_f32_le(&mut self, n: f32) -> std::io::Result<()> {
        self.write_all(&n.to_le_bytes())
    }
}

/// Extension trait for relative cursor movement
pub trait SeekExt: Seek {
    /// Skips `n` bytes forward (or backward when negative).
    fn skip(&mut self, n: i64) -> std::io::Result<u64> {
        self.seek(SeekFrom::Current(n))
    }
}

// Implement the traits for all types that implement Read/Write/Seek
impl<R: Read + ?Sized> ReadExt for R {}
impl<W: Write + ?Sized> WriteExt for W {}
impl<S: Seek + ?Sized> SeekExt for S {}

/// Reads a u16-length-prefixed ASCII string.
///
/// On a payload outside the ASCII range this fails with
/// [`ModelError::InvalidEncoding`] carrying the offset of the first payload
/// byte; the cursor is left past the payload.
pub fn read_string<R: Read + Seek>(reader: &mut R) -> Result<String> {
    let length = reader.read_u16_le()?;
    let offset = reader.stream_position()?;
    let mut buf = vec![0u8; usize::from(length)];
    reader.read_exact(&mut buf)?;
    if buf.is_ascii() {
        Ok(String::from_utf8_lossy(&buf).into_owned())
    } else {
        Err(ModelError::InvalidEncoding { offset })
    }
}

/// Reads a wire string, substituting [`PLACEHOLDER_NAME`] on bad payloads.
///
/// Recovery resynchronizes the cursor to the position immediately after the
/// length prefix so that the payload bytes stay available to later reads.
pub fn read_string_or_placeholder<R: Read + Seek>(reader: &mut R) -> Result<String> {
    match read_string(reader) {
        Ok(s) => Ok(s),
        Err(ModelError::InvalidEncoding { offset }) => {
            log::warn!("undecodable string at offset {offset}, using placeholder");
            reader.seek(SeekFrom::Start(offset))?;
            Ok(PLACEHOLDER_NAME.to_string())
        }
        Err(e) => Err(e),
    }
}

/// Writes a u16-length-prefixed string.
pub fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    let length = u16::try_from(bytes.len())
        .map_err(|_| ModelError::CorruptModel(format!("string too long for wire: {} bytes", bytes.len())))?;
    writer.write_u16_le(length)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Runs `f` and unconditionally restores the stream position afterwards,
/// whether `f` succeeded or not.
pub fn peek_with<R, T, F>(reader: &mut R, f: F) -> Result<T>
where
    R: Read + Seek,
    F: FnOnce(&mut R) -> Result<T>,
{
    let position = reader.stream_position()?;
    let outcome = f(reader);
    reader.seek(SeekFrom::Start(position))?;
    outcome
}
