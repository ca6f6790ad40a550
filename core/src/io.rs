// Copyright 2017-2026 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

Basic I/O helpers.

The snapshot format used by the column tables is a sequence of big-endian
"framed" records: every variable-length item (a string, a vector) is preceded
by its length as a `u64`. The extension traits here read and write those
items.

 */

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::io;
use std::io::{Read, Write};
use std::result;

use crate::CoreError;

/// Framed lengths above this are rejected rather than trusted for an
/// allocation.
pub const MAX_FRAME_LENGTH: u64 = 1 << 40;

/// Extend the `Read` trait to provide functions for reading an exact number
/// of bytes from a stream and distinguishing whether EOF was encountered
/// immediately, versus whether it was encountered in the midst of the read.
pub trait EofReadExactExt: Read {
    /// Like `Read::read_exact`, except returns Ok(false) if EOF was
    /// encountered at the first read attempt. Returns Ok(true) if everything
    /// was OK and EOF has not yet been hit. Returns Err with an IoError with
    /// a "kind" of UnexpectedEof if EOF was encountered somewhere in the
    /// midst of the buffer.
    fn eof_read_exact<E>(&mut self, buf: &mut [u8]) -> result::Result<bool, E>
    where
        E: From<io::Error>;

    /// Like `byteorder::ReadBytesExt::read_u32::<BigEndian>`, except returns
    /// Some(n) on success and None if EOF was encountered at the first read
    /// attempt.
    fn eof_read_be_u32<E>(&mut self) -> result::Result<Option<u32>, E>
    where
        E: From<io::Error>,
    {
        let mut buf = [0u8; 4];

        if self.eof_read_exact(&mut buf)? {
            Ok(Some(BigEndian::read_u32(&buf)))
        } else {
            Ok(None)
        }
    }
}

impl<R: Read> EofReadExactExt for R {
    fn eof_read_exact<E>(&mut self, buf: &mut [u8]) -> result::Result<bool, E>
    where
        E: From<io::Error>,
    {
        let mut n_left = buf.len();
        let mut ofs = 0;

        while n_left > 0 {
            let n_read = match self.read(&mut buf[ofs..]) {
                Ok(n) => n,
                Err(e) => {
                    if e.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }

                    return Err(e.into());
                }
            };

            if n_read == 0 {
                return if ofs == 0 {
                    Ok(false) // no more data at an expected stopping point
                } else {
                    Err(
                        io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of file")
                            .into(),
                    )
                };
            }

            ofs += n_read;
            n_left -= n_read;
        }

        Ok(true)
    }
}

/// Read length-prefixed big-endian items.
pub trait FramedReadExt: Read {
    /// Read a `u64` length prefix, rejecting absurd values.
    fn read_frame_len(&mut self) -> Result<usize, CoreError> {
        let n = self.read_u64::<BigEndian>()?;

        if n > MAX_FRAME_LENGTH {
            return Err(CoreError::BadFrameLength(n));
        }

        Ok(n as usize)
    }

    fn read_framed_string(&mut self) -> Result<String, CoreError> {
        let n = self.read_frame_len()?;
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    fn read_framed_i32s(&mut self) -> Result<Vec<i32>, CoreError> {
        let n = self.read_frame_len()?;
        let mut v = vec![0i32; n];
        self.read_i32_into::<BigEndian>(&mut v)?;
        Ok(v)
    }

    fn read_framed_f64s(&mut self) -> Result<Vec<f64>, CoreError> {
        let n = self.read_frame_len()?;
        let mut v = vec![0f64; n];
        self.read_f64_into::<BigEndian>(&mut v)?;
        Ok(v)
    }

    fn read_framed_u64s(&mut self) -> Result<Vec<u64>, CoreError> {
        let n = self.read_frame_len()?;
        let mut v = vec![0u64; n];
        self.read_u64_into::<BigEndian>(&mut v)?;
        Ok(v)
    }
}

impl<R: Read> FramedReadExt for R {}

/// The writing counterpart of `FramedReadExt`.
pub trait FramedWriteExt: Write {
    fn write_frame_len(&mut self, n: usize) -> io::Result<()> {
        self.write_u64::<BigEndian>(n as u64)
    }

    fn write_framed_str(&mut self, s: &str) -> io::Result<()> {
        self.write_frame_len(s.len())?;
        self.write_all(s.as_bytes())
    }

    fn write_framed_i32s(&mut self, values: &[i32]) -> io::Result<()> {
        self.write_frame_len(values.len())?;

        for v in values {
            self.write_i32::<BigEndian>(*v)?;
        }

        Ok(())
    }

    fn write_framed_f64s(&mut self, values: &[f64]) -> io::Result<()> {
        self.write_frame_len(values.len())?;

        for v in values {
            self.write_f64::<BigEndian>(*v)?;
        }

        Ok(())
    }

    fn write_framed_u64s(&mut self, values: &[u64]) -> io::Result<()> {
        self.write_frame_len(values.len())?;

        for v in values {
            self.write_u64::<BigEndian>(*v)?;
        }

        Ok(())
    }
}

impl<W: Write> FramedWriteExt for W {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn eof_at_boundary_is_not_an_error() {
        let mut c = Cursor::new(vec![0u8, 0, 0, 7]);
        assert_eq!(c.eof_read_be_u32::<io::Error>().unwrap(), Some(7));
        assert_eq!(c.eof_read_be_u32::<io::Error>().unwrap(), None);
    }

    #[test]
    fn eof_mid_item_is_an_error() {
        let mut c = Cursor::new(vec![0u8, 0]);
        let r = c.eof_read_be_u32::<io::Error>();
        assert_eq!(r.unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn framed_items() {
        let mut buf = Vec::new();
        buf.write_framed_str("TIMETABLE").unwrap();
        buf.write_framed_i32s(&[-1, -1]).unwrap();
        buf.write_framed_f64s(&[]).unwrap();

        let mut c = Cursor::new(buf);
        assert_eq!(c.read_framed_string().unwrap(), "TIMETABLE");
        assert_eq!(c.read_framed_i32s().unwrap(), vec![-1, -1]);
        assert!(c.read_framed_f64s().unwrap().is_empty());
    }

    #[test]
    fn absurd_length_rejected() {
        let mut c = Cursor::new(vec![0xffu8; 8]);
        assert!(matches!(
            c.read_frame_len(),
            Err(CoreError::BadFrameLength(_))
        ));
    }
}
