//! The `.npy` single-array format.
//!
//! Layout: the magic string `\x93NUMPY`, a major/minor version byte pair, the
//! header length (`u16` for version 1, `u32` for versions 2 and 3), an ASCII
//! Python dict literal with `descr`, `fortran_order` and `shape`, then the raw
//! element bytes in C order.

use std::io::{Read, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use ff_tensor::prelude::*;

use crate::{IoError, Result};

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Headers are padded so the data starts on this boundary.
const ALIGNMENT: usize = 64;

/// Parsed `.npy` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NpyHeader {
    pub dtype: DType,
    /// Stored shape; empty for a zero-rank array.
    pub shape: Vec<usize>,
    pub fortran_order: bool,
    pub big_endian: bool,
}

impl NpyHeader {
    /// Element count, failing on overflow.
    pub fn numel(&self) -> Result<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| IoError::InvalidHeader(format!("shape {:?} overflows", self.shape)))
    }
}

/// Numeric kinds that can be read from and written to `.npy` data.
pub trait NpyElement: Scalar {
    /// Fill `dst` from `reader` in the given byte order.
    fn read_values<R: Read>(reader: &mut R, dst: &mut [Self], big_endian: bool)
        -> std::io::Result<()>;

    /// Write `src` little-endian.
    fn write_values<W: Write>(writer: &mut W, src: &[Self]) -> std::io::Result<()>;
}

macro_rules! impl_npy_element {
    ($($t:ty => $read:ident, $write:ident);* $(;)?) => {$(
        impl NpyElement for $t {
            fn read_values<R: Read>(
                reader: &mut R,
                dst: &mut [Self],
                big_endian: bool,
            ) -> std::io::Result<()> {
                if big_endian {
                    reader.$read::<BigEndian>(dst)
                } else {
                    reader.$read::<LittleEndian>(dst)
                }
            }

            fn write_values<W: Write>(writer: &mut W, src: &[Self]) -> std::io::Result<()> {
                for &v in src {
                    writer.$write::<LittleEndian>(v)?;
                }
                Ok(())
            }
        }
    )*};
}

impl_npy_element! {
    i16 => read_i16_into, write_i16;
    i32 => read_i32_into, write_i32;
    i64 => read_i64_into, write_i64;
    u16 => read_u16_into, write_u16;
    u32 => read_u32_into, write_u32;
    u64 => read_u64_into, write_u64;
    f32 => read_f32_into, write_f32;
    f64 => read_f64_into, write_f64;
}

impl NpyElement for u8 {
    fn read_values<R: Read>(reader: &mut R, dst: &mut [u8], _: bool) -> std::io::Result<()> {
        reader.read_exact(dst)
    }

    fn write_values<W: Write>(writer: &mut W, src: &[u8]) -> std::io::Result<()> {
        writer.write_all(src)
    }
}

impl NpyElement for i8 {
    fn read_values<R: Read>(reader: &mut R, dst: &mut [i8], _: bool) -> std::io::Result<()> {
        reader.read_i8_into(dst)
    }

    fn write_values<W: Write>(writer: &mut W, src: &[i8]) -> std::io::Result<()> {
        src.iter().try_for_each(|&v| writer.write_i8(v))
    }
}

/// Read the preamble and header dictionary, leaving `reader` at the first
/// data byte.
pub fn read_header<R: Read>(reader: &mut R) -> Result<NpyHeader> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(IoError::InvalidHeader("missing \\x93NUMPY magic".into()));
    }

    let major = reader.read_u8()?;
    let minor = reader.read_u8()?;
    let header_len = match major {
        1 => reader.read_u16::<LittleEndian>()? as usize,
        2 | 3 => reader.read_u32::<LittleEndian>()? as usize,
        _ => {
            return Err(IoError::Unsupported(format!(
                "npy format version {major}.{minor}"
            )))
        }
    };

    let mut raw = vec![0u8; header_len];
    reader.read_exact(&mut raw)?;
    let text = String::from_utf8(raw)
        .map_err(|_| IoError::InvalidHeader("header is not valid text".into()))?;

    parse_header(&text)
}

fn parse_header(text: &str) -> Result<NpyHeader> {
    let descr_text = dict_value(text, "descr")?;
    let descr =
        quoted(descr_text).ok_or_else(|| IoError::UnsupportedNumericKind(descr_text.into()))?;
    let (big_endian, code) = match descr.as_bytes().first() {
        Some(b'<') | Some(b'|') => (false, &descr[1..]),
        Some(b'>') => (true, &descr[1..]),
        Some(b'=') => (cfg!(target_endian = "big"), &descr[1..]),
        _ => (cfg!(target_endian = "big"), descr),
    };
    let dtype =
        DType::from_npy_code(code).ok_or_else(|| IoError::UnsupportedNumericKind(descr.into()))?;

    let fortran = dict_value(text, "fortran_order")?;
    let fortran_order = if fortran.starts_with("True") {
        true
    } else if fortran.starts_with("False") {
        false
    } else {
        return Err(IoError::InvalidHeader(format!("bad fortran_order in {text:?}")));
    };

    let shape_text = dict_value(text, "shape")?;
    let close = shape_text
        .find(')')
        .filter(|_| shape_text.starts_with('('))
        .ok_or_else(|| IoError::InvalidHeader(format!("bad shape in {text:?}")))?;
    let shape = shape_text[1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| IoError::InvalidHeader(format!("bad dimension {s:?}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(NpyHeader {
        dtype,
        shape,
        fortran_order,
        big_endian,
    })
}

/// Text following `'key':` in the header dict, with leading spaces removed.
fn dict_value<'a>(text: &'a str, key: &str) -> Result<&'a str> {
    let start = [format!("'{key}'"), format!("\"{key}\"")]
        .iter()
        .find_map(|k| text.find(k.as_str()).map(|at| at + k.len()))
        .ok_or_else(|| IoError::InvalidHeader(format!("missing key {key:?}")))?;
    let rest = text[start..].trim_start();
    rest.strip_prefix(':')
        .map(str::trim_start)
        .ok_or_else(|| IoError::InvalidHeader(format!("missing ':' after {key:?}")))
}

/// The contents of a leading `'...'` or `"..."` literal.
fn quoted(value: &str) -> Option<&str> {
    let quote = value.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &value[1..];
    body.find(quote).map(|end| &body[..end])
}

/// Read a full `.npy` stream into a tensor of kind `T`.
///
/// A zero-rank stored array loads as shape `[1]`.
pub fn read_npy<T: NpyElement, R: Read>(reader: &mut R) -> Result<Tensor<T>> {
    let header = read_header(reader)?;
    if header.dtype != T::DTYPE {
        return Err(IoError::DifferentNumericKind {
            expected: T::DTYPE,
            found: header.dtype,
        });
    }
    if header.fortran_order && header.shape.iter().filter(|&&d| d > 1).count() > 1 {
        return Err(IoError::Unsupported("Fortran-ordered arrays".into()));
    }

    let len = header.numel()?;
    let byte_len = len
        .checked_mul(T::DTYPE.size_of())
        .and_then(|b| u64::try_from(b).ok())
        .ok_or_else(|| {
            IoError::InvalidHeader(format!("shape {:?} is too large", header.shape))
        })?;

    // Buffer only what the stream actually holds; a header may claim more.
    let mut raw = Vec::new();
    reader.by_ref().take(byte_len).read_to_end(&mut raw)?;
    if (raw.len() as u64) < byte_len {
        return Err(IoError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("expected {byte_len} data bytes, found {}", raw.len()),
        )));
    }
    let mut data = vec![T::zero(); len];
    T::read_values(&mut raw.as_slice(), &mut data, header.big_endian)?;

    let shape = if header.shape.is_empty() {
        vec![1]
    } else {
        header.shape
    };
    Ok(Tensor::from_vec(data, shape)?)
}

/// Write `tensor` as a version 1.0 little-endian `.npy` stream. Version 2.0
/// is used only when the header does not fit a `u16` length.
pub fn write_npy<T: NpyElement, W: Write>(tensor: &Tensor<T>, writer: &mut W) -> Result<()> {
    let dtype = T::DTYPE;
    let order = if dtype.size_of() == 1 { '|' } else { '<' };
    let shape = match tensor.dims() {
        [] => "()".to_string(),
        [d] => format!("({d},)"),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let dict = format!(
        "{{'descr': '{order}{}', 'fortran_order': False, 'shape': {shape}, }}",
        dtype.npy_code()
    );

    let mut version = 1u8;
    let mut prefix = MAGIC.len() + 2 + 2;
    let unpadded = prefix + dict.len() + 1;
    if unpadded + ALIGNMENT > u16::MAX as usize {
        version = 2;
        prefix += 2;
    }
    let padding = (ALIGNMENT - (prefix + dict.len() + 1) % ALIGNMENT) % ALIGNMENT;
    let header_len = dict.len() + padding + 1;

    writer.write_all(MAGIC)?;
    writer.write_all(&[version, 0])?;
    if version == 1 {
        writer.write_u16::<LittleEndian>(header_len as u16)?;
    } else {
        writer.write_u32::<LittleEndian>(header_len as u32)?;
    }
    writer.write_all(dict.as_bytes())?;
    writer.write_all(&vec![b' '; padding])?;
    writer.write_all(b"\n")?;

    T::write_values(writer, tensor.as_slice())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(text: &str) -> Result<NpyHeader> {
        parse_header(text)
    }

    #[test]
    fn test_parse_header_typical() {
        let h = header("{'descr': '<f4', 'fortran_order': False, 'shape': (3, 4), }").unwrap();
        assert_eq!(
            h,
            NpyHeader {
                dtype: DType::F32,
                shape: vec![3, 4],
                fortran_order: false,
                big_endian: false,
            }
        );
    }

    #[test]
    fn test_parse_header_variants() {
        let h = header("{'descr': '>i8', 'fortran_order': True, 'shape': (5,), }").unwrap();
        assert_eq!(h.dtype, DType::I64);
        assert!(h.big_endian && h.fortran_order);
        assert_eq!(h.shape, vec![5]);

        let h = header("{\"shape\": (), \"fortran_order\": False, \"descr\": \"|u1\"}").unwrap();
        assert_eq!(h.dtype, DType::U8);
        assert!(h.shape.is_empty());
    }

    #[test]
    fn test_parse_header_rejects_unknown_kinds() {
        for descr in ["'<c8'", "'<U4'", "'|b1'", "[('a', '<f4')]"] {
            let text = format!("{{'descr': {descr}, 'fortran_order': False, 'shape': (1,), }}");
            assert!(
                matches!(header(&text), Err(IoError::UnsupportedNumericKind(_))),
                "{descr} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_header_missing_key() {
        assert!(matches!(
            header("{'descr': '<f4', 'shape': (2,), }"),
            Err(IoError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_write_npy_header_alignment() {
        let t = Tensor::<f64>::zeros([2, 3]);
        let mut buf = Vec::new();
        write_npy(&t, &mut buf).unwrap();

        let header_len = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        let data_start = 10 + header_len;
        assert_eq!(data_start % ALIGNMENT, 0);
        assert_eq!(buf[data_start - 1], b'\n');
        assert_eq!(buf.len(), data_start + 6 * 8);
        assert_eq!(&buf[..8], b"\x93NUMPY\x01\x00");
    }

    #[test]
    fn test_numel_overflow() {
        let h = NpyHeader {
            dtype: DType::U8,
            shape: vec![usize::MAX, 2],
            fortran_order: false,
            big_endian: false,
        };
        assert!(matches!(h.numel(), Err(IoError::InvalidHeader(_))));
    }
}
