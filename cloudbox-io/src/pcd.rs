//! Self-describing binary point cloud format support
//!
//! Radar scans are stored with a line-oriented ASCII header followed by a
//! binary payload. The header declares the per-field byte widths and value
//! types, so the binary layout is only known at run time:
//!
//! ```text
//! # .PCD v0.7 - Point Cloud Data file format
//! VERSION 0.7
//! FIELDS x y z rcs vx vy
//! SIZE 4 4 4 4 4 4
//! TYPE F F F F F F
//! COUNT 1 1 1 1 1 1
//! WIDTH 125
//! HEIGHT 1
//! VIEWPOINT 0 0 0 1 0 0 0
//! POINTS 125
//! DATA binary
//! ```
//!
//! The payload starts immediately after the `DATA binary` line and holds
//! `WIDTH` points, each a little-endian field sequence in header order.

use cloudbox_core::{Error, Result};
use nalgebra::DMatrix;

/// Number of header lines in the strict layout, the DATA marker included.
const HEADER_LINES: usize = 11;
const COMMENT_LINE: usize = 0;
const VERSION_LINE: usize = 1;
const SIZE_LINE: usize = 3;
const TYPE_LINE: usize = 4;
const COUNT_LINE: usize = 5;
const WIDTH_LINE: usize = 6;
const HEIGHT_LINE: usize = 7;
const DATA_LINE: usize = 10;

/// Primitive type of one header-declared field, resolved once from the
/// TYPE code and SIZE width and applied by a fixed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F16,
    F32,
    F64,
}

impl FieldType {
    /// Resolve a TYPE code and SIZE pair to a decodable primitive.
    fn from_code(code: &str, size: usize) -> Result<Self> {
        match (code, size) {
            ("I", 1) => Ok(Self::I8),
            ("I", 2) => Ok(Self::I16),
            ("I", 4) => Ok(Self::I32),
            ("I", 8) => Ok(Self::I64),
            ("U", 1) => Ok(Self::U8),
            ("U", 2) => Ok(Self::U16),
            ("U", 4) => Ok(Self::U32),
            ("U", 8) => Ok(Self::U64),
            ("F", 2) => Ok(Self::F16),
            ("F", 4) => Ok(Self::F32),
            ("F", 8) => Ok(Self::F64),
            _ => Err(Error::MalformedInput(format!(
                "unsupported TYPE/SIZE combination: {}/{}",
                code, size
            ))),
        }
    }

    /// Bytes consumed by one value of this field.
    fn size(&self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 | Self::F16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Decode one little-endian value, widening it to `f32`.
    ///
    /// `bytes` must hold exactly `self.size()` bytes.
    fn decode(&self, bytes: &[u8]) -> f32 {
        match self {
            Self::I8 => bytes[0] as i8 as f32,
            Self::U8 => bytes[0] as f32,
            Self::I16 => {
                let mut buf = [0u8; 2];
                buf.copy_from_slice(bytes);
                i16::from_le_bytes(buf) as f32
            }
            Self::U16 => {
                let mut buf = [0u8; 2];
                buf.copy_from_slice(bytes);
                u16::from_le_bytes(buf) as f32
            }
            Self::F16 => {
                let mut buf = [0u8; 2];
                buf.copy_from_slice(bytes);
                half_to_f32(u16::from_le_bytes(buf))
            }
            Self::I32 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                i32::from_le_bytes(buf) as f32
            }
            Self::U32 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                u32::from_le_bytes(buf) as f32
            }
            Self::F32 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                f32::from_le_bytes(buf)
            }
            Self::I64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                i64::from_le_bytes(buf) as f32
            }
            Self::U64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                u64::from_le_bytes(buf) as f32
            }
            Self::F64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                f64::from_le_bytes(buf) as f32
            }
        }
    }
}

/// Header fields the decoder consumes.
struct Header {
    fields: Vec<FieldType>,
    width: usize,
}

/// Decode a self-describing buffer into a `channels x WIDTH` matrix.
///
/// A NaN in any field of the first decoded point marks an intentionally
/// empty cloud; the result is then a `channels x 0` matrix, not an error.
pub fn decode(buffer: &[u8]) -> Result<DMatrix<f32>> {
    let (lines, payload) = split_header(buffer)?;
    let header = parse_header(&lines)?;
    let channels = header.fields.len();

    let mut points = DMatrix::zeros(channels, header.width);
    let mut offset = 0;
    for col in 0..header.width {
        for (row, field) in header.fields.iter().enumerate() {
            let end = offset + field.size();
            let bytes = payload.get(offset..end).ok_or_else(|| {
                Error::OutOfBounds(format!(
                    "field read at bytes {}..{} exceeds the {}-byte payload",
                    offset,
                    end,
                    payload.len()
                ))
            })?;
            points[(row, col)] = field.decode(bytes);
            offset = end;
        }
    }

    if points.column(0).iter().any(|value| value.is_nan()) {
        log::debug!("first point is NaN, treating the scan as empty");
        return Ok(DMatrix::zeros(channels, 0));
    }

    log::debug!("decoded {} points with {} channels", header.width, channels);
    Ok(points)
}

/// Split the buffer into trimmed header lines and the binary payload.
///
/// The header ends at the first line starting with `DATA`; the payload is
/// everything after that line's terminator.
fn split_header(buffer: &[u8]) -> Result<(Vec<String>, &[u8])> {
    let mut lines = Vec::new();
    let mut cursor = 0;
    while cursor < buffer.len() {
        let line_end = buffer[cursor..]
            .iter()
            .position(|&byte| byte == b'\n')
            .map(|at| cursor + at)
            .unwrap_or(buffer.len());
        let line = std::str::from_utf8(&buffer[cursor..line_end])
            .map_err(|_| Error::MalformedInput("header is not valid UTF-8".to_string()))?
            .trim()
            .to_string();
        cursor = line_end + 1;

        let reached_data = line.starts_with("DATA");
        lines.push(line);
        if reached_data {
            return Ok((lines, &buffer[cursor.min(buffer.len())..]));
        }
    }
    Err(Error::MalformedInput(
        "header has no DATA marker".to_string(),
    ))
}

/// Check the strict header layout and extract the decode descriptors.
fn parse_header(lines: &[String]) -> Result<Header> {
    if lines.len() != HEADER_LINES {
        return Err(Error::MalformedInput(format!(
            "expected the DATA marker on header line {}, found it on line {}",
            HEADER_LINES,
            lines.len()
        )));
    }
    if !lines[COMMENT_LINE].starts_with('#') {
        return Err(Error::MalformedInput(
            "first header line must be a comment".to_string(),
        ));
    }
    if !lines[VERSION_LINE].starts_with("VERSION") {
        return Err(Error::MalformedInput(
            "second header line must be VERSION".to_string(),
        ));
    }

    let sizes = keyword_values(lines, SIZE_LINE, "SIZE")?;
    let types = keyword_values(lines, TYPE_LINE, "TYPE")?;
    let counts = keyword_values(lines, COUNT_LINE, "COUNT")?;
    if types.is_empty() {
        return Err(Error::MalformedInput(
            "header declares no fields".to_string(),
        ));
    }
    if sizes.len() != types.len() || counts.len() != types.len() {
        return Err(Error::MalformedInput(format!(
            "SIZE, TYPE and COUNT declare {}, {} and {} fields, expected them to match",
            sizes.len(),
            types.len(),
            counts.len()
        )));
    }
    for &count in &counts {
        if count != "1" {
            return Err(Error::MalformedInput(format!(
                "COUNT {} is not supported, fields must be scalar",
                count
            )));
        }
    }

    let width: usize = keyword_value(lines, WIDTH_LINE, "WIDTH")?
        .parse()
        .map_err(|_| Error::MalformedInput("WIDTH is not an integer".to_string()))?;
    if width == 0 {
        return Err(Error::MalformedInput("WIDTH must be positive".to_string()));
    }
    let height: usize = keyword_value(lines, HEIGHT_LINE, "HEIGHT")?
        .parse()
        .map_err(|_| Error::MalformedInput("HEIGHT is not an integer".to_string()))?;
    if height != 1 {
        return Err(Error::MalformedInput(format!(
            "HEIGHT {} is not supported, expected 1",
            height
        )));
    }
    let data = keyword_value(lines, DATA_LINE, "DATA")?;
    if data != "binary" {
        return Err(Error::MalformedInput(format!(
            "DATA mode {} is not supported, expected binary",
            data
        )));
    }

    let fields = types
        .iter()
        .zip(sizes.iter())
        .map(|(&code, &size)| {
            let size: usize = size.parse().map_err(|_| {
                Error::MalformedInput(format!("SIZE {} is not an integer", size))
            })?;
            FieldType::from_code(code, size)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Header {
        fields,
        width,
    })
}

/// The values of a header line, after checking its leading keyword.
fn keyword_values<'a>(lines: &'a [String], index: usize, keyword: &str) -> Result<Vec<&'a str>> {
    let mut tokens = lines[index].split_whitespace();
    if tokens.next() != Some(keyword) {
        return Err(Error::MalformedInput(format!(
            "header line {} must start with {}",
            index + 1,
            keyword
        )));
    }
    Ok(tokens.collect())
}

/// The single value of a header line, after checking its leading keyword.
fn keyword_value<'a>(lines: &'a [String], index: usize, keyword: &str) -> Result<&'a str> {
    keyword_values(lines, index, keyword)?
        .first()
        .copied()
        .ok_or_else(|| {
            Error::MalformedInput(format!("header line {} ({}) has no value", index + 1, keyword))
        })
}

/// Widen an IEEE 754 half-precision value to single precision.
fn half_to_f32(bits: u16) -> f32 {
    let sign = u32::from(bits >> 15) << 31;
    let exponent = u32::from((bits >> 10) & 0x1f);
    let mantissa = u32::from(bits & 0x3ff);
    match exponent {
        // Zero or subnormal: mantissa * 2^-24.
        0 => {
            let magnitude = mantissa as f32 * f32::from_bits(0x3380_0000);
            if sign == 0 {
                magnitude
            } else {
                -magnitude
            }
        }
        0x1f => {
            if mantissa == 0 {
                f32::from_bits(sign | 0x7f80_0000)
            } else {
                f32::from_bits(sign | 0x7fc0_0000 | (mantissa << 13))
            }
        }
        _ => f32::from_bits(sign | ((exponent + 112) << 23) | (mantissa << 13)),
    }
}
