//! PDF Stream Filters
//!
//! Decodes stream payloads according to ISO 32000-1 Section 7.4. Only the
//! general-purpose filters are handled; image codecs are reported as
//! unsupported.

use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Variant};

#[cfg(feature = "compression")]
use flate2::read::ZlibDecoder;
#[cfg(feature = "compression")]
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    ASCIIHexDecode,
    ASCII85Decode,
    LZWDecode,
    /// zlib/deflate
    FlateDecode,
    RunLengthDecode,
    CCITTFaxDecode,
    JBIG2Decode,
    DCTDecode,
    JPXDecode,
    Crypt,
}

impl Filter {
    /// Parse filter from name, including the abbreviations allowed in inline images
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "LZWDecode" | "LZW" => Some(Filter::LZWDecode),
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            "CCITTFaxDecode" | "CCF" => Some(Filter::CCITTFaxDecode),
            "JBIG2Decode" => Some(Filter::JBIG2Decode),
            "DCTDecode" | "DCT" => Some(Filter::DCTDecode),
            "JPXDecode" => Some(Filter::JPXDecode),
            "Crypt" => Some(Filter::Crypt),
            _ => None,
        }
    }
}

/// Filter chain named by `/Filter`, paired with the matching `/DecodeParms`.
pub fn filter_chain(dict: &Dictionary) -> Result<Vec<(Filter, Option<Dictionary>)>> {
    let names: Vec<&Variant> = match dict.get("Filter") {
        None | Some(Variant::Null) => return Ok(Vec::new()),
        Some(name @ Variant::Name(_)) => vec![name],
        Some(Variant::Array(array)) => array.iter().collect(),
        Some(other) => {
            return Err(PdfError::StreamDecode(format!(
                "invalid /Filter of type {}",
                other.data_type()
            )))
        }
    };

    let params: Vec<Option<Dictionary>> = match dict.get("DecodeParms") {
        Some(Variant::Dictionary(d)) => vec![Some(d.clone())],
        Some(Variant::Array(array)) => array.iter().map(|v| v.as_dict().cloned()).collect(),
        _ => Vec::new(),
    };

    names
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let name = value
                .as_name()
                .and_then(|n| n.as_str())
                .ok_or_else(|| PdfError::StreamDecode("invalid filter in array".to_string()))?;
            let filter = Filter::from_name(name)
                .ok_or_else(|| PdfError::StreamDecode(format!("unknown filter: {name}")))?;
            Ok((filter, params.get(i).cloned().flatten()))
        })
        .collect()
}

/// Decode stream data according to the filters in `dict`
pub fn decode_stream(data: &[u8], dict: &Dictionary) -> Result<Vec<u8>> {
    let mut result = data.to_vec();
    for (filter, params) in filter_chain(dict)? {
        result = apply_filter(&result, filter, params.as_ref())?;
    }
    Ok(result)
}

fn apply_filter(data: &[u8], filter: Filter, params: Option<&Dictionary>) -> Result<Vec<u8>> {
    match filter {
        Filter::FlateDecode => {
            let decoded = decode_flate(data)?;
            apply_predictor(decoded, params)
        }
        Filter::ASCIIHexDecode => decode_ascii_hex(data),
        Filter::ASCII85Decode => decode_ascii85(data),
        Filter::RunLengthDecode => decode_run_length(data),
        // Document decryption already happened while loading.
        Filter::Crypt => Ok(data.to_vec()),
        other => Err(PdfError::StreamDecode(format!(
            "filter {other:?} is not supported"
        ))),
    }
}

#[cfg(feature = "compression")]
fn decode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|e| PdfError::StreamDecode(format!("Flate decode error: {e}")))?;
    Ok(result)
}

#[cfg(not(feature = "compression"))]
fn decode_flate(_data: &[u8]) -> Result<Vec<u8>> {
    Err(PdfError::StreamDecode(
        "FlateDecode requires 'compression' feature".to_string(),
    ))
}

/// Undo a PNG (10..=15) or TIFF (2) predictor.
pub fn apply_predictor(data: Vec<u8>, params: Option<&Dictionary>) -> Result<Vec<u8>> {
    let Some(params) = params else {
        return Ok(data);
    };
    let predictor = params.get_number_or("Predictor", 1);
    if predictor <= 1 {
        return Ok(data);
    }

    let colors = predictor_param(params, "Colors", 1)?;
    if colors > MAX_COLORS {
        return Err(PdfError::StreamDecode(format!(
            "predictor /Colors {colors} is larger than {MAX_COLORS}"
        )));
    }
    let bits = predictor_param(params, "BitsPerComponent", 8)?;
    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return Err(PdfError::StreamDecode(format!(
            "invalid predictor /BitsPerComponent {bits}"
        )));
    }
    let columns = predictor_param(params, "Columns", 1)?;

    let bits_per_pixel = colors * bits;
    let bytes_per_pixel = bits_per_pixel.div_ceil(8);
    let row_len = bits_per_pixel
        .checked_mul(columns)
        .map(|row_bits| row_bits.div_ceil(8))
        .ok_or_else(|| {
            PdfError::StreamDecode(format!("predictor /Columns {columns} is out of range"))
        })?;
    if data.is_empty() {
        return Ok(data);
    }
    if row_len > data.len() {
        return Err(PdfError::StreamDecode(format!(
            "predictor row of {row_len} bytes is longer than the {} bytes of data",
            data.len()
        )));
    }

    match predictor {
        2 => {
            if bits != 8 {
                return Err(PdfError::StreamDecode(format!(
                    "TIFF predictor with {bits} bits per component is not supported"
                )));
            }
            let mut out = data;
            for row in out.chunks_mut(row_len) {
                for i in bytes_per_pixel..row.len() {
                    row[i] = row[i].wrapping_add(row[i - bytes_per_pixel]);
                }
            }
            Ok(out)
        }
        10..=15 => decode_png_rows(&data, row_len, bytes_per_pixel),
        other => Err(PdfError::StreamDecode(format!("unknown predictor {other}"))),
    }
}

/// Upper bound on `/Colors` in `/DecodeParms`
const MAX_COLORS: usize = 32;

/// A positive integer predictor parameter, `default` when absent
fn predictor_param(params: &Dictionary, key: &str, default: usize) -> Result<usize> {
    match params.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_number()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                PdfError::StreamDecode(format!("invalid predictor /{key} {value:?}"))
            }),
    }
}

fn decode_png_rows(data: &[u8], row_len: usize, bpp: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        let (&tag, encoded) = chunk
            .split_first()
            .ok_or_else(|| PdfError::StreamDecode("empty predictor row".to_string()))?;
        let mut row = encoded.to_vec();
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let upper_left = if i >= bpp { previous[i - bpp] } else { 0 };
            row[i] = match tag {
                0 => row[i],
                1 => row[i].wrapping_add(left),
                2 => row[i].wrapping_add(up),
                3 => row[i].wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => row[i].wrapping_add(paeth(left, up, upper_left)),
                other => {
                    return Err(PdfError::StreamDecode(format!(
                        "invalid PNG predictor tag {other}"
                    )))
                }
            };
        }

        out.extend_from_slice(&row[..encoded.len().min(row_len)]);
        previous = row;
    }

    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut digits = Vec::with_capacity(data.len());
    for &ch in data.iter().filter(|b| !b.is_ascii_whitespace()) {
        if ch == b'>' {
            break;
        }
        let value = crate::objects::hex_value(ch).ok_or_else(|| {
            PdfError::StreamDecode(format!("Invalid hex digit: {}", ch as char))
        })?;
        digits.push(value);
    }
    Ok(digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect())
}

fn decode_ascii85(data: &[u8]) -> Result<Vec<u8>> {
    let mut body: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if body.starts_with(b"<~") {
        body.drain(..2);
    }

    let mut result = Vec::with_capacity(body.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut count = 0;

    let mut iter = body.iter().copied();
    while let Some(c) = iter.next() {
        match c {
            b'~' => {
                if iter.next() == Some(b'>') {
                    break;
                }
                return Err(PdfError::StreamDecode(
                    "Invalid ASCII85 end marker".to_string(),
                ));
            }
            b'z' if count == 0 => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[count] = c;
                count += 1;
                if count == 5 {
                    result.extend_from_slice(&ascii85_group(&group)?);
                    count = 0;
                }
            }
            _ => {
                return Err(PdfError::StreamDecode(format!(
                    "Invalid ASCII85 character: {}",
                    c as char
                )))
            }
        }
    }

    if count == 1 {
        return Err(PdfError::StreamDecode(
            "ASCII85 final group with a single character".to_string(),
        ));
    }
    if count > 1 {
        for slot in group.iter_mut().skip(count) {
            *slot = b'u';
        }
        let bytes = ascii85_group(&group)?;
        result.extend_from_slice(&bytes[..count - 1]);
    }

    Ok(result)
}

fn ascii85_group(group: &[u8; 5]) -> Result<[u8; 4]> {
    let value = group
        .iter()
        .fold(0u64, |acc, &ch| acc * 85 + u64::from(ch - b'!'));
    let value = u32::try_from(value)
        .map_err(|_| PdfError::StreamDecode("ASCII85 group out of range".to_string()))?;
    Ok(value.to_be_bytes())
}

fn decode_run_length(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let end = i + length as usize + 1;
                let literal = data.get(i..end).ok_or_else(|| {
                    PdfError::StreamDecode("truncated RunLength literal run".to_string())
                })?;
                result.extend_from_slice(literal);
                i = end;
            }
            _ => {
                let byte = *data.get(i).ok_or_else(|| {
                    PdfError::StreamDecode("truncated RunLength repeat run".to_string())
                })?;
                result.extend(std::iter::repeat(byte).take(257 - length as usize));
                i += 1;
            }
        }
    }
    Ok(result)
}
