//! Chunk filters: deflate, shuffle and fletcher32.

use crate::error::FormatError;
use crate::filter_pipeline::{FilterPipeline, FILTER_DEFLATE, FILTER_FLETCHER32, FILTER_SHUFFLE};

/// Undo a pipeline on one stored chunk. Filters run in reverse order;
/// filters whose bit is set in `filter_mask` were skipped on write.
pub fn decompress_chunk(
    stored: &[u8],
    pipeline: &FilterPipeline,
    filter_mask: u32,
    element_size: u32,
) -> Result<Vec<u8>, FormatError> {
    let mut data = stored.to_vec();
    for (i, filter) in pipeline.filters.iter().enumerate().rev() {
        if i < 32 && filter_mask & (1 << i) != 0 {
            continue;
        }
        data = match filter.filter_id {
            FILTER_SHUFFLE => unshuffle(&data, element_size as usize)?,
            FILTER_DEFLATE => inflate(&data)?,
            FILTER_FLETCHER32 => fletcher32_strip(&data)?,
            other => return Err(FormatError::UnsupportedFilter(other)),
        };
    }
    Ok(data)
}

/// Apply a pipeline to one chunk before it is stored.
pub fn compress_chunk(
    data: &[u8],
    pipeline: &FilterPipeline,
    element_size: u32,
) -> Result<Vec<u8>, FormatError> {
    let mut out = data.to_vec();
    for filter in &pipeline.filters {
        out = match filter.filter_id {
            FILTER_SHUFFLE => shuffle(&out, element_size as usize)?,
            FILTER_DEFLATE => deflate(&out, filter.client_data.first().copied().unwrap_or(6))?,
            FILTER_FLETCHER32 => {
                let sum = fletcher32(&out);
                out.extend_from_slice(&sum.to_le_bytes());
                out
            }
            other => return Err(FormatError::UnsupportedFilter(other)),
        };
    }
    Ok(out)
}

#[cfg(feature = "deflate")]
fn inflate(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    use std::io::Read;
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| FormatError::DecompressionError(e.to_string()))?;
    Ok(out)
}

#[cfg(not(feature = "deflate"))]
fn inflate(_data: &[u8]) -> Result<Vec<u8>, FormatError> {
    Err(FormatError::UnsupportedFilter(FILTER_DEFLATE))
}

#[cfg(feature = "deflate")]
fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>, FormatError> {
    use std::io::Write;
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(level.min(9)));
    encoder
        .write_all(data)
        .map_err(|e| FormatError::CompressionError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| FormatError::CompressionError(e.to_string()))
}

#[cfg(not(feature = "deflate"))]
fn deflate(_data: &[u8], _level: u32) -> Result<Vec<u8>, FormatError> {
    Err(FormatError::UnsupportedFilter(FILTER_DEFLATE))
}

fn check_multiple(len: usize, element_size: usize) -> Result<(), FormatError> {
    if len % element_size != 0 {
        return Err(FormatError::FilterError(format!(
            "shuffle: {len} bytes is not a multiple of element size {element_size}"
        )));
    }
    Ok(())
}

/// Group byte 0 of every element, then byte 1, and so on.
fn shuffle(data: &[u8], element_size: usize) -> Result<Vec<u8>, FormatError> {
    if element_size <= 1 {
        return Ok(data.to_vec());
    }
    check_multiple(data.len(), element_size)?;
    let n = data.len() / element_size;
    let mut out = vec![0u8; data.len()];
    for i in 0..n {
        for j in 0..element_size {
            out[j * n + i] = data[i * element_size + j];
        }
    }
    Ok(out)
}

fn unshuffle(data: &[u8], element_size: usize) -> Result<Vec<u8>, FormatError> {
    if element_size <= 1 {
        return Ok(data.to_vec());
    }
    check_multiple(data.len(), element_size)?;
    let n = data.len() / element_size;
    let mut out = vec![0u8; data.len()];
    for i in 0..n {
        for j in 0..element_size {
            out[i * element_size + j] = data[j * n + i];
        }
    }
    Ok(out)
}

/// Fletcher-32 over big-endian 16-bit words; an odd trailing byte is
/// treated as the high byte of a final word.
fn fletcher32(data: &[u8]) -> u32 {
    let mut sum1: u64 = 0;
    let mut sum2: u64 = 0;
    for word in data.chunks(2) {
        let val = match word {
            [hi, lo] => ((*hi as u64) << 8) | *lo as u64,
            [hi] => (*hi as u64) << 8,
            _ => 0,
        };
        sum1 = (sum1 + val) % 65535;
        sum2 = (sum2 + sum1) % 65535;
    }
    ((sum2 << 16) | sum1) as u32
}

fn fletcher32_strip(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    if data.len() < 4 {
        return Err(FormatError::FilterError(
            "fletcher32: chunk shorter than its checksum".into(),
        ));
    }
    let (payload, tail) = data.split_at(data.len() - 4);
    let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let computed = fletcher32(payload);
    // older library versions stored the checksum byte-swapped
    if stored != computed && stored != computed.swap_bytes() {
        return Err(FormatError::FilterError(format!(
            "fletcher32 mismatch: stored {stored:#010x}, computed {computed:#010x}"
        )));
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_pipeline::FilterDescription;

    fn pipeline(ids: &[u16]) -> FilterPipeline {
        FilterPipeline {
            filters: ids
                .iter()
                .map(|&filter_id| FilterDescription {
                    filter_id,
                    name: None,
                    flags: 0,
                    client_data: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn shuffle_known_pattern() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(shuffle(&data, 4).unwrap(), vec![1, 5, 2, 6, 3, 7, 4, 8]);
        assert_eq!(unshuffle(&[1, 5, 2, 6, 3, 7, 4, 8], 4).unwrap(), data.to_vec());
    }

    #[test]
    fn shuffle_rejects_ragged_input() {
        assert!(shuffle(&[0; 7], 4).is_err());
    }

    #[test]
    fn fletcher32_big_endian_words() {
        assert_eq!(fletcher32(&[0x00, 0x01, 0x00, 0x02]), 0x0004_0003);
        assert_eq!(fletcher32(&[0x01]), 0x0100_0100);
    }

    #[test]
    fn fletcher32_pipeline_detects_corruption() {
        let p = pipeline(&[FILTER_FLETCHER32]);
        let mut stored = compress_chunk(&[9; 16], &p, 4).unwrap();
        assert_eq!(decompress_chunk(&stored, &p, 0, 4).unwrap(), vec![9; 16]);
        stored[0] = 0;
        assert!(decompress_chunk(&stored, &p, 0, 4).is_err());
    }

    #[test]
    fn masked_filter_is_skipped() {
        let p = pipeline(&[FILTER_SHUFFLE]);
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(decompress_chunk(&data, &p, 0b1, 4).unwrap(), data.to_vec());
    }

    #[test]
    #[cfg(feature = "deflate")]
    fn shuffle_deflate_roundtrip() {
        let p = FilterPipeline::shuffle_deflate(6);
        let data: Vec<u8> = (0..4000u32).flat_map(|v| (v as f32).to_le_bytes()).collect();
        let stored = compress_chunk(&data, &p, 4).unwrap();
        assert!(stored.len() < data.len());
        assert_eq!(decompress_chunk(&stored, &p, 0, 4).unwrap(), data);
    }

    #[test]
    fn unknown_filter() {
        let p = pipeline(&[32000]);
        assert_eq!(
            decompress_chunk(&[0; 4], &p, 0, 4).unwrap_err(),
            FormatError::UnsupportedFilter(32000)
        );
    }
}
