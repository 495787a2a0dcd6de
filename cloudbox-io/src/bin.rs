//! Flat binary point cloud format support
//!
//! Lidar sweeps are stored as a raw little-endian `f32` array with five
//! channels per point: x, y, z, intensity and ring index. The decoder keeps
//! the first four channels and drops the ring index.

use cloudbox_core::{Error, Result};
use nalgebra::DMatrix;

/// Channels stored per point on disk: x, y, z, intensity and ring index.
const FILE_CHANNELS: usize = 5;
/// Channels kept in the decoded matrix; the ring index is dropped.
const CLOUD_CHANNELS: usize = 4;
/// Bytes consumed by one point record.
const POINT_STRIDE: usize = FILE_CHANNELS * std::mem::size_of::<f32>();

/// Decode a flat binary buffer into a `4 x n` matrix of x, y, z, intensity.
///
/// The buffer length must be an exact multiple of the point record size;
/// a trailing partial record is an error, never silently truncated.
pub fn decode(buffer: &[u8]) -> Result<DMatrix<f32>> {
    if buffer.len() % POINT_STRIDE != 0 {
        return Err(Error::MalformedInput(format!(
            "buffer length {} is not a multiple of the {}-byte point record",
            buffer.len(),
            POINT_STRIDE
        )));
    }

    let count = buffer.len() / POINT_STRIDE;
    let mut points = DMatrix::zeros(CLOUD_CHANNELS, count);
    for (index, record) in buffer.chunks_exact(POINT_STRIDE).enumerate() {
        for channel in 0..CLOUD_CHANNELS {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&record[channel * 4..channel * 4 + 4]);
            points[(channel, index)] = f32::from_le_bytes(bytes);
        }
    }

    log::debug!("decoded {} points from a flat binary buffer", count);
    Ok(points)
}
