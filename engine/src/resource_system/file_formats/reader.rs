use glam::{Mat4, Quat, Vec3, Vec4};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("string table entry is not valid utf-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("count field {count} exceeds remaining data")]
    ImplausibleCount { count: u32 },
}

/// Little-endian cursor over a byte slice. Every accessor is bounds
/// checked; a short buffer surfaces as `DecodeError::UnexpectedEof`
/// instead of a panic.
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEof {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn f32(&mut self) -> Result<f32, DecodeError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Count prefix for a sequence of records that each occupy at least
    /// `min_record_size` bytes. Rejects counts the remaining buffer
    /// cannot possibly hold, so corrupt headers fail fast instead of
    /// driving a near-infinite loop.
    pub fn count(&mut self, min_record_size: usize) -> Result<u32, DecodeError> {
        let count = self.u32()?;
        if count as usize * min_record_size > self.remaining() {
            return Err(DecodeError::ImplausibleCount { count });
        }
        Ok(count)
    }

    pub fn vec3(&mut self) -> Result<Vec3, DecodeError> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    pub fn vec4(&mut self) -> Result<Vec4, DecodeError> {
        Ok(Vec4::new(self.f32()?, self.f32()?, self.f32()?, self.f32()?))
    }

    pub fn quat(&mut self) -> Result<Quat, DecodeError> {
        Ok(Quat::from_xyzw(
            self.f32()?,
            self.f32()?,
            self.f32()?,
            self.f32()?,
        ))
    }

    /// Matrices are stored row-major on disk; glam is column-major, so
    /// the raw entries come in transposed.
    pub fn mat4(&mut self) -> Result<Mat4, DecodeError> {
        let mut entries = [0.0f32; 16];
        for e in entries.iter_mut() {
            *e = self.f32()?;
        }
        Ok(Mat4::from_cols_array(&entries).transpose())
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        self.take(n)
    }
}

/// Append-only writer mirroring `ByteReader`'s layout.
#[derive(Default)]
pub struct ByteWriter {
    data: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn f32(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn vec3(&mut self, v: Vec3) {
        for c in v.to_array() {
            self.f32(c);
        }
    }

    pub fn vec4(&mut self, v: Vec4) {
        for c in v.to_array() {
            self.f32(c);
        }
    }

    pub fn quat(&mut self, q: Quat) {
        for c in q.to_array() {
            self.f32(c);
        }
    }

    pub fn mat4(&mut self, m: Mat4) {
        for c in m.transpose().to_cols_array() {
            self.f32(c);
        }
    }

    pub fn bytes(&mut self, b: &[u8]) {
        self.data.extend_from_slice(b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars_and_vectors() {
        let mut w = ByteWriter::new();
        w.u32(7);
        w.f32(-2.5);
        w.vec3(Vec3::new(1.0, 2.0, 3.0));
        w.vec4(Vec4::new(4.0, 5.0, 6.0, 7.0));
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.u32().unwrap(), 7);
        assert_eq!(r.f32().unwrap(), -2.5);
        assert_eq!(r.vec3().unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(r.vec4().unwrap(), Vec4::new(4.0, 5.0, 6.0, 7.0));
        assert!(r.is_empty());
    }

    #[test]
    fn mat4_round_trip_preserves_matrix() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)) * Mat4::from_rotation_x(0.3);
        let mut w = ByteWriter::new();
        w.mat4(m);
        let bytes = w.into_bytes();
        let back = ByteReader::new(&bytes).mat4().unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn mat4_on_disk_layout_is_row_major() {
        let m = Mat4::from_translation(Vec3::new(9.0, 10.0, 11.0));
        let mut w = ByteWriter::new();
        w.mat4(m);
        let bytes = w.into_bytes();
        // Translation lands at row-major entries 3, 7, 11.
        let entry = |i: usize| {
            f32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]])
        };
        assert_eq!(entry(3), 9.0);
        assert_eq!(entry(7), 10.0);
        assert_eq!(entry(11), 11.0);
    }

    #[test]
    fn truncated_read_errors() {
        let bytes = [1u8, 2, 3];
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            r.u32(),
            Err(DecodeError::UnexpectedEof { needed: 4, remaining: 3 })
        ));
    }

    #[test]
    fn implausible_count_errors() {
        let mut w = ByteWriter::new();
        w.u32(1_000_000);
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            r.count(16),
            Err(DecodeError::ImplausibleCount { count: 1_000_000 })
        ));
    }
}
