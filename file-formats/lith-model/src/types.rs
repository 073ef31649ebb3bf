//! Wire-level math primitives shared by all readers and writers.
//!
//! Matrices are row-major with the translation in the fourth column, the
//! layout the formats store on disk. `to_glam`/`from_glam` bridge to glam's
//! column-major types for actual math.

use std::io::{Read, Write};

use crate::error::Result;
use crate::io_ext::{ReadExt, WriteExt};

/// 2D vector (texture coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            x: reader.read_f32_le()?,
            y: reader.read_f32_le()?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32_le(self.x)?;
        writer.write_f32_le(self.y)?;
        Ok(())
    }
}

/// 3D vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            x: reader.read_f32_le()?,
            y: reader.read_f32_le()?,
            z: reader.read_f32_le()?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32_le(self.x)?;
        writer.write_f32_le(self.y)?;
        writer.write_f32_le(self.z)?;
        Ok(())
    }

    /// Convert to a glam Vec3
    pub fn to_glam(self) -> glam::Vec3 {
        glam::Vec3::new(self.x, self.y, self.z)
    }

    /// Convert from a glam Vec3
    pub fn from_glam(v: glam::Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }

    pub fn length(self) -> f32 {
        self.to_glam().length()
    }
}

/// Quaternion stored on disk as x, y, z, w
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Quat {
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            x: reader.read_f32_le()?,
            y: reader.read_f32_le()?,
            z: reader.read_f32_le()?,
            w: reader.read_f32_le()?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32_le(self.x)?;
        writer.write_f32_le(self.y)?;
        writer.write_f32_le(self.z)?;
        writer.write_f32_le(self.w)?;
        Ok(())
    }

    /// Convert to a glam Quat
    pub fn to_glam(self) -> glam::Quat {
        glam::Quat::from_xyzw(self.x, self.y, self.z, self.w)
    }

    /// Convert from a glam Quat
    pub fn from_glam(q: glam::Quat) -> Self {
        Self {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }
}

/// Row-major 4x4 matrix as stored in node records
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub rows: [[f32; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Reads 16 floats, four per row.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut rows = [[0.0f32; 4]; 4];
        for row in &mut rows {
            for value in row.iter_mut() {
                *value = reader.read_f32_le()?;
            }
        }
        Ok(Self { rows })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        for row in &self.rows {
            for value in row {
                writer.write_f32_le(*value)?;
            }
        }
        Ok(())
    }

    /// Translation column of the matrix.
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.rows[0][3], self.rows[1][3], self.rows[2][3])
    }

    /// Builds a translation-only matrix.
    pub fn from_translation(t: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.rows[0][3] = t.x;
        m.rows[1][3] = t.y;
        m.rows[2][3] = t.z;
        m
    }

    /// Convert to a glam Mat4 (transposing row-major storage to columns)
    pub fn to_glam(self) -> glam::Mat4 {
        glam::Mat4::from_cols_array_2d(&self.rows).transpose()
    }

    /// Convert from a glam Mat4
    pub fn from_glam(m: glam::Mat4) -> Self {
        Self {
            rows: m.transpose().to_cols_array_2d(),
        }
    }

    /// Applies the matrix to a point (w = 1).
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        Vec3::from_glam(self.to_glam().transform_point3(p.to_glam()))
    }

    /// Applies the rotational part to a direction and renormalizes.
    pub fn rotate_direction(&self, d: Vec3) -> Vec3 {
        let rotated = glam::Mat3::from_mat4(self.to_glam()) * d.to_glam();
        Vec3::from_glam(rotated.normalize_or_zero())
    }
}

/// A keyframe transform: position plus rotation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub location: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            location: Vec3::parse(reader)?,
            rotation: Quat::parse(reader)?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.location.write(writer)?;
        self.rotation.write(writer)?;
        Ok(())
    }
}
