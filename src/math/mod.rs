//! 统一的数学库模块
//!
//! 基于 `nalgebra` 提供导入管线使用的数学类型。
//!
//! # 模块组织
//!
//! - **基础类型**：Vector3, Matrix3/4, Quaternion, Color
//! - **常量**：EPSILON 等
//! - **几何处理**：稳健的三角形法线、顶点法线重建、切线空间（见 `geometry`）
//! - **包围盒**：轴对齐包围盒累积与变换（见 `bounds`）

pub use nalgebra::{Matrix3 as Mat3, Matrix4 as Mat4, Point3, UnitQuaternion, Vector3 as Vec3};
use serde::{Deserialize, Serialize};

// 类型别名，使用更简洁的名称
pub type Vector3 = Vec3<f32>;
pub type Matrix3 = Mat3<f32>;
pub type Matrix4 = Mat4<f32>;
pub type Quaternion = UnitQuaternion<f32>;

pub mod bounds;
pub mod geometry;

pub use bounds::Aabb;

/// 颜色类型（RGBA，线性空间，范围 0.0-1.0）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// 创建新的颜色
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// 从 glTF 风格的 `[r, g, b, a]` 数组创建
    pub fn from_array(c: [f32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }

    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// 数学常量
pub mod constants {
    /// 浮点数比较的 epsilon
    pub const EPSILON: f32 = 1e-6;

    /// 退化三角形的固定回退法线（+Y）
    pub const FALLBACK_NORMAL: [f32; 3] = [0.0, 1.0, 0.0];
}
