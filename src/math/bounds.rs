//! 轴对齐包围盒
//!
//! 网格在构建时计算自身的包围盒，解码器再把各节点下网格的包围盒
//! 变换到根节点空间并累积成场景包围盒，缩放策略依赖这个场景包围盒。

use serde::{Deserialize, Serialize};

use super::{Matrix4, Point3, Vector3};

/// 轴对齐包围盒
///
/// 空包围盒用 `min = +inf, max = -inf` 表示，任何点都能直接并入。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vector3,
    pub max: Vector3,
}

impl Aabb {
    /// 空包围盒
    pub fn empty() -> Self {
        Self {
            min: Vector3::repeat(f32::INFINITY),
            max: Vector3::repeat(f32::NEG_INFINITY),
        }
    }

    pub fn new(min: Vector3, max: Vector3) -> Self {
        Self { min, max }
    }

    /// 由一组点构建
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a [f32; 3]>,
    {
        let mut aabb = Self::empty();
        for p in points {
            aabb.encapsulate_point(&Vector3::from(*p));
        }
        aabb
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn encapsulate_point(&mut self, p: &Vector3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn encapsulate(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.encapsulate_point(&other.min);
        self.encapsulate_point(&other.max);
    }

    pub fn center(&self) -> Vector3 {
        (self.min + self.max) * 0.5
    }

    /// 各轴尺寸，空包围盒返回零向量
    pub fn size(&self) -> Vector3 {
        if self.is_empty() {
            Vector3::zeros()
        } else {
            self.max - self.min
        }
    }

    /// 最大轴向尺寸
    pub fn max_extent(&self) -> f32 {
        self.size().max()
    }

    /// 变换 8 个角点后重新求包围盒
    pub fn transformed(&self, matrix: &Matrix4) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let mut out = Aabb::empty();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.encapsulate_point(&matrix.transform_point(&corner).coords);
        }
        out
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_box() {
        let aabb = Aabb::empty();
        assert!(aabb.is_empty());
        assert_eq!(aabb.max_extent(), 0.0);
    }

    #[test]
    fn test_from_points() {
        let points = [[0.0, -1.0, 2.0], [4.0, 1.0, 3.0], [1.0, 0.0, 2.5]];
        let aabb = Aabb::from_points(points.iter());

        assert_eq!(aabb.min, Vector3::new(0.0, -1.0, 2.0));
        assert_eq!(aabb.max, Vector3::new(4.0, 1.0, 3.0));
        assert_eq!(aabb.max_extent(), 4.0);
        assert_eq!(aabb.center(), Vector3::new(2.0, 0.0, 2.5));
    }

    #[test]
    fn test_encapsulate_ignores_empty() {
        let mut aabb = Aabb::new(Vector3::zeros(), Vector3::repeat(1.0));
        aabb.encapsulate(&Aabb::empty());
        assert_eq!(aabb.max, Vector3::repeat(1.0));
    }

    #[test]
    fn test_transformed_scale_translate() {
        let aabb = Aabb::new(Vector3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0));
        let m = Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0)) * Matrix4::new_scaling(2.0);
        let out = aabb.transformed(&m);

        assert!((out.min.x - 8.0).abs() < 1e-5);
        assert!((out.max.x - 12.0).abs() < 1e-5);
        assert!((out.max_extent() - 4.0).abs() < 1e-5);
    }
}
