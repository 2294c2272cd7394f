//! 节点变换
//!
//! 平移 + 旋转（四元数）+ 缩放，组合顺序为 T * R * S。

use serde::{Deserialize, Serialize};

use crate::math::constants::EPSILON;
use crate::math::{Matrix3, Matrix4, Point3, Quaternion, Vector3};

/// 节点的局部变换
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// 位置
    pub translation: Vector3,

    /// 旋转
    pub rotation: Quaternion,

    /// 缩放
    pub scale: Vector3,
}

impl Transform {
    /// 单位变换
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: Quaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_trs(translation: Vector3, rotation: Quaternion, scale: Vector3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// 组合为 4x4 矩阵：T * R * S
    pub fn matrix(&self) -> Matrix4 {
        let translation = Matrix4::new_translation(&self.translation);
        let rotation = self.rotation.to_homogeneous();
        let scale = Matrix4::new_nonuniform_scaling(&self.scale);
        translation * rotation * scale
    }

    /// 从仿射矩阵分解出 TRS
    ///
    /// 行列式为负（镜像）时把镜像折算到 X 缩放上；某一轴缩放为零时
    /// 无法恢复旋转，旋转取单位四元数。
    pub fn from_matrix(m: &Matrix4) -> Self {
        let translation = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
        let linear: Matrix3 = m.fixed_view::<3, 3>(0, 0).into_owned();

        let mut scale = Vector3::new(
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
        );
        if linear.determinant() < 0.0 {
            scale.x = -scale.x;
        }

        let rotation = if scale.iter().all(|s| s.abs() > EPSILON) {
            let pure = Matrix3::from_columns(&[
                linear.column(0) / scale.x,
                linear.column(1) / scale.y,
                linear.column(2) / scale.z,
            ]);
            Quaternion::from_matrix(&pure)
        } else {
            Quaternion::identity()
        };

        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// 变换一个点
    pub fn transform_point(&self, p: &Vector3) -> Vector3 {
        self.matrix().transform_point(&Point3::from(*p)).coords
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_matrix() {
        assert_eq!(Transform::identity().matrix(), Matrix4::identity());
    }

    #[test]
    fn test_trs_order() {
        let t = Transform::from_trs(
            Vector3::new(1.0, 2.0, 3.0),
            Quaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2),
            Vector3::new(2.0, 2.0, 2.0),
        );
        // 先缩放到 (2,0,0)，绕 Z 转 90° 到 (0,2,0)，再平移
        let p = t.transform_point(&Vector3::new(1.0, 0.0, 0.0));
        assert!((p - Vector3::new(1.0, 4.0, 3.0)).norm() < 1e-5);
    }

    #[test]
    fn test_decompose_roundtrip() {
        let original = Transform::from_trs(
            Vector3::new(-4.0, 0.5, 9.0),
            Quaternion::from_euler_angles(0.3, -1.1, 0.7),
            Vector3::new(1.5, 0.5, 3.0),
        );
        let decomposed = Transform::from_matrix(&original.matrix());

        assert!((decomposed.translation - original.translation).norm() < 1e-5);
        assert!((decomposed.scale - original.scale).norm() < 1e-4);
        assert!(decomposed.rotation.angle_to(&original.rotation) < 1e-3);
    }

    #[test]
    fn test_decompose_mirror() {
        let m = Matrix4::new_nonuniform_scaling(&Vector3::new(-2.0, 1.0, 1.0));
        let t = Transform::from_matrix(&m);

        assert!((t.scale.x + 2.0).abs() < 1e-6);
        assert!((t.matrix() - m).norm() < 1e-5);
    }
}
