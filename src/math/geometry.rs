//! 几何数学工具模块
//!
//! 提供网格处理相关的数学函数，包括：
//! - 稳健的三角形法线（退化三角形也返回有限的单位向量）
//! - 法线重建（从三角形面计算顶点法线）
//! - 切线空间计算（用于法线贴图）
//!
//! 这些函数用于后处理解码得到的网格数据。

use super::constants::FALLBACK_NORMAL;
use super::Vector3;
use crate::geometry::vertex::Vertex;

/// 计算三角形的单位法线
///
/// 对非退化三角形返回 `normalize((v1 - v0) × (v2 - v0))`。
///
/// 退化输入不会报错：
/// - 三点共线（含两点重合）：返回垂直于最长边的单位向量，与所有边仍然正交
/// - 三点完全重合：返回固定的 +Y
///
/// 坐标量级很大且夹角极小的近退化三角形受 f32 精度限制，
/// 结果不保证与各边严格正交。
///
/// # 示例
///
/// ```rust
/// use dist_import::math::Vector3;
/// use dist_import::math::geometry::calculate_normal;
///
/// let n = calculate_normal(
///     &Vector3::zeros(),
///     &Vector3::new(1.0, 0.0, 0.0),
///     &Vector3::new(0.0, 1.0, 0.0),
/// );
/// assert_eq!(n, Vector3::new(0.0, 0.0, 1.0));
/// ```
pub fn calculate_normal(v0: &Vector3, v1: &Vector3, v2: &Vector3) -> Vector3 {
    let e01 = v1 - v0;
    let e02 = v2 - v0;

    let cross = e01.cross(&e02);
    let length = cross.norm();
    // 相对阈值：叉乘长度 = |e01||e02|sinθ
    let scale = e01.norm() * e02.norm();
    if length.is_finite() && length > scale * f32::EPSILON && length > f32::MIN_POSITIVE {
        return cross / length;
    }

    let e12 = v2 - v1;
    let longest = [e01, e12, e02]
        .into_iter()
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))
        .unwrap_or(e01);
    let longest_len = longest.norm();
    if longest_len.is_finite() && longest_len > f32::MIN_POSITIVE {
        return perpendicular(&(longest / longest_len));
    }

    Vector3::from(FALLBACK_NORMAL)
}

/// 任取一个与单位向量 `dir` 垂直的单位向量
fn perpendicular(dir: &Vector3) -> Vector3 {
    // 与 dir 夹角最大的坐标轴
    let abs = dir.abs();
    let axis = if abs.x <= abs.y && abs.x <= abs.z {
        Vector3::x()
    } else if abs.y <= abs.z {
        Vector3::y()
    } else {
        Vector3::z()
    };
    dir.cross(&axis).normalize()
}

/// 归一化，长度过小时返回回退法线
fn normalize_or_fallback(v: Vector3) -> Vector3 {
    let length = v.norm();
    if length.is_finite() && length > 1e-12 {
        v / length
    } else {
        Vector3::from(FALLBACK_NORMAL)
    }
}

/// 从三角形面重建顶点法线
///
/// 每个三角形的单位法线按面积加权累加到三个顶点，再归一化。
/// 退化三角形面积为零，不影响相邻顶点；只被退化三角形引用的顶点
/// 得到回退法线。
pub fn reconstruct_normals(vertices: &mut [Vertex], indices: &[u32]) {
    let mut sums = vec![Vector3::zeros(); vertices.len()];

    for triangle in indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;

        let p0 = Vector3::from(vertices[i0].position);
        let p1 = Vector3::from(vertices[i1].position);
        let p2 = Vector3::from(vertices[i2].position);

        let area = (p1 - p0).cross(&(p2 - p0)).norm();
        let face_normal = calculate_normal(&p0, &p1, &p2) * area;

        sums[i0] += face_normal;
        sums[i1] += face_normal;
        sums[i2] += face_normal;
    }

    for (vertex, sum) in vertices.iter_mut().zip(sums) {
        vertex.normal = normalize_or_fallback(sum).into();
    }
}

/// 计算顶点的切线空间向量
///
/// 使用UV坐标导数计算每个顶点的切线向量，指向U增加的方向，
/// 再对法线做 Gram-Schmidt 正交化。UV 退化的三角形被跳过，
/// 没有任何有效贡献的顶点取与法线垂直的任意单位向量。
///
/// # 前置条件
///
/// 顶点必须已经有有效的法线向量（可通过 `reconstruct_normals` 生成）。
pub fn compute_tangent_space(vertices: &mut [Vertex], indices: &[u32]) {
    let mut sums = vec![Vector3::zeros(); vertices.len()];

    for triangle in indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;

        let (v0, v1, v2) = (&vertices[i0], &vertices[i1], &vertices[i2]);

        let dp1 = Vector3::from(v1.position) - Vector3::from(v0.position);
        let dp2 = Vector3::from(v2.position) - Vector3::from(v0.position);

        let duv1 = [v1.texcoord[0] - v0.texcoord[0], v1.texcoord[1] - v0.texcoord[1]];
        let duv2 = [v2.texcoord[0] - v0.texcoord[0], v2.texcoord[1] - v0.texcoord[1]];

        let det = duv1[0] * duv2[1] - duv1[1] * duv2[0];
        if det.abs() < 1e-6 {
            continue;
        }

        let tangent = (dp1 * duv2[1] - dp2 * duv1[1]) / det;

        sums[i0] += tangent;
        sums[i1] += tangent;
        sums[i2] += tangent;
    }

    for (vertex, tangent) in vertices.iter_mut().zip(sums) {
        let normal = Vector3::from(vertex.normal);
        let orthogonal = tangent - normal * normal.dot(&tangent);
        let length = orthogonal.norm();
        vertex.tangent = if length.is_finite() && length > 1e-8 {
            (orthogonal / length).into()
        } else {
            perpendicular(&normalize_or_fallback(normal)).into()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() < eps, "{} not near {}", a, b);
    }

    /// 边长为零时正交性平凡成立（与源数据的校验方式一致：先各自归一化再点乘）
    fn assert_orthogonal(a: &Vector3, b: &Vector3, eps: f32) {
        if b.norm() == 0.0 {
            return;
        }
        let dot = a.normalize().dot(&b.normalize());
        assert!(dot.abs() <= eps, "{:?} not orthogonal to {:?}: {}", a, b, dot);
    }

    fn calculate_and_verify(v0: Vector3, v1: Vector3, v2: Vector3) -> Vector3 {
        let n = calculate_normal(&v0, &v1, &v2);
        assert!(n.iter().all(|c| c.is_finite()));
        assert_near(n.norm(), 1.0, 1e-4);
        assert_orthogonal(&n, &(v1 - v0), 1e-4);
        assert_orthogonal(&n, &(v2 - v1), 1e-4);
        assert_orthogonal(&n, &(v0 - v2), 1e-4);
        n
    }

    #[test]
    fn test_normal_matches_leg_cross_product() {
        let n = calculate_and_verify(
            Vector3::zeros(),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        );
        assert_eq!(n, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_normal_general_triangles() {
        let triangles = [
            ([0.3, -2.0, 5.0], [4.0, 1.5, -0.5], [-1.0, 2.0, 2.0]),
            ([100.0, 200.0, 300.0], [101.0, 200.0, 300.0], [100.0, 201.0, 302.0]),
            ([-0.01, 0.0, 0.0], [0.0, 0.01, 0.0], [0.0, 0.0, 0.01]),
        ];
        for (a, b, c) in triangles {
            calculate_and_verify(Vector3::from(a), Vector3::from(b), Vector3::from(c));
        }
    }

    #[test]
    fn test_normal_degenerate_parallel_sides() {
        let v0 = Vector3::zeros();
        let v1 = Vector3::new(1.0, 0.0, 0.0);
        calculate_and_verify(v0, v1, v1 + (v1 - v0) * 2.0);
    }

    #[test]
    fn test_normal_degenerate_two_coincident() {
        let v0 = Vector3::new(1.0, 2.0, 3.0);
        let v2 = Vector3::new(-2.0, 0.5, 4.0);
        calculate_and_verify(v0, v0, v2);
    }

    #[test]
    fn test_normal_degenerate_all_coincident() {
        let v0 = Vector3::new(1.0, 2.0, 3.0);
        let n = calculate_and_verify(v0, v0, v0);
        assert_eq!(n, Vector3::from(FALLBACK_NORMAL));
    }

    #[test]
    #[ignore = "known f32 precision limit for large, nearly collinear triangles"]
    fn test_normal_difficult_near_degenerate() {
        calculate_and_verify(
            Vector3::zeros(),
            Vector3::new(10000.0, 100.0, 200.0),
            Vector3::new(10000.0, 100.1, 200.0),
        );
    }

    #[test]
    fn test_reconstruct_normals_simple_triangle() {
        let mut vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0], [0.0, 0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [1.0, 0.0], [0.0, 0.0, 0.0]),
            Vertex::new([0.0, 0.0, 1.0], [0.0, 0.0, 0.0], [0.0, 1.0], [0.0, 0.0, 0.0]),
        ];
        reconstruct_normals(&mut vertices, &[0, 1, 2]);

        // (1,0,0) × (0,0,1) = (0,-1,0)
        for vertex in &vertices {
            assert_near(vertex.normal[1], -1.0, 1e-6);
        }
    }

    #[test]
    fn test_reconstruct_normals_degenerate_neighbor_ignored() {
        let mut vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0; 3], [0.0; 2], [0.0; 3]),
            Vertex::new([1.0, 0.0, 0.0], [0.0; 3], [0.0; 2], [0.0; 3]),
            Vertex::new([0.0, 1.0, 0.0], [0.0; 3], [0.0; 2], [0.0; 3]),
            Vertex::new([2.0, 0.0, 0.0], [0.0; 3], [0.0; 2], [0.0; 3]),
        ];
        // 第二个三角形共线
        reconstruct_normals(&mut vertices, &[0, 1, 2, 0, 1, 3]);

        assert_eq!(vertices[0].normal, [0.0, 0.0, 1.0]);
        // 只被退化三角形引用
        assert_eq!(vertices[3].normal, FALLBACK_NORMAL);
    }

    #[test]
    fn test_compute_tangent_space_simple() {
        let mut vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0], [0.0, 0.0, 0.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0], [0.0, 0.0, 0.0]),
            Vertex::new([0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0], [0.0, 0.0, 0.0]),
        ];
        compute_tangent_space(&mut vertices, &[0, 1, 2]);

        for vertex in &vertices {
            let tangent = Vector3::from(vertex.tangent);
            assert_near(tangent.norm(), 1.0, 1e-4);
            assert!(tangent.dot(&Vector3::from(vertex.normal)).abs() < 0.01);
            assert_near(tangent.x, 1.0, 1e-4);
        }
    }

    #[test]
    fn test_compute_tangent_space_degenerate_uv() {
        let mut vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.5, 0.5], [0.0; 3]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.5, 0.5], [0.0; 3]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.5, 0.5], [0.0; 3]),
        ];
        compute_tangent_space(&mut vertices, &[0, 1, 2]);

        for vertex in &vertices {
            let tangent = Vector3::from(vertex.tangent);
            assert_near(tangent.norm(), 1.0, 1e-4);
            assert!(tangent.z.abs() < 1e-6);
        }
    }
}
