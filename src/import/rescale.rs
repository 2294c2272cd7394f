//! 缩放策略
//!
//! 解码完成后只作用一次，且只修改根节点变换。顺序固定：先缩放，
//! 再按缩放后的包围盒重新居中。

use super::{ImportOptions, RescalingMode};
use crate::scene::ImportResult;

/// 按选项调整根节点变换
pub fn apply(result: &mut ImportResult, options: &ImportOptions) {
    match options.rescaling_mode {
        RescalingMode::None => {}
        RescalingMode::Convert => {
            result.root_transform_mut().scale *= options.scale_factor;
        }
        RescalingMode::Fit => {
            let extent = result.world_bounds().max_extent();
            let factor = if extent > 0.0 && extent.is_finite() {
                options.desired_size / extent
            } else {
                1.0
            };
            result.root_transform_mut().scale *= factor;
            tracing::debug!(extent, factor, "Fit scene to desired size");
        }
    }

    if options.recenter {
        let bounds = result.world_bounds();
        if !bounds.is_empty() {
            result.root_transform_mut().translation -= bounds.center();
        }
    }
}
