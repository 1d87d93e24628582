use super::cxcywh::CxCyWHTensor;
use crate::{common::*, utils::EPSILON};

/// Checked tensor of batched box parameters in TLBR format.
#[derive(Debug, TensorLike, Getters)]
pub struct TLBRTensor {
    /// The top parameter in shape `[batch, 1]`.
    #[get = "pub"]
    pub(crate) t: Tensor,
    /// The left parameter in shape `[batch, 1]`.
    #[get = "pub"]
    pub(crate) l: Tensor,
    /// The bottom parameter in shape `[batch, 1]`.
    #[get = "pub"]
    pub(crate) b: Tensor,
    /// The right parameter in shape `[batch, 1]`.
    #[get = "pub"]
    pub(crate) r: Tensor,
}

impl TLBRTensor {
    /// Compute the box area in shape `[batch, 1]`.
    pub fn area(&self) -> Tensor {
        let Self { t, l, b, r } = self;
        (b - t) * (r - l)
    }

    /// Compute the intersection area with the paired box in the other tensor.
    pub fn intersect_area_with(&self, other: &Self) -> Tensor {
        let Self {
            t: lhs_t,
            l: lhs_l,
            b: lhs_b,
            r: lhs_r,
        } = self;
        let Self {
            t: rhs_t,
            l: rhs_l,
            b: rhs_b,
            r: rhs_r,
        } = other;

        let max_t = lhs_t.maximum(rhs_t);
        let max_l = lhs_l.maximum(rhs_l);
        let min_b = lhs_b.minimum(rhs_b);
        let min_r = lhs_r.minimum(rhs_r);

        let inner_h = (min_b - max_t).clamp_min(0.0);
        let inner_w = (min_r - max_l).clamp_min(0.0);

        inner_h * inner_w
    }

    /// Compute the rectangle closure with the paired box in the other tensor.
    pub fn closure_with(&self, other: &Self) -> Self {
        let Self {
            t: lhs_t,
            l: lhs_l,
            b: lhs_b,
            r: lhs_r,
        } = self;
        let Self {
            t: rhs_t,
            l: rhs_l,
            b: rhs_b,
            r: rhs_r,
        } = other;

        Self {
            t: lhs_t.minimum(rhs_t),
            l: lhs_l.minimum(rhs_l),
            b: lhs_b.maximum(rhs_b),
            r: lhs_r.maximum(rhs_r),
        }
    }

    /// Compute the generalized IoU score between paired boxes.
    ///
    /// The i-th box is only compared to the i-th box of the other tensor,
    /// which is the diagonal of the all-pairs GIoU matrix.
    pub fn giou_with(&self, other: &Self) -> Tensor {
        let inter_area = self.intersect_area_with(other);
        let union_area = self.area() + other.area() - &inter_area + EPSILON;
        let closure_area = self.closure_with(other).area();
        let iou = inter_area / &union_area;
        iou - (&closure_area - &union_area) / (closure_area + EPSILON)
    }
}

impl From<&CxCyWHTensor> for TLBRTensor {
    fn from(from: &CxCyWHTensor) -> Self {
        let CxCyWHTensor { cx, cy, w, h } = from;

        let t = cy - h / 2.0;
        let b = cy + h / 2.0;
        let l = cx - w / 2.0;
        let r = cx + w / 2.0;

        Self { t, l, b, r }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tlbr_from(cxcywh: &[f32]) -> Result<TLBRTensor> {
        let boxes = CxCyWHTensor::from_packed(&Tensor::of_slice(cxcywh).view([-1, 4]))?;
        Ok(TLBRTensor::from(&boxes))
    }

    #[test]
    fn cxcywh_to_tlbr_test() -> Result<()> {
        let tlbr = tlbr_from(&[0.5, 0.4, 0.2, 0.6])?;

        assert_abs_diff_eq!(tlbr.t().double_value(&[0, 0]), 0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(tlbr.l().double_value(&[0, 0]), 0.4, epsilon = 1e-6);
        assert_abs_diff_eq!(tlbr.b().double_value(&[0, 0]), 0.7, epsilon = 1e-6);
        assert_abs_diff_eq!(tlbr.r().double_value(&[0, 0]), 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(tlbr.area().double_value(&[0, 0]), 0.12, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn closure_test() -> Result<()> {
        // tlbr (0.1, 0.1, 0.3, 0.3) and (0.2, 0.5, 0.6, 0.7)
        let lhs = tlbr_from(&[0.2, 0.2, 0.2, 0.2])?;
        let rhs = tlbr_from(&[0.6, 0.4, 0.2, 0.4])?;

        let closure = lhs.closure_with(&rhs);
        assert_abs_diff_eq!(closure.area().double_value(&[0, 0]), 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(
            lhs.intersect_area_with(&rhs).double_value(&[0, 0]),
            0.0,
            epsilon = 1e-6
        );
        Ok(())
    }
}
