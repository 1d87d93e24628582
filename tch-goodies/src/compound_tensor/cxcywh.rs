use super::tlbr::TLBRTensor;
use crate::common::*;

/// Checked tensor of batched box parameters in CxCyWH format.
#[derive(Debug, TensorLike, Getters)]
pub struct CxCyWHTensor {
    /// The center x parameter in shape `[batch, 1]`.
    #[get = "pub"]
    pub(crate) cx: Tensor,
    /// The center y parameter in shape `[batch, 1]`.
    #[get = "pub"]
    pub(crate) cy: Tensor,
    /// The width parameter in shape `[batch, 1]`.
    #[get = "pub"]
    pub(crate) w: Tensor,
    /// The height parameter in shape `[batch, 1]`.
    #[get = "pub"]
    pub(crate) h: Tensor,
}

/// Unchecked tensor of batched box parameters in CxCyWH format.
#[derive(Debug, TensorLike)]
pub struct CxCyWHTensorUnchecked {
    /// The center x parameter in shape `[batch, 1]`.
    pub cx: Tensor,
    /// The center y parameter in shape `[batch, 1]`.
    pub cy: Tensor,
    /// The width parameter in shape `[batch, 1]`.
    pub w: Tensor,
    /// The height parameter in shape `[batch, 1]`.
    pub h: Tensor,
}

impl CxCyWHTensor {
    /// Split a packed `[batch, 4]` tensor of `(cx, cy, w, h)` rows.
    pub fn from_packed(packed: &Tensor) -> Result<Self> {
        let (_, num_params) = packed.size2()?;
        ensure!(
            num_params == 4,
            "expect a [batch, 4] tensor, but get shape {:?}",
            packed.size()
        );

        CxCyWHTensorUnchecked {
            cx: packed.narrow(1, 0, 1),
            cy: packed.narrow(1, 1, 1),
            w: packed.narrow(1, 2, 1),
            h: packed.narrow(1, 3, 1),
        }
        .try_into()
    }

    /// Compute the GIoU score with the paired box in the other tensor.
    pub fn giou_with(&self, other: &Self) -> Tensor {
        TLBRTensor::from(self).giou_with(&TLBRTensor::from(other))
    }
}

impl TryFrom<CxCyWHTensorUnchecked> for CxCyWHTensor {
    type Error = Error;

    fn try_from(from: CxCyWHTensorUnchecked) -> Result<Self, Self::Error> {
        let CxCyWHTensorUnchecked { cx, cy, w, h } = from;
        match (cx.size2()?, cy.size2()?, w.size2()?, h.size2()?) {
            ((cx_len, 1), (cy_len, 1), (w_len, 1), (h_len, 1)) => ensure!(
                cx_len == cy_len && cx_len == w_len && cx_len == h_len,
                "size mismatch"
            ),
            _ => bail!("size mismatch"),
        };
        ensure!(
            hashset! {
                cx.device(),
                cy.device(),
                w.device(),
                h.device(),
            }
            .len()
                == 1,
            "device mismatch"
        );
        Ok(Self { cx, cy, w, h })
    }
}
