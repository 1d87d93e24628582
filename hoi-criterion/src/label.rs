//! Ground truth annotations of one image.

use crate::common::*;

/// One annotated interaction between a subject box and an object box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hoi {
    /// Index of the subject box in [TargetRecord::boxes].
    pub subject_id: i64,
    /// Index of the object box in [TargetRecord::boxes].
    pub object_id: i64,
    /// The dataset-global interaction class.
    pub hoi_id: i64,
}

/// Ground truth of one image.
///
/// Box references of every interaction are checked on construction.
#[derive(Debug, TensorLike, Getters)]
pub struct TargetRecord {
    /// The interaction annotations.
    #[tensor_like(clone)]
    #[get = "pub"]
    hois: Vec<Hoi>,
    /// Normalized boxes in `(cx, cy, w, h)` format with shape `[num_boxes, 4]`.
    #[get = "pub"]
    boxes: Tensor,
    /// Binary per-box region masks with shape `[num_boxes, height, width]`.
    #[get = "pub"]
    mask_region_hw: Option<Tensor>,
}

impl TargetRecord {
    pub fn new(hois: Vec<Hoi>, boxes: Tensor) -> Result<Self> {
        let (num_boxes, num_params) = boxes.size2()?;
        ensure!(
            num_params == 4,
            "expect boxes in shape [num_boxes, 4], but get {:?}",
            boxes.size()
        );
        hois.iter().try_for_each(|hoi| -> Result<_> {
            let Hoi {
                subject_id,
                object_id,
                ..
            } = *hoi;
            ensure!(
                (0..num_boxes).contains(&subject_id) && (0..num_boxes).contains(&object_id),
                "the interaction {:?} refers to a box out of range [0, {})",
                hoi,
                num_boxes
            );
            Ok(())
        })?;

        Ok(Self {
            hois,
            boxes,
            mask_region_hw: None,
        })
    }

    pub fn with_masks(self, mask_region_hw: Tensor) -> Result<Self> {
        let (num_masks, _height, _width) = mask_region_hw.size3()?;
        ensure!(
            num_masks == self.num_boxes(),
            "expect {} region masks, one per box, but get {}",
            self.num_boxes(),
            num_masks
        );
        Ok(Self {
            mask_region_hw: Some(mask_region_hw),
            ..self
        })
    }

    pub fn num_hois(&self) -> usize {
        self.hois.len()
    }

    pub fn num_boxes(&self) -> i64 {
        self.boxes.size()[0]
    }

    pub fn device(&self) -> Device {
        self.boxes.device()
    }

    pub fn hoi(&self, hoi_index: i64) -> Result<&Hoi> {
        usize::try_from(hoi_index)
            .ok()
            .and_then(|index| self.hois.get(index))
            .ok_or_else(|| {
                format_err!(
                    "interaction index {} is out of range [0, {})",
                    hoi_index,
                    self.hois.len()
                )
            })
    }

    /// The subject and object boxes of an interaction, concatenated into
    /// an `[8]` tensor.
    pub fn pair_boxes(&self, hoi_index: i64) -> Result<Tensor> {
        let Hoi {
            subject_id,
            object_id,
            ..
        } = *self.hoi(hoi_index)?;
        let boxes = Tensor::f_cat(
            &[self.boxes.f_get(subject_id)?, self.boxes.f_get(object_id)?],
            0,
        )?;
        Ok(boxes)
    }

    /// The subject and object region masks of an interaction, each in shape
    /// `[height, width]`.
    pub fn pair_masks(&self, hoi_index: i64) -> Result<(Tensor, Tensor)> {
        let masks = self
            .mask_region_hw
            .as_ref()
            .ok_or_else(|| format_err!("the target record has no 'mask_region_hw'"))?;
        let Hoi {
            subject_id,
            object_id,
            ..
        } = *self.hoi(hoi_index)?;
        Ok((masks.f_get(subject_id)?, masks.f_get(object_id)?))
    }
}
