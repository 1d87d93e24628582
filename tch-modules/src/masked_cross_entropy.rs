use crate::{common::*, cross_entropy::CrossEntropyLoss};

/// Cross entropy for one logits row with several valid target columns.
///
/// For each positive column `j`, the other positive columns are masked out
/// and plain cross entropy is taken over the remaining columns with `j` as
/// the target. The per-positive losses are summed and then divided by the
/// number of positives.
///
/// `logits` is a `[num_columns]` tensor and `positives` lists distinct
/// column indexes. The order of `positives` does not affect the result.
pub fn multi_positive_row_loss(logits: &Tensor, positives: &[i64]) -> Result<Tensor> {
    let num_columns = logits.size1()?;
    ensure!(
        !positives.is_empty(),
        "at least one positive column is required"
    );
    ensure!(
        positives.iter().all(|&col| (0..num_columns).contains(&col)),
        "positive columns {:?} are out of range [0, {})",
        positives,
        num_columns
    );

    let positive_set: HashSet<i64> = positives.iter().cloned().collect();
    ensure!(
        positive_set.len() == positives.len(),
        "positive columns {:?} are not unique",
        positives
    );

    let device = logits.device();
    let negatives: Vec<i64> = (0..num_columns)
        .filter(|col| !positive_set.contains(col))
        .collect();
    let cross_entropy = CrossEntropyLoss::new(true, Reduction::Sum);

    let losses = positives
        .iter()
        .map(|&positive| {
            // keep the negatives and this positive, in column order
            let target_pos = negatives.partition_point(|&col| col < positive);
            let mut kept = negatives.clone();
            kept.insert(target_pos, positive);

            let kept_logits = logits
                .index_select(0, &Tensor::of_slice(&kept).to_device(device))
                .view([1, -1]);
            let target = Tensor::of_slice(&[target_pos as i64]).to_device(device);
            cross_entropy.forward(&kept_logits, &target)
        })
        .collect::<Result<Vec<_>>>()?;

    let loss = Tensor::f_sum_tensors(&losses)? / positives.len() as f64;
    Ok(loss)
}

/// Multi-label cross entropy where every row may have several positive
/// columns.
///
/// Rows with fewer than two positives use ordinary cross entropy against
/// their argmax column. Rows with more go through
/// [multi_positive_row_loss]. The row losses are summed and divided by the
/// number of rows.
#[derive(Debug)]
pub struct MaskedCrossEntropyLoss {
    cross_entropy: CrossEntropyLoss,
}

impl MaskedCrossEntropyLoss {
    pub fn new() -> Self {
        Self {
            cross_entropy: CrossEntropyLoss::new(true, Reduction::Sum),
        }
    }

    /// `input` holds `[rows, columns]` logits and `target` the binary
    /// indicator matrix of the same shape.
    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Result<Tensor> {
        let (num_rows, num_columns) = input.size2()?;
        ensure!(
            target.size2()? == (num_rows, num_columns),
            "input and target shape mismatch, {:?} vs {:?}",
            input.size(),
            target.size()
        );
        let device = input.device();

        if num_rows == 0 || num_columns == 0 {
            return Ok(zero_loss(device));
        }

        let target = target.to_kind(Kind::Int64).to_device(device);
        let num_pos = target.sum_dim_intlist(&[-1], false, Kind::Int64);

        // rows with a single positive, or none where argmax falls on column 0
        let single_rows = num_pos.lt(2i64).nonzero().view([-1]);
        let single_loss = if single_rows.is_empty() {
            zero_loss(device)
        } else {
            let targets_one_pos = target.index_select(0, &single_rows).argmax(-1, false);
            self.cross_entropy
                .forward(&input.index_select(0, &single_rows), &targets_one_pos)?
        };

        let multi_rows: Vec<i64> = Vec::from(&num_pos.gt(1i64).nonzero().view([-1]));
        let multi_losses = multi_rows
            .iter()
            .map(|&row| {
                let row_target: Vec<i64> = Vec::from(&target.select(0, row));
                let positives: Vec<i64> = row_target
                    .iter()
                    .enumerate()
                    .filter(|(_, &flag)| flag != 0)
                    .map(|(col, _)| col as i64)
                    .collect();
                multi_positive_row_loss(&input.select(0, row), &positives)
            })
            .collect::<Result<Vec<_>>>()?;

        let loss = multi_losses
            .iter()
            .fold(single_loss, |total, row_loss| total + row_loss);
        Ok(loss / num_rows as f64)
    }
}

impl Default for MaskedCrossEntropyLoss {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::prelude::*;

    #[test]
    fn single_positive_equals_cross_entropy_test() -> Result<()> {
        let mut rng = rand::thread_rng();
        let num_rows = 6;
        let num_columns = 5;

        let input = Tensor::randn(&[num_rows, num_columns], (Kind::Float, Device::Cpu));
        let classes: Vec<i64> = (0..num_rows)
            .map(|_| rng.gen_range(0..num_columns))
            .collect();
        let classes = Tensor::of_slice(&classes);
        let target = classes.one_hot(num_columns);

        let masked = MaskedCrossEntropyLoss::new().forward(&input, &target)?;
        let plain = CrossEntropyLoss::new(true, Reduction::Mean).forward(&input, &classes)?;

        assert_abs_diff_eq!(
            masked.double_value(&[]),
            plain.double_value(&[]),
            epsilon = 1e-5
        );
        Ok(())
    }

    #[test]
    fn multi_positive_row_test() -> Result<()> {
        let logits = Tensor::of_slice(&[1.0f32, 2.0, 0.5, -1.0]);
        let loss = multi_positive_row_loss(&logits, &[0, 2])?.double_value(&[]);

        // column 0 against negatives {1, 3}, column 2 against negatives {1, 3}
        let neg = 2f64.exp() + (-1f64).exp();
        let loss_0 = (1f64.exp() + neg).ln() - 1.0;
        let loss_2 = (0.5f64.exp() + neg).ln() - 0.5;
        assert_abs_diff_eq!(loss, (loss_0 + loss_2) / 2.0, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn positive_order_invariance_test() -> Result<()> {
        let logits = Tensor::randn(&[7], (Kind::Float, Device::Cpu));
        let forward = multi_positive_row_loss(&logits, &[1, 4, 6])?.double_value(&[]);
        let backward = multi_positive_row_loss(&logits, &[6, 4, 1])?.double_value(&[]);
        let shuffled = multi_positive_row_loss(&logits, &[4, 1, 6])?.double_value(&[]);

        assert_abs_diff_eq!(forward, backward, epsilon = 1e-6);
        assert_abs_diff_eq!(forward, shuffled, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn mixed_rows_test() -> Result<()> {
        let input = Tensor::of_slice(&[
            0.2f32, 1.5, -0.3, //
            2.0, 0.1, 0.7,
        ])
        .view([2, 3]);
        let target = Tensor::of_slice(&[
            0i64, 1, 0, //
            1, 0, 1,
        ])
        .view([2, 3]);

        let loss = MaskedCrossEntropyLoss::new()
            .forward(&input, &target)?
            .double_value(&[]);

        let single = CrossEntropyLoss::new(true, Reduction::Sum)
            .forward(&input.narrow(0, 0, 1), &Tensor::of_slice(&[1i64]))?
            .double_value(&[]);
        let multi = multi_positive_row_loss(&input.select(0, 1), &[0, 2])?.double_value(&[]);

        assert_abs_diff_eq!(loss, (single + multi) / 2.0, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn zero_positive_row_targets_first_column_test() -> Result<()> {
        let input = Tensor::of_slice(&[0.3f32, 1.2, -0.4]).view([1, 3]);
        let target = Tensor::zeros(&[1, 3], (Kind::Int64, Device::Cpu));

        let loss = MaskedCrossEntropyLoss::new()
            .forward(&input, &target)?
            .double_value(&[]);
        let expect = CrossEntropyLoss::new(true, Reduction::Sum)
            .forward(&input, &Tensor::of_slice(&[0i64]))?
            .double_value(&[]);
        assert_abs_diff_eq!(loss, expect, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn empty_input_test() -> Result<()> {
        let input = Tensor::zeros(&[3, 0], (Kind::Float, Device::Cpu));
        let loss = MaskedCrossEntropyLoss::new().forward(&input, &input)?;
        assert_eq!(loss.double_value(&[]), 0.0);
        Ok(())
    }

    #[test]
    fn invalid_positives_test() {
        let logits = Tensor::randn(&[4], (Kind::Float, Device::Cpu));
        assert!(multi_positive_row_loss(&logits, &[]).is_err());
        assert!(multi_positive_row_loss(&logits, &[4]).is_err());
        assert!(multi_positive_row_loss(&logits, &[1, 1]).is_err());
    }
}
