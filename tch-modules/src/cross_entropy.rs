use crate::common::*;

/// Cross entropy over class logits in shape `[batch, classes]`.
#[derive(Debug)]
pub struct CrossEntropyLoss {
    reduction: Reduction,
    sparse_target: bool,
}

impl CrossEntropyLoss {
    pub fn new(sparse_target: bool, reduction: Reduction) -> Self {
        Self {
            reduction,
            sparse_target,
        }
    }

    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Result<Tensor> {
        // assume [batch_size, n_classes] input shape
        let (batch_size, num_classes) = input.size2()?;

        let target = if self.sparse_target {
            ensure!(
                target.kind() == Kind::Int64 && target.size1()? == batch_size,
                "expect target a [{}] int64 tensor, but get {:?} {:?} tensor",
                batch_size,
                target.size(),
                target.kind()
            );
            debug_assert!(
                bool::from(target.ge(0i64).all()) && bool::from(target.lt(num_classes).all()),
                "target values must be in range of [0, {}]",
                num_classes
            );

            target.shallow_clone()
        } else {
            ensure!(
                target.size2()? == (batch_size, num_classes),
                "expect target in shape [{}, {}], but get {:?}",
                batch_size,
                num_classes,
                target.size()
            );
            let (_, sparse_target) = target.max_dim(1, false);
            sparse_target.set_requires_grad(false)
        };

        // return zero tensor if (1) input is empty and (2) using mean reduction
        if input.is_empty() && self.reduction == Reduction::Mean {
            return Ok(zero_loss(input.device()));
        }

        // negative log-likelihood of the target class, per sample
        let loss = -input
            .log_softmax(-1, Kind::Float)
            .gather(1, &target.view([-1, 1]), false)
            .view([-1]);

        let loss = match self.reduction {
            Reduction::None => loss,
            Reduction::Sum => loss.sum(Kind::Float),
            Reduction::Mean => loss.mean(Kind::Float),
            Reduction::Other(code) => bail!("unsupported reduction method code {}", code),
        };
        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cross_entropy_test() -> Result<()> {
        let input = Tensor::of_slice(&[2f32, 1.0, 0.1, 0.5, 2.5, 0.3]).view([2, 3]);
        let target = Tensor::of_slice(&[0i64, 1]);

        let expect = {
            let lse0 = (2f64.exp() + 1f64.exp() + 0.1f64.exp()).ln();
            let lse1 = (0.5f64.exp() + 2.5f64.exp() + 0.3f64.exp()).ln();
            [lse0 - 2.0, lse1 - 2.5]
        };

        let none = CrossEntropyLoss::new(true, Reduction::None).forward(&input, &target)?;
        let none: Vec<f32> = Vec::from(&none);
        assert_abs_diff_eq!(none[0] as f64, expect[0], epsilon = 1e-5);
        assert_abs_diff_eq!(none[1] as f64, expect[1], epsilon = 1e-5);

        let sum = CrossEntropyLoss::new(true, Reduction::Sum).forward(&input, &target)?;
        assert_abs_diff_eq!(sum.double_value(&[]), expect[0] + expect[1], epsilon = 1e-5);

        let mean = CrossEntropyLoss::new(true, Reduction::Mean).forward(&input, &target)?;
        assert_abs_diff_eq!(
            mean.double_value(&[]),
            (expect[0] + expect[1]) / 2.0,
            epsilon = 1e-5
        );

        // dense one-hot targets pick the same classes
        let dense = Tensor::of_slice(&[1f32, 0.0, 0.0, 0.0, 1.0, 0.0]).view([2, 3]);
        let dense_sum = CrossEntropyLoss::new(false, Reduction::Sum).forward(&input, &dense)?;
        assert_abs_diff_eq!(dense_sum.double_value(&[]), sum.double_value(&[]), epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn empty_input_test() -> Result<()> {
        let input = Tensor::zeros(&[0, 4], (Kind::Float, Device::Cpu));
        let target = Tensor::zeros(&[0], (Kind::Int64, Device::Cpu));
        let loss = CrossEntropyLoss::new(true, Reduction::Mean).forward(&input, &target)?;
        assert_eq!(loss.double_value(&[]), 0.0);
        Ok(())
    }
}
