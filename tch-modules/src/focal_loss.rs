use crate::common::*;

/// Parse a reduction method by its name, one of `mean`, `sum` or `none`.
pub fn reduction_from_name(name: &str) -> Result<Reduction> {
    let reduction = match name {
        "mean" => Reduction::Mean,
        "sum" => Reduction::Sum,
        "none" => Reduction::None,
        _ => bail!("unsupported reduction method '{}'", name),
    };
    Ok(reduction)
}

/// Binary focal loss initializer.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct FocalLossInit<F>
where
    F: 'static + Fn(&Tensor, &Tensor) -> Tensor + Send,
{
    /// The wrapped loss function. It must not apply reduction.
    #[derivative(Debug = "ignore")]
    pub loss_fn: F,
    /// The gamma coefficient.
    pub gamma: f64,
    /// The alpha coefficient.
    pub alpha: f64,
    /// Guards the modulating power against a zero base.
    pub eps: f64,
    /// The reduction method applied on output loss.
    pub reduction: Reduction,
}

impl<F> FocalLossInit<F>
where
    F: 'static + Fn(&Tensor, &Tensor) -> Tensor + Send,
{
    pub fn default(reduction: Reduction, loss_fn: F) -> Self {
        Self {
            loss_fn,
            gamma: 2.0,
            alpha: 0.5,
            eps: 1e-6,
            reduction,
        }
    }

    /// Build a focal loss calculator.
    pub fn build(self) -> Result<FocalLoss> {
        let Self {
            loss_fn,
            gamma,
            alpha,
            eps,
            reduction,
        } = self;

        ensure!(gamma >= 0.0, "gamma must be non-negative, but get {}", gamma);
        ensure!(
            (0.0..=1.0).contains(&alpha),
            "alpha must be in range [0, 1], but get {}",
            alpha
        );
        ensure!(eps >= 0.0, "eps must be non-negative, but get {}", eps);
        if let Reduction::Other(code) = reduction {
            bail!("unsupported reduction method code {}", code);
        }

        Ok(FocalLoss {
            loss_fn: Box::new(loss_fn),
            gamma,
            alpha,
            eps,
            reduction,
        })
    }
}

/// Binary focal loss calculator.
///
/// Given logits `x` and binary labels `y`, the loss is
/// `|1 - y - alpha| * (|y - sigmoid(x)| + eps)^gamma * loss_fn(x, y)`,
/// where `loss_fn` is typically binary cross entropy with logits.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct FocalLoss {
    #[derivative(Debug = "ignore")]
    loss_fn: Box<dyn Fn(&Tensor, &Tensor) -> Tensor + Send>,
    gamma: f64,
    alpha: f64,
    eps: f64,
    reduction: Reduction,
}

impl FocalLoss {
    /// Compute focal loss from an input against to a ground truth.
    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Tensor {
        debug_assert_eq!(
            input.size(),
            target.size(),
            "input and target shape must be equal"
        );
        debug_assert!(
            bool::from(target.ge(0.0).logical_and(&target.le(1.0)).all()),
            "target values must be in range of [0.0, 1.0]"
        );

        // return zero tensor if (1) input is empty and (2) using mean reduction
        if input.is_empty() && self.reduction == Reduction::Mean {
            return zero_loss(input.device());
        }

        let Self {
            ref loss_fn,
            gamma,
            alpha,
            eps,
            reduction,
        } = *self;

        let orig_loss = loss_fn(input, target);
        debug_assert_eq!(
            orig_loss.size(),
            target.size(),
            "the contained loss function must not apply reduction"
        );

        let alpha_factor = (1.0f64 - target - alpha).abs();
        let modulating_factor = ((target - input.sigmoid()).abs() + eps).pow(&gamma.into());
        let loss: Tensor = &orig_loss * &alpha_factor * &modulating_factor;

        match reduction {
            Reduction::None => loss,
            Reduction::Sum => loss.sum(Kind::Float),
            Reduction::Mean => loss.mean(Kind::Float),
            Reduction::Other(_) => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bce_with_logits_loss::BceWithLogitsLossInit;
    use approx::assert_abs_diff_eq;

    fn focal_with_bce(alpha: f64, gamma: f64, reduction: Reduction) -> Result<FocalLoss> {
        let bce = BceWithLogitsLossInit::default(Reduction::None).build();
        FocalLossInit {
            alpha,
            gamma,
            ..FocalLossInit::default(reduction, move |input, target| bce.forward(input, target))
        }
        .build()
    }

    #[test]
    fn focal_loss_test() -> Result<()> {
        let alpha = 0.25;
        let gamma = 2.0;
        let loss_fn = focal_with_bce(alpha, gamma, Reduction::None)?;

        let x = 0.7f64;
        let input = Tensor::of_slice(&[x as f32, x as f32]).view([1, 2]);
        let target = Tensor::of_slice(&[1f32, 0.0]).view([1, 2]);
        let loss: Vec<f32> = Vec::from(&loss_fn.forward(&input, &target).view([-1]));

        let p = 1.0 / (1.0 + (-x).exp());
        let expect_pos = alpha * ((1.0 - p) + 1e-6).powf(gamma) * -(p.ln());
        let expect_neg = (1.0 - alpha) * (p + 1e-6).powf(gamma) * -((1.0 - p).ln());

        assert_abs_diff_eq!(loss[0] as f64, expect_pos, epsilon = 1e-5);
        assert_abs_diff_eq!(loss[1] as f64, expect_neg, epsilon = 1e-5);
        Ok(())
    }

    #[test]
    fn zero_gamma_reduces_to_weighted_bce_test() -> Result<()> {
        let loss_fn = focal_with_bce(0.5, 0.0, Reduction::Sum)?;
        let bce = BceWithLogitsLossInit::default(Reduction::Sum).build();

        let input = Tensor::randn(&[4, 3], (Kind::Float, Device::Cpu));
        let target = Tensor::rand(&[4, 3], (Kind::Float, Device::Cpu))
            .ge(0.5)
            .to_kind(Kind::Float);

        let focal = loss_fn.forward(&input, &target).double_value(&[]);
        let plain = bce.forward(&input, &target).double_value(&[]);
        assert_abs_diff_eq!(focal, 0.5 * plain, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn invalid_config_test() {
        assert!(focal_with_bce(1.5, 2.0, Reduction::Sum).is_err());
        assert!(focal_with_bce(0.5, -1.0, Reduction::Sum).is_err());
        assert!(focal_with_bce(0.5, 2.0, Reduction::Other(7)).is_err());
    }

    #[test]
    fn reduction_from_name_test() {
        assert!(reduction_from_name("mean").unwrap() == Reduction::Mean);
        assert!(reduction_from_name("sum").unwrap() == Reduction::Sum);
        assert!(reduction_from_name("none").unwrap() == Reduction::None);

        let err = reduction_from_name("average").unwrap_err();
        assert!(err.to_string().contains("average"));
    }
}
