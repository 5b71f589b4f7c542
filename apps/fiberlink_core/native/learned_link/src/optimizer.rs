//! Adam optimizer over a whole network

use ndarray::{Array2, Zip};

use crate::error::{LinkError, LinkResult};
use crate::network::{Gradients, NetworkParams};

/// Adam with bias correction. Owns moment estimates shaped like the
/// network it was created for.
#[derive(Debug, Clone)]
pub struct Adam {
    /// Learning rate
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    /// First moment estimates
    m: NetworkParams,
    /// Second moment estimates
    v: NetworkParams,
    /// Time step
    t: i32,
}

impl Adam {
    pub fn new(params: &NetworkParams, lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            m: params.zeros_like(),
            v: params.zeros_like(),
            t: 0,
        }
    }

    pub fn steps(&self) -> i32 {
        self.t
    }

    /// One descent step on `params` along `grads`
    pub fn step(&mut self, params: &mut NetworkParams, grads: &Gradients) -> LinkResult<()> {
        if !params.same_shape(grads) || !params.same_shape(&self.m) {
            return Err(LinkError::shape(
                "optimizer parameter count",
                self.m.parameter_count(),
                grads.parameter_count(),
            ));
        }
        if !grads.is_finite() {
            return Err(LinkError::NumericInstability(
                "refusing to apply non-finite gradient".into(),
            ));
        }

        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t);
        let hyper = Moments {
            lr: self.lr,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            bias_correction1,
            bias_correction2,
        };

        for (((layer, grad), m), v) in params
            .layers
            .iter_mut()
            .zip(&grads.layers)
            .zip(self.m.layers.iter_mut())
            .zip(self.v.layers.iter_mut())
        {
            hyper.apply(&mut layer.weight, &grad.weight, &mut m.weight, &mut v.weight);
            hyper.apply(&mut layer.bias, &grad.bias, &mut m.bias, &mut v.bias);
        }
        Ok(())
    }

    /// Reset optimizer state
    pub fn reset(&mut self) {
        self.m = self.m.zeros_like();
        self.v = self.v.zeros_like();
        self.t = 0;
    }
}

struct Moments {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    bias_correction1: f64,
    bias_correction2: f64,
}

impl Moments {
    fn apply(
        &self,
        param: &mut Array2<f64>,
        grad: &Array2<f64>,
        m: &mut Array2<f64>,
        v: &mut Array2<f64>,
    ) {
        Zip::from(param)
            .and(grad)
            .and(m)
            .and(v)
            .for_each(|p, &g, m, v| {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                let m_hat = *m / self.bias_correction1;
                let v_hat = *v / self.bias_correction2;
                *p -= self.lr * m_hat / (v_hat.sqrt() + self.epsilon);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::DenseLayer;
    use ndarray::array;

    fn single(value: f64) -> NetworkParams {
        NetworkParams::from_layers(vec![DenseLayer {
            weight: array![[value]],
            bias: array![[value]],
        }])
        .unwrap()
    }

    #[test]
    fn test_first_step_moves_by_lr() {
        // After one step m̂ = g and v̂ = g², so the update is lr·sign(g)
        let mut params = single(1.0);
        let mut opt = Adam::new(&params, 0.01);
        opt.step(&mut params, &single(0.5)).unwrap();
        assert!((params.layers[0].weight[[0, 0]] - 0.99).abs() < 1e-6);
        assert_eq!(opt.steps(), 1);
    }

    #[test]
    fn test_minimizes_quadratic() {
        // f(w) = (w − 3)²
        let mut params = single(0.0);
        let mut opt = Adam::new(&params, 0.05);
        for _ in 0..2000 {
            let w = params.layers[0].weight[[0, 0]];
            let b = params.layers[0].bias[[0, 0]];
            let grads = NetworkParams::from_layers(vec![DenseLayer {
                weight: array![[2.0 * (w - 3.0)]],
                bias: array![[2.0 * (b + 1.0)]],
            }])
            .unwrap();
            opt.step(&mut params, &grads).unwrap();
        }
        assert!((params.layers[0].weight[[0, 0]] - 3.0).abs() < 1e-2);
        assert!((params.layers[0].bias[[0, 0]] + 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_rejects_non_finite_and_mismatched() {
        let mut params = single(1.0);
        let mut opt = Adam::new(&params, 0.01);
        assert!(matches!(
            opt.step(&mut params, &single(f64::NAN)),
            Err(LinkError::NumericInstability(_))
        ));
        let other = NetworkParams::xavier(&[2, 3], 0).unwrap();
        assert!(matches!(
            opt.step(&mut params, &other),
            Err(LinkError::ShapeMismatch { .. })
        ));
        // Rejected steps leave parameters and state untouched
        assert_eq!(params, single(1.0));
        assert_eq!(opt.steps(), 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut params = single(1.0);
        let mut opt = Adam::new(&params, 0.01);
        opt.step(&mut params, &single(1.0)).unwrap();
        opt.reset();
        assert_eq!(opt.steps(), 0);
    }
}
