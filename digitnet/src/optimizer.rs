use crate::dtype::DType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::iter::zip;

/// Identifies one parameter tensor of a network across optimizer steps.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ParamId {
    pub layer: usize,
    pub slot: usize,
}

pub trait Optimizer<T: DType> {
    /// called once per mini-batch before any parameter is updated
    fn begin_step(&mut self);
    fn update(&mut self, id: ParamId, param: &mut [T], grad: &[T]);
}

/// Adam configuration, defaults match the usual Keras/TF.js settings.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta_1: f64,
    pub beta_2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            learning_rate: 0.001,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-7,
        }
    }
}

struct Moments<T> {
    first: Vec<T>,
    second: Vec<T>,
}

/// Adam optimizer as described in [Adam: A Method for Stochastic Optimization](https://arxiv.org/abs/1412.6980).
pub struct Adam<T: DType> {
    config: AdamConfig,
    time: i32,
    moments: HashMap<ParamId, Moments<T>>,
}

impl<T: DType> Adam<T> {
    pub fn new(config: AdamConfig) -> Self {
        Adam {
            config,
            time: 0,
            moments: HashMap::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// number of completed steps
    #[inline]
    pub fn iterations(&self) -> i32 {
        self.time
    }
}

impl<T: DType> Optimizer<T> for Adam<T> {
    fn begin_step(&mut self) {
        self.time += 1;
    }

    fn update(&mut self, id: ParamId, param: &mut [T], grad: &[T]) {
        assert_eq!(param.len(), grad.len(), "Gradient length does not match parameter");
        assert!(self.time > 0, "begin_step must be called before update");
        let AdamConfig {
            learning_rate,
            beta_1,
            beta_2,
            epsilon,
        } = self.config;
        let moments = self.moments.entry(id).or_insert_with(|| Moments {
            first: vec![T::ZERO; param.len()],
            second: vec![T::ZERO; param.len()],
        });
        let first_correction = T::from_f64(1.0 - beta_1.powi(self.time));
        let second_correction = T::from_f64(1.0 - beta_2.powi(self.time));
        let (lr, b1, b2, eps) = (
            T::from_f64(learning_rate),
            T::from_f64(beta_1),
            T::from_f64(beta_2),
            T::from_f64(epsilon),
        );
        for ((p, &g), (m, v)) in zip(
            zip(param.iter_mut(), grad),
            zip(moments.first.iter_mut(), moments.second.iter_mut()),
        ) {
            *m = b1 * *m + (T::ONE - b1) * g;
            *v = b2 * *v + (T::ONE - b2) * g * g;
            let m_hat = *m / first_correction;
            let v_hat = *v / second_correction;
            *p -= lr * m_hat / (v_hat.sqrt() + eps);
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Adam, AdamConfig, Optimizer, ParamId};
    use approx::assert_abs_diff_eq;

    const ID: ParamId = ParamId { layer: 0, slot: 0 };

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        // after bias correction the first step is lr * g / (|g| + eps)
        let mut adam = Adam::<f64>::new(AdamConfig::default());
        let mut param = vec![1.0, -2.0, 0.5];
        let grad = vec![0.3, -4.0, 0.0];
        adam.begin_step();
        adam.update(ID, &mut param, &grad);
        assert_abs_diff_eq!(param[0], 1.0 - 0.001, epsilon = 1e-9);
        assert_abs_diff_eq!(param[1], -2.0 + 0.001, epsilon = 1e-9);
        assert_abs_diff_eq!(param[2], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_params_have_separate_state() {
        let mut adam = Adam::<f32>::new(AdamConfig::default());
        let mut a = vec![0.0f32];
        let mut b = vec![0.0f32];
        adam.begin_step();
        adam.update(ID, &mut a, &[1.0]);
        adam.update(ParamId { layer: 1, slot: 0 }, &mut b, &[-1.0]);
        adam.begin_step();
        adam.update(ID, &mut a, &[1.0]);
        assert_eq!(adam.iterations(), 2);
        assert!(a[0] < b[0] * -1.5);
    }
}
