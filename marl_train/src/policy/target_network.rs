//! Polyak averaging between an online network and its target copy.
//!
//! ```text
//! θ_target = τ * θ_online + (1 - τ) * θ_target
//! ```
//!
//! Parameters are matched by traversal order, so online and target models
//! only need the same architecture, not shared parameter ids.

use burn::module::{Module, ModuleMapper, Param};
use burn::prelude::*;

/// Collects every float parameter of a module, flattened to 1D.
struct ParamExtractor<B: Backend> {
    params: Vec<Tensor<B, 1>>,
}

impl<B: Backend> ModuleMapper<B> for ParamExtractor<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let total: usize = val.dims().iter().product();
        self.params.push(val.reshape([total]));
        param
    }
}

/// Blends each target parameter towards the online parameter at the same
/// traversal position.
struct SoftUpdateMapper<B: Backend> {
    online: Vec<Tensor<B, 1>>,
    tau: f32,
    index: usize,
}

impl<B: Backend> ModuleMapper<B> for SoftUpdateMapper<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let target = param.val();
        let shape = target.dims();
        let total: usize = shape.iter().product();
        let idx = self.index;
        self.index += 1;

        match self.online.get(idx) {
            Some(online) => {
                let blended = online.clone().mul_scalar(self.tau)
                    + target.reshape([total]).mul_scalar(1.0 - self.tau);
                // Targets never receive gradients; cut the history so the
                // autodiff graph does not grow across updates.
                Param::initialized(param.id.clone(), blended.reshape(shape).detach())
            }
            None => param,
        }
    }
}

/// Move `target` towards `online` by factor `tau` and return the result.
///
/// `tau = 0` leaves the target unchanged, `tau = 1` copies the online model.
pub fn soft_update<B, M>(online: &M, target: M, tau: f32) -> M
where
    B: Backend,
    M: Module<B>,
{
    if tau.abs() < 1e-6 {
        return target;
    }
    if (tau - 1.0).abs() < 1e-6 {
        return online.clone();
    }

    let mut extractor = ParamExtractor { params: Vec::new() };
    let _ = online.clone().map(&mut extractor);

    let mut updater = SoftUpdateMapper {
        online: extractor.params,
        tau,
        index: 0,
    };
    target.map(&mut updater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MlpConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn flat_params<M: Module<TestBackend>>(model: &M) -> Vec<f32> {
        let mut extractor = ParamExtractor { params: Vec::new() };
        let _ = model.clone().map(&mut extractor);
        extractor
            .params
            .into_iter()
            .flat_map(|t| t.into_data().to_vec::<f32>().unwrap())
            .collect()
    }

    #[test]
    fn test_tau_zero_keeps_target() {
        let device = Default::default();
        let config = MlpConfig::new(3, 2).with_num_units(4);
        let online = config.init::<TestBackend>(&device);
        let target = config.init::<TestBackend>(&device);
        let before = flat_params(&target);
        let after = flat_params(&soft_update::<TestBackend, _>(&online, target, 0.0));
        assert_eq!(before, after);
    }

    #[test]
    fn test_tau_one_copies_online() {
        let device = Default::default();
        let config = MlpConfig::new(3, 2).with_num_units(4);
        let online = config.init::<TestBackend>(&device);
        let target = config.init::<TestBackend>(&device);
        let updated = soft_update::<TestBackend, _>(&online, target, 1.0);
        assert_eq!(flat_params(&online), flat_params(&updated));
    }

    #[test]
    fn test_partial_update_interpolates() {
        let device = Default::default();
        let config = MlpConfig::new(3, 2).with_num_units(4);
        let online = config.init::<TestBackend>(&device);
        let target = config.init::<TestBackend>(&device);
        let online_flat = flat_params(&online);
        let target_flat = flat_params(&target);

        let updated = flat_params(&soft_update::<TestBackend, _>(&online, target, 0.25));
        for ((o, t), u) in online_flat.iter().zip(&target_flat).zip(&updated) {
            assert!((u - (0.25 * o + 0.75 * t)).abs() < 1e-5);
        }
    }
}
