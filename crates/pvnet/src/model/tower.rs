use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::relu;

use replay::{BOARD_SIDE, POLICY_LEN, STATE_PLANES};

use crate::model::PolicyValueModel;

/// Channel count both heads reduce to before their linear layers.
const HEAD_CHANNELS: usize = 32;
/// Hidden width of the value head's first linear layer.
const VALUE_HIDDEN: usize = 64;

/// Configuration for the residual-tower policy-value network.
///
/// ```text
/// (batch, 10, 6, 6)
///   → Conv3x3(10→channels) → BN → ReLU
///   → [ResidualBlock(channels)] × blocks
///   ├→ Conv1x1(channels→32) → BN → ReLU → flatten → Linear(1152→188)
///   │    → policy logits: (batch, 188)
///   └→ Conv1x1(channels→32) → BN → ReLU → flatten
///        → Linear(1152→64) → ReLU → Linear(64→1) → tanh → squeeze
///        → value: (batch,)
/// ```
#[derive(Config, Debug)]
pub struct PolicyValueNetConfig {
    /// Number of residual blocks in the tower.
    #[config(default = 8)]
    pub blocks: usize,
    /// Channel width of the tower.
    #[config(default = 64)]
    pub channels: usize,
}

/// One residual block: two 3×3 convolutions with batch norm, skip
/// connection added before the final ReLU.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
}

impl<B: Backend> ResidualBlock<B> {
    fn init(channels: usize, device: &B::Device) -> Self {
        let conv = || {
            Conv2dConfig::new([channels, channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
        };
        Self {
            conv1: conv().init(device),
            bn1: BatchNormConfig::new(channels).init(device),
            conv2: conv().init(device),
            bn2: BatchNormConfig::new(channels).init(device),
        }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.bn1.forward(self.conv1.forward(input.clone())));
        let x = self.bn2.forward(self.conv2.forward(x));
        relu(x + input)
    }
}

/// Residual tower with a policy head and a value head.
///
/// The shipped implementer of [`PolicyValueModel`]: board planes go
/// through a shared convolutional tower, then split into the two heads.
/// Policy output is raw logits; value output is tanh-squashed to [-1, 1].
#[derive(Module, Debug)]
pub struct PolicyValueNet<B: Backend> {
    stem_conv: Conv2d<B>,
    stem_bn: BatchNorm<B, 2>,
    blocks: Vec<ResidualBlock<B>>,
    policy_conv: Conv2d<B>,
    policy_bn: BatchNorm<B, 2>,
    policy_fc: Linear<B>,
    value_conv: Conv2d<B>,
    value_bn: BatchNorm<B, 2>,
    value_fc1: Linear<B>,
    value_fc2: Linear<B>,
}

impl PolicyValueNetConfig {
    /// Initialize a PolicyValueNet with the given configuration.
    pub fn init<B: Backend>(&self, device: &B::Device) -> PolicyValueNet<B> {
        let head_flat = HEAD_CHANNELS * BOARD_SIDE * BOARD_SIDE;
        PolicyValueNet {
            stem_conv: Conv2dConfig::new([STATE_PLANES, self.channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            stem_bn: BatchNormConfig::new(self.channels).init(device),
            blocks: (0..self.blocks)
                .map(|_| ResidualBlock::init(self.channels, device))
                .collect(),
            policy_conv: Conv2dConfig::new([self.channels, HEAD_CHANNELS], [1, 1]).init(device),
            policy_bn: BatchNormConfig::new(HEAD_CHANNELS).init(device),
            policy_fc: LinearConfig::new(head_flat, POLICY_LEN).init(device),
            value_conv: Conv2dConfig::new([self.channels, HEAD_CHANNELS], [1, 1]).init(device),
            value_bn: BatchNormConfig::new(HEAD_CHANNELS).init(device),
            value_fc1: LinearConfig::new(head_flat, VALUE_HIDDEN).init(device),
            value_fc2: LinearConfig::new(VALUE_HIDDEN, 1).init(device),
        }
    }
}

impl<B: Backend> PolicyValueModel<B> for PolicyValueNet<B> {
    fn forward(&self, states: Tensor<B, 4>) -> (Tensor<B, 2>, Tensor<B, 1>) {
        let mut x = relu(self.stem_bn.forward(self.stem_conv.forward(states)));
        for block in &self.blocks {
            x = block.forward(x);
        }

        let p = relu(self.policy_bn.forward(self.policy_conv.forward(x.clone())));
        let policy_logits = self.policy_fc.forward(p.flatten::<2>(1, 3));

        let v = relu(self.value_bn.forward(self.value_conv.forward(x)));
        let v = relu(self.value_fc1.forward(v.flatten::<2>(1, 3)));
        let value = self.value_fc2.forward(v).tanh().squeeze::<1>(1);

        (policy_logits, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    fn small_config() -> PolicyValueNetConfig {
        PolicyValueNetConfig::new().with_blocks(2).with_channels(16)
    }

    #[test]
    fn test_config_defaults() {
        let config = PolicyValueNetConfig::new();
        assert_eq!(config.blocks, 8);
        assert_eq!(config.channels, 64);
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);
        let states = Tensor::<TestBackend, 4>::random(
            [4, STATE_PLANES, BOARD_SIDE, BOARD_SIDE],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        let (policy, value) = model.forward(states);
        assert_eq!(policy.dims(), [4, POLICY_LEN]);
        assert_eq!(value.dims(), [4]);
    }

    #[test]
    fn test_value_bounded_by_tanh() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);
        // Large-magnitude inputs should still give values inside [-1, 1]
        let states = Tensor::<TestBackend, 4>::random(
            [8, STATE_PLANES, BOARD_SIDE, BOARD_SIDE],
            Distribution::Normal(0.0, 50.0),
            &device,
        );

        let (_, value) = model.forward(states);
        let values: Vec<f32> = value.into_data().to_vec().unwrap();
        for (i, &v) in values.iter().enumerate() {
            assert!(
                (-1.0..=1.0).contains(&v),
                "value[{i}] = {v} escaped the tanh range"
            );
        }
    }

    #[test]
    fn test_different_inputs_different_outputs() {
        let device = Default::default();
        let model = small_config().init::<TestBackend>(&device);

        let states1 = Tensor::<TestBackend, 4>::random(
            [4, STATE_PLANES, BOARD_SIDE, BOARD_SIDE],
            Distribution::Normal(2.0, 0.5),
            &device,
        );
        let states2 = Tensor::<TestBackend, 4>::random(
            [4, STATE_PLANES, BOARD_SIDE, BOARD_SIDE],
            Distribution::Normal(-2.0, 0.5),
            &device,
        );

        let (policy1, _) = model.forward(states1);
        let (policy2, _) = model.forward(states2);

        let diff: f32 = (policy1 - policy2).abs().sum().into_scalar().elem();
        assert!(
            diff > 1e-6,
            "Different inputs should produce different logits, diff={diff}"
        );
    }

    #[test]
    fn test_gradient_flows_through_both_heads() {
        use burn::optim::GradientsParams;

        let device = Default::default();
        let model = small_config().init::<TestAutodiffBackend>(&device);

        let states = Tensor::<TestAutodiffBackend, 4>::random(
            [4, STATE_PLANES, BOARD_SIDE, BOARD_SIDE],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let (policy, value) = model.forward(states);
        let loss = policy.sum() + value.sum();

        let grads = GradientsParams::from_grads(loss.backward(), &model);

        // Stem sits below both heads, so its gradient proves the full path
        let stem_grad = grads
            .get::<NdArray<f32>, 4>(model.stem_conv.weight.id)
            .expect("stem conv weight should have gradient");
        let stem_sum: f32 = stem_grad.abs().sum().into_scalar().elem();
        assert!(stem_sum > 0.0, "stem gradient is zero, gradient not flowing");

        let policy_grad = grads
            .get::<NdArray<f32>, 2>(model.policy_fc.weight.id)
            .expect("policy head weight should have gradient");
        let policy_sum: f32 = policy_grad.abs().sum().into_scalar().elem();
        assert!(policy_sum > 0.0, "policy head gradient is zero");

        let value_grad = grads
            .get::<NdArray<f32>, 2>(model.value_fc2.weight.id)
            .expect("value head weight should have gradient");
        let value_sum: f32 = value_grad.abs().sum().into_scalar().elem();
        assert!(value_sum > 0.0, "value head gradient is zero");
    }

    #[test]
    fn test_param_count_scales_with_width() {
        let device = Default::default();
        let narrow = PolicyValueNetConfig::new()
            .with_blocks(2)
            .with_channels(16)
            .init::<TestBackend>(&device);
        let wide = PolicyValueNetConfig::new()
            .with_blocks(2)
            .with_channels(32)
            .init::<TestBackend>(&device);

        assert!(narrow.num_params() > 0);
        assert!(
            wide.num_params() > narrow.num_params(),
            "doubling channel width must add parameters ({} vs {})",
            wide.num_params(),
            narrow.num_params()
        );
    }
}
