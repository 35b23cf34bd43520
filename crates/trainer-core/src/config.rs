//! Run-config TOML loading and the override chain.
//!
//! Every knob resolves through the same priority order: built-in
//! defaults, then `[network]`/`[training]` values from an optional TOML
//! file, then explicit CLI flags. Absent TOML keys leave the lower
//! layer untouched.

use std::path::Path;

use pvnet::model::tower::PolicyValueNetConfig;
use pvnet::training::trainer::TrainingConfig;
use serde::Deserialize;

/// Parsed run-config TOML. Both sections are optional.
#[derive(Debug, Default, Deserialize)]
pub struct RunToml {
    #[serde(default)]
    pub network: NetworkOverrides,
    #[serde(default)]
    pub training: TrainingOverrides,
}

/// `[network]` section: architecture overrides.
#[derive(Debug, Default, Deserialize)]
pub struct NetworkOverrides {
    pub blocks: Option<usize>,
    pub channels: Option<usize>,
}

/// `[training]` section: trainer hyperparameter overrides.
#[derive(Debug, Default, Deserialize)]
pub struct TrainingOverrides {
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub weight_decay: Option<f64>,
    pub shuffle: Option<bool>,
    pub prefetch_batches: Option<usize>,
    pub log_interval: Option<usize>,
    pub seed: Option<u64>,
    pub checkpoint_dir: Option<String>,
}

/// Trainer knobs exposed as CLI flags. These beat TOML values.
#[derive(Debug, Default)]
pub struct TrainingCliOverrides {
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub learning_rate: Option<f64>,
    pub weight_decay: Option<f64>,
    pub prefetch_batches: Option<usize>,
    pub seed: Option<u64>,
    pub checkpoint_dir: Option<String>,
}

/// Read and parse a run-config TOML file.
pub fn load_run_toml(path: &Path) -> anyhow::Result<RunToml> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {e}", path.display()))?;
    let parsed: RunToml = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {e}", path.display()))?;
    tracing::info!(path = %path.display(), "Loaded run config");
    Ok(parsed)
}

/// Resolve the network architecture: defaults < TOML < CLI flags.
pub fn build_network_config(
    toml: &NetworkOverrides,
    blocks_cli: Option<usize>,
    channels_cli: Option<usize>,
) -> PolicyValueNetConfig {
    let mut config = PolicyValueNetConfig::new();
    if let Some(blocks) = toml.blocks {
        config.blocks = blocks;
    }
    if let Some(channels) = toml.channels {
        config.channels = channels;
    }
    if let Some(blocks) = blocks_cli {
        config.blocks = blocks;
    }
    if let Some(channels) = channels_cli {
        config.channels = channels;
    }
    config
}

/// Resolve the trainer hyperparameters: defaults < TOML < CLI flags.
pub fn build_training_config(
    toml: &TrainingOverrides,
    cli: TrainingCliOverrides,
) -> TrainingConfig {
    let mut config = TrainingConfig::new();

    if let Some(epochs) = toml.epochs {
        config.epochs = epochs;
    }
    if let Some(batch_size) = toml.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(lr) = toml.learning_rate {
        config.learning_rate = lr;
    }
    if let Some(wd) = toml.weight_decay {
        config.weight_decay = wd;
    }
    if let Some(shuffle) = toml.shuffle {
        config.shuffle = shuffle;
    }
    if let Some(prefetch) = toml.prefetch_batches {
        config.prefetch_batches = prefetch;
    }
    if let Some(interval) = toml.log_interval {
        config.log_interval = interval;
    }
    if let Some(seed) = toml.seed {
        config.seed = Some(seed);
    }
    if let Some(dir) = &toml.checkpoint_dir {
        config.checkpoint_dir = dir.clone();
    }

    if let Some(epochs) = cli.epochs {
        config.epochs = epochs;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(lr) = cli.learning_rate {
        config.learning_rate = lr;
    }
    if let Some(wd) = cli.weight_decay {
        config.weight_decay = wd;
    }
    if let Some(prefetch) = cli.prefetch_batches {
        config.prefetch_batches = prefetch;
    }
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(dir) = cli.checkpoint_dir {
        config.checkpoint_dir = dir;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[network]
blocks = 4
channels = 32

[training]
epochs = 3
batch_size = 64
learning_rate = 5e-4
weight_decay = 1e-5
shuffle = false
prefetch_batches = 2
log_interval = 10
seed = 7
checkpoint_dir = "runs/a1"
"#;
        let parsed: RunToml = toml::from_str(toml_str).unwrap();
        assert_eq!(parsed.network.blocks, Some(4));
        assert_eq!(parsed.network.channels, Some(32));
        assert_eq!(parsed.training.epochs, Some(3));
        assert_eq!(parsed.training.batch_size, Some(64));
        assert_eq!(parsed.training.learning_rate, Some(5e-4));
        assert_eq!(parsed.training.weight_decay, Some(1e-5));
        assert_eq!(parsed.training.shuffle, Some(false));
        assert_eq!(parsed.training.prefetch_batches, Some(2));
        assert_eq!(parsed.training.log_interval, Some(10));
        assert_eq!(parsed.training.seed, Some(7));
        assert_eq!(parsed.training.checkpoint_dir.as_deref(), Some("runs/a1"));
    }

    #[test]
    fn test_parse_partial_toml_leaves_rest_none() {
        let toml_str = r#"
[training]
epochs = 5
"#;
        let parsed: RunToml = toml::from_str(toml_str).unwrap();
        assert_eq!(parsed.training.epochs, Some(5));
        assert_eq!(parsed.training.batch_size, None);
        assert_eq!(parsed.network.blocks, None);
    }

    #[test]
    fn test_parse_empty_toml() {
        let parsed: RunToml = toml::from_str("").unwrap();
        assert_eq!(parsed.network.blocks, None);
        assert_eq!(parsed.training.epochs, None);
    }

    #[test]
    fn test_network_override_priority() {
        let toml = NetworkOverrides {
            blocks: Some(4),
            channels: Some(32),
        };

        // TOML beats the built-in defaults
        let config = build_network_config(&toml, None, None);
        assert_eq!(config.blocks, 4);
        assert_eq!(config.channels, 32);

        // CLI beats TOML
        let config = build_network_config(&toml, Some(2), None);
        assert_eq!(config.blocks, 2);
        assert_eq!(config.channels, 32);

        // Nothing set falls back to defaults
        let config = build_network_config(&NetworkOverrides::default(), None, None);
        assert_eq!(config.blocks, 8);
        assert_eq!(config.channels, 64);
    }

    #[test]
    fn test_training_override_priority() {
        let toml = TrainingOverrides {
            epochs: Some(5),
            learning_rate: Some(5e-4),
            checkpoint_dir: Some("runs/toml".into()),
            ..Default::default()
        };
        let cli = TrainingCliOverrides {
            epochs: Some(2),
            checkpoint_dir: Some("runs/cli".into()),
            ..Default::default()
        };

        let config = build_training_config(&toml, cli);
        assert_eq!(config.epochs, 2);
        assert_eq!(config.learning_rate, 5e-4);
        assert_eq!(config.checkpoint_dir, "runs/cli");

        // TOML alone overrides only the keys it names
        let config = build_training_config(&toml, TrainingCliOverrides::default());
        assert_eq!(config.epochs, 5);
        assert_eq!(config.batch_size, 256);
        assert_eq!(config.checkpoint_dir, "runs/toml");
    }

    #[test]
    fn test_seed_merges_into_option_field() {
        let toml = TrainingOverrides {
            seed: Some(11),
            ..Default::default()
        };
        let config = build_training_config(&toml, TrainingCliOverrides::default());
        assert_eq!(config.seed, Some(11));

        let cli = TrainingCliOverrides {
            seed: Some(99),
            ..Default::default()
        };
        let config = build_training_config(&toml, cli);
        assert_eq!(config.seed, Some(99));
    }
}
