use strata_map::{IntegrationError, IntegratorConfig, Layer, LayerConfig, MapError, Voxel};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::Error),
    #[error(transparent)]
    Layer(#[from] MapError),
    #[error(transparent)]
    Integrator(#[from] IntegrationError),
}

/// Everything needed to set up a map and fuse measurements into it. Missing fields take their default values.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub layer: LayerConfig,
    pub integrator: IntegratorConfig,
}

impl Config {
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let reader = std::fs::File::open(path)?;
        let config: Self = ron::de::from_reader(reader)?;
        config.validate()?;
        log::info!("loaded config from {}", path.display());

        Ok(config)
    }

    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::de::from_str(s)?;
        config.validate()?;

        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layer.validate()?;
        self.integrator.validate()?;
        Ok(())
    }

    /// An empty layer with the configured geometry.
    pub fn new_layer<V: Voxel>(&self) -> Result<Layer<V>, ConfigError> {
        Ok(Layer::from_config(&self.layer)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strata_map::TsdfVoxel;

    use approx::assert_relative_eq;

    #[test]
    fn bundled_config_parses() {
        let config = Config::from_ron_str(include_str!("../assets/strata.ron")).unwrap();
        assert_relative_eq!(config.layer.voxel_size, 0.05);
        assert_eq!(config.layer.voxels_per_side, 16);
        assert_eq!(config.integrator, IntegratorConfig::default());

        let layer = config.new_layer::<TsdfVoxel>().unwrap();
        assert_relative_eq!(layer.block_size(), 0.8);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config = Config::from_ron_str("(integrator: (max_weight: 20.0))").unwrap();
        assert_eq!(config.layer, LayerConfig::default());
        assert_relative_eq!(config.integrator.max_weight, 20.0);
        assert_relative_eq!(config.integrator.max_distance, 15.0);
    }

    #[test]
    fn round_trips_through_ron() {
        let config = Config::default();
        let text = config.to_ron_string().unwrap();
        assert_eq!(Config::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            Config::from_ron_str("(layer: (voxels_per_side: 0))"),
            Err(ConfigError::Layer(MapError::InvalidLayerConfig(_)))
        ));
        assert!(matches!(
            Config::from_ron_str("(integrator: (max_distance: -1.0))"),
            Err(ConfigError::Integrator(IntegrationError::InvalidConfig(_)))
        ));
        assert!(matches!(Config::from_ron_str("(layer: "), Err(ConfigError::Parse(_))));
        assert!(matches!(Config::read_file("does/not/exist.ron"), Err(ConfigError::Io(_))));
    }
}
