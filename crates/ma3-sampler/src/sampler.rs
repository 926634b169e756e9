//! Sampler: shared tables and instance factory

use std::sync::Arc;

use log::debug;

use crate::backend::SamplerFactory;
use crate::config::SamplerConfig;
use crate::instance::Instance;
use crate::preset::PresetTables;
use crate::tables::WaveTables;
use crate::Result;

/// Read-only data shared by every instance of a sampler
#[derive(Debug)]
pub(crate) struct Shared {
    pub tables: WaveTables,
    pub presets: PresetTables,
}

/// Owns the waveform tables and preset data, and creates [`Instance`]s
///
/// Building the tables takes a few milliseconds, so create one sampler and reuse
/// it; instances are cheap and fully independent.
#[derive(Debug, Clone)]
pub struct Sampler {
    config: SamplerConfig,
    shared: Arc<Shared>,
}

impl Sampler {
    /// Build a sampler for the given preset configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for preset combinations with no data behind them
    /// (MA-2 wave drums).
    pub fn new(config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        debug!("building sampler tables for {config:?}");
        let shared = Shared {
            tables: WaveTables::build(),
            presets: PresetTables::build(&config),
        };
        Ok(Self {
            config,
            shared: Arc::new(shared),
        })
    }

    /// Configuration this sampler was built with
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Built-in presets
    pub fn presets(&self) -> &PresetTables {
        &self.shared.presets
    }
}

impl SamplerFactory for Sampler {
    type Instance = Instance;

    fn make_instance(&self, channels: usize, sample_rate: f64) -> Result<Instance> {
        Instance::new(Arc::clone(&self.shared), channels, sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PresetBank;
    use crate::SamplerError;

    #[test]
    fn test_rejects_ma2_wave_drums() {
        let config = SamplerConfig {
            wave_drums: PresetBank::Ma2,
            ..SamplerConfig::default()
        };
        assert!(matches!(Sampler::new(config), Err(SamplerError::ConfigError(_))));
    }

    #[test]
    fn test_instances_share_tables() {
        let sampler = Sampler::new(SamplerConfig::default()).unwrap();
        let _a = sampler.make_instance(4, 44_100.0).unwrap();
        let _b = sampler.make_instance(16, 22_050.0).unwrap();
        assert_eq!(Arc::strong_count(&sampler.shared), 3);
    }

    #[test]
    fn test_rejects_bad_instance_parameters() {
        let sampler = Sampler::new(SamplerConfig::default()).unwrap();
        assert!(sampler.make_instance(0, 44_100.0).is_err());
        assert!(sampler.make_instance(4, 0.0).is_err());
        assert!(sampler.make_instance(4, f64::NAN).is_err());
    }
}
