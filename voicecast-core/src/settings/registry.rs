use crate::error::VoiceError;
use crate::settings::config::SynthesisConfig;
use std::collections::HashMap;
use std::sync::RwLock;

/// Per-guild synthesis parameters behind one explicit registry.
///
/// One instance per process, shared by reference with every component that
/// reads voice parameters. Guilds that never wrote a config read the
/// defaults.
#[derive(Default)]
pub struct SynthesisConfigRegistry {
    configs: RwLock<HashMap<String, SynthesisConfig>>,
}

impl SynthesisConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: &str) -> SynthesisConfig {
        self.configs
            .read()
            .unwrap()
            .get(guild_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Validates and stores a guild's config. Invalid values are rejected,
    /// not clamped; callers that want default substitution for legacy values
    /// sanitize before calling.
    pub fn set(&self, guild_id: &str, config: SynthesisConfig) -> Result<(), VoiceError> {
        if guild_id.is_empty() {
            return Err(VoiceError::InvalidInput(
                "guild id must not be empty".to_string(),
            ));
        }
        config.validate()?;
        self.configs
            .write()
            .unwrap()
            .insert(guild_id.to_string(), config);
        Ok(())
    }

    pub fn remove(&self, guild_id: &str) {
        self.configs.write().unwrap().remove(guild_id);
    }
}
