use parking_lot::RwLock;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

const DEFAULT_ALIGN: usize = 32;
const DEFAULT_POOL_MAX_FREE: usize = 64;

/// Process-wide defaults for buffer allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Byte alignment applied to plane linesizes by [`Frame::get_buffer`](crate::av::Frame::get_buffer).
    pub align: usize,
    /// Maximum number of cached free entries a [`BufferPool`](crate::buffer::BufferPool) keeps.
    pub pool_max_free: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            align: DEFAULT_ALIGN,
            pool_max_free: DEFAULT_POOL_MAX_FREE,
        }
    }
}

impl Config {
    fn load() -> Self {
        let mut config = Config::default();

        // Environment first, then the config file wins
        if let Some(align) = env_usize("AVCORE_ALIGN") {
            config.align = align;
        }
        if let Some(max_free) = env_usize("AVCORE_POOL_MAX_FREE") {
            config.pool_max_free = max_free;
        }

        let config_paths = ["./avcore.toml", "./avcore_config.toml"];
        for path in &config_paths {
            if let Ok(content) = fs::read_to_string(path) {
                config.apply(&content);
                break;
            }
        }

        config.sanitize();
        config
    }

    /// Applies `key = value` lines from a config file body.
    ///
    /// Unknown keys and unparsable values are skipped.
    pub fn apply(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            let Ok(value) = value.parse::<usize>() else {
                log::warn!("ignoring config value for {}: {:?}", key.trim(), value);
                continue;
            };
            match key.trim() {
                "align" => self.align = value,
                "pool_max_free" => self.pool_max_free = value,
                _ => {}
            }
        }
    }

    fn sanitize(&mut self) {
        if self.align == 0 || !self.align.is_power_of_two() {
            log::warn!("align {} is not a power of two, using {}", self.align, DEFAULT_ALIGN);
            self.align = DEFAULT_ALIGN;
        }
    }

    /// Re-reads environment and config file.
    pub fn reload() {
        let new_config = Config::load();
        *cell().write() = new_config;
    }

    /// Replaces the process-wide configuration.
    pub fn set(mut config: Config) {
        config.sanitize();
        *cell().write() = config;
    }
}

fn cell() -> &'static RwLock<Config> {
    CONFIG.get_or_init(|| RwLock::new(Config::load()))
}

fn env_usize(name: &str) -> Option<usize> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Returns a snapshot of the current configuration.
pub fn get() -> Config {
    cell().read().clone()
}

/// Returns the configured plane alignment.
pub fn align() -> usize {
    cell().read().align
}

/// Returns the configured pool free-list cap.
pub fn pool_max_free() -> usize {
    cell().read().pool_max_free
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# avcore configuration

# Plane linesize alignment in bytes (power of two)
align = 32

# Maximum free entries cached per buffer pool
pool_max_free = 64
"#;
        fs::write(path, template)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apply_file_body() {
        let mut config = Config::default();
        config.apply("# comment\nalign = 64\npool_max_free = '8'\nunknown = 3\n");
        assert_eq!(config, Config { align: 64, pool_max_free: 8 });
    }

    #[test]
    fn test_apply_skips_garbage() {
        let mut config = Config::default();
        config.apply("align = wide\nno equals sign here\n");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_sanitize_rejects_non_power_of_two() {
        let mut config = Config { align: 24, pool_max_free: 1 };
        config.sanitize();
        assert_eq!(config.align, DEFAULT_ALIGN);
    }
}
