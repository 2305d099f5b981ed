use crate::domain::chart::Dimensions;
use crate::domain::metric_query::DEFAULT_QUERY_FILTER;
use crate::domain::palette::PaletteKind;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_ENDPOINT: &str = "https://monitoring.googleapis.com";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TsplotConfig {
    #[serde(default)]
    pub monitoring: MonitoringSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub chart: ChartSettings,
    #[serde(default)]
    pub query: QuerySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitoringSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            access_token: None,
            page_size: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputSettings {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_width")]
    pub width_inches: f64,
    #[serde(default = "default_height")]
    pub height_inches: f64,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

impl OutputSettings {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::from_inches(self.width_inches, self.height_inches, self.dpi)
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            width_inches: default_width(),
            height_inches: default_height(),
            dpi: default_dpi(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChartSettings {
    #[serde(default)]
    pub palette: PaletteKind,
    #[serde(default)]
    pub font_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuerySettings {
    #[serde(default = "default_filter_template")]
    pub filter_template: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            filter_template: default_filter_template(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_width() -> f64 {
    8.0
}

fn default_height() -> f64 {
    4.0
}

fn default_dpi() -> u32 {
    96
}

fn default_filter_template() -> String {
    DEFAULT_QUERY_FILTER.to_string()
}

/// Load `config/tsplot.*` if present, then `TSPLOT__SECTION__KEY` variables.
pub fn load_config() -> anyhow::Result<TsplotConfig> {
    load_config_from("config/tsplot")
}

pub fn load_config_from(path: &str) -> anyhow::Result<TsplotConfig> {
    build_config(path, environment())
}

/// `TSPLOT__OUTPUT__DPI=120` sets `output.dpi`.
fn environment() -> config::Environment {
    config::Environment::with_prefix("TSPLOT")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn build_config(path: &str, environment: config::Environment) -> anyhow::Result<TsplotConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(environment)
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = load_config_from("config/does-not-exist").unwrap();

        assert_eq!(config.monitoring.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.output.directory, PathBuf::from("."));
        assert_eq!(config.output.dimensions(), Dimensions { width: 768, height: 384 });
        assert_eq!(config.chart.palette, PaletteKind::HighContrast);
        assert_eq!(config.query.filter_template, DEFAULT_QUERY_FILTER);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("tsplot-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tsplot.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[monitoring]\nendpoint = \"http://localhost:9000\"\n\n[output]\ndpi = 100\n\n[chart]\npalette = \"named\""
        )
        .unwrap();

        let config = load_config_from(dir.join("tsplot").to_str().unwrap()).unwrap();

        assert_eq!(config.monitoring.endpoint, "http://localhost:9000");
        assert_eq!(config.output.dimensions(), Dimensions { width: 800, height: 400 });
        assert_eq!(config.chart.palette, PaletteKind::Named);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = std::env::temp_dir().join(format!("tsplot-config-env-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut file = std::fs::File::create(dir.join("tsplot.toml")).unwrap();
        writeln!(file, "[output]\ndpi = 100\nwidth_inches = 10.0").unwrap();

        let mut vars = config::Map::new();
        vars.insert("TSPLOT__OUTPUT__DPI".to_string(), "120".to_string());
        vars.insert("TSPLOT__MONITORING__ENDPOINT".to_string(), "http://localhost:9000".to_string());
        vars.insert("OTHER__OUTPUT__DPI".to_string(), "1".to_string());

        let config = build_config(
            dir.join("tsplot").to_str().unwrap(),
            environment().source(Some(vars)),
        )
        .unwrap();

        assert_eq!(config.output.dpi, 120);
        assert_eq!(config.output.dimensions(), Dimensions { width: 1200, height: 480 });
        assert_eq!(config.monitoring.endpoint, "http://localhost:9000");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
