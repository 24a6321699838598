use std::time::Duration;

use hybrid_config::AppConfig;
use hybrid_core::tolerance::Tolerance;
use hybrid_engine::settings::{
    EngineSettings, GuardSettings, MarkerSettings, ReportSettings,
};

/// 将应用配置映射为引擎参数。
pub fn engine_settings(config: &AppConfig) -> EngineSettings {
    let markers = &config.markers;
    let report = &config.report;
    let pass_through_commands = if config.guard.pass_through_commands.is_empty() {
        GuardSettings::default_pass_through()
    } else {
        config
            .guard
            .pass_through_commands
            .iter()
            .map(|name| name.trim().to_ascii_uppercase())
            .filter(|name| !name.is_empty())
            .collect()
    };

    EngineSettings {
        tolerance: Tolerance::from_display_precision(
            config.tolerance.display_precision,
            config.tolerance.min_epsilon,
        ),
        metadata_key: config.metadata.key.clone(),
        payload_decimals: config.metadata.decimals,
        markers: MarkerSettings {
            numbering_block: markers.numbering_block.clone(),
            number_tag: markers.number_tag.clone(),
            id_tag: markers.id_tag.clone(),
            layer: markers.layer.clone(),
            text_height: markers.text_height,
            classification_prefix: markers.classification_prefix.clone(),
            classification_scale: markers.classification_scale,
            place_classification: markers.place_classification,
        },
        report: ReportSettings {
            style: report.style.clone(),
            layer: report.layer.clone(),
            text_height: report.text_height,
            row_height: report.row_height,
            column_widths: report.column_widths.clone(),
            polyline_layer: report.polyline_layer.clone(),
        },
        guard: GuardSettings {
            warning_cooldown: Duration::from_secs(config.guard.warning_cooldown_secs),
            pass_through_commands,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_engine_defaults() {
        let settings = engine_settings(&AppConfig::default());
        let defaults = EngineSettings::default();
        assert!((settings.tolerance.epsilon() - defaults.tolerance.epsilon()).abs() < 1e-12);
        assert_eq!(settings.metadata_key, defaults.metadata_key);
        assert_eq!(settings.markers.numbering_block, defaults.markers.numbering_block);
        assert_eq!(settings.report.column_widths, defaults.report.column_widths);
        assert_eq!(
            settings.guard.pass_through_commands,
            GuardSettings::default_pass_through()
        );
        assert_eq!(settings.guard.warning_cooldown, Duration::from_secs(60));
    }

    #[test]
    fn precision_and_pass_through_overrides_apply() {
        let mut config = AppConfig::default();
        config.tolerance.display_precision = 6;
        config.guard.pass_through_commands = vec![" move ".to_string(), String::new()];
        let settings = engine_settings(&config);
        assert!((settings.tolerance.epsilon() - 1e-4).abs() < 1e-12);
        assert_eq!(settings.guard.pass_through_commands, vec!["MOVE".to_string()]);
    }
}
