use anyhow::Result;
use comfy_table::Color;
use gym_coach_lib::{
    load_config_util, parse_color, save_config_util, Config, ConfigError, StandardColor,
};

#[test]
fn test_missing_config_file_is_created_with_defaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("config.toml");

    let config = load_config_util(&path)?;
    assert!(path.exists());
    assert_eq!(config.theme.header_color, "Green");
    assert_eq!(config.assistant.model, "gemini-2.5-flash");
    assert!(config.assistant.api_key.is_none());
    Ok(())
}

#[test]
fn test_config_round_trip_and_partial_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    config.theme.header_color = "Cyan".to_string();
    config.assistant.api_key = Some("secret".to_string());
    config.assistant.timeout_secs = 5;
    save_config_util(&path, &config)?;

    let loaded = load_config_util(&path)?;
    assert_eq!(loaded.theme.header_color, "Cyan");
    assert_eq!(loaded.assistant.api_key.as_deref(), Some("secret"));
    assert_eq!(loaded.assistant.timeout_secs, 5);
    assert_eq!(loaded.theme.header(), Color::Cyan);

    // Missing tables and fields fall back to defaults.
    std::fs::write(&path, "[theme]\nheader_color = \"Red\"\n")?;
    let loaded = load_config_util(&path)?;
    assert_eq!(loaded.theme.header_color, "Red");
    assert_eq!(loaded.assistant.timeout_secs, 30);

    std::fs::write(&path, "this is = = not toml")?;
    assert!(matches!(
        load_config_util(&path),
        Err(ConfigError::TomlParse(_))
    ));
    Ok(())
}

#[test]
fn test_parse_color() {
    assert_eq!(parse_color("green").unwrap(), StandardColor::Green);
    assert_eq!(parse_color(" DarkGrey ").unwrap(), StandardColor::DarkGrey);
    assert!(matches!(
        parse_color("chartreuse"),
        Err(ConfigError::InvalidColor(_))
    ));

    let mut config = Config::default();
    config.theme.header_color = "not a colour".to_string();
    assert_eq!(config.theme.header(), Color::Green);
}
