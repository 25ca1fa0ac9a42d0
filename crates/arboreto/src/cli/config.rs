//! `arboreto config`: show the resolved configuration.

use anyhow::Result;
use arboreto::ArboretoConfig;

pub fn run(config: &ArboretoConfig, json: bool) -> Result<()> {
    if json {
        let view = serde_json::json!({
            "config": config,
            "archive_dir": config.archive_dir(),
            "required_folders": config.required_folders(),
        });
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    print!("{}", toml::to_string_pretty(config)?);
    println!();
    println!("# folders");
    for folder in config.required_folders() {
        let state = if folder.is_dir() { "ok" } else { "missing" };
        println!("#   {:<8} {}", state, folder.display());
    }
    Ok(())
}
