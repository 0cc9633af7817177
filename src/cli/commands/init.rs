//! Init and Config commands.

use anyhow::{Context, anyhow};

use crate::config::Settings;

/// Write `.labelwatch/settings.toml` with defaults rooted at the cwd.
pub fn run_init(force: bool) -> anyhow::Result<()> {
    let path = Settings::init_config_file(force).map_err(|e| anyhow!("{e}"))?;

    println!("Wrote {}", path.display());
    println!("Next: set [extractor] program and args, then run 'labelwatch watch'.");
    Ok(())
}

/// Print the effective settings after file and environment layering.
pub fn run_config(settings: &Settings) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(settings).context("rendering settings")?;
    println!("# root: {}", settings.watch.root.display());
    print!("{rendered}");
    Ok(())
}
