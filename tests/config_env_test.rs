use labelwatch::Settings;
use std::env;
use tempfile::TempDir;

// Single test in this binary: it mutates process environment.
#[test]
fn test_env_overrides_file_with_double_underscore_nesting() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &config_path,
        "[retry]\nmax_retries = 2\n\n[stability]\nsamples = 6\ninterval_ms = 500\n",
    )
    .unwrap();

    unsafe {
        env::set_var("LW_RETRY__MAX_RETRIES", "5");
        env::set_var("LW_STABILITY__INTERVAL_MS", "50");
        env::set_var("LW_WATCH__PROCESSED_DIR", "Done");
    }

    let settings = Settings::load_from(&config_path).unwrap();

    unsafe {
        env::remove_var("LW_RETRY__MAX_RETRIES");
        env::remove_var("LW_STABILITY__INTERVAL_MS");
        env::remove_var("LW_WATCH__PROCESSED_DIR");
    }

    // Environment wins over the file
    assert_eq!(settings.retry.max_retries, 5);
    assert_eq!(settings.stability.interval_ms, 50);
    // File wins over defaults
    assert_eq!(settings.stability.samples, 6);
    // Underscores inside field names survive
    assert_eq!(settings.watch.processed_dir, "Done");
    assert_eq!(
        settings.layout().processed(),
        settings.watch.root.join("Done")
    );
}
