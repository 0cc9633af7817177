//! Requeue and Unlock commands.

use crate::config::Settings;
use crate::pipeline::{LockManager, RequeueOptions, requeue_retries};

/// Run the requeue command.
pub fn run_requeue(settings: &Settings, options: RequeueOptions) -> anyhow::Result<()> {
    let moved = requeue_retries(&settings.layout(), &settings.watch.extension_set(), options)?;

    let verb = if options.dry_run { "Would requeue" } else { "Requeued" };
    for path in &moved {
        println!("  {}", path.display());
    }
    println!("{verb} {} label(s)", moved.len());
    Ok(())
}

/// Run the unlock command.
pub fn run_unlock(settings: &Settings, all: bool) -> anyhow::Result<()> {
    let locks = LockManager::new(settings.lock.suffix.clone());
    let max_age = if all { None } else { settings.lock.stale_after() };

    if max_age.is_none() && !all {
        println!("Stale lock sweep disabled (lock.stale_after_secs = 0); use --all");
        return Ok(());
    }

    let removed = locks.sweep_stale(&settings.watch.root, max_age)?;
    for path in &removed {
        println!("  {}", path.display());
    }
    println!("Removed {} lock marker(s)", removed.len());
    Ok(())
}
