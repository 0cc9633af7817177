//! Status command - where labels currently sit.

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use console::style;

use crate::config::Settings;
use crate::pipeline::{Inventory, LockManager};

/// Run the status command.
pub fn run(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let layout = settings.layout();
    let inventory = Inventory::collect(
        &layout,
        &settings.watch.extension_set(),
        &LockManager::new(settings.lock.suffix.clone()),
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        return Ok(());
    }

    println!("{}", style(layout.root().display()).bold());
    print_inventory(&inventory);
    Ok(())
}

fn print_inventory(inventory: &Inventory) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("State").fg(Color::Cyan),
        Cell::new("Labels").fg(Color::Cyan),
    ]);

    table.add_row(vec![Cell::new("pending"), Cell::new(inventory.pending)]);
    table.add_row(vec![Cell::new("processed"), Cell::new(inventory.processed)]);
    table.add_row(vec![
        Cell::new("retry scheduled"),
        Cell::new(inventory.retry_scheduled),
    ]);

    let stuck = Cell::new(inventory.stuck.len());
    table.add_row(vec![
        Cell::new("stuck"),
        if inventory.stuck.is_empty() {
            stuck
        } else {
            stuck.fg(Color::Red)
        },
    ]);
    let locks = Cell::new(inventory.locks.len());
    table.add_row(vec![
        Cell::new("locked"),
        if inventory.locks.is_empty() {
            locks
        } else {
            locks.fg(Color::Yellow)
        },
    ]);

    println!("{table}");

    for name in &inventory.stuck {
        println!("  stuck: {name}");
    }
    for name in &inventory.locks {
        println!("  lock:  {name}");
    }
}
