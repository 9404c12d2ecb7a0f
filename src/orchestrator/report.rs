//! Status table rendering.

use std::fmt::Write as _;

use crate::state::{RuntimeRecord, StateStore};

const ID_WIDTH: usize = 10;

/// Renders the status table of every tracked service.
///
/// Containers are listed before processes. Ids are cut to ten characters.
pub fn ps_table(store: &StateStore) -> String {
    let mut table = String::new();
    let _ = writeln!(
        table,
        "{:>15} | {:>15} | {:>10} | {:>10}",
        "Id", "Name", "Driver", "Status"
    );
    let _ = writeln!(table, "{}", "-".repeat(73));

    for (name, record) in store.containers().iter().chain(store.processes().iter()) {
        write_row(&mut table, name, record);
    }
    table
}

fn write_row(table: &mut String, name: &str, record: &RuntimeRecord) {
    let id: String = record.id.chars().take(ID_WIDTH).collect();
    let _ = writeln!(
        table,
        "{:>15} | {:>15} | {:>10} | {:>10}",
        id,
        name,
        record.driver.to_string(),
        record.status.to_string()
    );
}
