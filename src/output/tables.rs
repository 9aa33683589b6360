use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::flow::{Organization, Repository};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn flag_cell(value: bool, yes: &str, no: &str) -> Cell {
    if value {
        Cell::new(yes).fg(TableColor::Green)
    } else {
        Cell::new(no).fg(TableColor::DarkGrey)
    }
}

pub fn organizations_table(organizations: &[Organization]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Organization", "Org folder", "Auto-discover"]);
    for org in organizations {
        table.add_row(vec![
            Cell::new(&org.name),
            flag_cell(org.has_org_folder(), "exists", "none"),
            flag_cell(org.auto_discover, "yes", "no"),
        ]);
    }
    table
}

pub fn repositories_table(repositories: &[&Repository]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Repository", "Visibility", "Default branch", "Description"]);
    for repo in repositories {
        let visibility = if repo.private {
            Cell::new("private").fg(TableColor::Yellow)
        } else {
            Cell::new("public")
        };
        table.add_row(vec![
            Cell::new(&repo.name),
            visibility,
            Cell::new(repo.default_branch.as_deref().unwrap_or("-")),
            Cell::new(repo.description.as_deref().unwrap_or("")),
        ]);
    }
    table
}
