use initpipe_core::action::Action;
use initpipe_core::types::ActionMode;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  "));
    }
}

/// `[dry-run] mkdir src`, `[applied] write README.md`, `[skipped] ... (exists)`.
pub fn print_actions(actions: &[Action]) {
    for a in actions {
        print_action(a);
    }
}

pub fn print_action(a: &Action) {
    match (&a.reason, a.mode) {
        (Some(reason), ActionMode::Skipped | ActionMode::Failed) => {
            println!("[{}] {} {} ({})", a.mode, a.op, a.path, reason)
        }
        _ => println!("[{}] {} {}", a.mode, a.op, a.path),
    }
}

pub fn print_messages(errors: &[String], warnings: &[String]) {
    for e in errors {
        println!("[error] {e}");
    }
    for w in warnings {
        println!("[warning] {w}");
    }
}
