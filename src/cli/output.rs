//! Output formatting utilities

use console::style;

use crate::core::config::UnitSystem;

/// Format an internal millimetre length in the chosen unit, with suffix.
pub fn length(mm: f64, unit: UnitSystem) -> String {
    format!("{:.1} {}", unit.from_mm(mm), unit.suffix())
}

/// Thread consumption: metres once it passes 10 m of thread, else the
/// configured unit.
pub fn thread(cm: f64, unit: UnitSystem) -> String {
    if cm >= 1000.0 {
        format!("{:.1} m", cm / 100.0)
    } else {
        length(cm * 10.0, unit)
    }
}

/// Seconds as `Xm Ys` for readability; plain seconds under a minute.
pub fn duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    if total < 60 {
        format!("{}s", total)
    } else {
        format!("{}m {:02}s", total / 60, total % 60)
    }
}

/// Print accumulated analysis warnings, if any.
pub fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("{}", style("Warnings").yellow().bold());
    for warning in warnings {
        println!("  {} {}", style("⚠").yellow(), warning);
    }
}
