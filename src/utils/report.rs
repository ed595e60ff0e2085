use std::fmt::Write;
use crate::models::{GradeItem, Report};

// Renders the aggregated grades as the console report.
pub fn format_report(report: &Report) -> String {
    let rule = "=".repeat(70);
    let mut out = String::new();

    let _ = writeln!(out, "\n{}", rule);
    let _ = writeln!(out, "GRADE REPORT");
    let _ = writeln!(out, "{}", rule);

    for course in &report.courses {
        let _ = writeln!(out, "\n  {}", course.course);
        let _ = writeln!(out, "  {}", "-".repeat(60));

        if course.categories.is_empty() {
            let _ = writeln!(out, "    No grades found");
            continue;
        }

        for category in &course.categories {
            match category.grade_pct {
                Some(pct) => {
                    let _ = writeln!(out, "  {} - {}%", category.category, format_number(pct));
                }
                None => {
                    let _ = writeln!(out, "  {}", category.category);
                }
            }
            for item in &category.items {
                let _ = writeln!(out, "{}", format_item(item));
            }
        }
    }

    let _ = writeln!(out, "\n{}", rule);
    out
}

fn format_item(item: &GradeItem) -> String {
    match (item.score, item.out_of) {
        (Some(score), Some(out_of)) => {
            let fraction = format!("{}/{}", format_number(score), format_number(out_of));
            let pct = item
                .percentage
                .map(|p| format!("{}%", format_number(p)))
                .unwrap_or_else(|| "-".to_string());
            format!("      {:<40} {:>8}  {:>6}", item.name, fraction, pct)
        }
        _ => format!("      {:<40} {:>8}", item.name, "-"),
    }
}

// 17.0 -> "17", 17.5 -> "17.5"
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
