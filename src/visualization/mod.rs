use crate::pipeline::AlignmentReport;
use std::fmt::Write;

pub fn print_results(reports: &[AlignmentReport]) {
    println!("=== Alignment Results ===");
    for report in reports {
        let t = &report.transform;
        println!("Aligner: {} (comparator {})", report.aligner, report.comparator);
        println!("  Translation: ({:.2}, {:.2}, {:.2})", t.tx(), t.ty(), t.tz());
        println!("  Rotation: {:.2}°", t.angle());
        println!("  Mirror: {}", t.is_mirrored());
        println!("  Score: {:.4}", report.score);
        println!("  Processing Time: {:.2}ms", report.execution_time_ms);
        println!();
    }
}

/// Markdown table, one row per report
pub fn comparison_table(reports: &[AlignmentReport]) -> String {
    let mut out = String::new();
    out.push_str("| Aligner | Time (ms) | Translation | Rotation (°) | Mirror | Score |\n");
    out.push_str("|---------|-----------|-------------|--------------|--------|-------|\n");
    for report in reports {
        let t = &report.transform;
        let _ = writeln!(
            out,
            "| {} | {:.2} | ({:.2}, {:.2}) | {:.2} | {} | {:.4} |",
            report.aligner,
            report.execution_time_ms,
            t.tx(),
            t.ty(),
            t.angle(),
            if t.is_mirrored() { "yes" } else { "no" },
            report.score
        );
    }
    out
}

pub fn print_comparison_table(reports: &[AlignmentReport]) {
    print!("{}", comparison_table(reports));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Transform;

    #[test]
    fn test_comparison_table_rows() {
        let reports = vec![
            AlignmentReport::new("translational", "ccc", Transform::translation_2d(-8.0, 2.0))
                .with_score(-1.0)
                .with_execution_time(1.5),
            AlignmentReport::new("rotate_flip", "ccc", Transform::new_2d(30.0, 0.0, 0.0, true)),
        ];
        let table = comparison_table(&reports);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "| translational | 1.50 | (-8.00, 2.00) | 0.00 | no | -1.0000 |");
        assert!(lines[3].contains("| yes |"));
    }
}
