//! `lessonhost lessons`: list what the worker can run.

use anyhow::Result;

use lessonhost_core::{LessonDescriptor, LessonRegistry};

pub fn run_lessons() -> Result<()> {
    let registry = LessonRegistry::builtin()?;
    let lessons = registry.discover();
    if lessons.is_empty() {
        println!("No lessons registered.");
        return Ok(());
    }
    print!("{}", format_table(&lessons));
    Ok(())
}

fn format_table(lessons: &[LessonDescriptor]) -> String {
    let name_width = lessons
        .iter()
        .map(|l| l.display_name.len())
        .max()
        .unwrap_or(0)
        .max("LESSON".len());

    let mut out = format!("{:<6} {:<name_width$} {:<8} INPUT\n", "ORDER", "LESSON", "ID");
    for lesson in lessons {
        out.push_str(&format!(
            "{:<6} {:<name_width$} {:<8} {}\n",
            lesson.group_order.to_string(),
            lesson.display_name,
            lesson.id,
            if lesson.needs_input { "yes" } else { "no" },
        ));
    }
    out
}
