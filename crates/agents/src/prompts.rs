//! Role instructions and request builders.
//!
//! Every JSON shape requested here must match the serde names of the
//! corresponding type in [`pipeline::results`].

use std::fmt::Write as _;

use pipeline::{
    AnalysisResult, BacklogStats, Change, ReviewReport, WorkItem,
};

/// Line that introduces the full replacement body in an implementation response.
pub const IMPLEMENTATION_MARKER: &str = "<!-- UPDATED CODE -->";

const NO_DESCRIPTION: &str = "No description";

pub const ANALYST_SYSTEM: &str = "You are a senior engineer planning a change to a \
single-file web application. You answer with exactly one JSON object and no other text.";

pub const IMPLEMENTER_SYSTEM: &str = "You are a senior engineer implementing a change to a \
single-file web application. You always return the complete file, never a fragment or a diff.";

pub const REVIEWER_SYSTEM: &str = "You are a senior QA engineer reviewing a change to a \
single-file web application. You answer with exactly one JSON object and no other text.";

pub const PLANNER_SYSTEM: &str = "You are a product manager steering the roadmap of a \
single-file web application. You answer with exactly one JSON object and no other text.";

pub fn analysis(item: &WorkItem, artifact: &str) -> String {
    format!(
        r#"Analyze this backlog item before it is implemented.

Item:
- Title: {title}
- Category: {category}
- Description: {description}
- Priority: {priority}
- Quarter: {quarter}

The whole application lives in `{artifact}` (vanilla JavaScript, no framework).

Provide an implementation plan, the files to modify, the complexity (Low, Medium or High),
prerequisites, a testing strategy, and whether the item can be implemented now.

Respond with this JSON object:
{{
  "implementationPlan": "...",
  "filesToModify": ["..."],
  "complexity": "Low | Medium | High",
  "dependencies": ["..."],
  "testingStrategy": "...",
  "readyToImplement": true
}}"#,
        title = item.title,
        category = item.category,
        description = item.description_or(NO_DESCRIPTION),
        priority = item.priority,
        quarter = item.quarter_label(),
    )
}

pub fn implementation(
    item: &WorkItem,
    analysis: &AnalysisResult,
    artifact: &str,
    current: &str,
) -> String {
    format!(
        r#"Implement this backlog item.

Item:
- Title: {title}
- Category: {category}
- Description: {description}

Implementation plan:
{plan}

Current `{artifact}`:
```
{current}
```

Requirements:
1. Keep the single-file architecture.
2. Use vanilla JavaScript.
3. Follow the existing code style.
4. Comment the parts you change.
5. Keep the existing backend and real-time integration working.

Return the COMPLETE updated file. Put the line {marker} first and the file after it."#,
        title = item.title,
        category = item.category,
        description = item.description_or(NO_DESCRIPTION),
        plan = analysis.implementation_plan,
        marker = IMPLEMENTATION_MARKER,
    )
}

pub fn review(item: &WorkItem, change: &Change, artifact: &str, current: &str) -> String {
    format!(
        r#"Review the latest change for this backlog item.

Item:
- Title: {title}
- Category: {category}
- Description: {description}

Commit message:
{message}

Diff:
```diff
{diff}
```

Current `{artifact}`:
```
{current}
```

Assess:
1. Functionality: does it implement the item correctly?
2. Code quality: is it clean and maintainable?
3. Best practice: does it follow vanilla JavaScript conventions?
4. Security: are there any vulnerabilities?
5. Performance: are there any regressions?
6. Integration: does it fit the existing code?
7. Bugs: are there obvious defects or unhandled edge cases?

Respond with this JSON object:
{{
  "approved": true,
  "score": 0,
  "strengths": ["..."],
  "issues": [
    {{ "severity": "critical | major | minor", "description": "...", "suggestion": "..." }}
  ],
  "testingNotes": "...",
  "feedback": "..."
}}"#,
        title = item.title,
        category = item.category,
        description = item.description_or(NO_DESCRIPTION),
        message = change.message,
        diff = change.diff,
    )
}

fn histogram(out: &mut String, counts: &std::collections::BTreeMap<String, usize>) {
    if counts.is_empty() {
        out.push_str("- none\n");
    }
    for (key, count) in counts {
        let _ = writeln!(out, "- {key}: {count}");
    }
}

pub fn insights(
    stats: &BacklogStats,
    recent_completed: &[WorkItem],
    recent_reports: &[ReviewReport],
    open_items: &[WorkItem],
    excerpt: &str,
) -> String {
    let mut out = String::new();
    out.push_str("Analyze the roadmap and propose what to do next.\n\n");

    let _ = writeln!(out, "Backlog statistics:");
    let _ = writeln!(out, "- Total: {}", stats.total);
    let _ = writeln!(out, "- Completed: {}", stats.completed);
    let _ = writeln!(out, "- In progress: {}", stats.in_progress);
    let _ = writeln!(out, "- Pending: {}", stats.pending);
    let _ = writeln!(out, "- Completion ratio: {:.2}", stats.completion_ratio);
    let _ = writeln!(out, "- Mean review score: {}/100\n", stats.mean_review_score);

    out.push_str("Items by category:\n");
    histogram(&mut out, &stats.by_category);
    out.push_str("\nItems by priority:\n");
    histogram(&mut out, &stats.by_priority);

    out.push_str("\nRecently completed:\n");
    if recent_completed.is_empty() {
        out.push_str("- none\n");
    }
    for item in recent_completed {
        let _ = writeln!(out, "- [{}] {}", item.category, item.title);
    }

    out.push_str("\nRecent reviews:\n");
    if recent_reports.is_empty() {
        out.push_str("- none\n");
    }
    for report in recent_reports {
        let _ = writeln!(
            out,
            "- {}: score {}, approved: {}",
            report.item_title, report.score, report.approved
        );
    }

    out.push_str("\nOpen items (use these ids for priority adjustments):\n");
    if open_items.is_empty() {
        out.push_str("- none\n");
    }
    for item in open_items {
        let _ = writeln!(out, "- {} [{}] {} ({})", item.id, item.priority, item.title, item.status);
    }

    let _ = write!(
        out,
        r#"
Application excerpt:
```
{excerpt}
```

Cover the impact of completed work, gaps, technical debt, and category balance.
Suggest 3 to 5 new backlog items (title, category, description, priority High/Medium/Low,
quarter such as "Q1 2026", reasoning) and any priority changes for open items.

Respond with this JSON object:
{{
  "analysis": {{
    "completedImpact": "...",
    "gaps": ["..."],
    "technicalDebt": ["..."],
    "categoryBalance": "..."
  }},
  "newFeatures": [
    {{ "title": "...", "category": "...", "description": "...", "priority": "High", "quarter": "...", "reasoning": "..." }}
  ],
  "priorityAdjustments": [
    {{ "itemId": "...", "currentPriority": "Low", "suggestedPriority": "High", "reasoning": "..." }}
  ],
  "recommendations": "..."
}}"#
    );
    out
}

/// Commit message for an implemented item.
pub fn commit_message(item: &WorkItem, analysis: &AnalysisResult) -> String {
    format!(
        "feat({scope}): {title}\n\n{description}\n\nPriority: {priority}\nQuarter: {quarter}\nComplexity: {complexity}\n",
        scope = item.category.to_lowercase(),
        title = item.title,
        description = item.description_or("No description provided"),
        priority = item.priority,
        quarter = item.quarter_label(),
        complexity = analysis.complexity,
    )
}

/// The first `max_chars` characters of `text`, marked when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... [truncated]", &text[..cut]),
        None => text.to_string(),
    }
}
