//! Colored terminal output for the CLI.

use crate::db::SessionSummary;
use crate::types::{FailureReport, PipelineRun, QualityDimension, SourceOrigin};
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n  {} {}\n",
                "veris".bright_cyan().bold(),
                version.dimmed()
            );
        } else {
            println!("\n  veris {}\n", version);
        }
    }

    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Errors go to stderr.
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    pub fn created(&self, kind: &str, path: &str) {
        if self.colored {
            println!("  {} {} {}", "✓".green().bold(), kind.dimmed(), path.bright_white());
        } else {
            println!("  [CREATED] {} {}", kind, path);
        }
    }

    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!("  {} {} {}", "○".yellow(), path.dimmed(), format!("({})", reason).yellow());
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print the report body, its sources and the judge's scores.
    pub fn run(&self, run: &PipelineRun) {
        println!("\n{}", run.report.to_markdown());

        let citations = run.citations();
        if !citations.is_empty() {
            self.subheader("Sources");
            let mut seen = Vec::new();
            for citation in &citations {
                if seen.contains(&citation.source_id) {
                    continue;
                }
                seen.push(citation.source_id.clone());
                let origin = match citation.origin {
                    SourceOrigin::Web => "web",
                    SourceOrigin::Document => "doc",
                };
                self.list_item(&format!(
                    "[{}] {} (retrieved {})",
                    origin,
                    citation.locator,
                    citation.retrieved_at.format("%Y-%m-%d %H:%M UTC")
                ));
            }
        }

        let low_confidence: Vec<_> = run
            .verified_facts
            .iter()
            .filter(|f| f.contradicted || f.is_unverifiable())
            .collect();
        if !low_confidence.is_empty() {
            self.subheader("Disputed or unverifiable");
            for fact in low_confidence {
                let tag = if fact.contradicted { "contradicted" } else { "unverifiable" };
                self.list_item(&format!("{} ({}, confidence {:.2})", fact.text, tag, fact.confidence));
            }
        }

        self.subheader("Quality");
        for dimension in QualityDimension::ALL {
            let score = run.quality_scores.get(dimension);
            self.kv(&format!("{:<16}", dimension.as_str()), &format!("{} {:.2}", score_bar(score, 20), score));
        }
        self.kv(&format!("{:<16}", "average"), &format!("{:.2}", run.quality_scores.average()));
        let scores = &run.quality_scores;
        for (title, items) in [
            ("Strengths", &scores.strengths),
            ("Weaknesses", &scores.weaknesses),
            ("Suggestions", &scores.suggestions),
        ] {
            if items.is_empty() {
                continue;
            }
            self.subheader(title);
            for item in items {
                self.list_item(item);
            }
        }
        if !scores.feedback.is_empty() {
            self.hint(&scores.feedback);
        }

        for reason in &run.degraded {
            self.warning(&format!("degraded: {}", reason));
        }
        self.info(&format!("session {}", run.id));
    }

    pub fn failure(&self, failure: &FailureReport) {
        self.error(&format!("Research failed during {}: {}", failure.stage, failure.reason));
        self.error(&failure.message);
        for reason in &failure.degraded {
            self.warning(&format!("degraded: {}", reason));
        }
    }

    pub fn sessions(&self, sessions: &[SessionSummary]) {
        if sessions.is_empty() {
            self.info("No saved sessions");
            return;
        }
        self.table_header(&["ID", "Created", "Facts", "Quality", "Query"]);
        for s in sessions {
            let quality = format!("{:.2}{}", s.average_quality, if s.degraded { "*" } else { "" });
            self.table_row(&[
                short_id(&s.id),
                &s.created_at.format("%Y-%m-%d %H:%M").to_string(),
                &s.fact_count.to_string(),
                &quality,
                &truncate(&s.query, 48),
            ]);
        }
    }

    pub fn table_header(&self, columns: &[&str]) {
        let header = columns
            .iter()
            .map(|c| format!("{:<15}", c))
            .collect::<Vec<_>>()
            .join(" ");
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 16).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 16));
        }
    }

    pub fn table_row(&self, values: &[&str]) {
        let row = values
            .iter()
            .map(|v| format!("{:<15}", v))
            .collect::<Vec<_>>()
            .join(" ");
        println!("    {}", row);
    }
}

/// Fixed-width bar for a score in [0, 1].
pub fn score_bar(score: f32, width: usize) -> String {
    let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
    let filled = (score * width as f32).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}
