use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{FullStudyDetails, Insight, SearchPage, Study};
use crate::view::{self, file_category_breakdown, format_bytes, top_roles};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Writes progress lines to stderr.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("  {} ({} ms)", event.message, elapsed.as_millis()),
            None => eprintln!("  {}", event.message),
        }
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn render_study(out: &mut impl Write, study: &Study) -> io::Result<()> {
        writeln!(out, "{}  {}", study.accession, study.title)?;
        if !study.description.is_empty() {
            writeln!(out, "    {}", truncate(&study.description, 200))?;
        }
        if let Some(at) = study.last_modified_at() {
            writeln!(out, "    Last Modified: {}", at.format("%B %-d, %Y"))?;
        }
        Ok(())
    }

    pub fn render_search(
        out: &mut impl Write,
        page: &SearchPage,
        page_number: u32,
        page_size: u32,
    ) -> io::Result<()> {
        if page.studies.is_empty() {
            writeln!(out, "No studies found.")?;
            return Ok(());
        }
        for study in &page.studies {
            Self::render_study(out, study)?;
        }
        if let Some((first, last)) = view::result_window(page_number, page_size, page.total) {
            writeln!(
                out,
                "\nShowing {first} - {last} of {} results (page {page_number} of {})",
                page.total,
                view::total_pages(page.total, page_size)
            )?;
        }
        Ok(())
    }

    pub fn render_insight(out: &mut impl Write, insight: &Insight) -> io::Result<()> {
        writeln!(out, "{}\n", insight.insight)?;
        writeln!(out, "Related studies ({}):", insight.studies.len())?;
        for study in &insight.studies {
            Self::render_study(out, study)?;
        }
        Ok(())
    }

    pub fn render_details(out: &mut impl Write, details: &FullStudyDetails) -> io::Result<()> {
        let section = details.metadata.primary();
        let title = section
            .and_then(|s| s.title.as_deref())
            .unwrap_or(details.accession.as_str());
        writeln!(out, "{}  {}", details.accession, title)?;
        writeln!(out, "\nSummary\n  {}", details.summary)?;

        if let Some(section) = section {
            if !section.publications.is_empty() {
                writeln!(out, "\nPublications")?;
                for publication in &section.publications {
                    writeln!(out, "  {} (doi: {})", publication.title, publication.doi)?;
                    if !publication.author_list.is_empty() {
                        writeln!(out, "    {}", publication.author_list)?;
                    }
                }
            }
            if !section.people.is_empty() {
                writeln!(out, "\nPersonnel")?;
                for person in &section.people {
                    let roles: Vec<&str> = person
                        .roles
                        .iter()
                        .map(|r| r.label())
                        .filter(|label| !label.is_empty())
                        .collect();
                    writeln!(out, "  {} ({})", person.full_name(), roles.join(", "))?;
                }
                writeln!(out, "\nTop roles")?;
                for role in top_roles(&section.people, 5) {
                    writeln!(out, "  {:<40} {}", role.name, role.count)?;
                }
            }
        }

        writeln!(out, "\nFiles by category")?;
        for usage in file_category_breakdown(&details.files) {
            writeln!(
                out,
                "  {:<28} {:>12}  {} files",
                usage.name,
                format_bytes(usage.size),
                usage.count
            )?;
        }
        writeln!(out, "\nFiles ({})", details.files.len())?;
        for file in &details.files {
            writeln!(
                out,
                "  {} [{}] {}\n    {}",
                file.file_name,
                file.category,
                format_bytes(file.file_size),
                file.remote_url
            )?;
        }
        Ok(())
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit).collect();
    format!("{}...", kept.trim_end())
}
