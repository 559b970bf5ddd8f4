//! Document renderer seam. The engine supplies structured minutes content;
//! pagination and typesetting belong to the implementation behind this
//! trait.

use thiserror::Error;

use crate::directory::ClientContact;
use crate::minutes::MinutesDocument;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render failed: {0}")]
    Render(String),
}

pub trait DocumentRenderer: Send + Sync {
    fn render(
        &self,
        minutes: &MinutesDocument,
        contact: Option<&ClientContact>,
    ) -> Result<RenderedDocument, RenderError>;
}

/// Plain-text renderer used by the CLI `minutes show` path.
#[derive(Debug, Default, Clone)]
pub struct TextRenderer;

impl DocumentRenderer for TextRenderer {
    fn render(
        &self,
        minutes: &MinutesDocument,
        contact: Option<&ClientContact>,
    ) -> Result<RenderedDocument, RenderError> {
        let mut out = String::new();
        out.push_str(&format!("Minutes {} ({})\n", minutes.code, minutes.kind));
        out.push_str(&format!("Status: {}\n", minutes.status));
        out.push_str(&format!("Meeting: {}\n", minutes.meeting_at.to_rfc3339()));
        if let Some(contact) = contact {
            out.push_str(&format!("Client: {}\n", contact.name));
        }
        if !minutes.participants.is_empty() {
            out.push_str(&format!("Participants: {}\n", minutes.participants.join(", ")));
        }

        let section = |title: &str, items: &[String]| -> String {
            if items.is_empty() {
                String::new()
            } else {
                let mut s = format!("\n{title}:\n");
                for item in items {
                    s.push_str(&format!("  - {item}\n"));
                }
                s
            }
        };

        out.push_str(&section("Agenda", &minutes.agenda));
        out.push_str(&section("Objectives", &minutes.objectives));
        out.push_str(&section("Decisions", &minutes.decisions));

        if !minutes.commitments.is_empty() {
            out.push_str("\nCommitments:\n");
            for commitment in &minutes.commitments {
                let owner = commitment.owner.as_deref().unwrap_or("unassigned");
                let due = commitment
                    .due
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_else(|| "no due date".to_string());
                out.push_str(&format!("  - {} ({owner}, {due})\n", commitment.description));
            }
        }

        if let Some(narrative) = &minutes.narrative {
            out.push_str(&format!("\n{narrative}\n"));
        }
        out.push_str(&section("References", &minutes.references));

        Ok(RenderedDocument {
            filename: format!("{}.txt", minutes.code.replace('.', "-")),
            content: out,
        })
    }
}
