use std::fmt;

use annotate_snippets::AnnotationKind;
use annotate_snippets::Level;
use annotate_snippets::Renderer;
use annotate_snippets::Snippet;
use serde::Serialize;

use crate::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        };
        f.write_str(label)
    }
}

/// A labelled span inside a [`Report`].
#[derive(Debug, Clone)]
pub struct Label<'a> {
    pub span: Span,
    pub text: &'a str,
    pub primary: bool,
}

/// Everything needed to print one diagnostic against its template source.
#[derive(Debug)]
pub struct Report<'a> {
    pub source: &'a str,
    pub path: &'a str,
    pub code: &'a str,
    pub message: &'a str,
    pub severity: Severity,
    pub labels: Vec<Label<'a>>,
    pub notes: Vec<&'a str>,
}

impl<'a> Report<'a> {
    #[must_use]
    pub fn new(
        source: &'a str,
        path: &'a str,
        code: &'a str,
        message: &'a str,
        severity: Severity,
    ) -> Self {
        Self {
            source,
            path,
            code,
            message,
            severity,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    #[must_use]
    pub fn primary(mut self, span: Span, text: &'a str) -> Self {
        self.labels.push(Label {
            span,
            text,
            primary: true,
        });
        self
    }

    #[must_use]
    pub fn context(mut self, span: Span, text: &'a str) -> Self {
        self.labels.push(Label {
            span,
            text,
            primary: false,
        });
        self
    }

    #[must_use]
    pub fn note(mut self, note: &'a str) -> Self {
        self.notes.push(note);
        self
    }
}

/// Renders [`Report`]s with `annotate-snippets`, either plain or with ANSI
/// styling for terminals.
#[derive(Debug)]
pub struct ReportRenderer {
    renderer: Renderer,
}

impl ReportRenderer {
    #[must_use]
    pub fn plain() -> Self {
        Self {
            renderer: Renderer::plain(),
        }
    }

    #[must_use]
    pub fn styled() -> Self {
        Self {
            renderer: Renderer::styled(),
        }
    }

    #[must_use]
    pub fn render(&self, report: &Report<'_>) -> String {
        let level = match report.severity {
            Severity::Error => Level::ERROR,
            Severity::Warning => Level::WARNING,
            Severity::Info => Level::INFO,
            Severity::Hint => Level::HELP,
        };

        let source_len = report.source.len();
        let mut snippet = Snippet::source(report.source)
            .path(report.path)
            .line_start(1);

        for label in &report.labels {
            let start = label.span.start_usize().min(source_len);
            let end = label.span.end_usize().min(source_len);
            let kind = if label.primary {
                AnnotationKind::Primary
            } else {
                AnnotationKind::Context
            };
            snippet = snippet.annotation(kind.span(start..end).label(label.text));
        }

        let mut title = level
            .primary_title(report.message)
            .id(report.code)
            .element(snippet);

        for note in &report.notes {
            title = title.element(Level::NOTE.message(*note));
        }

        self.renderer.render(&[title]).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_primary_label() {
        let source = "{% block content %}\n<p>Hello</p>\n";
        let report = Report::new(
            source,
            "templates/page.twig",
            "T101",
            "Unclosed block: content",
            Severity::Error,
        )
        .primary(Span::new(0, 19), "this block is never closed");

        let output = ReportRenderer::plain().render(&report);

        assert!(output.contains("error[T101]"));
        assert!(output.contains("Unclosed block: content"));
        assert!(output.contains("templates/page.twig"));
        assert!(output.contains("{% block content %}"));
        assert!(output.contains("this block is never closed"));
    }

    #[test]
    fn test_render_warning_with_note() {
        let source = "{% include 'missing.twig' %}\n";
        let report = Report::new(
            source,
            "index.twig",
            "R100",
            "Template 'missing.twig' not found",
            Severity::Warning,
        )
        .primary(Span::new(0, 28), "referenced here")
        .note("looked in: templates/missing.twig");

        let output = ReportRenderer::plain().render(&report);

        assert!(output.contains("warning[R100]"));
        assert!(output.contains("looked in: templates/missing.twig"));
    }

    #[test]
    fn test_out_of_range_span_is_clamped() {
        let source = "{{ x }}";
        let report = Report::new(source, "x.twig", "J100", "bad", Severity::Error)
            .primary(Span::new(3, 100), "here");
        let output = ReportRenderer::plain().render(&report);
        assert!(output.contains("error[J100]"));
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(Severity::Hint.to_string(), "hint");
    }
}
