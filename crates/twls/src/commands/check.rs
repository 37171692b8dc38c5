use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use rayon::prelude::*;
use twls_conf::DiagnosticSeverity;
use twls_conf::DiagnosticsConfig;
use twls_conf::Settings;
use twls_semantic::Diagnostic;
use twls_semantic::TemplateRecord;
use twls_source::ReportRenderer;
use twls_source::Severity;
use twls_source::TemplateId;

use crate::args::Args;
use crate::commands::Command;
use crate::commands::Project;
use crate::exit::Exit;

#[derive(Debug, Parser)]
pub struct Check {
    /// Files or directories to check. If omitted, checks every template in
    /// the project.
    paths: Vec<Utf8PathBuf>,

    /// Report these codes or code prefixes as errors (e.g. R100,J).
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,

    /// Ignore these codes or code prefixes (e.g. R101).
    #[arg(long, value_delimiter = ',')]
    ignore: Vec<String>,
}

impl Command for Check {
    fn execute(&self, args: &Args, project: Project) -> Result<Exit> {
        let config = build_diagnostics_config(&project.settings, &self.select, &self.ignore);
        let workspace = project.load()?;
        let engine = workspace.engine();

        let ids: Vec<TemplateId> = workspace
            .discover(&self.paths)
            .iter()
            .filter_map(|path| workspace.normalizer().to_id(path))
            .collect();

        // Collect in parallel, render on this thread; output order follows `ids`.
        let results: Vec<FileCheckResult> = ids
            .par_iter()
            .filter_map(|id| {
                let record = engine.get(id)?;
                let diagnostics: Vec<Diagnostic> = engine
                    .diagnostics(id)
                    .into_iter()
                    .filter_map(|diagnostic| apply_severity(&config, diagnostic))
                    .collect();
                (!diagnostics.is_empty()).then_some(FileCheckResult {
                    record,
                    diagnostics,
                })
            })
            .collect();

        let fmt = pick_renderer();
        let mut shown: usize = 0;
        let mut errors: usize = 0;

        for result in &results {
            for diagnostic in &result.diagnostics {
                if !args.global.quiet {
                    let report = diagnostic.report(result.record.source());
                    println!("{}\n", fmt.render(&report));
                }
                shown += 1;
                if diagnostic.severity == Severity::Error {
                    errors += 1;
                }
            }
        }

        if shown == 0 {
            return Ok(Exit::success());
        }

        let file_count = results.len();
        let file_word = if file_count == 1 { "file" } else { "files" };
        let diagnostic_word = if shown == 1 { "diagnostic" } else { "diagnostics" };
        let message = format!("Found {shown} {diagnostic_word} in {file_count} {file_word}.");

        if errors > 0 {
            Ok(Exit::error().with_message(message))
        } else {
            Ok(Exit::success().with_message(message))
        }
    }
}

struct FileCheckResult {
    record: Arc<TemplateRecord>,
    diagnostics: Vec<Diagnostic>,
}

/// The diagnostic with its configured severity, or `None` if it is switched off.
fn apply_severity(config: &DiagnosticsConfig, mut diagnostic: Diagnostic) -> Option<Diagnostic> {
    diagnostic.severity = config.effective_severity(diagnostic.code, diagnostic.severity)?;
    Some(diagnostic)
}

fn build_diagnostics_config(
    settings: &Settings,
    select: &[String],
    ignore: &[String],
) -> DiagnosticsConfig {
    let mut config = settings.diagnostics.clone();

    for code in select {
        config.set_severity(code, DiagnosticSeverity::Error);
    }

    for code in ignore {
        config.set_severity(code, DiagnosticSeverity::Off);
    }

    config
}

fn pick_renderer() -> ReportRenderer {
    if std::io::stdout().is_terminal() {
        ReportRenderer::styled()
    } else {
        ReportRenderer::plain()
    }
}

#[cfg(test)]
mod tests {
    use twls_source::LineCol;
    use twls_source::Span;

    use super::*;

    fn diagnostic(code: &'static str, severity: Severity) -> Diagnostic {
        Diagnostic {
            template: TemplateId::new("a.twig"),
            code,
            severity,
            message: String::new(),
            span: Span::new(0, 1),
            start: LineCol::default(),
        }
    }

    #[test]
    fn test_select_and_ignore_override_settings() {
        let mut settings = Settings::default();
        settings
            .diagnostics
            .set_severity("R100", DiagnosticSeverity::Off);
        let config = build_diagnostics_config(
            &settings,
            &["R100".to_string()],
            &["R101".to_string()],
        );

        let promoted = apply_severity(&config, diagnostic("R100", Severity::Warning));
        assert_eq!(promoted.map(|d| d.severity), Some(Severity::Error));
        assert_eq!(apply_severity(&config, diagnostic("R101", Severity::Info)), None);
    }

    #[test]
    fn test_unconfigured_keeps_severity() {
        let config = DiagnosticsConfig::default();
        let kept = apply_severity(&config, diagnostic("R100", Severity::Warning));
        assert_eq!(kept.map(|d| d.severity), Some(Severity::Warning));
    }
}
