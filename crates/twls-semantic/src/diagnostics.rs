use serde::Serialize;
use twls_source::LineCol;
use twls_source::Report;
use twls_source::Severity;
use twls_source::Span;
use twls_source::TemplateId;

use crate::jsonpath::JsonPath;
use crate::record::TemplateRecord;
use crate::references::Reference;
use crate::references::ReferenceKind;
use crate::references::TargetName;
use crate::resolver::Resolver;

pub const UNRESOLVED_TEMPLATE: &str = "R100";
pub const DYNAMIC_TEMPLATE: &str = "R101";
pub const INHERITANCE_CYCLE: &str = "R102";
pub const MALFORMED_JSON_PATH: &str = "J100";

/// A problem in one template, ready to be shown to a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub template: TemplateId,
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub start: LineCol,
}

impl Diagnostic {
    fn at(reference: &Reference, code: &'static str, severity: Severity, message: String) -> Self {
        Self {
            template: reference.source.clone(),
            code,
            severity,
            message,
            span: reference.span,
            start: reference.start,
        }
    }

    /// Build a renderable report against the template's source text.
    #[must_use]
    pub fn report<'a>(&'a self, source: &'a str) -> Report<'a> {
        Report::new(
            source,
            self.template.as_str(),
            self.code,
            &self.message,
            self.severity,
        )
        .primary(self.span, "")
    }
}

/// Parse errors, unresolvable template references, inheritance cycles and
/// malformed JSON paths in `record`, ordered by position.
#[must_use]
pub fn collect(record: &TemplateRecord, resolver: &Resolver<'_>) -> Vec<Diagnostic> {
    let tree = record.tree();
    let mut diagnostics: Vec<Diagnostic> = tree
        .errors()
        .iter()
        .map(|error| Diagnostic {
            template: record.id().clone(),
            code: error.code(),
            severity: Severity::Error,
            message: error.to_string(),
            span: error.span(),
            start: tree.line_col(error.span().start_offset()),
        })
        .collect();

    for reference in record.references() {
        if reference.kind.is_template() {
            match &reference.target {
                TargetName::Unknown => diagnostics.push(Diagnostic::at(
                    reference,
                    DYNAMIC_TEMPLATE,
                    Severity::Info,
                    format!("Template name for '{}' is computed at render time", reference.kind),
                )),
                TargetName::Named(name) => {
                    if resolver.resolve_template(&reference.target).is_none() {
                        diagnostics.push(Diagnostic::at(
                            reference,
                            UNRESOLVED_TEMPLATE,
                            Severity::Warning,
                            format!("Template '{name}' could not be found"),
                        ));
                    }
                }
            }
        } else if reference.kind == ReferenceKind::JsonPathRef {
            let Some(path) = reference.target.named() else {
                continue;
            };
            if let Err(error) = JsonPath::parse(path) {
                diagnostics.push(Diagnostic::at(
                    reference,
                    MALFORMED_JSON_PATH,
                    Severity::Error,
                    format!("Malformed JSON path '{path}': {error}"),
                ));
            }
        }
    }

    let chain = resolver.inheritance_chain(record.id());
    if chain.cycle_detected {
        if let Some(extends) = record
            .references()
            .iter()
            .find(|r| r.kind == ReferenceKind::Extends)
        {
            let mut path: Vec<&str> = vec![record.id().as_str()];
            path.extend(chain.templates.iter().map(TemplateId::as_str));
            let message = format!("Template inheritance cycle: {} -> ...", path.join(" -> "));
            diagnostics.push(Diagnostic::at(
                extends,
                INHERITANCE_CYCLE,
                Severity::Error,
                message,
            ));
        }
    }

    diagnostics.sort_by_key(|diagnostic| diagnostic.span.start());
    diagnostics
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use twls_source::ReportRenderer;

    use super::*;
    use crate::names::TemplateNames;
    use crate::store::IndexStore;

    fn diagnostics_for(templates: &[(&str, &str)], id: &str) -> Vec<Diagnostic> {
        let store = IndexStore::new();
        for (id, text) in templates {
            let id = TemplateId::new(id);
            store.upsert(id.clone(), Arc::new(TemplateRecord::new(id, text)));
        }
        let names = TemplateNames::new();
        let resolver = Resolver::new(&store, &names);
        let record = store.get(&TemplateId::new(id)).unwrap();
        collect(&record, &resolver)
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<&'static str> {
        diagnostics.iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_clean_template() {
        let diagnostics = diagnostics_for(
            &[
                ("base.twig", "{% block a %}{% endblock %}"),
                ("page.twig", "{% extends 'base.twig' %}{% block a %}{{ x }}{% endblock %}"),
            ],
            "page.twig",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn test_parse_errors_are_reported() {
        let diagnostics = diagnostics_for(&[("a.twig", "{% if x %}\n{% endfor %}")], "a.twig");
        assert_eq!(codes(&diagnostics), ["T101", "T100"]);
        assert_eq!(diagnostics[1].start, LineCol::new(1, 0));
        assert_eq!(diagnostics[1].severity, Severity::Error);
    }

    #[test]
    fn test_unresolved_and_dynamic_templates() {
        let diagnostics = diagnostics_for(
            &[("a.twig", "{% include 'missing.twig' %}{% include name %}")],
            "a.twig",
        );
        assert_eq!(codes(&diagnostics), ["R100", "R101"]);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(diagnostics[0].message, "Template 'missing.twig' could not be found");
        assert_eq!(diagnostics[1].severity, Severity::Info);
    }

    #[test]
    fn test_cycle() {
        let diagnostics = diagnostics_for(
            &[
                ("a.twig", "{% extends 'b.twig' %}"),
                ("b.twig", "{% extends 'a.twig' %}"),
            ],
            "a.twig",
        );
        assert_eq!(codes(&diagnostics), ["R102"]);
        assert_eq!(
            diagnostics[0].message,
            "Template inheritance cycle: a.twig -> b.twig -> ..."
        );
    }

    #[test]
    fn test_malformed_json_path() {
        let diagnostics = diagnostics_for(
            &[("a.twig", "{{ data|json_path('$.items[0') }}{{ data|json_path('$.ok') }}")],
            "a.twig",
        );
        assert_eq!(codes(&diagnostics), ["J100"]);
        assert_eq!(
            diagnostics[0].message,
            "Malformed JSON path '$.items[0': unexpected end of JSON path"
        );
    }

    #[test]
    fn test_report_renders_code_and_path() {
        let source = "{% include 'missing.twig' %}";
        let diagnostics = diagnostics_for(&[("a.twig", source)], "a.twig");
        let rendered = ReportRenderer::plain().render(&diagnostics[0].report(source));
        assert!(rendered.contains("R100"), "{rendered}");
        assert!(rendered.contains("a.twig"), "{rendered}");
        assert!(rendered.contains("missing.twig"), "{rendered}");
    }
}
