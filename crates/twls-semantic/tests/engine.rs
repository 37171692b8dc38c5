use std::sync::Arc;

use twls_semantic::CancellationToken;
use twls_semantic::Cancelled;
use twls_semantic::Engine;
use twls_semantic::FileChange;
use twls_semantic::ReferenceKind;
use twls_semantic::TemplateNames;
use twls_source::ByteOffset;
use twls_source::TemplateId;

fn id(name: &str) -> TemplateId {
    TemplateId::new(name)
}

#[test]
fn extends_scenario_chain_and_definition() {
    let engine = Engine::new(TemplateNames::new());
    let a = r#"{% extends "b.twig" %}{% block content %}hi{% endblock %}"#;
    engine.index(id("a.twig"), a);
    engine.index(id("b.twig"), "{% block content %}bye{% endblock %}");

    let chain = engine.inheritance_chain(&id("a.twig"));
    assert_eq!(chain.templates, [id("b.twig")]);
    assert!(!chain.cycle_detected);

    let extends_at = ByteOffset::from_usize(a.find("b.twig").unwrap());
    let location = engine.resolve_definition(&id("a.twig"), extends_at).unwrap();
    assert_eq!(location.template, id("b.twig"));

    let keyword_at = ByteOffset::from_usize(a.find("extends").unwrap());
    let location = engine.resolve_definition(&id("a.twig"), keyword_at).unwrap();
    assert_eq!(location.template, id("b.twig"));

    let block_at = ByteOffset::from_usize(a.find("content").unwrap());
    let location = engine.resolve_definition(&id("a.twig"), block_at).unwrap();
    assert_eq!(location.template, id("b.twig"));
    assert_eq!(location.start.column(), 9);
}

#[test]
fn index_order_does_not_matter() {
    let engine = Engine::new(TemplateNames::new());
    engine.index(id("b.twig"), "{% block content %}bye{% endblock %}");
    engine.index(id("a.twig"), r#"{% extends "b.twig" %}"#);
    assert_eq!(engine.inheritance_chain(&id("a.twig")).templates, [id("b.twig")]);
}

#[test]
fn variable_usages_across_three_templates() {
    let engine = Engine::new(TemplateNames::new());
    engine.index(id("c.twig"), "<p>{{ user.name }}</p>");
    engine.index(id("b.twig"), "{{ title }}");
    engine.index(id("a.twig"), "{% if user %}\n  {{ user|default('guest') }}{% endif %}");

    let usages = engine.find_usages(&id("b.twig"), "user", ReferenceKind::VariableRead);
    let found: Vec<(&str, u32)> = usages
        .iter()
        .map(|l| (l.template.as_str(), l.span.start()))
        .collect();
    assert_eq!(found, [("a.twig", 6), ("a.twig", 19), ("c.twig", 6)]);

    let templates: std::collections::BTreeSet<&str> =
        usages.iter().map(|l| l.template.as_str()).collect();
    assert_eq!(templates.len(), 2);
}

#[test]
fn variable_usages_one_per_template() {
    let engine = Engine::new(TemplateNames::new());
    engine.index(id("one.twig"), "{{ user }}");
    engine.index(id("two.twig"), "{{ other }}");
    engine.index(id("three.twig"), "{{ user.email }}");

    let usages = engine.find_usages(&id("two.twig"), "user", ReferenceKind::VariableRead);
    let templates: Vec<&str> = usages.iter().map(|l| l.template.as_str()).collect();
    assert_eq!(templates, ["one.twig", "three.twig"]);
}

#[test]
fn cycle_terminates() {
    let engine = Engine::new(TemplateNames::new());
    engine.index(id("A.twig"), "{% extends 'B.twig' %}");
    engine.index(id("B.twig"), "{% extends 'A.twig' %}");

    let chain = engine.inheritance_chain(&id("A.twig"));
    assert!(chain.cycle_detected);
    assert_eq!(chain.templates, [id("B.twig")]);

    let codes: Vec<&str> = engine
        .diagnostics(&id("A.twig"))
        .iter()
        .map(|d| d.code)
        .collect();
    assert_eq!(codes, ["R102"]);
}

#[test]
fn half_typed_expression_still_yields_its_read() {
    let engine = Engine::new(TemplateNames::new());
    let record = engine.index(id("a.twig"), "{{ user");
    assert_eq!(record.references().len(), 1);
    assert_eq!(record.references()[0].kind, ReferenceKind::VariableRead);
    assert_eq!(
        record.tree().errors()[0].kind(),
        twls_templates::ParseErrorKind::UnterminatedExpression
    );
}

#[test]
fn missing_include_is_absent_not_an_error() {
    let engine = Engine::new(TemplateNames::new());
    let text = "{% include 'nowhere.twig' %}";
    engine.index(id("a.twig"), text);
    let at = ByteOffset::from_usize(text.find("nowhere").unwrap());
    assert_eq!(engine.resolve_definition(&id("a.twig"), at), None);
}

#[test]
fn reindex_is_seen_by_queries() {
    let engine = Engine::new(TemplateNames::new());
    engine.index(id("base.twig"), "");
    engine.index(id("other.twig"), "");
    engine.index(id("a.twig"), "{% extends 'base.twig' %}");
    assert_eq!(engine.inheritance_chain(&id("a.twig")).templates, [id("base.twig")]);

    engine.apply(FileChange::Changed {
        id: id("a.twig"),
        text: "{% extends 'other.twig' %}".to_string(),
    });
    assert_eq!(engine.inheritance_chain(&id("a.twig")).templates, [id("other.twig")]);

    engine.apply(FileChange::Deleted { id: id("other.twig") });
    let chain = engine.inheritance_chain(&id("a.twig"));
    assert!(chain.templates.is_empty());
    assert!(chain.unresolved.is_some());
}

#[test]
fn namespaced_templates() {
    let names = TemplateNames::new()
        .with_root("templates")
        .with_namespace("Admin", "admin/templates");
    let engine = Engine::new(names);
    engine.index(id("admin/templates/layout.twig"), "{% block body %}{% endblock %}");
    engine.index(
        id("templates/dashboard.twig"),
        "{% extends '@Admin/layout.twig' %}{% block body %}{% endblock %}",
    );
    assert_eq!(
        engine.inheritance_chain(&id("templates/dashboard.twig")).templates,
        [id("admin/templates/layout.twig")]
    );
    assert_eq!(
        engine.template_usages(&id("admin/templates/layout.twig")).len(),
        1
    );
}

#[test]
fn upsert_of_one_template_does_not_disturb_reads_of_another() {
    let engine = Arc::new(Engine::new(TemplateNames::new()));
    engine.index(id("y.twig"), "{% block stable %}{% endblock %}");
    let expected = engine.get(&id("y.twig")).unwrap();

    std::thread::scope(|scope| {
        let writer = Arc::clone(&engine);
        scope.spawn(move || {
            for i in 0..500 {
                writer.index(id("x.twig"), &format!("{{% block b{i} %}}{{% endblock %}}"));
            }
        });
        for _ in 0..500 {
            let record = engine.get(&id("y.twig")).unwrap();
            assert!(Arc::ptr_eq(&record, &expected));
        }
    });

    let last = engine.get(&id("x.twig")).unwrap();
    assert_eq!(last.source(), "{% block b499 %}{% endblock %}");
}

#[test]
fn concurrent_writers_to_the_same_template_leave_a_complete_record() {
    let engine = Engine::new(TemplateNames::new());
    let texts = ["{{ a }}", "{{ b }}{{ c }}", "{% if d %}{% endif %}"];

    std::thread::scope(|scope| {
        for text in texts {
            let engine = &engine;
            scope.spawn(move || {
                for _ in 0..100 {
                    engine.index(id("shared.twig"), text);
                }
            });
        }
    });

    let record = engine.get(&id("shared.twig")).unwrap();
    assert!(texts.contains(&record.source()));
    let fresh = twls_semantic::TemplateRecord::new(id("shared.twig"), record.source());
    assert_eq!(record.references(), fresh.references());
}

#[test]
fn cancelled_usages_scan() {
    let engine = Engine::new(TemplateNames::new());
    for i in 0..10 {
        engine.index(id(&format!("t{i}.twig")), "{{ user }}");
    }
    let token = CancellationToken::new();
    let scan = token.clone();
    token.cancel();
    assert_eq!(
        engine.find_usages_cancellable(&id("t0.twig"), "user", ReferenceKind::VariableRead, &scan),
        Err(Cancelled)
    );
    let live = CancellationToken::new();
    assert_eq!(
        engine
            .find_usages_cancellable(&id("t0.twig"), "user", ReferenceKind::VariableRead, &live)
            .map(|usages| usages.len()),
        Ok(10)
    );
}

#[test]
fn snapshot_covers_every_template() {
    let engine = Engine::new(TemplateNames::new());
    engine.index(id("b.twig"), "");
    engine.index(id("a.twig"), "{% extends 'b.twig' %}");
    let snapshot = engine.snapshot();
    let ids: Vec<&str> = snapshot.templates.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["a.twig", "b.twig"]);
    assert_eq!(snapshot.templates[0].content_hash.len(), 64);
}
