//! Snapshot tests
//!
//! Loads each *.yml file in /tests/ individually. Documents annotated with `overlay/match`
//! are applied to the other documents and the rendered result (or the error chain) is
//! compared.

use yov::annotation;
use yov::node::Node;

#[test]
fn snapshots() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("YOV_LOG"))
        .with_writer(std::io::stderr)
        .init();

    insta::glob!("*.yml", |path| {
        let content = std::fs::read_to_string(path).unwrap();
        let file_name = path.file_name().and_then(|name| name.to_str());
        let documents = yov::load::load_str(&content, file_name).expect("valid yaml");

        let mut base = Node::document_set();
        let mut overlays = Node::document_set();
        for document in documents.into_items() {
            let target = if document.annotations().has(annotation::MATCH) {
                &mut overlays
            } else {
                &mut base
            };
            target.add_value(document).unwrap();
        }

        let rendered = match yov::overlay::apply(&mut base, &overlays) {
            Ok(()) => yov::render::to_yaml(&base).expect("renderable"),
            Err(error) => anyhow::Error::from(error)
                .chain()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        };

        insta::assert_snapshot!(rendered);
    });
}
