//! End-to-end pipeline tests over the reference components.

#[cfg(test)]
mod tests {
    use crate::component::{Component, ComponentOutputs, FnComponent, InputSocket, OutputSocket, SocketType};
    use crate::components::{
        DocumentSplitter, DocumentSplitterConfig, FileTypeRouter, LocalTextGenerator,
        LocalTextGeneratorConfig, SplitBy, UNCLASSIFIED,
    };
    use crate::core::Document;
    use crate::errors::{ComponentError, PipelineError};
    use crate::events::CollectingEventSink;
    use crate::pipeline::{ConfigFormat, Pipeline, PipelineBuilder, PipelineInputs};
    use crate::testing::mocks::{AddFixedValue, ConstantComponent, EchoLoader, Hello, RecordingComponent, Threshold};
    use crate::testing::{assert_component_absent, assert_output, loop_pipeline, sample_registry};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::Arc;

    fn sentence_splitter() -> Arc<DocumentSplitter> {
        Arc::new(DocumentSplitter::new(DocumentSplitterConfig::new(SplitBy::Sentence, 1, 0)).unwrap())
    }

    /// Reads every routed path into a document.
    fn text_reader() -> Arc<dyn Component> {
        Arc::new(FnComponent::new(
            "ragflow.testing.TextReader",
            vec![InputSocket::new("sources", SocketType::list(SocketType::Any))],
            vec![OutputSocket::new("documents", SocketType::list(SocketType::Document))],
            |inputs| {
                let paths: Vec<String> = inputs.get("sources")?;
                let documents = paths
                    .iter()
                    .map(|path| {
                        std::fs::read_to_string(path)
                            .map(Document::new)
                            .map_err(|e| ComponentError::invalid_input("sources", e))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ComponentOutputs::from([("documents".to_string(), json!(documents))]))
            },
        ))
    }

    /// Feeds documents to `prompt` one at a time and records each batch of
    /// `replies` that comes back.
    fn prompt_queue(replies: Arc<Mutex<Vec<Vec<String>>>>) -> Arc<dyn Component> {
        let pending = Mutex::new(VecDeque::<Document>::new());
        Arc::new(FnComponent::new(
            "ragflow.testing.PromptQueue",
            vec![
                InputSocket::new("documents", SocketType::optional(SocketType::list(SocketType::Document)))
                    .with_default(Value::Null),
                InputSocket::new("replies", SocketType::optional(SocketType::list(SocketType::Str)))
                    .with_default(Value::Null),
            ],
            vec![OutputSocket::new("prompt", SocketType::Str)],
            move |inputs| {
                let mut pending = pending.lock();
                if let Some(documents) = inputs.get_optional::<Vec<Document>>("documents")? {
                    pending.extend(documents);
                }
                if let Some(batch) = inputs.get_optional::<Vec<String>>("replies")? {
                    replies.lock().push(batch);
                }
                Ok(match pending.pop_front() {
                    Some(doc) => ComponentOutputs::from([("prompt".to_string(), json!(doc.text()))]),
                    None => ComponentOutputs::new(),
                })
            },
        ))
    }

    fn documents(outputs: &ComponentOutputs) -> Vec<Document> {
        serde_json::from_value(outputs["documents"].clone()).unwrap()
    }

    #[tokio::test]
    async fn test_splitter_pipeline() {
        let pipeline = PipelineBuilder::new()
            .component("splitter", sentence_splitter())
            .unwrap()
            .build();

        let outputs = pipeline
            .run(PipelineInputs::new().with("splitter", "documents", json!([Document::new("A.B.C.")])))
            .await
            .unwrap();

        let splits = documents(&outputs["splitter"]);
        let texts: Vec<&str> = splits.iter().map(Document::text).collect();
        assert_eq!(texts, vec!["A.", "B.", "C."]);
    }

    #[tokio::test]
    async fn test_router_feeds_splitter() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        let paper = dir.path().join("paper.pdf");
        std::fs::write(&notes, "First. Second.").unwrap();
        std::fs::write(&paper, b"%PDF").unwrap();

        let pipeline = PipelineBuilder::new()
            .component("router", Arc::new(FileTypeRouter::with_mime_types(["text/plain"]).unwrap()))
            .unwrap()
            .component("reader", text_reader())
            .unwrap()
            .then("splitter", sentence_splitter())
            .unwrap()
            .connect("router.text/plain", "reader.sources")
            .unwrap()
            .build();

        let sources = json!([notes.to_string_lossy(), paper.to_string_lossy()]);
        let outputs = pipeline
            .run(PipelineInputs::new().with("router", "sources", sources))
            .await
            .unwrap();

        let texts: Vec<String> = documents(&outputs["splitter"])
            .iter()
            .map(|doc| doc.text().trim().to_string())
            .collect();
        assert_eq!(texts, vec!["First.", "Second."]);
        assert_output(&outputs, "router", UNCLASSIFIED, &json!([paper.to_string_lossy()]));
    }

    #[tokio::test]
    async fn test_generator_pipeline() {
        let config = LocalTextGeneratorConfig::new("google/flan-t5-base")
            .with_token(None)
            .with_stop_words(["(echo)"]);
        let generator = LocalTextGenerator::new(config, Arc::new(EchoLoader)).unwrap();

        let pipeline = PipelineBuilder::new()
            .component("llm", Arc::new(generator))
            .unwrap()
            .build();

        let outputs = pipeline
            .run(PipelineInputs::new().with("llm", "prompt", json!("What is Rust?")))
            .await
            .unwrap();

        assert_output(&outputs, "llm", "replies", &json!(["What is Rust?"]));
    }

    #[tokio::test]
    async fn test_splitter_feeds_generator_per_document() {
        let replies = Arc::new(Mutex::new(Vec::new()));
        let generator = LocalTextGenerator::new(
            LocalTextGeneratorConfig::new("google/flan-t5-base").with_token(None),
            Arc::new(EchoLoader),
        )
        .unwrap();

        let pipeline = PipelineBuilder::new()
            .component("splitter", sentence_splitter())
            .unwrap()
            .component("queue", prompt_queue(replies.clone()))
            .unwrap()
            .component("llm", Arc::new(generator))
            .unwrap()
            .connect("splitter.documents", "queue.documents")
            .unwrap()
            .connect("queue.prompt", "llm.prompt")
            .unwrap()
            .connect("llm.replies", "queue.replies")
            .unwrap()
            .build();

        let report = pipeline
            .run_with_report(
                PipelineInputs::new().with("splitter", "documents", json!([Document::new("A.B.C.")])),
                &[],
            )
            .await
            .unwrap();

        let replies = replies.lock().clone();
        assert_eq!(replies.len(), 3);
        assert!(replies.iter().all(|batch| !batch.is_empty() && batch.iter().all(|r| !r.is_empty())));
        assert_eq!(replies[0], vec!["A. (echo)".to_string()]);
        assert_eq!(report.trace.iter().filter(|name| *name == "llm").count(), 3);
    }

    #[tokio::test]
    async fn test_generator_requires_warm_up_when_disabled() {
        let generator = LocalTextGenerator::new(
            LocalTextGeneratorConfig::new("google/flan-t5-base").with_token(None),
            Arc::new(EchoLoader),
        )
        .unwrap();
        let pipeline = PipelineBuilder::new()
            .settings(crate::pipeline::PipelineSettings::new().with_warm_up_on_run(false))
            .component("llm", Arc::new(generator))
            .unwrap()
            .build();

        let err = pipeline
            .run(PipelineInputs::new().with("llm", "prompt", json!("hi")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ComponentFailed { source: ComponentError::NotWarmedUp(_), .. }
        ));

        pipeline.warm_up().await.unwrap();
        let outputs = pipeline
            .run(PipelineInputs::new().with("llm", "prompt", json!("hi")))
            .await
            .unwrap();
        assert_output(&outputs, "llm", "replies", &json!(["hi (echo)"]));
    }

    #[tokio::test]
    async fn test_round_trip_preserves_behavior() {
        let registry = sample_registry();
        let mut original = loop_pipeline(5, 20).unwrap();
        original.add_component("splitter", sentence_splitter()).unwrap();
        original
            .add_component(
                "llm",
                Arc::new(
                    LocalTextGenerator::new(
                        LocalTextGeneratorConfig::new("google/flan-t5-base").with_token(None),
                        Arc::new(EchoLoader),
                    )
                    .unwrap(),
                ),
            )
            .unwrap();

        for format in [ConfigFormat::Json, ConfigFormat::Yaml] {
            let text = original.dumps(format).unwrap();
            let restored = Pipeline::loads(&text, format, &registry).unwrap();

            assert_eq!(restored.component_names(), original.component_names());
            assert_eq!(restored.connections(), original.connections());
            assert_eq!(restored.dumps(format).unwrap(), text);

            let inputs = PipelineInputs::new()
                .with("first_of", "initial", json!(1))
                .with("splitter", "documents", json!([Document::new("One. Two.")]))
                .with("llm", "prompt", json!("ping"));
            let expected = original.run(inputs.clone()).await.unwrap();
            let actual = restored.run(inputs).await.unwrap();
            assert_eq!(actual, expected);
            assert_output(&actual, "threshold", "above", &json!(6));
        }
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        let pipeline = loop_pipeline(3, 10).unwrap();

        pipeline.save(&path).unwrap();
        let restored = Pipeline::load(&path, &sample_registry()).unwrap();

        let outputs = restored
            .run(PipelineInputs::new().with("first_of", "initial", json!(0)))
            .await
            .unwrap();
        assert_output(&outputs, "threshold", "above", &json!(4));
    }

    #[tokio::test]
    async fn test_branch_and_join() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("threshold", Arc::new(Threshold::new(10))).unwrap();
        pipeline.add_component("big", Arc::new(AddFixedValue::new(1000))).unwrap();
        pipeline.add_component("small", Arc::new(AddFixedValue::new(1))).unwrap();
        let joiner = Arc::new(RecordingComponent::variadic());
        pipeline.add_component("joiner", joiner.clone()).unwrap();
        pipeline.connect("threshold.above", "big.value").unwrap();
        pipeline.connect("threshold.below", "small.value").unwrap();
        pipeline.connect("big.result", "joiner.values").unwrap();
        pipeline.connect("small.result", "joiner.values").unwrap();

        let outputs = pipeline
            .run(PipelineInputs::new().with("threshold", "value", json!(3)))
            .await
            .unwrap();

        assert_output(&outputs, "joiner", "values", &json!([4]));
        assert_component_absent(&outputs, "big");
        assert_eq!(joiner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fan_out_to_many_receivers() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("source", Arc::new(ConstantComponent::new(json!("Ada")))).unwrap();
        pipeline.add_component("hello", Arc::new(Hello)).unwrap();
        pipeline.add_component("echo", Arc::new(RecordingComponent::passthrough())).unwrap();
        pipeline.connect("source.value", "hello.name").unwrap();
        pipeline.connect("source.value", "echo.value").unwrap();

        let outputs = pipeline.run(PipelineInputs::new()).await.unwrap();

        assert_output(&outputs, "hello", "greeting", &json!("Hello, Ada!"));
        assert_output(&outputs, "echo", "value", &json!("Ada"));
        assert_component_absent(&outputs, "source");
    }

    #[tokio::test]
    async fn test_events_cover_every_visit() {
        let sink = Arc::new(CollectingEventSink::new());
        let mut pipeline = loop_pipeline(2, 10).unwrap();
        pipeline.set_event_sink(sink.clone());

        let report = pipeline
            .run_with_report(PipelineInputs::new().with("first_of", "initial", json!(0)), &[])
            .await
            .unwrap();

        let completed = sink.events_of_type("component.completed");
        assert_eq!(completed.len(), report.trace.len());
        assert_eq!(sink.components_for("component.started"), report.trace);
        assert_eq!(report.outputs["threshold"]["above"], Value::from(3));
    }
}
