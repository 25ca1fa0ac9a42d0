//! Ingestion pipeline scenarios
//!
//! Each test builds a throwaway folder topology, drops record files into the
//! watch root and drives the pipeline through `FileEventHandler`, the same
//! entry point the supervisor uses.

use arboreto::pipeline::{ArchiveError, CreatedEvent, EventOutcome, IgnoreReason, PipelinePaths};
use arboreto::{FailureKind, FileEventHandler, IngestPipeline, PipelineError};
use arboreto_record::TreeRecord;
use arboreto_render::{ConflictPolicy, DocumentRenderer, DocxRenderer, RenderError, IMAGE_NOT_FOUND};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ROBLE: &str = r#"{"id":"1","nombre":"Roble","descripcion":"Viejo roble","fecha":"2023-05-10"}"#;

struct Layout {
    _dir: TempDir,
    paths: PipelinePaths,
}

impl Layout {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("entrada");
        let paths = PipelinePaths {
            watch_root: root.clone(),
            archive_dir: root.join("procesados"),
            image_root: dir.path().join("imagenes"),
            output_dir: dir.path().join("salida"),
        };
        arboreto::ensure_folders(&[
            &paths.watch_root,
            &paths.archive_dir,
            &paths.image_root,
            &paths.output_dir,
        ])
        .unwrap();
        Self { _dir: dir, paths }
    }

    fn pipeline(&self) -> IngestPipeline {
        self.pipeline_with(Box::new(DocxRenderer::default()))
    }

    fn pipeline_with(&self, renderer: Box<dyn DocumentRenderer>) -> IngestPipeline {
        IngestPipeline::new(self.paths.clone(), renderer)
    }

    fn drop_record(&self, name: &str, body: &str) -> PathBuf {
        let path = self.paths.watch_root.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn outputs(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.paths.output_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn archived(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.paths.archive_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn document_xml(path: &Path) -> String {
    let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    xml
}

fn expect_failure(outcome: EventOutcome) -> PipelineError {
    match outcome {
        EventOutcome::Failed(err) => err,
        other => panic!("expected a failure, got {other:?}"),
    }
}

/// Renderer that always fails with an I/O error.
struct BrokenRenderer;

impl DocumentRenderer for BrokenRenderer {
    fn extension(&self) -> &str {
        "docx"
    }

    fn render(&self, _: &TreeRecord, _: &Path, output_dir: &Path) -> Result<PathBuf, RenderError> {
        Err(RenderError::Io {
            path: output_dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only volume"),
        })
    }
}

#[test]
fn test_scenario_a_record_without_image() {
    let layout = Layout::new();
    let source = layout.drop_record("roble.json", ROBLE);
    let pipeline = layout.pipeline();

    let outcome = pipeline.on_file_created(&CreatedEvent::file(&source));
    let done = match outcome {
        EventOutcome::Processed(done) => done,
        other => panic!("expected processed, got {other:?}"),
    };

    assert_eq!(done.document, layout.paths.output_dir.join("1_Roble.docx"));
    assert_eq!(done.archived, Some(layout.paths.archive_dir.join("roble.json")));
    assert!(!source.exists());
    assert_eq!(layout.archived(), vec!["roble.json"]);
    assert_eq!(fs::read_to_string(layout.paths.archive_dir.join("roble.json")).unwrap(), ROBLE);

    let xml = document_xml(&done.document);
    assert!(xml.contains("Reporte del Árbol: Roble"));
    assert!(xml.contains(IMAGE_NOT_FOUND));

    let stats = pipeline.stats().snapshot();
    assert_eq!((stats.detected, stats.processed, stats.failed()), (1, 1, 0));
}

#[test]
fn test_scenario_b_invalid_json_keeps_loop_alive() {
    let layout = Layout::new();
    let broken = layout.drop_record("roto.json", r#"{"id": "1", "nombre": "#);
    let pipeline = layout.pipeline();

    let err = expect_failure(pipeline.on_file_created(&CreatedEvent::file(&broken)));
    assert_eq!(err.kind(), FailureKind::Decode);
    assert!(broken.exists());
    assert!(layout.outputs().is_empty());
    assert!(layout.archived().is_empty());

    // next event is still handled
    let good = layout.drop_record("roble.json", ROBLE);
    assert!(pipeline.on_file_created(&CreatedEvent::file(&good)).is_processed());
    assert_eq!(layout.outputs(), vec!["1_Roble.docx"]);
}

#[test]
fn test_scenario_c_missing_fecha() {
    let layout = Layout::new();
    let source = layout.drop_record(
        "sin_fecha.json",
        r#"{"id":"2","nombre":"Pino","descripcion":"Pino joven"}"#,
    );
    let pipeline = layout.pipeline_with(Box::new(BrokenRenderer));

    let err = expect_failure(pipeline.on_file_created(&CreatedEvent::file(&source)));
    assert_eq!(err.kind(), FailureKind::Validation);
    // rejected before the renderer could be reached
    assert!(err.to_string().contains("missing required field: fecha"));
    assert!(source.exists());
    assert!(layout.outputs().is_empty());
    assert_eq!(pipeline.stats().snapshot().validation_failures, 1);
}

#[test]
fn test_scenario_d_two_records_in_quick_succession() {
    let layout = Layout::new();
    let first = layout.drop_record("roble.json", ROBLE);
    let second = layout.drop_record(
        "sauce.json",
        r#"{"id":7,"nombre":"Sauce Llorón","descripcion":"Junto al río","fecha":"2024-02-29","altura_metros":"12.5"}"#,
    );
    let pipeline = layout.pipeline();

    assert!(pipeline.on_file_created(&CreatedEvent::file(&first)).is_processed());
    assert!(pipeline.on_file_created(&CreatedEvent::file(&second)).is_processed());

    assert_eq!(layout.outputs(), vec!["1_Roble.docx", "7_Sauce_Llorón.docx"]);
    assert_eq!(layout.archived(), vec!["roble.json", "sauce.json"]);
}

#[test]
fn test_duplicate_event_archives_once() {
    let layout = Layout::new();
    let source = layout.drop_record("roble.json", ROBLE);
    let pipeline = layout.pipeline();
    let event = CreatedEvent::file(&source);

    assert!(pipeline.on_file_created(&event).is_processed());
    let err = expect_failure(pipeline.on_file_created(&event));

    assert!(err.is_vanished());
    assert_eq!(layout.archived(), vec!["roble.json"]);
    assert_eq!(layout.outputs(), vec!["1_Roble.docx"]);
}

#[test]
fn test_existing_output_is_not_silently_overwritten() {
    let layout = Layout::new();
    fs::write(layout.paths.output_dir.join("1_Roble.docx"), b"previous").unwrap();
    let source = layout.drop_record("roble.json", ROBLE);
    let pipeline = layout.pipeline();

    let err = expect_failure(pipeline.on_file_created(&CreatedEvent::file(&source)));
    assert_eq!(err.kind(), FailureKind::Render);
    assert!(matches!(
        err,
        PipelineError::Render {
            source: RenderError::OutputExists(_),
            ..
        }
    ));
    assert!(source.exists());
    assert_eq!(fs::read(layout.paths.output_dir.join("1_Roble.docx")).unwrap(), b"previous");
}

#[test]
fn test_timestamp_policy_keeps_both_documents() {
    let layout = Layout::new();
    fs::write(layout.paths.output_dir.join("1_Roble.docx"), b"previous").unwrap();
    let source = layout.drop_record("roble.json", ROBLE);
    let pipeline = layout.pipeline_with(Box::new(DocxRenderer::new(ConflictPolicy::Timestamp)));

    let done = match pipeline.on_file_created(&CreatedEvent::file(&source)) {
        EventOutcome::Processed(done) => done,
        other => panic!("expected processed, got {other:?}"),
    };
    let name = done.document.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("1_Roble_") && name.ends_with(".docx"), "{name}");
    assert_eq!(layout.outputs().len(), 2);
}

#[test]
fn test_render_failure_leaves_file_in_place() {
    let layout = Layout::new();
    let source = layout.drop_record("roble.json", ROBLE);
    let pipeline = layout.pipeline_with(Box::new(BrokenRenderer));

    let err = expect_failure(pipeline.on_file_created(&CreatedEvent::file(&source)));
    assert_eq!(err.kind(), FailureKind::Render);
    assert!(source.exists());
    assert!(layout.archived().is_empty());
}

#[test]
fn test_archive_collision_is_an_archive_failure() {
    let layout = Layout::new();
    fs::write(layout.paths.archive_dir.join("roble.json"), b"older copy").unwrap();
    let source = layout.drop_record("roble.json", ROBLE);
    let pipeline = layout.pipeline_with(Box::new(DocxRenderer::new(ConflictPolicy::Overwrite)));

    let err = expect_failure(pipeline.on_file_created(&CreatedEvent::file(&source)));
    assert_eq!(err.kind(), FailureKind::Archive);
    assert!(matches!(
        err,
        PipelineError::Archive {
            source: ArchiveError::DestinationExists(_),
            ..
        }
    ));
    assert!(source.exists());
    assert_eq!(
        fs::read(layout.paths.archive_dir.join("roble.json")).unwrap(),
        b"older copy"
    );
}

#[test]
fn test_archive_folder_events_are_ignored() {
    let layout = Layout::new();
    let archived = layout.paths.archive_dir.join("roble.json");
    fs::write(&archived, ROBLE).unwrap();
    let pipeline = layout.pipeline();

    let outcome = pipeline.on_file_created(&CreatedEvent::file(&archived));
    assert!(matches!(
        outcome,
        EventOutcome::Ignored(IgnoreReason::OutsideWatchRoot)
    ));
    assert!(archived.exists());
    assert!(layout.outputs().is_empty());
}

#[test]
fn test_directories_and_other_files_are_ignored() {
    let layout = Layout::new();
    let folder = layout.paths.watch_root.join("lote.json");
    fs::create_dir(&folder).unwrap();
    let notes = layout.drop_record("notas.txt", "hola");
    let pipeline = layout.pipeline();

    assert!(matches!(
        pipeline.on_file_created(&CreatedEvent::file(&folder)),
        EventOutcome::Ignored(IgnoreReason::Directory)
    ));
    assert!(matches!(
        pipeline.on_file_created(&CreatedEvent::file(&notes)),
        EventOutcome::Ignored(IgnoreReason::NotARecord)
    ));
    assert_eq!(pipeline.stats().snapshot().ignored, 2);
    assert_eq!(pipeline.stats().snapshot().detected, 0);
}

#[test]
fn test_embeds_image_when_present() {
    let layout = Layout::new();
    fs::write(
        layout.paths.image_root.join("roble.png"),
        arboreto_render::image::png_header(400, 300),
    )
    .unwrap();
    let source = layout.drop_record(
        "roble.json",
        r#"{"id":"1","nombre":"Roble","descripcion":"Viejo roble","fecha":"2023-05-10","imagen":"roble.png","pie_imagen":"Vista norte"}"#,
    );
    let pipeline = layout.pipeline();

    let done = match pipeline.on_file_created(&CreatedEvent::file(&source)) {
        EventOutcome::Processed(done) => done,
        other => panic!("expected processed, got {other:?}"),
    };
    let xml = document_xml(&done.document);
    assert!(!xml.contains(IMAGE_NOT_FOUND));
    assert!(xml.contains("Vista norte"));

    let mut archive = zip::ZipArchive::new(fs::File::open(&done.document).unwrap()).unwrap();
    assert!(archive.by_name("word/media/image1.png").is_ok());
}
