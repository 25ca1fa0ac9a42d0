//! End-to-end tests: a real supervisor watching a temp folder
//!
//! The supervisor runs on a background thread; tests drop files into the
//! watch root and poll (bounded) for the effects.

use arboreto::pipeline::PipelinePaths;
use arboreto::{
    IngestPipeline, PipelineStats, ShutdownToken, StateHandle, Supervisor, SupervisorError,
    SupervisorState,
};
use arboreto_render::DocxRenderer;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(10);

struct Running {
    dir: TempDir,
    paths: PipelinePaths,
    stats: Arc<PipelineStats>,
    state: StateHandle,
    shutdown: ShutdownToken,
    handle: JoinHandle<Result<(), SupervisorError>>,
}

impl Running {
    fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("entrada");
        let paths = PipelinePaths {
            watch_root: root.clone(),
            archive_dir: root.join("procesados"),
            image_root: dir.path().join("imagenes"),
            output_dir: dir.path().join("salida"),
        };

        let pipeline = IngestPipeline::new(paths.clone(), Box::new(DocxRenderer::default()));
        let stats = pipeline.stats().clone();
        let shutdown = ShutdownToken::new();
        let supervisor = Supervisor::new(pipeline, &root, shutdown.clone())
            .with_folders(vec![
                root.clone(),
                paths.archive_dir.clone(),
                paths.image_root.clone(),
                paths.output_dir.clone(),
            ])
            .with_settle(Duration::from_millis(100))
            .with_poll_interval(Duration::from_millis(20))
            .with_stats(stats.clone());
        let state = supervisor.state_handle();
        let handle = thread::spawn(move || supervisor.run());

        assert!(
            wait_for(|| state.get() == SupervisorState::Running),
            "supervisor never reached RUNNING"
        );

        Self {
            dir,
            paths,
            stats,
            state,
            shutdown,
            handle,
        }
    }

    fn stop(self) -> (TempDir, Result<(), SupervisorError>) {
        self.shutdown.request();
        let result = self.handle.join().unwrap();
        assert_eq!(self.state.get(), SupervisorState::Stopped);
        (self.dir, result)
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    condition()
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn test_watch_processes_and_archives() {
    let running = Running::start();
    let root = &running.paths.watch_root;

    fs::write(
        root.join("roble.json"),
        r#"{"id":"1","nombre":"Roble","descripcion":"Viejo roble","fecha":"2023-05-10"}"#,
    )
    .unwrap();
    fs::write(root.join("roto.json"), "{ not json").unwrap();
    fs::write(root.join("notas.txt"), "ignored").unwrap();

    let archived = running.paths.archive_dir.join("roble.json");
    assert!(wait_for(|| archived.exists()), "record was not archived");
    assert!(running.paths.output_dir.join("1_Roble.docx").exists());
    assert!(wait_for(|| running.stats.snapshot().decode_failures == 1));

    assert!(root.join("roto.json").exists());
    assert!(root.join("notas.txt").exists());
    assert!(!root.join("roble.json").exists());

    let (_dir, result) = running.stop();
    result.unwrap();
}

#[test]
fn test_archived_files_do_not_retrigger() {
    let running = Running::start();
    let root = running.paths.watch_root.clone();

    for (name, id) in [("a.json", "1"), ("b.json", "2")] {
        fs::write(
            root.join(name),
            format!(r#"{{"id":"{id}","nombre":"Arbol {id}","descripcion":"d","fecha":"2023-05-10"}}"#),
        )
        .unwrap();
    }

    assert!(wait_for(|| count_files(&running.paths.archive_dir) == 2));
    // give any stray events from the archive moves time to arrive
    thread::sleep(Duration::from_millis(400));

    let snap = running.stats.snapshot();
    assert_eq!(snap.processed, 2);
    assert_eq!(snap.failed(), 0);
    assert_eq!(count_files(&running.paths.output_dir), 2);

    let (_dir, result) = running.stop();
    result.unwrap();
}

#[test]
fn test_shutdown_from_idle() {
    let running = Running::start();
    let (dir, result) = running.stop();
    result.unwrap();
    assert!(dir.path().join("entrada").join("procesados").is_dir());
    assert!(dir.path().join("salida").is_dir());
}
