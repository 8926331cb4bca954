mod common;

use std::path::Path;
use std::sync::Arc;

use common::{context, scratch_config, RecordingRunner};
use portage::context::Context;
use portage::exec::{Output, SharedBuffer};
use portage::pipelines::{CodeScan, ImageScan, Sequence, Stage, StageStatus};
use portage::task::{CodeScanTask, CombinedTask};
use portage::{bundle, Error, ErrorCode, Result};

fn program_and_verb(line: &str) -> String {
    line.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

#[test]
fn all_dry_run_invokes_every_tool_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let ctx = context(runner.clone()).with_dry_run(true);

    let mut config = scratch_config(dir.path());
    config.image_tag = "registry.example.com/app:v1".to_string();
    config.image_publish.bundle_tag = "registry.example.com/app:v1-bundle".to_string();
    config.deploy.enabled = true;

    let result = Sequence::all(&ctx, &config, dir.path()).run().unwrap();
    assert_eq!(result.summary.total_stages, 5);
    assert_eq!(result.summary.skipped, 0);
    assert!(runner.all_dry_run());

    let verbs: Vec<String> = runner.lines().iter().map(|l| program_and_verb(l)).collect();
    let position = |verb: &str| verbs.iter().position(|v| v == verb).unwrap();

    assert!(position("gitleaks detect") < position("docker build"));
    assert!(position("docker build") < position("syft scan"));
    assert!(position("syft scan") < position("docker push"));
    assert!(position("docker push") < position("oras push"));
    assert!(position("oras push") < position("gatecheck validate"));
}

#[test]
fn disabled_stages_have_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());

    let mut config = scratch_config(dir.path());
    config.code_scan.enabled = false;
    config.image_build.enabled = false;
    config.image_scan.enabled = false;
    config.image_publish.enabled = false;
    config.deploy.enabled = false;

    let result = Sequence::all(&context(runner.clone()), &config, dir.path()).run().unwrap();
    assert!(result.stages.iter().all(|s| s.status == StageStatus::Skipped));
    assert!(runner.lines().is_empty());
    assert!(!Path::new(&config.artifact_dir).exists());
}

#[test]
fn bundle_is_created_once_then_appended() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let ctx = context(runner.clone());
    let config = scratch_config(dir.path());

    bundle::init_with_config(&ctx, &config).unwrap();
    assert!(config.bundle_path().exists());

    CodeScan::new(ctx).with_config(config).run().unwrap();

    let bundle_calls: Vec<String> = runner
        .lines()
        .into_iter()
        .filter(|l| l.starts_with("gatecheck bundle"))
        .collect();
    assert!(bundle_calls[0].starts_with("gatecheck bundle create"));
    assert!(bundle_calls[1..]
        .iter()
        .all(|l| l.starts_with("gatecheck bundle add")));
    assert_eq!(bundle_calls.len(), 3);
}

#[test]
fn image_scan_bundles_every_report() {
    let dir = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::new());
    let config = scratch_config(dir.path());

    ImageScan::new(context(runner.clone()))
        .with_config(config.clone())
        .run()
        .unwrap();

    let added: Vec<String> = runner
        .lines()
        .into_iter()
        .filter(|l| l.starts_with("gatecheck bundle"))
        .collect();
    assert_eq!(added.len(), 3);
    assert!(added[0].ends_with(&config.image_scan.syft_filename));
    assert!(added[1].ends_with(&config.image_scan.grype_filename));
    assert!(added[2].ends_with(&config.image_scan.clamav_filename));
}

struct ScriptedTask {
    name: &'static str,
    report: std::path::PathBuf,
    outcome: std::result::Result<&'static str, i32>,
}

impl CodeScanTask for ScriptedTask {
    fn name(&self) -> &'static str {
        self.name
    }

    fn report(&self) -> &Path {
        &self.report
    }

    fn run(&self, _ctx: &Context, display: &SharedBuffer) -> Result<()> {
        match self.outcome {
            Ok(summary) => {
                let mut display = display.clone();
                std::io::Write::write_all(&mut display, summary.as_bytes()).unwrap();
                Ok(())
            }
            Err(code) => Err(Error::command_failed(self.name, code)),
        }
    }
}

#[test]
fn combined_task_runs_past_failures_and_flushes_summaries() {
    let runner = Arc::new(RecordingRunner::new());
    let display = SharedBuffer::new();

    let combined = CombinedTask::new(Output::Capture(display.clone()))
        .with_task(ScriptedTask {
            name: "first",
            report: "first.json".into(),
            outcome: Err(3),
        })
        .with_task(ScriptedTask {
            name: "second",
            report: "second.json".into(),
            outcome: Ok("second summary\n"),
        });

    let err = combined.run(&context(runner)).unwrap_err();
    assert_eq!(err.code, ErrorCode::CommandFailed);
    assert_eq!(err.exit_code(), Some(3));
    assert_eq!(display.to_string_lossy(), "second summary\n");
}
