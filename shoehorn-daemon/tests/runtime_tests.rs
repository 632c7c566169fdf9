//! End-to-end coordinator runs: initial generation, watch-triggered
//! regeneration and reload, and the two ways a run ends.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use shoehorn_core::types::{
    Config, GenerateConfig, InputFile, OutputName, ProcessConfig, ReloadPolicy, Strategy,
};
use shoehorn_daemon::{run_until, RunOptions, RunOutcome, ShutdownOutcome, ShutdownSignal};
use tempfile::TempDir;
use tokio::sync::oneshot;

fn options() -> RunOptions {
    RunOptions {
        // fs::write truncates then writes; every event must regenerate so
        // the last one sees the full contents.
        debounce: Duration::ZERO,
        grace_period: Duration::from_secs(2),
        restart_grace: Duration::from_millis(500),
    }
}

fn append_spec(dir: &Path, name: &str, input: &str) -> GenerateConfig {
    GenerateConfig {
        name: OutputName::from(name),
        path: dir.join("out"),
        strategy: Strategy::Append,
        inputs: vec![InputFile {
            name: input.to_string(),
            path: dir.join(input),
        }],
    }
}

fn shell(script: String, reload: ReloadPolicy) -> ProcessConfig {
    ProcessConfig {
        path: PathBuf::from("/bin/sh"),
        args: vec!["-c".to_string(), script],
        reload,
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

fn shutdown_trigger() -> (
    oneshot::Sender<ShutdownSignal>,
    impl std::future::Future<Output = ShutdownSignal> + Send + 'static,
) {
    let (tx, rx) = oneshot::channel();
    let fut = async move {
        match rx.await {
            Ok(signal) => signal,
            Err(_) => std::future::pending().await,
        }
    };
    (tx, fut)
}

#[tokio::test]
async fn generation_only_run_regenerates_on_write_and_exits_zero_on_signal() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("in.txt"), "first").expect("seed input");
    let output = dir.path().join("out").join("result.txt");

    let config = Config {
        generate: vec![append_spec(dir.path(), "result.txt", "in.txt")],
        process: ProcessConfig::default(),
    };
    let (trigger, shutdown) = shutdown_trigger();
    let run = tokio::spawn(run_until(config, options(), shutdown));

    assert!(wait_for(|| read(&output) == "first\n").await, "initial pass");

    fs::write(dir.path().join("in.txt"), "second").expect("update input");
    assert!(
        wait_for(|| read(&output) == "second\n").await,
        "regenerated after write, got {:?}",
        read(&output)
    );

    trigger.send(ShutdownSignal::Terminate).expect("send");
    let outcome = run.await.expect("join").expect("run");
    assert_eq!(
        outcome,
        RunOutcome::Shutdown {
            signal: ShutdownSignal::Terminate,
            outcome: ShutdownOutcome::NoProcess,
        }
    );
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn child_exit_ends_the_run_with_its_status() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("in.txt"), "data").expect("seed input");

    let config = Config {
        generate: vec![append_spec(dir.path(), "result.txt", "in.txt")],
        process: shell("exit 3".to_string(), ReloadPolicy::Disabled),
    };
    let (_trigger, shutdown) = shutdown_trigger();

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        run_until(config, options(), shutdown),
    )
    .await
    .expect("run ends")
    .expect("run");

    assert!(matches!(outcome, RunOutcome::ChildExited { code: 1, .. }));
    assert_eq!(outcome.exit_code(), 1);
    // Outputs exist before the child starts.
    assert_eq!(read(&dir.path().join("out").join("result.txt")), "data\n");
}

#[tokio::test]
async fn clean_child_exit_is_success() {
    let config = Config {
        generate: vec![],
        process: shell("true".to_string(), ReloadPolicy::Disabled),
    };
    let (_trigger, shutdown) = shutdown_trigger();

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        run_until(config, options(), shutdown),
    )
    .await
    .expect("run ends")
    .expect("run");
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn input_change_restarts_the_managed_process() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("in.txt"), "v1").expect("seed input");
    let starts = dir.path().join("starts");
    let output = dir.path().join("out").join("result.txt");

    let config = Config {
        generate: vec![append_spec(dir.path(), "result.txt", "in.txt")],
        process: shell(
            format!("echo started >> {}; exec sleep 30", starts.display()),
            ReloadPolicy::Restart,
        ),
    };
    let (trigger, shutdown) = shutdown_trigger();
    let run = tokio::spawn(run_until(config, options(), shutdown));

    assert!(wait_for(|| read(&starts).lines().count() == 1).await);

    fs::write(dir.path().join("in.txt"), "v2").expect("update input");
    assert!(wait_for(|| read(&output) == "v2\n").await);
    assert!(
        wait_for(|| read(&starts).lines().count() >= 2).await,
        "process restarted after regeneration"
    );

    trigger.send(ShutdownSignal::Terminate).expect("send");
    let outcome = run.await.expect("join").expect("run");
    assert!(
        matches!(
            outcome,
            RunOutcome::Shutdown {
                outcome: ShutdownOutcome::Graceful { .. },
                ..
            }
        ),
        "got: {outcome:?}"
    );
}

#[tokio::test]
async fn unrelated_write_leaves_outputs_alone() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("a.txt"), "a").expect("seed a");
    fs::write(dir.path().join("b.txt"), "b").expect("seed b");
    let out_a = dir.path().join("out").join("a.out");
    let out_b = dir.path().join("out").join("b.out");

    let config = Config {
        generate: vec![
            append_spec(dir.path(), "a.out", "a.txt"),
            append_spec(dir.path(), "b.out", "b.txt"),
        ],
        process: ProcessConfig::default(),
    };
    let (trigger, shutdown) = shutdown_trigger();
    let run = tokio::spawn(run_until(config, options(), shutdown));

    assert!(wait_for(|| read(&out_a) == "a\n" && read(&out_b) == "b\n").await);
    // Tamper with b's output; only a write to b.txt should restore it.
    fs::write(&out_b, "tampered").expect("tamper");

    fs::write(dir.path().join("a.txt"), "a2").expect("update a");
    assert!(wait_for(|| read(&out_a) == "a2\n").await);
    assert_eq!(read(&out_b), "tampered");

    trigger.send(ShutdownSignal::Interrupt).expect("send");
    let outcome = run.await.expect("join").expect("run");
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn relative_input_paths_are_watched() {
    // A directory under the working directory, named relatively.
    let dir = TempDir::new_in(".").expect("tempdir");
    assert!(dir.path().is_relative());
    fs::write(dir.path().join("in.txt"), "first").expect("seed input");
    let output = dir.path().join("out").join("result.txt");

    let config = Config {
        generate: vec![append_spec(dir.path(), "result.txt", "in.txt")],
        process: ProcessConfig::default(),
    };
    let (trigger, shutdown) = shutdown_trigger();
    let run = tokio::spawn(run_until(config, options(), shutdown));

    assert!(wait_for(|| read(&output) == "first\n").await, "initial pass");

    fs::write(dir.path().join("in.txt"), "second").expect("update input");
    assert!(
        wait_for(|| read(&output) == "second\n").await,
        "regenerated after write, got {:?}",
        read(&output)
    );

    trigger.send(ShutdownSignal::Terminate).expect("send");
    run.await.expect("join").expect("run");
}

#[tokio::test]
async fn burst_of_writes_within_the_window_reloads_once() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("in.txt");
    fs::write(&input, "seed\n").expect("seed input");
    let starts = dir.path().join("starts");

    let config = Config {
        generate: vec![append_spec(dir.path(), "result.txt", "in.txt")],
        process: shell(
            format!("echo started >> {}; exec sleep 30", starts.display()),
            ReloadPolicy::Restart,
        ),
    };
    let options = RunOptions {
        restart_grace: Duration::from_millis(500),
        grace_period: Duration::from_secs(2),
        ..RunOptions::default()
    };
    assert_eq!(options.debounce, Duration::from_millis(100));

    let (trigger, shutdown) = shutdown_trigger();
    let run = tokio::spawn(run_until(config, options, shutdown));
    assert!(wait_for(|| read(&starts).lines().count() == 1).await);

    // Appends raise one modify event each, with no truncation event.
    let append_line = |line: &str| {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&input)
            .expect("open input");
        writeln!(file, "{line}").expect("append");
    };
    for i in 0..5 {
        append_line(&format!("burst {i}"));
    }
    assert!(wait_for(|| read(&starts).lines().count() == 2).await);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(read(&starts).lines().count(), 2, "burst coalesced to one reload");

    append_line("later");
    assert!(
        wait_for(|| read(&starts).lines().count() == 3).await,
        "a write past the window reloads again"
    );

    trigger.send(ShutdownSignal::Terminate).expect("send");
    run.await.expect("join").expect("run");
}
