use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use iqmux_config::SupervisorConfig;
use registry::{Liveness, Registry};
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::ChildSpec;

/// Supervise one child forever.
///
/// The worker never gives up; the stabilization window doubles as the
/// minimum respawn interval. If the dependency never appears, the worker
/// blocks indefinitely, which is acceptable.
pub async fn supervise(spec: ChildSpec, registry: Arc<Registry>, cfg: SupervisorConfig) {
    loop {
        if let Some(dep) = &spec.dep {
            await_dep(&registry, &spec.name, dep, &cfg).await;
        }

        if let Err(e) = run_once(&spec, &registry, &cfg).await {
            error!(target: "iqmux::supervisor", child = %spec.name, error = %e, "Child run failed");
        }

        if let Some(post) = &spec.post_exe {
            // Post-exit command runs after the registry entry is gone and
            // never re-registers the child's key.
            if let Err(e) = run_post(post, &spec.post_args).await {
                warn!(
                    target: "iqmux::supervisor",
                    child = %spec.name,
                    error = %e,
                    "Post-exit command failed"
                );
            }
        }

        debug!(target: "iqmux::supervisor", child = %spec.name, "Respawning");
    }
}

async fn await_dep(registry: &Registry, name: &str, dep: &str, cfg: &SupervisorConfig) {
    loop {
        if registry.is_up(dep) {
            debug!(target: "iqmux::supervisor", child = name, dep, "Dependency available");
            return;
        }
        sleep(cfg.dep_poll()).await;
    }
}

async fn run_once(
    spec: &ChildSpec,
    registry: &Registry,
    cfg: &SupervisorConfig,
) -> anyhow::Result<()> {
    let mut cmd = Command::new(&spec.exe);
    cmd.args(&spec.args)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if let Some(dir) = spec.exe.parent().filter(|d| !d.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn()?;
    info!(target: "iqmux::supervisor", child = %spec.name, pid = child.id(), "Spawned");

    // Mark as running only once the child survives the stabilization
    // window, to prevent flip-flopping on instant crashes.
    sleep(cfg.stabilize()).await;
    if child.try_wait()?.is_none() {
        if let Some(pid) = child.id() {
            registry.store(&spec.name, Liveness::Pid(pid as i32));
            debug!(target: "iqmux::supervisor", child = %spec.name, pid, "Marked as running");
        }
    } else {
        warn!(
            target: "iqmux::supervisor",
            child = %spec.name,
            "Child exited within the stabilization window"
        );
    }

    let status = child.wait().await;
    registry.delete(&spec.name);

    let status = status?;
    if !status.success() {
        anyhow::bail!("child exited with {status}");
    }
    Ok(())
}

async fn run_post(exe: &Path, args: &[String]) -> anyhow::Result<()> {
    let mut cmd = Command::new(exe);
    cmd.args(args).stdout(Stdio::inherit()).stderr(Stdio::inherit());

    let status = cmd.status().await?;
    if !status.success() {
        anyhow::bail!("post command exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn shell(name: &str, script: &str) -> ChildSpec {
        ChildSpec {
            name: name.into(),
            exe: "/bin/sh".into(),
            args: vec!["-c".into(), script.into()],
            dep: None,
            post_exe: None,
            post_args: vec![],
        }
    }

    fn fast_cfg() -> SupervisorConfig {
        SupervisorConfig {
            stabilize_secs: 1,
            dep_poll_ms: 50,
        }
    }

    async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
        let start = Instant::now();
        while !cond() {
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "timed out waiting for {what}"
            );
            sleep(Duration::from_millis(25)).await;
        }
    }

    #[tokio::test]
    async fn marks_child_running_after_stabilization_and_clears_on_exit() {
        let registry = Arc::new(Registry::new());
        let spec = shell("svc", "sleep 2");

        let reg = registry.clone();
        let task = tokio::spawn(async move { run_once(&spec, &reg, &fast_cfg()).await });

        wait_until("registry entry", || registry.is_up("svc")).await;
        assert!(registry.pid("svc").is_some());

        task.await.unwrap().unwrap();
        assert!(!registry.is_up("svc"));
    }

    #[tokio::test]
    async fn instant_exit_never_registers() {
        let registry = Arc::new(Registry::new());
        let spec = shell("flaky", "true");

        run_once(&spec, &registry, &fast_cfg()).await.unwrap();
        assert!(!registry.is_up("flaky"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_and_entry_removed() {
        let registry = Arc::new(Registry::new());
        let spec = shell("failing", "sleep 2; exit 3");

        let err = run_once(&spec, &registry, &fast_cfg()).await.unwrap_err();
        assert!(err.to_string().contains("exit"), "{err}");
        assert!(!registry.is_up("failing"));
    }

    #[tokio::test]
    async fn dependency_gates_the_spawn() {
        let registry = Arc::new(Registry::new());
        let mut spec = shell("dependent", "sleep 2");
        spec.dep = Some("base".into());

        let reg = registry.clone();
        let task = tokio::spawn(async move { supervise(spec, reg, fast_cfg()).await });

        // Without the dependency nothing may spawn.
        sleep(Duration::from_millis(1300)).await;
        assert!(!registry.is_up("dependent"));

        registry.store("base", Liveness::Ready);
        wait_until("dependent child", || registry.is_up("dependent")).await;

        task.abort();
    }

    #[tokio::test]
    async fn post_exit_command_runs_after_the_entry_is_gone() {
        let marker = std::env::temp_dir().join(format!(
            "iqmux-post-{}-{}",
            std::process::id(),
            line!()
        ));
        let _ = std::fs::remove_file(&marker);

        let registry = Arc::new(Registry::new());
        let mut spec = shell("rotating", "true");
        spec.post_exe = Some("/bin/sh".into());
        spec.post_args = vec!["-c".into(), format!("touch {}", marker.display())];

        let reg = registry.clone();
        let spec_task = spec.clone();
        let task = tokio::spawn(async move { supervise(spec_task, reg, fast_cfg()).await });

        wait_until("post-exit marker", || marker.exists()).await;
        assert!(!registry.is_up("rotating"));

        task.abort();
        let _ = std::fs::remove_file(&marker);
    }
}
