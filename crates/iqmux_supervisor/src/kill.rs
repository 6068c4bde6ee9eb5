use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use registry::Registry;
use tracing::info;

/// Kill a supervised child by its registry pid, forcing a respawn.
///
/// Absence of the entry is a no-op: nothing to kill, probably not running.
pub fn kill(registry: &Registry, name: &str) -> std::io::Result<()> {
    let Some(pid) = registry.pid(name) else {
        return Ok(());
    };

    signal::kill(Pid::from_raw(pid), Signal::SIGKILL)?;
    info!(target: "iqmux::supervisor", child = name, pid, "Killed unresponsive child");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::kill;
    use registry::{Liveness, Registry};

    #[test]
    fn missing_entry_is_a_noop() {
        let registry = Registry::new();
        kill(&registry, "iqfeed").unwrap();
    }

    #[test]
    fn kills_a_live_child_by_registry_pid() {
        let mut child = std::process::Command::new("/bin/sh")
            .args(["-c", "sleep 30"])
            .spawn()
            .unwrap();

        let registry = Registry::new();
        registry.store("iqfeed", Liveness::Pid(child.id() as i32));

        kill(&registry, "iqfeed").unwrap();

        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
