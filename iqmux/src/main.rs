use std::env;

use anyhow::Context;
use iqmux_config::IqmuxConfig;
use iqmux_core::master::Master;
use iqmux_supervisor::ChildSpec;
use tracing::info;

/// Command table for the supervised children. The display server comes
/// first; the feed daemon depends on it and rotates its own log on exit.
/// Credentials arrive only here, as spawn arguments.
fn child_commands(prod: &str, login: &str, pass: &str) -> Vec<ChildSpec> {
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    vec![
        ChildSpec {
            name: registry::DISPLAY.into(),
            exe: "/usr/bin/Xvfb".into(),
            args: strings(&[":0", "-screen", "0", "1024x768x24", "-noreset"]),
            dep: None,
            post_exe: None,
            post_args: vec![],
        },
        ChildSpec {
            name: registry::FEED.into(),
            exe: "wine64".into(),
            args: strings(&[
                "/home/wine/.wine/drive_c/Program Files/DTN/IQFeed/iqconnect.exe",
                "-product",
                prod,
                "-version",
                "IQFEED_LAUNCHER",
                "-login",
                login,
                "-password",
                pass,
                "-autoconnect",
            ]),
            dep: Some(registry::DISPLAY.into()),
            post_exe: Some("mv".into()),
            post_args: strings(&[
                "/home/wine/DTN/IQFeed/IQConnectLog.txt",
                "/home/wine/DTN/IQFeed/IQConnectLog.txt.1",
            ]),
        },
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let prod = env::var("PROD").context("Missing env.PROD")?;
    let login = env::var("LOGIN").context("Missing env.LOGIN")?;
    let pass = env::var("PASS").context("Missing env.PASS")?;

    let cfg = IqmuxConfig::from_file_or_default("iqmux.conf");
    utils::init_tracing();

    if env::var("VERBOSE").is_ok_and(|v| !v.is_empty()) {
        info!(target: "iqmux", "env.VERBOSE toggled");
        utils::set_wire_verbose(true);
    } else {
        utils::set_wire_verbose(cfg.global.wire_verbose);
    }
    cfg.print();

    let children = child_commands(&prod, &login, &pass);
    info!(target: "iqmux", children = children.len(), "Child command table ready");

    let master = Master::new(cfg, children);
    master.run().await?;

    Ok(())
}
