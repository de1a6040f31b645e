use crate::AppContext;
use anyhow::Context;
use remotehand_notify::Report;
use std::process::Stdio;

#[cfg(windows)]
const RDP_CLIENT: &str = "mstsc";
#[cfg(not(windows))]
const RDP_CLIENT: &str = "xfreerdp";

/// Exit code of `taskkill` when no process matched.
#[cfg(windows)]
const NO_MATCH_EXIT_CODE: i32 = 128;
/// Exit code of `pkill` when no process matched.
#[cfg(not(windows))]
const NO_MATCH_EXIT_CODE: i32 = 1;

/// Client program and arguments for `host:port`.
pub fn rdp_command(host: &str, port: u16) -> (&'static str, Vec<String>) {
    (RDP_CLIENT, vec![format!("/v:{host}:{port}")])
}

/// Starts the platform RDP client against the configured endpoint and
/// reports the session. The client is not awaited.
pub async fn run_rdp(ctx: &AppContext) -> anyhow::Result<()> {
    let Some(rdp) = &ctx.config.rdp else {
        anyhow::bail!("no RDP endpoint configured; set [rdp] host in config.toml");
    };
    let endpoint = format!("{}:{}", rdp.host, rdp.port);
    let (program, args) = rdp_command(&rdp.host, rdp.port);

    tracing::info!("opening RDP session to {endpoint}");
    let spawned = tokio::process::Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    if let Err(err) = spawned {
        ctx.report_error(format!("could not start {program}: {err}"))
            .await;
        return Err(err).with_context(|| format!("starting {program}"));
    }

    ctx.report(Report::Rdp {
        origin: ctx.origin(),
        endpoint: endpoint.clone(),
    })
    .await;
    println!("RDP session to {endpoint} started.");
    Ok(())
}

/// Program and arguments that terminate every running RDP client.
pub fn close_rdp_command() -> (&'static str, Vec<String>) {
    if cfg!(windows) {
        (
            "taskkill",
            vec!["/F".to_string(), "/IM".to_string(), format!("{RDP_CLIENT}.exe")],
        )
    } else {
        ("pkill", vec!["-x".to_string(), RDP_CLIENT.to_string()])
    }
}

/// Terminates all RDP client processes. Returns whether any were running.
pub async fn run_close_rdp(ctx: &AppContext) -> anyhow::Result<bool> {
    let (program, args) = close_rdp_command();
    let output = tokio::process::Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("running {program}"))?;

    let closed = match output.status.code() {
        Some(0) => true,
        Some(NO_MATCH_EXIT_CODE) => false,
        _ => {
            let detail = format!(
                "{program} failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            ctx.report_error(format!("closing RDP sessions: {detail}"))
                .await;
            anyhow::bail!(detail);
        }
    };
    if closed {
        tracing::info!("closed running {RDP_CLIENT} sessions");
        println!("RDP sessions closed.");
    } else {
        tracing::info!("no {RDP_CLIENT} sessions to close");
        println!("No RDP sessions were open.");
    }
    Ok(closed)
}
