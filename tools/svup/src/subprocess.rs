use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::error::ProvisionError;

/// Runs `command` to completion, optionally feeding `stdin` to it.
///
/// Stdout is collected and returned so callers can parse results out of it. With `with_logs` it
/// is also forwarded line by line prefixed with `name` so the operator can follow long running
/// tools. Stderr is always forwarded.
pub async fn run_subprocess(
    name: &'static str,
    mut command: Command,
    stdin: Option<String>,
    with_logs: bool,
) -> anyhow::Result<String> {
    let std_command = command.as_std();
    // Only program and arguments, the environment carries credentials
    tracing::debug!(
        "Running {name}: {:?} {:?}",
        std_command.get_program(),
        std_command.get_args().collect::<Vec<_>>()
    );

    let mut child = command
        .kill_on_drop(true)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| anyhow::anyhow!("Failed to start {name}: {e}"))?;

    if let (Some(input), Some(mut child_stdin)) = (stdin, child.stdin.take()) {
        // Written from a task so a chatty child can't fill its stdout pipe while we block here.
        // The pipe is closed when `child_stdin` drops at the end of the task.
        tokio::spawn(async move {
            if let Err(e) = child_stdin.write_all(input.as_bytes()).await {
                tracing::warn!("Failed to write stdin of {name}: {e}");
            }
        });
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to capture stdout of {name}"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to capture stderr of {name}"))?;

    let stderr_task = tokio::spawn(async move {
        let mut last_line = String::new();

        for_each_line(name, stderr, |line| {
            eprintln!("{name} stderr: {line}");
            if !line.trim().is_empty() {
                last_line = line;
            }
        })
        .await;

        last_line
    });

    let mut output = String::new();
    for_each_line(name, stdout, |line| {
        if with_logs {
            println!("{name} stdout: {line}");
        }
        output.push_str(&line);
        output.push('\n');
    })
    .await;

    let status = child.wait().await?;
    let stderr = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(ProvisionError::Subprocess {
            name,
            status,
            stderr,
        }
        .into());
    }

    Ok(output)
}

/// Reads `reader` to EOF, one line at a time. Lines are decoded lossily so invalid UTF-8 never
/// stops a pipe from being drained.
async fn for_each_line<R: AsyncRead + Unpin>(
    name: &'static str,
    reader: R,
    mut on_line: impl FnMut(String),
) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => return,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(['\n', '\r']).to_string());
            }
            Err(e) => {
                tracing::warn!("Failed to read output of {name}: {e}");
                return;
            }
        }
    }
}
