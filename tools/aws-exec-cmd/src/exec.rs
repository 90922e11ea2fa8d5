/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use anyhow::{bail, Context, Result};
use aws_exec_auth_providers::environment::{
    ENV_VAR_ACCESS_KEY_ID, ENV_VAR_SECRET_ACCESS_KEY, ENV_VAR_SESSION_TOKEN,
};
use aws_exec_credential_types::Credentials;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use std::io;
use std::io::{Read, Write};
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Command;

/// Run `command` with `credentials` added to the inherited environment and return its exit code
///
/// The command shares this process's stdin, stdout, and stderr. With a `timeout`, a command still
/// running when it expires is killed.
pub async fn run_with_credentials(
    command: &[String],
    credentials: &Credentials,
    timeout: Option<Duration>,
) -> Result<i32> {
    let (program, args) = command.split_first().context("command not specified")?;

    let mut child_command = Command::new(program);
    child_command
        .args(args)
        .env(ENV_VAR_ACCESS_KEY_ID, credentials.access_key_id())
        .env(ENV_VAR_SECRET_ACCESS_KEY, credentials.secret_access_key())
        .kill_on_drop(true);
    match credentials.session_token() {
        Some(token) => child_command.env(ENV_VAR_SESSION_TOKEN, token),
        // an inherited token would not match the new key pair
        None => child_command.env_remove(ENV_VAR_SESSION_TOKEN),
    };

    let mut child = child_command
        .spawn()
        .with_context(|| format!("failed to start command [{}]", program))?;
    tracing::debug!(program = %program, pid = ?child.id(), "started command");

    let status = match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status,
            Err(_elapsed) => {
                child
                    .kill()
                    .await
                    .with_context(|| format!("failed to kill command [{}]", program))?;
                bail!(
                    "command [{}] did not finish within {} seconds",
                    program,
                    timeout.as_secs_f64()
                );
            }
        },
        None => child.wait().await,
    }
    .with_context(|| format!("failed to wait for command [{}]", program))?;

    Ok(exit_code(status))
}

/// Run `command` in a pseudo-terminal with `credentials` added to the inherited environment
///
/// Terminal output is copied to stdout and stdin is forwarded to the terminal. There is no
/// timeout in this mode.
pub async fn run_in_pty(command: &[String], credentials: &Credentials) -> Result<i32> {
    let command = command.to_vec();
    let credentials = credentials.clone();
    tokio::task::spawn_blocking(move || {
        let stdin: Box<dyn Read + Send> = Box::new(io::stdin());
        run_pty_session(&command, &credentials, Some(stdin), io::stdout())
            .map(|(code, _stdout)| code)
    })
    .await
    .context("pseudo-terminal session panicked")?
}

/// Blocking pseudo-terminal session. Returns the exit code and `output` once the command has
/// exited and its terminal output is drained.
fn run_pty_session<W>(
    command: &[String],
    credentials: &Credentials,
    input: Option<Box<dyn Read + Send>>,
    output: W,
) -> Result<(i32, W)>
where
    W: Write + Send + 'static,
{
    let (program, args) = command.split_first().context("command not specified")?;

    let mut child_command = CommandBuilder::new(program);
    child_command.args(args);
    child_command.cwd(std::env::current_dir().context("failed to read working directory")?);
    child_command.env(ENV_VAR_ACCESS_KEY_ID, credentials.access_key_id());
    child_command.env(ENV_VAR_SECRET_ACCESS_KEY, credentials.secret_access_key());
    match credentials.session_token() {
        Some(token) => child_command.env(ENV_VAR_SESSION_TOKEN, token),
        None => child_command.env_remove(ENV_VAR_SESSION_TOKEN),
    }

    let pair = native_pty_system()
        .openpty(PtySize::default())
        .context("failed to open a pseudo-terminal")?;
    let mut child = pair
        .slave
        .spawn_command(child_command)
        .with_context(|| format!("failed to start command [{}]", program))?;
    // the child holds the only slave handle, so reads end once it exits
    drop(pair.slave);
    tracing::debug!(program = %program, pid = ?child.process_id(), "started command in pseudo-terminal");

    let mut reader = pair
        .master
        .try_clone_reader()
        .context("failed to read from the pseudo-terminal")?;
    let copy_output = std::thread::spawn(move || {
        let mut output = output;
        // linux reports EIO on the master once the slave side is closed
        let _ = io::copy(&mut reader, &mut output);
        let _ = output.flush();
        output
    });
    if let Some(mut input) = input {
        let mut writer = pair
            .master
            .take_writer()
            .context("failed to write to the pseudo-terminal")?;
        // detached: a read from stdin may block past the end of the session
        std::thread::spawn(move || {
            let _ = io::copy(&mut input, &mut writer);
        });
    }

    let status = child
        .wait()
        .with_context(|| format!("failed to wait for command [{}]", program))?;
    let output = copy_output
        .join()
        .map_err(|_| anyhow::anyhow!("pseudo-terminal output copy panicked"))?;
    drop(pair.master);

    Ok((i32::try_from(status.exit_code()).unwrap_or(1), output))
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[cfg(all(test, unix))]
mod test {
    use super::*;

    fn credentials(token: Option<&str>) -> Credentials {
        Credentials::new(
            "ASIAEXEC",
            "exec-secret",
            token.map(str::to_string),
            None,
            "test",
        )
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn credentials_are_in_child_environment() {
        let script = r#"[ "$AWS_ACCESS_KEY_ID" = ASIAEXEC ] && [ "$AWS_SECRET_ACCESS_KEY" = exec-secret ] && [ "$AWS_SESSION_TOKEN" = exec-token ] && exit 7"#;
        let code = run_with_credentials(&sh(script), &credentials(Some("exec-token")), None)
            .await
            .unwrap();
        assert_eq!(code, 7);
    }

    #[tokio::test]
    async fn session_token_is_unset_without_token() {
        let code = run_with_credentials(
            &sh(r#"[ -z "${AWS_SESSION_TOKEN+set}" ]"#),
            &credentials(None),
            None,
        )
        .await
        .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn exit_code_is_propagated() {
        let code = run_with_credentials(&sh("exit 42"), &credentials(None), None)
            .await
            .unwrap();
        assert_eq!(code, 42);
    }

    #[tokio::test]
    async fn slow_command_is_killed() {
        let err = run_with_credentials(
            &sh("sleep 5"),
            &credentials(None),
            Some(Duration::from_millis(100)),
        )
        .await
        .expect_err("timeout");
        assert!(err.to_string().contains("did not finish"));
    }

    #[test]
    fn pty_session_sees_credentials() {
        let (code, output) = run_pty_session(
            &sh(r#"printf '%s:%s' "$AWS_ACCESS_KEY_ID" "${AWS_SESSION_TOKEN-unset}"; exit 3"#),
            &credentials(None),
            None,
            Vec::new(),
        )
        .unwrap();
        assert_eq!(code, 3);
        let output = String::from_utf8_lossy(&output);
        assert!(output.contains("ASIAEXEC:unset"), "{}", output);
    }

    #[test]
    fn pty_session_runs_on_a_terminal() {
        let (code, _output) = run_pty_session(
            &sh("[ -t 0 ] && [ -t 1 ]"),
            &credentials(Some("exec-token")),
            None,
            Vec::new(),
        )
        .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn pty_session_requires_a_command() {
        let err = run_pty_session(&[], &credentials(None), None, Vec::new())
            .expect_err("no command");
        assert_eq!(err.to_string(), "command not specified");
    }

    #[tokio::test]
    async fn missing_command() {
        let err = run_with_credentials(&[], &credentials(None), None)
            .await
            .expect_err("no command");
        assert_eq!(err.to_string(), "command not specified");

        let err = run_with_credentials(
            &["/nonexistent/aws-exec-cmd-test".to_string()],
            &credentials(None),
            None,
        )
        .await
        .expect_err("missing program");
        assert!(err.to_string().contains("failed to start command"));
    }
}
