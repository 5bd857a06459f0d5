// Dev launcher
// Runs `serve` as a child process and reports when /health starts answering


use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::FaqError;

pub const POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const HEALTH_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub port: u16,
    /// Report the /health status code instead of the plain ready line
    pub full_status: bool,
    /// Passed through to the child as `--config`
    pub config_path: Option<PathBuf>,
    /// Passed through to the child as `--reset`
    pub reset: bool,
}

#[inline]
pub fn health_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/health", port)
}

/// Agent used for readiness checks, with a short global timeout
#[inline]
pub fn health_agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(HEALTH_TIMEOUT))
        .build()
        .into()
}

/// Status code of a GET against `url`, or `None` if nothing answered
#[inline]
pub fn health_status(agent: &ureq::Agent, url: &str) -> Option<u16> {
    match agent.get(url).call() {
        Ok(resp) => Some(resp.status().as_u16()),
        Err(ureq::Error::StatusCode(status)) => Some(status),
        Err(e) => {
            debug!("Health check failed: {}", e);
            None
        }
    }
}

#[inline]
pub fn server_ready(agent: &ureq::Agent, url: &str) -> bool {
    health_status(agent, url) == Some(200)
}

#[inline]
pub fn ready_message(port: u16, elapsed: Duration, status: Option<u16>) -> String {
    let secs = elapsed.as_secs_f64();
    match status {
        Some(status) => format!(
            "✅  /health responded {} in {:.2}s (http://localhost:{})",
            status, secs, port
        ),
        None => format!("✅  Server ready in {:.2}s (http://localhost:{})", secs, port),
    }
}

fn boot_spinner() -> ProgressBar {
    if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Booting server…");
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    } else {
        ProgressBar::hidden()
    }
}

fn server_command(options: &LaunchOptions) -> Result<Command, FaqError> {
    let exe = std::env::current_exe()?;
    let mut command = Command::new(exe);
    if let Some(path) = &options.config_path {
        command.arg("--config").arg(path);
    }
    command
        .arg("serve")
        .arg("--port")
        .arg(options.port.to_string());
    if options.reset {
        command.arg("--reset");
    }
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    Ok(command)
}

/// Copy `stdout` into `out` and `stderr` into `err` until both streams close
#[inline]
pub fn tail_output<S, T, O, E>(
    stdout: Option<S>,
    stderr: Option<T>,
    out: &mut O,
    err: &mut E,
) -> io::Result<()>
where
    S: Read,
    T: Read + Send,
    O: Write,
    E: Write + Send,
{
    thread::scope(|scope| {
        let stderr_copy = stderr.map(|mut stream| scope.spawn(move || io::copy(&mut stream, err)));

        if let Some(mut stream) = stdout {
            io::copy(&mut stream, out)?;
        }
        if let Some(handle) = stderr_copy {
            handle
                .join()
                .map_err(|_| io::Error::other("stderr copy thread panicked"))??;
        }
        out.flush()
    })
}

/// Poll `url` until it answers 200, failing if `child` exits first
#[inline]
pub fn wait_until_ready(
    child: &mut Child,
    agent: &ureq::Agent,
    url: &str,
    bar: &ProgressBar,
) -> Result<(), FaqError> {
    loop {
        if server_ready(agent, url) {
            return Ok(());
        }
        if let Some(status) = child.try_wait()? {
            return Err(FaqError::Server(format!(
                "Server exited with {} before becoming ready",
                status
            )));
        }
        bar.tick();
        thread::sleep(POLL_INTERVAL);
    }
}

/// Start the server, wait for it, then stream its output until it exits
#[inline]
pub fn run_dev(options: &LaunchOptions) -> Result<(), FaqError> {
    let started = Instant::now();
    let mut child = server_command(options)?.spawn()?;
    info!("Spawned server process {}", child.id());

    // Forward output while the server boots, not only once it is ready
    let (stdout, stderr) = (child.stdout.take(), child.stderr.take());
    let forwarder =
        thread::spawn(move || tail_output(stdout, stderr, &mut io::stdout(), &mut io::stderr()));

    let agent = health_agent();
    let url = health_url(options.port);
    let bar = boot_spinner();

    if let Err(e) = wait_until_ready(&mut child, &agent, &url, &bar) {
        bar.abandon_with_message("Server failed to start");
        if matches!(child.try_wait(), Ok(Some(_))) {
            // Flush whatever the child printed before exiting
            let _ = forwarder.join();
        }
        return Err(e);
    }
    bar.finish_and_clear();

    let status = if options.full_status {
        health_status(&agent, &url)
    } else {
        None
    };
    println!("{}", ready_message(options.port, started.elapsed(), status));

    forwarder
        .join()
        .map_err(|_| FaqError::Server("Output forwarding thread panicked".to_string()))??;

    let exit = child.wait()?;
    if exit.success() {
        Ok(())
    } else {
        warn!("Server process exited with {}", exit);
        Err(FaqError::Server(format!("Server exited with {}", exit)))
    }
}
