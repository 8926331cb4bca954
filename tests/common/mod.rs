#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use portage::config::PipelineConfig;
use portage::context::Context;
use portage::exec::{ExecOptions, Output, Runner, ToolCommand};
use portage::{Error, Result};

/// Records every invocation. `gatecheck bundle create` writes the bundle file
/// so later calls observe it as present; `--report-path` targets are written too.
#[derive(Default)]
pub struct RecordingRunner {
    lines: Mutex<Vec<String>>,
    dry_runs: Mutex<Vec<bool>>,
    failures: Vec<(String, i32)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, prefix: &str, code: i32) -> Self {
        self.failures.push((prefix.to_string(), code));
        self
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn all_dry_run(&self) -> bool {
        self.dry_runs.lock().unwrap().iter().all(|d| *d)
    }
}

impl Runner for RecordingRunner {
    fn run(&self, cmd: &ToolCommand, opts: ExecOptions) -> Result<()> {
        let line = cmd.display();
        self.lines.lock().unwrap().push(line.clone());
        self.dry_runs.lock().unwrap().push(opts.dry_run());

        if opts.dry_run() {
            return Ok(());
        }
        if let Some((_, code)) = self.failures.iter().find(|(p, _)| line.starts_with(p.as_str())) {
            return Err(Error::command_failed(cmd.name(), *code));
        }

        if cmd.program == "gatecheck" && cmd.args.len() > 2 && cmd.args[..2] == ["bundle", "create"] {
            std::fs::write(&cmd.args[2], b"bundle").unwrap();
        }
        if let Some(i) = cmd.args.iter().position(|a| a == "--report-path") {
            std::fs::write(&cmd.args[i + 1], b"{}").unwrap();
        }
        if let Output::File(path) = opts.stdout() {
            std::fs::write(path, b"{}").unwrap();
        }
        Ok(())
    }
}

pub fn context(runner: Arc<RecordingRunner>) -> Context {
    Context::new(runner).with_output(Output::Null, Output::Null)
}

pub fn scratch_config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        artifact_dir: dir.join("artifacts").to_string_lossy().into_owned(),
        ..PipelineConfig::default()
    }
}

#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Minimal HTTP/1.1 server answering each request with the status mapped to its path (200 otherwise).
pub struct WebhookServer {
    pub base_url: String,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl WebhookServer {
    pub fn start(statuses: Vec<(&'static str, u16)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let Some(request) = read_request(&mut stream) else { continue };
                let status = statuses
                    .iter()
                    .find(|(path, _)| *path == request.path)
                    .map(|(_, status)| *status)
                    .unwrap_or(200);
                sink.lock().unwrap().push(request);

                let body = if status < 300 { "ok" } else { "receiver exploded" };
                let response = format!(
                    "HTTP/1.1 {} Status\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        Self { base_url, received }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }
}

fn read_request(stream: &mut std::net::TcpStream) -> Option<ReceivedRequest> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let path = request_line.split_whitespace().nth(1)?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let header = |name: &str| {
        headers
            .iter()
            .find(|(k, _): &&(String, String)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    };

    let mut body = Vec::new();
    if let Some(length) = header("content-length").and_then(|v| v.parse::<usize>().ok()) {
        body.resize(length, 0);
        reader.read_exact(&mut body).ok()?;
    } else if header("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked")) {
        loop {
            let mut size_line = String::new();
            reader.read_line(&mut size_line).ok()?;
            let size = usize::from_str_radix(size_line.trim(), 16).ok()?;
            let mut chunk = vec![0; size + 2];
            reader.read_exact(&mut chunk).ok()?;
            if size == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    }

    Some(ReceivedRequest {
        path,
        headers,
        body,
    })
}

pub fn write_bundle(config: &PipelineConfig) -> PathBuf {
    std::fs::create_dir_all(&config.artifact_dir).unwrap();
    let bundle = config.bundle_path();
    std::fs::write(&bundle, b"bundle-bytes").unwrap();
    bundle
}
