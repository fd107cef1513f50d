//! Mock transfer tool binary for integration testing
//!
//! Plays both the transfer tool and the validator against `file://`
//! "remotes" so the harness can be exercised without any storage service.
//!
//! Transfer verbs: `copy`, `sleep`, `fail`. Validator verbs: `testBlob`,
//! `testFile`, `clean`. With `--output-type=json` every message is printed
//! as a pretty-printed envelope whose `MessageContent` is JSON text.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn main() {
    let invocation = Invocation::parse(std::env::args().skip(1));

    let code = match invocation.verb.as_str() {
        "copy" => copy(&invocation),
        "sleep" => sleep(&invocation),
        "fail" => fail(&invocation),
        "testBlob" | "testFile" => validate(&invocation),
        "clean" => clean(&invocation),
        other => {
            eprintln!("unknown verb '{}'", other);
            2
        }
    };

    std::process::exit(code);
}

struct Invocation {
    verb: String,
    args: Vec<String>,
    flags: HashMap<String, String>,
}

impl Invocation {
    fn parse(argv: impl Iterator<Item = String>) -> Self {
        let mut verb = String::new();
        let mut args = Vec::new();
        let mut flags = HashMap::new();

        for arg in argv {
            if let Some(flag) = arg.strip_prefix("--") {
                let (name, value) = flag.split_once('=').unwrap_or((flag, "true"));
                flags.insert(name.to_string(), value.to_string());
            } else if verb.is_empty() {
                verb = arg;
            } else {
                args.push(arg);
            }
        }

        Self { verb, args, flags }
    }

    fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    fn json(&self) -> bool {
        self.flag("output-type") == Some("json")
    }
}

/// `file:///a/b?sig=x` -> `/a/b`; plain paths pass through
fn to_path(location: &str) -> PathBuf {
    let without_query = location.split('?').next().unwrap_or(location);
    PathBuf::from(without_query.strip_prefix("file://").unwrap_or(without_query))
}

fn emit(json_mode: bool, message_type: &str, content: Value) {
    if !json_mode {
        return;
    }
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let envelope = json!({
        "TimeStamp": timestamp.to_string(),
        "MessageType": message_type,
        "MessageContent": content.to_string(),
    });
    let Ok(mut text) = serde_json::to_string_pretty(&envelope) else {
        return;
    };
    text.push('\n');

    // One write per envelope so nothing on stderr can land inside it
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush());
}

fn summary(job_id: &str, status: &str, completed: u64, failed: u64, bytes: u64) -> Value {
    json!({
        "JobID": job_id,
        "JobStatus": status,
        "TransfersCompleted": completed.to_string(),
        "TransfersFailed": failed.to_string(),
        "TransfersSkipped": "0",
        "TotalTransfers": (completed + failed).to_string(),
        "TotalBytesTransferred": bytes.to_string(),
        "PercentComplete": "100",
    })
}

fn copy(invocation: &Invocation) -> i32 {
    let json_mode = invocation.json();
    let job_id = format!("job-{}", std::process::id());

    match invocation.flag("from-to") {
        Some("PipeBlob") => return pipe_in(invocation),
        Some("BlobPipe") => return pipe_out(invocation),
        _ => {}
    }

    if invocation.args.len() != 2 {
        eprintln!("copy expects a source and a destination");
        return 1;
    }

    println!("INFO: Scanning...");
    emit(json_mode, "Init", json!({ "JobID": job_id }));

    let source = to_path(&invocation.args[0]);
    let destination = to_path(&invocation.args[1]);
    let recursive = invocation.flag("recursive") == Some("true");

    let mut files = Vec::new();
    if source.is_dir() {
        if !recursive {
            eprintln!("cannot copy a directory without --recursive=true");
            return 1;
        }
        let target = match source.file_name() {
            Some(name) => destination.join(name),
            None => destination.clone(),
        };
        collect_files(&source, &target, &mut files);
    } else {
        let target = if destination.is_dir() {
            destination.join(source.file_name().unwrap_or_default())
        } else {
            destination.clone()
        };
        files.push((source.clone(), target));
    }

    let (mut completed, mut failed, mut bytes) = (0, 0, 0);
    for (from, to) in &files {
        let result = to
            .parent()
            .map(fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|()| fs::copy(from, to));
        match result {
            Ok(n) => {
                completed += 1;
                bytes += n;
            }
            Err(e) => {
                eprintln!("failed to copy {}: {}", from.display(), e);
                failed += 1;
            }
        }
        emit(
            json_mode,
            "Progress",
            summary(&job_id, "InProgress", completed, failed, bytes),
        );
    }

    let status = if failed == 0 { "Completed" } else { "CompletedWithErrors" };
    emit(
        json_mode,
        "EndOfJob",
        summary(&job_id, status, completed, failed, bytes),
    );
    println!("Final Job Status: {}", status);

    if failed == 0 {
        0
    } else {
        1
    }
}

fn collect_files(dir: &Path, target: &Path, files: &mut Vec<(PathBuf, PathBuf)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let to = target.join(entry.file_name());
        if path.is_dir() {
            collect_files(&path, &to, files);
        } else {
            files.push((path, to));
        }
    }
}

/// Destination remote receives stdin
fn pipe_in(invocation: &Invocation) -> i32 {
    let Some(destination) = invocation.args.first().map(|a| to_path(a)) else {
        eprintln!("piped upload expects a destination");
        return 1;
    };
    let mut data = Vec::new();
    if let Err(e) = io::stdin().read_to_end(&mut data) {
        eprintln!("failed to read stdin: {}", e);
        return 1;
    }
    if let Some(parent) = destination.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match fs::write(&destination, &data) {
        Ok(()) => {
            eprintln!("uploaded {} bytes from stdin", data.len());
            0
        }
        Err(e) => {
            eprintln!("failed to write {}: {}", destination.display(), e);
            1
        }
    }
}

/// Source remote is written to stdout; diagnostics go to stderr
fn pipe_out(invocation: &Invocation) -> i32 {
    let Some(source) = invocation.args.first().map(|a| to_path(a)) else {
        eprintln!("piped download expects a source");
        return 1;
    };
    match fs::read(&source) {
        Ok(data) => {
            let mut stdout = io::stdout().lock();
            if stdout.write_all(&data).and_then(|()| stdout.flush()).is_err() {
                return 1;
            }
            eprintln!("downloaded {} bytes to stdout", data.len());
            0
        }
        Err(e) => {
            eprintln!("failed to read {}: {}", source.display(), e);
            1
        }
    }
}

fn sleep(invocation: &Invocation) -> i32 {
    let secs: u64 = invocation
        .args
        .first()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);
    println!("sleeping for {} seconds", secs);
    io::stdout().flush().ok();
    std::thread::sleep(Duration::from_secs(secs));
    0
}

fn fail(invocation: &Invocation) -> i32 {
    let code = invocation
        .args
        .first()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);
    let json_mode = invocation.json();
    emit(json_mode, "EndOfJob", summary("failed-job", "Failed", 0, 1, 0));
    eprintln!("failing with exit code {}", code);
    code
}

/// Compare a local file or directory with its remote copy
fn validate(invocation: &Invocation) -> i32 {
    if invocation.args.len() != 2 {
        eprintln!("{} expects a local path and a remote", invocation.verb);
        return 1;
    }
    let local = to_path(&invocation.args[0]);
    let remote = to_path(&invocation.args[1]);
    let is_dir = invocation.flag("is-object-dir") == Some("true");

    let matches = if is_dir {
        same_tree(&local, &remote)
    } else {
        same_file(&local, &remote)
    };

    if matches {
        println!("{} validation passed", invocation.verb);
        0
    } else {
        println!(
            "{} validation failed: {} does not match {}",
            invocation.verb,
            local.display(),
            remote.display()
        );
        1
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::read(a), fs::read(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn same_tree(a: &Path, b: &Path) -> bool {
    let names = |dir: &Path| -> Option<Vec<_>> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .ok()?
            .flatten()
            .map(|e| e.file_name())
            .collect();
        names.sort();
        Some(names)
    };
    match (names(a), names(b)) {
        (Some(left), Some(right)) if left == right => left.iter().all(|name| {
            let (x, y) = (a.join(name), b.join(name));
            if x.is_dir() {
                same_tree(&x, &y)
            } else {
                same_file(&x, &y)
            }
        }),
        _ => false,
    }
}

/// Empty the remote, creating it if needed
fn clean(invocation: &Invocation) -> i32 {
    let Some(remote) = invocation.args.first().map(|a| to_path(a)) else {
        eprintln!("clean expects a remote");
        return 1;
    };
    if invocation.flag("serviceType").is_none() || invocation.flag("resourceType").is_none() {
        eprintln!("clean requires --serviceType and --resourceType");
        return 1;
    }
    let _ = fs::remove_dir_all(&remote);
    match fs::create_dir_all(&remote) {
        Ok(()) => {
            println!("cleaned {}", remote.display());
            0
        }
        Err(e) => {
            eprintln!("failed to clean {}: {}", remote.display(), e);
            1
        }
    }
}
