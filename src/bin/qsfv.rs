// qsfv — verify and create checksum manifests (.sfv, .md5)

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, anyhow};

use qsfv::command_line::options_from_tokens;
use qsfv::digest::Digest;
use qsfv::hasher::{CpuFeatures, HasherOptions};
use qsfv::provider::{ChecksumProvider, Md5Provider, SfvProvider, find_provider_for};
use qsfv::scheduler::{
    CompletionStatus, CreateFromFolder, EventSink, OperationResults, OperationScheduler, Verify,
};

const TOOL_NAME: &str = "qsfv";
const VERSION: &str = env!("CARGO_PKG_VERSION");

struct Cli {
    files: Vec<String>,
    out_file: Option<String>,
    create_folder: Option<String>,
}

fn parse_args() -> Cli {
    let mut tokens = Vec::new();
    let mut create_folder = None;

    let mut args = std::env::args().skip(1);
    #[allow(clippy::while_let_on_iterator)]
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--" => {
                tokens.extend(args.by_ref());
                break;
            }
            "--help" => {
                print!(
                    "Usage: {} [TOKEN]... FILE...\n\
                     Verify checksum manifests, or create one from a folder.\n\n\
                     \x20 FILE             manifest to verify (.sfv, .md5)\n\
                     \x20 DOALL            accepted and ignored (compatibility)\n\
                     \x20 OUTPUT:<path>    write results of the first FILE to <path>\n\
                     \x20 CREATE:<folder>  hash <folder> and write the manifest to FILE\n\n\
                     \x20     --help       display this help and exit\n\
                     \x20     --version    output version information and exit\n",
                    TOOL_NAME
                );
                process::exit(0);
            }
            "--version" => {
                println!("{} {}", TOOL_NAME, VERSION);
                process::exit(0);
            }
            _ => {
                if let Some(folder) = arg.strip_prefix("CREATE:") {
                    create_folder = Some(folder.to_owned());
                } else {
                    tokens.push(arg);
                }
            }
        }
    }

    let opts = options_from_tokens(tokens);
    Cli {
        files: opts.files_to_check,
        out_file: opts.out_file,
        create_folder,
    }
}

/// Prints per-file results as they arrive and tracks the final counters.
struct ConsoleSink {
    out: Mutex<Box<dyn Write + Send>>,
    finished: AtomicBool,
    bad_or_missing: AtomicU32,
    errored: AtomicBool,
}

impl ConsoleSink {
    fn new(out: Box<dyn Write + Send>) -> ConsoleSink {
        ConsoleSink {
            out: Mutex::new(out),
            finished: AtomicBool::new(false),
            bad_or_missing: AtomicU32::new(0),
            errored: AtomicBool::new(false),
        }
    }

    fn write_line(&self, line: &str) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if writeln!(out, "{}", line).is_err() {
            process::exit(1);
        }
    }
}

impl EventSink for ConsoleSink {
    fn on_operation_started(&self, _n_files: u32) {}

    fn on_file_started(&self, _file: &str, _absolute_file_path: &str) {}

    fn on_progress(&self, _percentage: u32, _bandwidth_mib_s: u32) {}

    fn on_file_completed(
        &self,
        file: &str,
        checksum: &Digest,
        _absolute_file_path: &str,
        status: CompletionStatus,
    ) {
        match status {
            CompletionStatus::Ok => self.write_line(&format!("{}: OK", file)),
            CompletionStatus::Bad => {
                self.bad_or_missing.fetch_add(1, Ordering::Relaxed);
                if checksum.is_empty() {
                    self.write_line(&format!("{}: BAD", file));
                } else {
                    self.write_line(&format!("{}: BAD (found {})", file, checksum));
                }
            }
            CompletionStatus::Missing => {
                self.bad_or_missing.fetch_add(1, Ordering::Relaxed);
                self.write_line(&format!("{}: MISSING", file));
            }
        }
    }

    fn on_operation_completed(&self, results: OperationResults) {
        self.write_line(&format!(
            "{} file(s): {} ok, {} bad, {} missing",
            results.total, results.ok, results.bad, results.missing
        ));
        self.finished.store(true, Ordering::SeqCst);
    }

    fn on_canceled(&self) {
        self.write_line("operation canceled");
        self.finished.store(true, Ordering::SeqCst);
    }

    fn on_error(&self, error: &qsfv::Error, msg: &str) {
        eprintln!("{}: error {}: {}", TOOL_NAME, error.code(), msg);
        self.errored.store(true, Ordering::SeqCst);
        self.finished.store(true, Ordering::SeqCst);
    }
}

fn drive_to_completion(scheduler: &OperationScheduler, sink: &ConsoleSink) {
    while !sink.finished.load(Ordering::SeqCst) {
        scheduler.wait_for_events(Duration::from_millis(100));
        scheduler.run();
    }
    // pick up anything emitted between the flag flip and now
    scheduler.run();
}

fn run() -> anyhow::Result<i32> {
    let cli = parse_args();
    if cli.files.is_empty() {
        return Err(anyhow!("no files given; try '{} --help'", TOOL_NAME));
    }

    let providers: Vec<Arc<dyn ChecksumProvider>> =
        vec![Arc::new(SfvProvider::new()), Arc::new(Md5Provider::new())];
    let options = HasherOptions::from(CpuFeatures::detect());

    let mut scheduler = OperationScheduler::new();
    scheduler.start().context("failed to start scheduler")?;

    let mut exit_code = 0;
    for file in &cli.files {
        let path = PathBuf::from(file);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let provider = find_provider_for(&providers, &file_name)
            .with_context(|| format!("{}: no provider for this file format", file))?;

        let out: Box<dyn Write + Send> = match &cli.out_file {
            Some(out_path) => Box::new(
                std::fs::File::create(Path::new(out_path))
                    .with_context(|| format!("cannot create output file {}", out_path))?,
            ),
            None => Box::new(std::io::stdout()),
        };
        let sink = Arc::new(ConsoleSink::new(out));

        if let Some(folder) = &cli.create_folder {
            scheduler.post_create_from_folder(CreateFromFolder {
                event_sink: Arc::clone(&sink) as Arc<dyn EventSink>,
                provider: Arc::clone(provider),
                options,
                target_file: path.clone(),
                folder_path: PathBuf::from(folder),
            })?;
        } else {
            scheduler.post_verify(Verify {
                event_sink: Arc::clone(&sink) as Arc<dyn EventSink>,
                provider: Arc::clone(provider),
                options,
                source_file: path.clone(),
            })?;
        }
        drive_to_completion(&scheduler, &sink);

        if sink.errored.load(Ordering::SeqCst) || sink.bad_or_missing.load(Ordering::SeqCst) > 0
        {
            exit_code = 1;
        }
    }
    scheduler.shutdown();
    Ok(exit_code)
}

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", TOOL_NAME, e);
            process::exit(1);
        }
    }
}
