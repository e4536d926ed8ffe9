//! Process wrapper for the OpenACR command-line tools (acr, acr_ed, amc, abt).
//!
//! Every command runs with the active work directory as cwd and with
//! `<openacr>/bin` prepended to the child's `PATH`, so sub-commands spawned by
//! `acr_ed` (acr_in, amc_vis, acr) resolve by name. The parent's environment
//! is left alone.

use crate::error::ClientError;
use acr_syntax::{parse_tuple_output, Record};
use serde_json::{json, Value};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
const EDIT_TIMEOUT: Duration = Duration::from_secs(60);
const AMC_TIMEOUT: Duration = Duration::from_secs(120);
const ABT_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of one toolchain command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcrResult {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
    /// Parsed ssim records from stdout; filled only when `ok`.
    pub records: Vec<Record>,
}

impl AcrResult {
    /// A command that never produced an exit status.
    pub fn failure(err: &ClientError) -> Self {
        Self {
            ok: false,
            stderr: err.to_string(),
            returncode: -1,
            ..Default::default()
        }
    }

    /// JSON shape returned to agents.
    pub fn to_json(&self) -> Value {
        if self.ok {
            return json!({
                "ok": true,
                "records": self.records,
                "count": self.records.len(),
            });
        }
        let stderr = self.stderr.trim();
        let error = if stderr.is_empty() {
            format!("Command failed with exit code {}", self.returncode)
        } else {
            stderr.to_string()
        };
        json!({
            "ok": false,
            "error": error,
            "stderr": stderr,
        })
    }
}

/// Client for one OpenACR installation.
#[derive(Debug, Clone)]
pub struct AcrClient {
    openacr_dir: PathBuf,
    bin_dir: PathBuf,
    project_dir: Option<PathBuf>,
}

impl AcrClient {
    /// Fails when `<openacr_dir>/bin` does not exist.
    pub fn new(openacr_dir: impl AsRef<Path>) -> Result<Self, ClientError> {
        let openacr_dir = std::path::absolute(openacr_dir.as_ref())?;
        let bin_dir = openacr_dir.join("bin");
        if !bin_dir.is_dir() {
            return Err(ClientError::BinDirMissing(bin_dir));
        }
        Ok(Self {
            openacr_dir,
            bin_dir,
            project_dir: None,
        })
    }

    pub fn openacr_dir(&self) -> &Path {
        &self.openacr_dir
    }

    /// Directory commands run in: the active project, else the installation.
    pub fn work_dir(&self) -> &Path {
        self.project_dir.as_deref().unwrap_or(&self.openacr_dir)
    }

    /// Switch to a standalone project directory, or back to the installation
    /// with `None`. A project needs `data/dmmeta/` and `bin/`.
    pub fn set_work_dir(&mut self, dir: Option<&Path>) -> Result<&Path, ClientError> {
        let Some(dir) = dir else {
            self.project_dir = None;
            return Ok(self.work_dir());
        };
        let dir = std::path::absolute(dir)?;
        if !dir.join("data").join("dmmeta").is_dir() {
            return Err(ClientError::InvalidProject {
                dir,
                missing: "data/dmmeta",
            });
        }
        if !dir.join("bin").exists() {
            return Err(ClientError::InvalidProject { dir, missing: "bin/" });
        }
        tracing::info!(project = %dir.display(), "switched project");
        self.project_dir = Some(dir);
        Ok(self.work_dir())
    }

    // -- acr queries ---------------------------------------------------------

    /// `acr <pattern> [-t]`
    pub async fn acr(&self, pattern: &str, tree: bool) -> AcrResult {
        let mut args = vec!["acr", pattern];
        if tree {
            args.push("-t");
        }
        self.run(&args, QUERY_TIMEOUT).await
    }

    /// `acr -insert -write` with the record on stdin.
    pub async fn acr_insert(&self, line: &str) -> AcrResult {
        let input = format!("{line}\n");
        self.run_with_input(&["acr", "-insert", "-write"], Some(&input), QUERY_TIMEOUT)
            .await
    }

    /// `acr -del -write <pattern>`
    pub async fn acr_delete(&self, pattern: &str) -> AcrResult {
        self.run(&["acr", "-del", "-write", pattern], QUERY_TIMEOUT)
            .await
    }

    /// `acr <pattern> -ndown <n>`: records that depend on the match.
    pub async fn acr_ndown(&self, pattern: &str, levels: u32) -> AcrResult {
        let n = levels.to_string();
        self.run(&["acr", pattern, "-ndown", &n], EDIT_TIMEOUT).await
    }

    /// `acr <pattern> -nup <n>`: records the match refers to.
    pub async fn acr_nup(&self, pattern: &str, levels: u32) -> AcrResult {
        let n = levels.to_string();
        self.run(&["acr", pattern, "-nup", &n], EDIT_TIMEOUT).await
    }

    /// `acr -merge -write` with the record on stdin: updates the changed
    /// attributes, or inserts when the key is new.
    pub async fn acr_merge(&self, line: &str) -> AcrResult {
        let input = format!("{line}\n");
        self.run_with_input(&["acr", "-merge", "-write"], Some(&input), QUERY_TIMEOUT)
            .await
    }

    /// `acr <pattern> -meta`: the ctype and field records describing the match.
    pub async fn acr_meta(&self, pattern: &str) -> AcrResult {
        self.run(&["acr", pattern, "-meta"], QUERY_TIMEOUT).await
    }

    /// `acr <pattern> -field <a,b,...>`: print only the listed attributes.
    pub async fn acr_select_fields(&self, pattern: &str, fields: &[String]) -> AcrResult {
        let fields = fields.join(",");
        self.run(&["acr", pattern, "-field", &fields], QUERY_TIMEOUT)
            .await
    }

    pub async fn acr_unused(&self, pattern: &str) -> AcrResult {
        self.run(&["acr", pattern, "-unused"], EDIT_TIMEOUT).await
    }

    /// Referential integrity check; errors come back on stderr.
    pub async fn acr_check(&self, pattern: &str) -> AcrResult {
        self.run(&["acr", pattern, "-check"], EDIT_TIMEOUT).await
    }

    // -- acr_ed ----------------------------------------------------------------

    /// `acr_ed <args> -write`
    pub async fn acr_ed(&self, args: &[&str]) -> AcrResult {
        let mut argv = Vec::with_capacity(args.len() + 2);
        argv.push("acr_ed");
        argv.extend_from_slice(args);
        argv.push("-write");
        self.run(&argv, EDIT_TIMEOUT).await
    }

    /// `acr_ed -create <args> -write`
    pub async fn acr_ed_create(&self, args: &[&str]) -> AcrResult {
        let mut argv = vec!["-create"];
        argv.extend_from_slice(args);
        self.acr_ed(&argv).await
    }

    /// New namespace; `nstype` is one of ssimdb, exe, lib, protocol.
    pub async fn acr_ed_create_target(&self, name: &str, nstype: &str, comment: &str) -> AcrResult {
        let mut args = vec!["-target", name, "-nstype", nstype];
        if !comment.is_empty() {
            args.extend(["-comment", comment]);
        }
        self.acr_ed_create(&args).await
    }

    /// Rename a record and every reference to it.
    pub async fn acr_ed_rename(&self, old: &str, new: &str) -> AcrResult {
        self.acr_ed(&["-rename", old, new]).await
    }

    /// Delete a ctype with its fields, ssimfile, cfmt and other dependents.
    pub async fn acr_ed_delete_ctype(&self, ctype: &str) -> AcrResult {
        self.acr_ed(&["-del", "-ctype", ctype]).await
    }

    pub async fn acr_ed_delete_field(&self, field: &str) -> AcrResult {
        self.acr_ed(&["-del", "-field", field]).await
    }

    /// Delete a namespace and everything it owns, sources included.
    pub async fn acr_ed_delete_target(&self, target: &str) -> AcrResult {
        self.acr_ed(&["-del", "-target", target]).await
    }

    // -- code generation and build -------------------------------------------

    /// `amc [namespace]`
    pub async fn amc(&self, namespace: &str) -> AcrResult {
        let mut args = vec!["amc"];
        if !namespace.is_empty() {
            args.push(namespace);
        }
        self.run(&args, AMC_TIMEOUT).await
    }

    /// `abt <target>`
    pub async fn abt(&self, target: &str) -> AcrResult {
        self.run(&["abt", target], ABT_TIMEOUT).await
    }

    /// `acr_in <target>`: every ssimfile the target loads, transitively.
    pub async fn acr_in(&self, target: &str) -> AcrResult {
        self.run(&["acr_in", target], QUERY_TIMEOUT).await
    }

    /// `amc_vis <ctype>`: ASCII diagram of a ctype and its references.
    pub async fn amc_vis(&self, ctype: &str) -> AcrResult {
        self.run(&["amc_vis", ctype], QUERY_TIMEOUT).await
    }

    // -- convenience ---------------------------------------------------------

    pub async fn list_namespaces(&self) -> AcrResult {
        self.acr("dmmeta.ns:%", false).await
    }

    pub async fn list_ctypes(&self, namespace: &str) -> AcrResult {
        self.acr(&format!("dmmeta.ctype:{namespace}.%"), false).await
    }

    pub async fn list_fields(&self, ctype: &str) -> AcrResult {
        self.acr(&format!("dmmeta.field:{ctype}.%"), false).await
    }

    /// Ctype with its full cross-reference tree.
    pub async fn get_ctype(&self, ctype: &str) -> AcrResult {
        self.acr(&format!("dmmeta.ctype:{ctype}"), true).await
    }

    /// The nstype of a namespace (`ssimdb`, `exe`, ...), if it exists.
    pub async fn get_ns_type(&self, namespace: &str) -> Option<String> {
        let result = self.acr(&format!("dmmeta.ns:{namespace}"), false).await;
        if !result.ok {
            return None;
        }
        result.records.into_iter().next()?.remove("nstype")
    }

    // -- process plumbing ----------------------------------------------------

    pub async fn run(&self, args: &[&str], timeout: Duration) -> AcrResult {
        self.run_with_input(args, None, timeout).await
    }

    /// Run `args`, feed `input` on stdin, and parse stdout on success.
    pub async fn run_with_input(
        &self,
        args: &[&str],
        input: Option<&str>,
        timeout: Duration,
    ) -> AcrResult {
        match self.spawn(args, input, timeout).await {
            Ok(output) => {
                let returncode = output.status.code().unwrap_or(-1);
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                let ok = output.status.success();
                let records = if ok {
                    parse_tuple_output(&stdout)
                } else {
                    Vec::new()
                };
                tracing::debug!(
                    command = args.join(" "),
                    returncode,
                    records = records.len(),
                    "command finished"
                );
                AcrResult {
                    ok,
                    stdout,
                    stderr,
                    returncode,
                    records,
                }
            }
            Err(err) => {
                tracing::warn!(command = args.join(" "), error = %err, "command failed");
                AcrResult::failure(&err)
            }
        }
    }

    async fn spawn(
        &self,
        args: &[&str],
        input: Option<&str>,
        timeout: Duration,
    ) -> Result<std::process::Output, ClientError> {
        let (program, rest) = args.split_first().ok_or_else(|| ClientError::CommandNotFound {
            program: String::new(),
        })?;

        let mut child = Command::new(self.resolve(program))
            .args(rest)
            .current_dir(self.work_dir())
            .env("PATH", self.child_path())
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => ClientError::CommandNotFound {
                    program: program.to_string(),
                },
                _ => ClientError::Io(err),
            })?;

        // The stdin write counts against the deadline too.
        let stdin = child.stdin.take();
        let finished = async move {
            if let (Some(input), Some(mut stdin)) = (input, stdin) {
                match stdin.write_all(input.as_bytes()).await {
                    // exited without reading everything; the exit status tells the rest
                    Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
                    other => other?,
                }
            }
            child.wait_with_output().await
        };

        match tokio::time::timeout(timeout, finished).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(ClientError::Timeout {
                program: program.to_string(),
                secs: timeout.as_secs(),
            }),
        }
    }

    /// Toolchain binaries live in `bin/`; anything else goes through `PATH`.
    fn resolve(&self, program: &str) -> PathBuf {
        let candidate = self.bin_dir.join(program);
        if candidate.is_file() {
            candidate
        } else {
            PathBuf::from(program)
        }
    }

    fn child_path(&self) -> OsString {
        let mut paths = vec![self.bin_dir.clone()];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        std::env::join_paths(paths).unwrap_or_else(|_| self.bin_dir.clone().into_os_string())
    }
}
