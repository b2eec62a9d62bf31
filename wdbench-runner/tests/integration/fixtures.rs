// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, WrapErr, eyre};
use indoc::{formatdoc, indoc};
use std::{
    sync::Once,
    time::{Duration, Instant},
};

/// Copies the source to the output, unless the source's first line is `nocompile`.
const FAKE_COMPILER: &str = indoc! {r#"
    #!/bin/sh
    if [ "$(head -n 1 "$1")" = "nocompile" ]; then
        echo "fake-cc: error: cannot compile $1" >&2
        exit 1
    fi
    cp "$1" "$2"
"#};

/// Always fails.
const FAKE_INSTRUMENTER: &str = indoc! {r#"
    #!/bin/sh
    echo "fake-opt: unsupported bitcode" >&2
    exit 2
"#};

/// Behaves according to the first line of its input:
///
/// * `ok`: writes the remaining lines as the result.
/// * `slow`: sleeps well past any test timeout.
/// * `garbage`: writes a result that isn't valid and exits with an error.
/// * `spawn`: starts a background `sleep`, records its pid in `<input>.pid` and waits for it.
/// * anything else: writes nothing.
const FAKE_ANALYZER: &str = indoc! {r#"
    #!/bin/sh
    echo "analyzer args: $*"
    input="$1"
    case "$(head -n 1 "$input")" in
        ok) tail -n +2 "$input" > "$input.result" ;;
        slow) sleep 30 ;;
        garbage) echo "Segmentation fault" > "$input.result"; exit 139 ;;
        spawn)
            sleep 30 &
            echo $! > "$input.pid.tmp"
            mv "$input.pid.tmp" "$input.pid"
            wait
            ;;
        *) ;;
    esac
"#};

/// Runs the fake tools through `/bin/sh`, so the scripts never need to be executed directly
/// right after being written.
pub(crate) fn default_test_config(root: &Utf8Path) -> String {
    formatdoc! {r#"
        [tools.compiler]
        program = "/bin/sh"
        args = ["{root}/bin/fake-cc", "{{input}}", "{{output}}"]

        [tools.instrumenter]
        program = "/bin/sh"
        args = ["{root}/bin/fake-opt", "{{input}}"]

        [tools.analyzer]
        program = "/bin/sh"
        args = ["{root}/bin/fake-analyzer", "{{input}}", "--max_disjunctions", "{{max-disjunctions}}"]

        [environment]
        library-dirs = ["lib"]
        "#,
        root = root,
    }
}

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        color_eyre::install().expect("color-eyre installed once");
    });
}

/// A scratch install root with fake tools, plus a `bench` directory for cases.
pub(crate) struct FakeInstall {
    dir: Utf8TempDir,
}

impl FakeInstall {
    pub(crate) fn new() -> Result<Self> {
        let dir = camino_tempfile::Builder::new()
            .prefix("wdbench-test-")
            .tempdir()
            .wrap_err("failed to create temp dir")?;
        let this = Self { dir };

        std::fs::create_dir_all(this.root().join("bin"))?;
        std::fs::create_dir_all(this.root().join("lib"))?;
        std::fs::create_dir_all(this.bench_dir())?;
        this.write_script("bin/fake-cc", FAKE_COMPILER)?;
        this.write_script("bin/fake-opt", FAKE_INSTRUMENTER)?;
        this.write_script("bin/fake-analyzer", FAKE_ANALYZER)?;
        this.write_config(&default_test_config(this.root()))?;
        Ok(this)
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(crate) fn bench_dir(&self) -> Utf8PathBuf {
        self.root().join("bench")
    }

    /// Writes `wdbench.toml` in the install root.
    pub(crate) fn write_config(&self, contents: &str) -> Result<Utf8PathBuf> {
        let path = self.root().join("wdbench.toml");
        std::fs::write(&path, contents).wrap_err_with(|| format!("failed to write {path}"))?;
        Ok(path)
    }

    /// Writes a case source under the bench directory.
    pub(crate) fn add_case(&self, name: &str, contents: &str) -> Result<Utf8PathBuf> {
        let path = self.bench_dir().join(name);
        std::fs::write(&path, contents).wrap_err_with(|| format!("failed to write {path}"))?;
        Ok(path)
    }

    /// Writes a list of entries, relative to the bench directory.
    pub(crate) fn write_list(&self, entries: &[&str]) -> Result<Utf8PathBuf> {
        let path = self.bench_dir().join("list.txt");
        let mut contents = entries.join("\n");
        contents.push('\n');
        std::fs::write(&path, contents).wrap_err_with(|| format!("failed to write {path}"))?;
        Ok(path)
    }

    fn write_script(&self, rel_path: &str, contents: &str) -> Result<()> {
        let path = self.root().join(rel_path);
        std::fs::write(&path, contents).wrap_err_with(|| format!("failed to write {path}"))?;
        Ok(())
    }
}

/// Strips the trailing elapsed-time cell from a case row, since timings vary between runs.
pub(crate) fn without_time(row: &str) -> &str {
    row.rsplit_once(" & ").map_or(row, |(cells, _)| cells)
}

/// Waits for the fake analyzer's `spawn` mode to record the pid of its background process.
pub(crate) fn wait_for_pid(pid_file: &Utf8Path, limit: Duration) -> Result<i32> {
    let start = Instant::now();
    loop {
        if let Ok(contents) = std::fs::read_to_string(pid_file) {
            return contents
                .trim()
                .parse()
                .wrap_err_with(|| format!("invalid pid in {pid_file}: {contents:?}"));
        }
        if start.elapsed() > limit {
            return Err(eyre!("{pid_file} not written within {limit:?}"));
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Returns true once `pid` has exited, polling for up to `limit`.
///
/// An orphan is reaped by init on its own schedule, so a zombie counts as exited.
pub(crate) fn wait_for_exit(pid: i32, limit: Duration) -> bool {
    let start = Instant::now();
    loop {
        if !is_running(pid) {
            return true;
        }
        if start.elapsed() > limit {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

fn is_running(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        // The state field follows the parenthesized command name.
        Ok(stat) => !stat
            .rsplit_once(") ")
            .is_some_and(|(_, rest)| rest.starts_with('Z')),
        // Without procfs, fall back to sending signal 0.
        Err(_) => unsafe { libc::kill(pid, 0) == 0 },
    }
}
