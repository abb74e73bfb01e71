use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use tempfile::TempDir;

const CALLS_FILE: &str = "calls";
const STDIN_FILE: &str = "stdin";

/// Executable shell script standing in for an HTCondor tool.
///
/// Every invocation appends its arguments (joined by spaces) as one line into a `calls` file,
/// then runs `body`. The body can use `$FAKE_DIR` to store additional data, e.g.
/// `cat > "$FAKE_DIR/stdin"` to record its input.
pub struct FakeProgram {
    dir: TempDir,
    path: PathBuf,
}

impl FakeProgram {
    pub fn new(body: &str) -> Self {
        let dir = TempDir::with_prefix("annex-provisioner").unwrap();
        let path = dir.path().join("program.sh");
        let script = format!(
            "#!/bin/sh\nFAKE_DIR=\"{}\"\necho \"$@\" >> \"$FAKE_DIR/{CALLS_FILE}\"\n{body}\n",
            dir.path().display()
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, path }
    }

    pub fn program(&self) -> String {
        self.path.display().to_string()
    }

    /// Arguments of all invocations so far.
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join(CALLS_FILE))
            .map(|content| content.lines().map(|line| line.to_string()).collect())
            .unwrap_or_default()
    }

    /// Input recorded by a body that stores its stdin with `cat > "$FAKE_DIR/stdin"`.
    pub fn stdin(&self) -> String {
        std::fs::read_to_string(self.dir.path().join(STDIN_FILE)).unwrap()
    }
}
