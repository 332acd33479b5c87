//! Shared test fixtures.
//!
//! `setup_test_paths` builds a `Paths` rooted in a temp directory, and
//! `FakeRunner` is the deterministic stand-in for every external binary so
//! tests never touch ssh-keygen, ssh-agent, or git.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::exec::{CommandRunner, Output};
use crate::paths::Paths;
use crate::ui::{ColorMode, Ui};

pub fn test_ui() -> Ui {
    Ui::new(ColorMode::Never, false)
}

/// A `Paths` mirroring the real ~/.mgit and ~/.ssh layout inside a TempDir
pub fn setup_test_paths(temp_dir: &TempDir) -> Paths {
    Paths {
        config_dir: temp_dir.path().join(".mgit"),
        store_file: temp_dir.path().join(".mgit/config.json"),
        ssh_dir: temp_dir.path().join(".ssh"),
        ssh_config: temp_dir.path().join(".ssh/config"),
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

type Handler = Box<dyn Fn(&[String]) -> Output>;

/// Records every invocation and answers from per-program scripted handlers.
/// Programs without a handler succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    calls: RefCell<Vec<RecordedCall>>,
    handlers: RefCell<HashMap<String, Handler>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for one program.
    pub fn on(&self, program: &str, handler: impl Fn(&[String]) -> Output + 'static) {
        self.handlers
            .borrow_mut()
            .insert(program.to_string(), Box::new(handler));
    }

    /// Argument lists of every recorded call to `program`, in order.
    pub fn calls_for(&self, program: &str) -> Vec<Vec<String>> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.program == program)
            .map(|c| c.args.clone())
            .collect()
    }

    pub fn all_calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> crate::errors::Result<Output> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.calls.borrow_mut().push(RecordedCall {
            program: program.to_string(),
            args: args.clone(),
            cwd: cwd.map(Path::to_path_buf),
        });

        let handlers = self.handlers.borrow();
        Ok(match handlers.get(program) {
            Some(handler) => handler(&args),
            None => Output::default(),
        })
    }
}
