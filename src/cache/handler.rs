//! Compiler/codec collaborators
//!
//! The cache never compiles anything itself. Each artifact kind supplies a
//! [`Handler`] that turns source text into storable bytes and stored bytes
//! back into an output value.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use crate::error::{Corrupt, Uncompilable};

/// The three collaborator primitives for one artifact kind
pub trait Handler {
    type Output;

    /// Source text to storable bytes. Errors propagate to the caller and are never cached.
    fn compile(&self, source: &[u8], path: &Path) -> Result<Vec<u8>, Uncompilable>;

    /// Stored bytes back to a value. `Corrupt` makes the cache recompile.
    fn deserialize(&self, storage: &[u8]) -> Result<Self::Output, Corrupt>;

    /// Produce the value without going through storage
    fn direct(&self, source: &[u8], path: &Path) -> Result<Self::Output, Uncompilable>;
}

impl<H: Handler + ?Sized> Handler for &H {
    type Output = H::Output;

    fn compile(&self, source: &[u8], path: &Path) -> Result<Vec<u8>, Uncompilable> {
        (**self).compile(source, path)
    }

    fn deserialize(&self, storage: &[u8]) -> Result<Self::Output, Corrupt> {
        (**self).deserialize(storage)
    }

    fn direct(&self, source: &[u8], path: &Path) -> Result<Self::Output, Uncompilable> {
        (**self).direct(source, path)
    }
}

/// Parses JSON; stores compact JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHandler;

impl Handler for JsonHandler {
    type Output = serde_json::Value;

    fn compile(&self, source: &[u8], path: &Path) -> Result<Vec<u8>, Uncompilable> {
        let value = self.direct(source, path)?;
        serde_json::to_vec(&value).map_err(|e| Uncompilable::new(e.to_string()))
    }

    fn deserialize(&self, storage: &[u8]) -> Result<Self::Output, Corrupt> {
        serde_json::from_slice(storage).map_err(|e| Corrupt::new(e.to_string()))
    }

    fn direct(&self, source: &[u8], _path: &Path) -> Result<Self::Output, Uncompilable> {
        serde_json::from_slice(source).map_err(|e| Uncompilable::new(e.to_string()))
    }
}

/// Parses YAML into a JSON value; stores compact JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlHandler;

impl Handler for YamlHandler {
    type Output = serde_json::Value;

    fn compile(&self, source: &[u8], path: &Path) -> Result<Vec<u8>, Uncompilable> {
        let value = self.direct(source, path)?;
        serde_json::to_vec(&value).map_err(|e| Uncompilable::new(e.to_string()))
    }

    fn deserialize(&self, storage: &[u8]) -> Result<Self::Output, Corrupt> {
        serde_json::from_slice(storage).map_err(|e| Corrupt::new(e.to_string()))
    }

    fn direct(&self, source: &[u8], _path: &Path) -> Result<Self::Output, Uncompilable> {
        serde_yaml::from_slice(source).map_err(|e| Uncompilable::new(e.to_string()))
    }
}

/// Stores source text verbatim after checking it is UTF-8.
///
/// Stand-in compiler for the `source` kind when no external command is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughHandler;

impl Handler for PassthroughHandler {
    type Output = String;

    fn compile(&self, source: &[u8], path: &Path) -> Result<Vec<u8>, Uncompilable> {
        self.direct(source, path).map(String::into_bytes)
    }

    fn deserialize(&self, storage: &[u8]) -> Result<Self::Output, Corrupt> {
        String::from_utf8(storage.to_vec()).map_err(|e| Corrupt::new(e.to_string()))
    }

    fn direct(&self, source: &[u8], _path: &Path) -> Result<Self::Output, Uncompilable> {
        String::from_utf8(source.to_vec()).map_err(|e| Uncompilable::new(e.to_string()))
    }
}

/// Environment variable naming the file being compiled, set for the command
pub const ENV_SOURCE_PATH: &str = "PREWARM_SOURCE_PATH";

/// Runs an external compiler through the shell.
///
/// The source text is written to the command's stdin and its stdout is the
/// stored artifact. A non-zero exit is reported as [`Uncompilable`] carrying
/// the command's stderr.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    command: String,
}

impl CommandHandler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn run(&self, source: &[u8], path: &Path) -> Result<Vec<u8>, Uncompilable> {
        let shell = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let mut child = Command::new(shell.0)
            .arg(shell.1)
            .arg(&self.command)
            .env(ENV_SOURCE_PATH, path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Uncompilable::new(format!("failed to spawn `{}`: {}", self.command, e)))?;

        // Feed stdin from a thread so a chatty compiler cannot deadlock on a full stdout pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = source.to_vec();
            thread::spawn(move || {
                let _ = stdin.write_all(&input);
            })
        });

        let output = child
            .wait_with_output()
            .map_err(|e| Uncompilable::new(format!("failed to wait for `{}`: {}", self.command, e)))?;
        if let Some(handle) = writer {
            let _ = handle.join();
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Uncompilable::new(stderr.trim()));
        }
        Ok(output.stdout)
    }
}

impl Handler for CommandHandler {
    type Output = Vec<u8>;

    fn compile(&self, source: &[u8], path: &Path) -> Result<Vec<u8>, Uncompilable> {
        self.run(source, path)
    }

    fn deserialize(&self, storage: &[u8]) -> Result<Self::Output, Corrupt> {
        Ok(storage.to_vec())
    }

    fn direct(&self, source: &[u8], path: &Path) -> Result<Self::Output, Uncompilable> {
        self.run(source, path)
    }
}
