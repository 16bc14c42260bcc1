//! Command-info construction and the owned C-string array handed to sudo.

use crate::policy::PolicyError;
use std::ffi::CString;
use std::fs;
use std::os::raw::c_char;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::ptr;

/// Search path used when the environment carries no `PATH`.
pub const FALLBACK_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Command execution timeout handed to the front end, in seconds.
pub const COMMAND_TIMEOUT_SECONDS: u32 = 300;

/// Null-terminated array of C strings owned by the plugin.
///
/// The front end borrows the array (command info, for the lifetime of the
/// invocation); the plugin frees it, never the host. Ownership is asserted
/// at construction: every entry is allocated here and reclaimed on drop.
#[derive(Debug)]
pub struct CStringArray {
    ptrs: Vec<*mut c_char>,
}

// The array is loaned to the front end within one single-threaded plugin
// invocation; no aliasing mutation happens while it is shared.
unsafe impl Send for CStringArray {}

impl CStringArray {
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, PolicyError> {
        let mut ptrs = Vec::with_capacity(entries.len() + 1);
        for entry in entries {
            ptrs.push(CString::new(entry.as_ref())?.into_raw());
        }
        ptrs.push(ptr::null_mut());
        Ok(Self { ptrs })
    }

    /// Pointer handed across the plugin boundary. Valid while `self` lives.
    pub fn as_ptr(&self) -> *const *mut c_char {
        self.ptrs.as_ptr()
    }

    /// Number of entries, excluding the terminator.
    pub fn len(&self) -> usize {
        self.ptrs.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn entries(&self) -> Vec<String> {
        self.ptrs[..self.len()]
            .iter()
            .map(|&ptr| {
                unsafe { std::ffi::CStr::from_ptr(ptr) }
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

impl Drop for CStringArray {
    fn drop(&mut self) {
        for &ptr in &self.ptrs {
            if !ptr.is_null() {
                drop(unsafe { CString::from_raw(ptr) });
            }
        }
    }
}

/// Resolves `command` to the path sudo will execute. Anything containing a
/// slash is taken verbatim; bare names are searched on `path_var` (falling
/// back to [FALLBACK_PATH]), first directory with an executable wins.
pub fn resolve_command_path(
    command: &str,
    path_var: Option<&str>,
) -> Result<PathBuf, PolicyError> {
    if command.contains('/') {
        return Ok(PathBuf::from(command));
    }
    let search = match path_var {
        Some(path) if !path.is_empty() => path,
        _ => FALLBACK_PATH,
    };
    for dir in search.split(':').filter(|dir| !dir.is_empty()) {
        let candidate = Path::new(dir).join(command);
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }
    Err(PolicyError::CommandNotFound(command.to_string()))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// The `key=value` array sudo consumes to execute the command. Either the
/// whole array is built or nothing is: a failing entry aborts construction.
pub fn build_command_info(resolved: &Path, cwd: &Path) -> Result<CStringArray, PolicyError> {
    let entries = [
        format!("command={}", resolved.display()),
        "runas_uid=0".to_string(),
        "runas_gid=0".to_string(),
        format!("cwd={}", cwd.display()),
        format!("timeout={COMMAND_TIMEOUT_SECONDS}"),
    ];
    CStringArray::from_entries(&entries)
}
