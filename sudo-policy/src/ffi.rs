//! The sudo policy-plugin ABI surface.
//!
//! Everything behind this module boundary is pointer marshalling: argv and
//! environment arrays are copied into owned Rust types on the way in, and
//! the only allocations handed back out are [CStringArray]s owned by the
//! session. Pointers received from the front end (`settings`, `user_info`,
//! `user_env`) are loaned: stored raw, read-only, never freed here.
//!
//! Invocation protocol (enforced by sudo, relied on here): `open`, then at
//! most one of `check_policy`/`list`/`validate`, then `close`, all from one
//! thread.

use crate::command_info::CStringArray;
use crate::policy::{CheckOutcome, PolicyEngine, PolicyError};
use crate::principal::{principal_is_valid, resolve_principal};
use sgnl_client::config::{CommandAttribute, SudoSettings};
use sgnl_client::logging::LogDestination;
use sgnl_client::{ClientBuilder, SgnlClient};
use std::collections::HashMap;
use std::env;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_int, c_uint};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::ptr;
use std::sync::Mutex;
use tracing::{debug, error};

pub const SUDO_API_VERSION_MAJOR: c_uint = 1;
pub const SUDO_API_VERSION_MINOR: c_uint = 17;
pub const SUDO_API_VERSION: c_uint = (SUDO_API_VERSION_MAJOR << 16) | SUDO_API_VERSION_MINOR;

/// Plugin type discriminator for policy plugins.
pub const SUDO_POLICY_PLUGIN: c_uint = 1;

/// Front-end return codes.
pub const RC_ACCEPT: c_int = 1;
pub const RC_REJECT: c_int = 0;
pub const RC_ERROR: c_int = -1;
pub const RC_USAGE_ERROR: c_int = -2;

/// Message type for the front end's printf: informational output.
pub const SUDO_CONV_INFO_MSG: c_int = 0x0004;

/// Conversation callback. Unused by this plugin (no prompting), kept opaque.
pub type SudoConv =
    Option<unsafe extern "C" fn(c_int, *const c_void, *mut c_void, *mut c_void) -> c_int>;

/// The front end's printf-style output channel.
pub type SudoPrintf = Option<unsafe extern "C" fn(c_int, *const c_char, ...) -> c_int>;

static ERR_DENIED: &CStr = c"Access denied by SGNL policy";
static ERR_NO_COMMAND: &CStr = c"no command specified";
static ERR_COMMAND_NOT_FOUND: &CStr = c"Command not found";
static ERR_POLICY: &CStr = c"SGNL policy error";
static ERR_API_VERSION: &CStr = c"incompatible sudo plugin API version";

/// Host-loaned string vector. Read-only for the plugin; the pointer stays
/// valid for the invocation because the front end owns it for longer.
struct HostStrings(*const *mut c_char);

// One invocation is single-threaded end to end; the loan never crosses a
// concurrent access.
unsafe impl Send for HostStrings {}

struct PolicySession {
    engine: PolicyEngine<SgnlClient>,
    settings: SudoSettings,
    user_info: HashMap<String, String>,
    user_env: HostStrings,
    printf: SudoPrintf,
    /// Owned until `close`; sudo borrows it after an accepted check.
    command_info: Option<CStringArray>,
}

static SESSION: Mutex<Option<PolicySession>> = Mutex::new(None);

fn session_lock() -> std::sync::MutexGuard<'static, Option<PolicySession>> {
    match SESSION.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Panic barrier: nothing unwinds into the C front end.
fn ffi_guard<F>(f: F) -> c_int
where
    F: FnOnce() -> c_int,
{
    catch_unwind(AssertUnwindSafe(f)).unwrap_or(RC_ERROR)
}

unsafe fn set_errstr(errstr: *mut *const c_char, message: &'static CStr) {
    if !errstr.is_null() {
        *errstr = message.as_ptr();
    }
}

unsafe fn clear_errstr(errstr: *mut *const c_char) {
    if !errstr.is_null() {
        *errstr = ptr::null();
    }
}

/// Copies a null-terminated `char *` vector into owned strings.
unsafe fn copy_string_vector(mut vector: *const *mut c_char) -> Vec<String> {
    let mut strings = Vec::new();
    if vector.is_null() {
        return strings;
    }
    while !(*vector).is_null() {
        strings.push(CStr::from_ptr(*vector).to_string_lossy().into_owned());
        vector = vector.add(1);
    }
    strings
}

/// Copies a `key=value` vector into a map. Entries without `=` are dropped.
unsafe fn copy_keyed_vector(vector: *const *mut c_char) -> HashMap<String, String> {
    copy_string_vector(vector)
        .into_iter()
        .filter_map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_attribute(value: &str) -> Option<CommandAttribute> {
    match value {
        "id" => Some(CommandAttribute::Id),
        "name" => Some(CommandAttribute::Name),
        "displayName" => Some(CommandAttribute::DisplayName),
        _ => None,
    }
}

fn print_info(printf: SudoPrintf, message: &str) {
    let Some(printf) = printf else {
        return;
    };
    let Ok(message) = CString::new(message) else {
        return;
    };
    unsafe {
        printf(SUDO_CONV_INFO_MSG, c"%s\n".as_ptr(), message.as_ptr());
    }
}

/// Builds the client and stores the session. Plugin options recognized:
/// `config_path`, `debug`, `access_msg`, `command_attribute`,
/// `batch_evaluation`.
fn open_session(
    options: HashMap<String, String>,
    user_info: HashMap<String, String>,
    user_env: HostStrings,
    printf: SudoPrintf,
) -> Result<(), PolicyError> {
    let mut builder = ClientBuilder::new().with_log_destination(LogDestination::Stderr);
    if let Some(path) = options.get("config_path") {
        builder = builder.with_config_path(PathBuf::from(path));
    }
    if let Some(debug) = options.get("debug").and_then(|value| parse_flag(value)) {
        builder = builder.with_debug(debug);
    }
    let client = builder.build().map_err(PolicyError::Client)?;

    let mut settings = client.sudo_settings().clone();
    if let Some(flag) = options.get("access_msg").and_then(|value| parse_flag(value)) {
        settings.access_msg = flag;
    }
    if let Some(flag) = options
        .get("batch_evaluation")
        .and_then(|value| parse_flag(value))
    {
        settings.batch_evaluation = flag;
    }
    if let Some(attribute) = options
        .get("command_attribute")
        .and_then(|value| parse_attribute(value))
    {
        settings.command_attribute = attribute;
    }

    let mut guard = session_lock();
    *guard = Some(PolicySession {
        engine: PolicyEngine::new(client),
        settings,
        user_info,
        user_env,
        printf,
        command_info: None,
    });
    Ok(())
}

unsafe extern "C" fn plugin_open(
    version: c_uint,
    _conversation: SudoConv,
    plugin_printf: SudoPrintf,
    _settings: *const *mut c_char,
    user_info: *const *mut c_char,
    user_env: *const *mut c_char,
    plugin_options: *const *mut c_char,
    errstr: *mut *const c_char,
) -> c_int {
    ffi_guard(|| unsafe {
        clear_errstr(errstr);
        if (version >> 16) != SUDO_API_VERSION_MAJOR {
            set_errstr(errstr, ERR_API_VERSION);
            return RC_ERROR;
        }

        let options = copy_keyed_vector(plugin_options);
        let parsed_user_info = copy_keyed_vector(user_info);

        match open_session(
            options,
            parsed_user_info,
            HostStrings(user_env),
            plugin_printf,
        ) {
            Ok(()) => RC_ACCEPT,
            Err(err) => {
                error!(%err, "plugin open failed");
                set_errstr(errstr, ERR_POLICY);
                RC_ERROR
            }
        }
    })
}

unsafe extern "C" fn plugin_check_policy(
    argc: c_int,
    argv: *const *mut c_char,
    _env_add: *mut *mut c_char,
    command_info_out: *mut *mut *mut c_char,
    argv_out: *mut *mut *mut c_char,
    user_env_out: *mut *mut *mut c_char,
    errstr: *mut *const c_char,
) -> c_int {
    ffi_guard(|| unsafe {
        // Out-pointers first: nothing partial ever escapes a failure path.
        for out in [command_info_out, argv_out, user_env_out] {
            if !out.is_null() {
                *out = ptr::null_mut();
            }
        }
        clear_errstr(errstr);

        let mut guard = session_lock();
        let Some(session) = guard.as_mut() else {
            set_errstr(errstr, ERR_POLICY);
            return RC_ERROR;
        };

        if argc < 0 || (argc > 0 && argv.is_null()) {
            set_errstr(errstr, ERR_NO_COMMAND);
            return RC_USAGE_ERROR;
        }
        let mut argv_vec = Vec::with_capacity(argc as usize);
        for i in 0..argc as usize {
            let element = *argv.add(i);
            if element.is_null() {
                break;
            }
            argv_vec.push(CStr::from_ptr(element).to_string_lossy().into_owned());
        }

        let principal = resolve_principal(&session.user_info);
        let path_var = env::var("PATH").ok();
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));

        match session.engine.check_command(
            &principal,
            &argv_vec,
            &session.settings,
            path_var.as_deref(),
            &cwd,
        ) {
            Ok(CheckOutcome::Accept {
                command_info,
                access_message,
            }) => {
                if let Some(message) = access_message {
                    print_info(session.printf, &message);
                }
                let stored = session.command_info.insert(command_info);
                if !command_info_out.is_null() {
                    *command_info_out = stored.as_ptr() as *mut *mut c_char;
                }
                // argv and the environment pass through host-owned.
                if !argv_out.is_null() {
                    *argv_out = argv as *mut *mut c_char;
                }
                if !user_env_out.is_null() {
                    *user_env_out = session.user_env.0 as *mut *mut c_char;
                }
                RC_ACCEPT
            }
            Ok(CheckOutcome::Reject { .. }) => {
                set_errstr(errstr, ERR_DENIED);
                RC_REJECT
            }
            Err(PolicyError::NoCommand) => {
                set_errstr(errstr, ERR_NO_COMMAND);
                RC_REJECT
            }
            Err(PolicyError::CommandNotFound(command)) => {
                debug!(%command, "command not found on PATH");
                set_errstr(errstr, ERR_COMMAND_NOT_FOUND);
                RC_ERROR
            }
            Err(err) => {
                error!(%err, "policy check failed");
                set_errstr(errstr, ERR_POLICY);
                RC_ERROR
            }
        }
    })
}

unsafe extern "C" fn plugin_list(
    argc: c_int,
    argv: *const *mut c_char,
    _verbose: c_int,
    list_user: *const c_char,
    errstr: *mut *const c_char,
) -> c_int {
    ffi_guard(|| unsafe {
        clear_errstr(errstr);
        let mut guard = session_lock();
        let Some(session) = guard.as_mut() else {
            set_errstr(errstr, ERR_POLICY);
            return RC_ERROR;
        };

        let principal = if list_user.is_null() {
            resolve_principal(&session.user_info)
        } else {
            let listed = CStr::from_ptr(list_user).to_string_lossy().into_owned();
            if listed.is_empty() {
                resolve_principal(&session.user_info)
            } else {
                listed
            }
        };

        let command = (argc > 0 && !argv.is_null() && !(*argv).is_null())
            .then(|| CStr::from_ptr(*argv).to_string_lossy().into_owned());

        match session.engine.list(&principal, command.as_deref()) {
            Ok(lines) => {
                for line in lines {
                    print_info(session.printf, &line);
                }
                RC_ACCEPT
            }
            Err(err) => {
                error!(%err, "list failed");
                set_errstr(errstr, ERR_POLICY);
                RC_ERROR
            }
        }
    })
}

unsafe extern "C" fn plugin_show_version(_verbose: c_int) -> c_int {
    ffi_guard(|| {
        let guard = session_lock();
        if let Some(session) = guard.as_ref() {
            print_info(
                session.printf,
                &format!("SGNL sudo policy plugin version {}", crate::VERSION),
            );
        }
        RC_ACCEPT
    })
}

unsafe extern "C" fn plugin_validate(errstr: *mut *const c_char) -> c_int {
    ffi_guard(|| unsafe {
        clear_errstr(errstr);
        let guard = session_lock();
        let Some(session) = guard.as_ref() else {
            set_errstr(errstr, ERR_POLICY);
            return RC_ERROR;
        };
        if principal_is_valid(&resolve_principal(&session.user_info)) {
            RC_ACCEPT
        } else {
            set_errstr(errstr, ERR_POLICY);
            RC_ERROR
        }
    })
}

unsafe extern "C" fn plugin_invalidate(_rmcred: c_int) {
    // No credentials are cached: nothing to invalidate.
}

unsafe extern "C" fn plugin_init_session(
    _pwd: *mut c_void,
    user_env_out: *mut *mut *mut c_char,
    errstr: *mut *const c_char,
) -> c_int {
    ffi_guard(|| unsafe {
        clear_errstr(errstr);
        let guard = session_lock();
        let Some(session) = guard.as_ref() else {
            set_errstr(errstr, ERR_POLICY);
            return RC_ERROR;
        };
        debug!("session initialization");
        if !user_env_out.is_null() {
            *user_env_out = session.user_env.0 as *mut *mut c_char;
        }
        RC_ACCEPT
    })
}

unsafe extern "C" fn plugin_close(exit_status: c_int, error: c_int) {
    let _ = catch_unwind(AssertUnwindSafe(|| {
        debug!(exit_status, error, "invocation closed");
        // Dropping the session drops the client (token buffer zeroed) and
        // the command-info array the front end has finished with.
        *session_lock() = None;
    }));
}

#[repr(C)]
pub struct PolicyPlugin {
    pub type_: c_uint,
    pub version: c_uint,
    pub open: Option<
        unsafe extern "C" fn(
            c_uint,
            SudoConv,
            SudoPrintf,
            *const *mut c_char,
            *const *mut c_char,
            *const *mut c_char,
            *const *mut c_char,
            *mut *const c_char,
        ) -> c_int,
    >,
    pub close: Option<unsafe extern "C" fn(c_int, c_int)>,
    pub show_version: Option<unsafe extern "C" fn(c_int) -> c_int>,
    pub check_policy: Option<
        unsafe extern "C" fn(
            c_int,
            *const *mut c_char,
            *mut *mut c_char,
            *mut *mut *mut c_char,
            *mut *mut *mut c_char,
            *mut *mut *mut c_char,
            *mut *const c_char,
        ) -> c_int,
    >,
    pub list: Option<
        unsafe extern "C" fn(
            c_int,
            *const *mut c_char,
            c_int,
            *const c_char,
            *mut *const c_char,
        ) -> c_int,
    >,
    pub validate: Option<unsafe extern "C" fn(*mut *const c_char) -> c_int>,
    pub invalidate: Option<unsafe extern "C" fn(c_int)>,
    pub init_session: Option<
        unsafe extern "C" fn(*mut c_void, *mut *mut *mut c_char, *mut *const c_char) -> c_int,
    >,
    pub register_hooks: Option<unsafe extern "C" fn(c_int, *mut c_void)>,
    pub deregister_hooks: Option<unsafe extern "C" fn(c_int, *mut c_void)>,
    pub event_alloc: Option<unsafe extern "C" fn() -> *mut c_void>,
}

/// The symbol sudo.conf points at.
#[no_mangle]
#[allow(non_upper_case_globals)]
pub static sgnl_policy: PolicyPlugin = PolicyPlugin {
    type_: SUDO_POLICY_PLUGIN,
    version: SUDO_API_VERSION,
    open: Some(plugin_open),
    close: Some(plugin_close),
    show_version: Some(plugin_show_version),
    check_policy: Some(plugin_check_policy),
    list: Some(plugin_list),
    validate: Some(plugin_validate),
    invalidate: Some(plugin_invalidate),
    init_session: Some(plugin_init_session),
    register_hooks: None,
    deregister_hooks: None,
    event_alloc: None,
};
