//! libpam binding: the `pam_sm_*` entry points.
//!
//! Compiled only with the `pam` feature, which links against the host's
//! libpam. Identity items are copied out of the handle before any decision
//! work; the handle itself is owned by the PAM stack and only passed back
//! into libpam calls.

use crate::{account_check, cleanup, PAM_AUTHINFO_UNAVAIL, PAM_SUCCESS};
use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

/// Item types from `_pam_types.h`.
const PAM_SERVICE: c_int = 1;
const PAM_RHOST: c_int = 4;

/// Opaque PAM handle.
#[repr(C)]
pub struct PamHandle {
    _private: [u8; 0],
}

#[link(name = "pam")]
extern "C" {
    fn pam_get_user(
        pamh: *mut PamHandle,
        user: *mut *const c_char,
        prompt: *const c_char,
    ) -> c_int;
    fn pam_get_item(
        pamh: *const PamHandle,
        item_type: c_int,
        item: *mut *const c_void,
    ) -> c_int;
}

unsafe fn user_string(pamh: *mut PamHandle) -> Option<String> {
    let mut user: *const c_char = ptr::null();
    if pam_get_user(pamh, &mut user, ptr::null()) != PAM_SUCCESS || user.is_null() {
        return None;
    }
    Some(CStr::from_ptr(user).to_string_lossy().into_owned())
}

unsafe fn item_string(pamh: *const PamHandle, item_type: c_int) -> Option<String> {
    let mut item: *const c_void = ptr::null();
    if pam_get_item(pamh, item_type, &mut item) != PAM_SUCCESS || item.is_null() {
        return None;
    }
    Some(
        CStr::from_ptr(item as *const c_char)
            .to_string_lossy()
            .into_owned(),
    )
}

/// The integration point: account management.
#[no_mangle]
pub unsafe extern "C" fn pam_sm_acct_mgmt(
    pamh: *mut PamHandle,
    _flags: c_int,
    _argc: c_int,
    _argv: *const *const c_char,
) -> c_int {
    catch_unwind(AssertUnwindSafe(|| {
        let (user, service, rhost) = unsafe {
            (
                user_string(pamh),
                item_string(pamh, PAM_SERVICE),
                item_string(pamh, PAM_RHOST),
            )
        };
        account_check(user.as_deref(), service.as_deref(), rhost.as_deref()).pam_code()
    }))
    .unwrap_or(PAM_AUTHINFO_UNAVAIL)
}

/// Not an integration point: credentials are none of this module's business.
#[no_mangle]
pub unsafe extern "C" fn pam_sm_setcred(
    _pamh: *mut PamHandle,
    _flags: c_int,
    _argc: c_int,
    _argv: *const *const c_char,
) -> c_int {
    PAM_SUCCESS
}

/// Not an integration point: this module never prompts for or validates
/// passwords.
#[no_mangle]
pub unsafe extern "C" fn pam_sm_authenticate(
    _pamh: *mut PamHandle,
    _flags: c_int,
    _argc: c_int,
    _argv: *const *const c_char,
) -> c_int {
    PAM_SUCCESS
}

/// Module-unload hook: drops the process client (zeroing the token).
#[no_mangle]
pub unsafe extern "C" fn pam_sgnl_cleanup() {
    let _ = catch_unwind(AssertUnwindSafe(cleanup));
}
