use nix::errno::Errno;
use nix::unistd::gethostname;
use std::ffi::OsString;

#[cfg_attr(test, mockall::automock)]
pub trait Hostname {
    fn get(&self) -> Result<OsString, Errno>;
}

#[derive(Default)]
pub struct HostnameGetter;

impl Hostname for HostnameGetter {
    fn get(&self) -> Result<OsString, Errno> {
        gethostname()
    }
}
