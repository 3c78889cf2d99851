use std::io;

use tracing::debug;

/// Run `op`, transparently retrying while it fails with
/// [`io::ErrorKind::Interrupted`].
///
/// Signal delivery can interrupt a blocking socket call mid-wait; that is
/// not a failure of the operation, so the call is simply reissued. Every
/// other outcome passes through untouched.
pub fn retry_interrupted<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match op() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                debug!("interrupted system call, retrying");
            }
            other => return other,
        }
    }
}
