pub mod env;
pub mod init;
pub mod reqwest_helper;

/// Log the error of a `Result` without consuming it, keeping the call site
/// terse.
#[macro_export]
macro_rules! log_err {
    ($res:expr) => {
        if let Err(err) = &$res {
            tracing::error!("{:?}", err);
        }
    };
}
